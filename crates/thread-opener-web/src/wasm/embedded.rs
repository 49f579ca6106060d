#![forbid(unsafe_code)]

//! The chat composer inside a panel's embedded document.

use core::time::Duration;

use thread_opener_core::autofill::ComposerHost;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, Event, EventInit, HtmlElement, HtmlTextAreaElement, InputEvent,
    InputEventInit, Window,
};
use web_time::Instant;

pub(crate) struct DomComposer {
    window: Window,
    document: Document,
    epoch: Instant,
}

impl DomComposer {
    pub(crate) fn new(window: Window, document: Document) -> Self {
        Self {
            window,
            document,
            epoch: Instant::now(),
        }
    }

    fn fill_textarea(area: &HtmlTextAreaElement, text: &str) -> Result<(), JsValue> {
        area.focus()?;
        area.set_value(text);
        let end = u32::try_from(text.encode_utf16().count()).unwrap_or(u32::MAX);
        area.set_selection_range(end, end)?;
        Ok(())
    }

    fn fill_editable(&self, editable: &Element, text: &str) -> Result<(), JsValue> {
        if let Some(html) = editable.dyn_ref::<HtmlElement>() {
            html.focus()?;
        }
        editable.set_text_content(None);
        for line in text.split('\n') {
            let paragraph = self.document.create_element("p")?;
            if line.is_empty() {
                paragraph.append_child(&self.document.create_element("br")?)?;
            } else {
                paragraph.set_text_content(Some(line));
            }
            editable.append_child(&paragraph)?;
        }
        self.caret_to_end(editable)
    }

    fn caret_to_end(&self, element: &Element) -> Result<(), JsValue> {
        let Some(selection) = self.window.get_selection()? else {
            return Ok(());
        };
        let range = self.document.create_range()?;
        range.select_node_contents(element)?;
        range.collapse_with_to_start(false);
        selection.remove_all_ranges()?;
        selection.add_range(&range)?;
        Ok(())
    }

    fn announce(element: &Element, text: &str) -> Result<(), JsValue> {
        let init = InputEventInit::new();
        init.set_bubbles(true);
        init.set_input_type("insertText");
        init.set_data(Some(text));
        let input = InputEvent::new_with_event_init_dict("input", &init)?;
        element.dispatch_event(&input)?;

        let init = EventInit::new();
        init.set_bubbles(true);
        let change = Event::new_with_event_init_dict("change", &init)?;
        element.dispatch_event(&change)?;
        Ok(())
    }
}

impl ComposerHost for DomComposer {
    type Input = Element;

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn query_input(&self, selector: &str) -> Option<Element> {
        self.document.query_selector(selector).ok().flatten()
    }

    fn fill_input(&mut self, input: &Element, text: &str) {
        let filled = match input.dyn_ref::<HtmlTextAreaElement>() {
            Some(area) => Self::fill_textarea(area, text),
            None => self.fill_editable(input, text),
        };
        match filled.and_then(|()| Self::announce(input, text)) {
            Ok(()) => debug!(chars = text.chars().count(), "chat input filled"),
            Err(err) => warn!(error = ?err, "chat input fill incomplete"),
        }
    }
}

#![forbid(unsafe_code)]

//! Delegated DOM listeners for the chat page.
//!
//! Every listener lives on `window` or `document`; targets are resolved with
//! `closest()` against the attributes in [`crate::dom_names`], so panels and
//! tabs can be rebuilt freely without rebinding anything.

use core::time::Duration;

use thread_opener_core::geometry::{GeometryController, Point};
use thread_opener_core::host::PanelHost;
use thread_opener_core::keys::KeyInput;
use thread_opener_core::manager::INERT_URL;
use thread_opener_core::{PanelId, PanelManager, ThreadOpenerConfig};
use tracing::{debug, trace};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, Event, HtmlIFrameElement, KeyboardEvent, MouseEvent, Window};

use crate::dom_names::{
    ACTION_ATTR, AFFORDANCE_ATTR, FRAME_ATTR, HANDLE_ATTR, HIJACK_ATTR, PANEL_CLASS,
    PANEL_ID_ATTR, SURFACE_ATTR, SurfaceAction, has_attr, parse_affordance_id, parse_handle,
    parse_panel_id,
};

use super::dom_host::DomHost;
use super::storage::SessionStore;
use super::{Driver, Shared, listen};

/// Panel manager plus the one drag/resize controller shared by all panels.
pub(crate) struct HostDriver {
    manager: PanelManager<DomHost, SessionStore>,
    geometry: GeometryController<PanelId>,
}

impl HostDriver {
    pub(crate) fn new(host: DomHost, store: SessionStore, config: ThreadOpenerConfig) -> Self {
        let geometry = GeometryController::new(config.geometry());
        Self {
            manager: PanelManager::new(host, store, config),
            geometry,
        }
    }

    pub(crate) fn set_clipboard_waker(&mut self, wake: js_sys::Function) {
        self.manager.host_mut().set_clipboard_waker(wake);
    }

    fn dispatch(&mut self, action: SurfaceAction, panel: PanelId) -> bool {
        match action {
            SurfaceAction::Minimize => self.manager.minimize_panel(panel),
            SurfaceAction::Expand => self.manager.expand_panel(panel),
            SurfaceAction::Copy => self.manager.recopy_context(panel),
            SurfaceAction::OpenExternal => self.manager.open_in_new_context(panel),
            SurfaceAction::Close => {
                let closed = self.manager.close_panel(panel);
                if closed {
                    self.geometry.cancel_for(panel);
                }
                closed
            }
        }
    }
}

impl Driver for HostDriver {
    fn now(&self) -> Duration {
        self.manager.host().now()
    }

    fn observer_count(&self) -> usize {
        self.manager.observer_count()
    }

    fn next_wakeup(&self) -> Option<Duration> {
        self.manager.next_wakeup()
    }

    fn on_mutations(&mut self) {
        self.manager.on_mutations();
    }

    fn tick(&mut self) {
        let settled = self.manager.host().take_settled_clipboard();
        for (panel, result) in settled {
            self.manager.on_clipboard_settled(panel, result);
        }
        self.manager.tick();
    }
}

fn event_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

fn closest(element: &Element, selector: &str) -> Option<Element> {
    element.closest(selector).ok().flatten()
}

fn panel_of(element: &Element) -> Option<PanelId> {
    closest(element, &has_attr(PANEL_ID_ATTR))?
        .get_attribute(PANEL_ID_ATTR)
        .and_then(|value| parse_panel_id(&value))
}

fn pointer(event: &MouseEvent) -> Point {
    Point::new(f64::from(event.client_x()), f64::from(event.client_y()))
}

fn on_click(driver: &mut HostDriver, event: &MouseEvent) {
    let Some(target) = event_element(event) else {
        return;
    };

    if let Some(affordance) = closest(&target, &has_attr(HIJACK_ATTR)) {
        event.prevent_default();
        event.stop_immediate_propagation();
        let opened = affordance
            .get_attribute(AFFORDANCE_ATTR)
            .and_then(|value| parse_affordance_id(&value))
            .and_then(|id| driver.manager.activate_hijack(id));
        if opened.is_none() {
            debug!("hijacked affordance clicked without a qualifying selection");
        }
        return;
    }

    let Some(control) = closest(&target, &has_attr(ACTION_ATTR)) else {
        return;
    };
    let Some(action) = control
        .get_attribute(ACTION_ATTR)
        .and_then(|value| SurfaceAction::parse(&value))
    else {
        return;
    };
    let Some(panel) = panel_of(&control) else {
        return;
    };
    event.stop_propagation();
    let applied = driver.dispatch(action, panel);
    trace!(panel_id = %panel, ?action, applied, "surface action");
}

fn on_mouse_down(driver: &mut HostDriver, event: &MouseEvent) {
    if event.button() != 0 {
        return;
    }
    let Some(target) = event_element(event) else {
        return;
    };
    let Some(handle) = closest(&target, &has_attr(HANDLE_ATTR)) else {
        return;
    };
    let Some(kind) = handle
        .get_attribute(HANDLE_ATTR)
        .and_then(|value| parse_handle(&value))
    else {
        return;
    };
    let Some(panel) = closest(&handle, &format!(".{PANEL_CLASS}")).and_then(|root| panel_of(&root))
    else {
        return;
    };
    let Some(frame) = driver.manager.host().panel_frame(panel) else {
        return;
    };
    let on_action_button = closest(&target, &has_attr(ACTION_ATTR)).is_some();
    match driver
        .geometry
        .pointer_down(panel, kind, pointer(event), frame, on_action_button)
    {
        Ok(()) => {
            event.prevent_default();
            driver.manager.host().set_gesture_active(panel, kind, true);
        }
        Err(reason) => trace!(panel_id = %panel, ?reason, "gesture ignored"),
    }
}

fn on_mouse_move(driver: &mut HostDriver, event: &MouseEvent) {
    if let Some(update) = driver.geometry.pointer_move(pointer(event)) {
        driver.manager.host().apply_geometry(update);
    }
}

fn on_mouse_up(driver: &mut HostDriver, event: &MouseEvent) {
    if let Some((panel, kind)) = driver.geometry.pointer_up() {
        driver.manager.host().set_gesture_active(panel, kind, false);
        return;
    }
    let in_surface = event_element(event)
        .and_then(|target| closest(&target, &has_attr(SURFACE_ATTR)))
        .is_some();
    if !in_surface {
        driver.manager.on_selection_gesture();
    }
}

fn on_key_down(driver: &mut HostDriver, event: &KeyboardEvent) {
    let input = KeyInput {
        key: event.key(),
        ctrl: event.ctrl_key(),
        meta: event.meta_key(),
        shift: event.shift_key(),
    };
    if driver.manager.handle_key(&input) {
        event.prevent_default();
        event.stop_propagation();
    }
}

/// Frame `load` does not bubble, so this listens in the capture phase.
fn on_load(driver: &mut HostDriver, event: &Event) {
    let Some(frame) = event
        .target()
        .and_then(|target| target.dyn_into::<HtmlIFrameElement>().ok())
    else {
        return;
    };
    let Some(panel) = frame
        .get_attribute(FRAME_ATTR)
        .and_then(|value| parse_panel_id(&value))
    else {
        return;
    };
    let src = frame.src();
    if src.is_empty() || src == INERT_URL {
        return;
    }
    driver.manager.on_embedded_loaded(panel);
}

pub(super) fn attach(
    window: &Window,
    document: &Document,
    runtime: &Shared<HostDriver>,
) -> Result<(), JsValue> {
    listen::<_, MouseEvent>(window, "click", true, runtime, on_click)?;
    listen::<_, MouseEvent>(document, "mousedown", false, runtime, on_mouse_down)?;
    listen::<_, MouseEvent>(document, "mousemove", false, runtime, on_mouse_move)?;
    listen::<_, MouseEvent>(document, "mouseup", false, runtime, on_mouse_up)?;
    listen::<_, KeyboardEvent>(document, "keydown", false, runtime, on_key_down)?;
    listen::<_, Event>(document, "load", true, runtime, on_load)?;
    Ok(())
}

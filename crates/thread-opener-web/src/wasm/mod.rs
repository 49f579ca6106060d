#![forbid(unsafe_code)]

//! `wasm-bindgen` entry point and the DOM plumbing that drives the core.
//!
//! The core never touches the event loop. Each driver reports how many
//! conditions it is awaiting and when its next deadline is; after every
//! callback [`Pulse::sync`] connects or disconnects the one
//! `MutationObserver` and re-arms the one timeout to match.
//! Only compiled on `wasm32` targets.

mod console;
mod dom_host;
mod embedded;
mod host_events;
mod storage;

use core::cell::{Cell, RefCell};
use core::time::Duration;
use std::rc::Rc;

use thread_opener_core::ThreadOpenerConfig;
use thread_opener_core::autofill::{AutofillSession, ComposerHost};
use thread_opener_core::handoff::EphemeralStore;
use tracing::{debug, info, trace, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Event, EventTarget, MutationObserver, MutationObserverInit, Node, Window};

use crate::dom_names::OBSERVED_ATTRIBUTES;
use crate::frame_role::FrameRole;

use self::dom_host::DomHost;
use self::embedded::DomComposer;
use self::host_events::HostDriver;
use self::storage::SessionStore;

thread_local! {
    static STARTED: Cell<bool> = const { Cell::new(false) };
}

/// Something the page's event loop has to poke.
trait Driver {
    fn now(&self) -> Duration;
    fn observer_count(&self) -> usize;
    fn next_wakeup(&self) -> Option<Duration>;
    fn on_mutations(&mut self);
    fn tick(&mut self);
}

impl<C: ComposerHost, S: EphemeralStore> Driver for AutofillSession<C, S> {
    fn now(&self) -> Duration {
        self.host().now()
    }

    fn observer_count(&self) -> usize {
        AutofillSession::observer_count(self)
    }

    fn next_wakeup(&self) -> Option<Duration> {
        AutofillSession::next_wakeup(self)
    }

    fn on_mutations(&mut self) {
        let _ = AutofillSession::on_mutations(self);
    }

    fn tick(&mut self) {
        let _ = AutofillSession::tick(self);
    }
}

fn observed_attributes() -> js_sys::Array {
    OBSERVED_ATTRIBUTES
        .iter()
        .map(|name| JsValue::from_str(name))
        .collect()
}

/// Observer and timer handles shared by both frame roles.
struct Pulse {
    window: Window,
    target: Node,
    observer: Option<MutationObserver>,
    observing: bool,
    wake: Option<Closure<dyn FnMut()>>,
    pending: Option<i32>,
}

impl Pulse {
    fn new(window: Window, target: Node) -> Self {
        Self {
            window,
            target,
            observer: None,
            observing: false,
            wake: None,
            pending: None,
        }
    }

    fn sync(&mut self, observers: usize, now: Duration, next_wakeup: Option<Duration>) {
        let wanted = observers > 0;
        if let Some(observer) = &self.observer
            && wanted != self.observing
        {
            if wanted {
                let options = MutationObserverInit::new();
                options.set_child_list(true);
                options.set_subtree(true);
                // Host controls are often shown by toggling these rather than
                // by insertion. Our own data attributes stay out of the filter.
                options.set_attributes(true);
                options.set_attribute_filter(&observed_attributes());
                match observer.observe_with_options(&self.target, &options) {
                    Ok(()) => self.observing = true,
                    Err(err) => warn!(error = ?err, "mutation observer refused to start"),
                }
            } else {
                observer.disconnect();
                self.observing = false;
            }
            trace!(observing = self.observing, observers, "observer toggled");
        }

        if let Some(handle) = self.pending.take() {
            self.window.clear_timeout_with_handle(handle);
        }
        let (Some(deadline), Some(wake)) = (next_wakeup, &self.wake) else {
            return;
        };
        let delay = deadline.saturating_sub(now);
        let millis = i32::try_from(delay.as_micros().div_ceil(1_000)).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                wake.as_ref().unchecked_ref(),
                millis,
            ) {
            Ok(handle) => self.pending = Some(handle),
            Err(err) => warn!(error = ?err, "failed to arm wake-up timer"),
        }
    }

    /// The wake-up callback, for continuations that settle outside a DOM event.
    fn wake_function(&self) -> Option<js_sys::Function> {
        self.wake
            .as_ref()
            .map(|wake| wake.as_ref().unchecked_ref::<js_sys::Function>().clone())
    }
}

struct Runtime<D> {
    driver: D,
    pulse: Pulse,
}

impl<D: Driver> Runtime<D> {
    fn sync(&mut self) {
        let Self { driver, pulse } = self;
        pulse.sync(driver.observer_count(), driver.now(), driver.next_wakeup());
    }
}

type Shared<D> = Rc<RefCell<Runtime<D>>>;

/// Run `f` against the driver, then resync observer and timer.
fn with_driver<D: Driver>(runtime: &RefCell<Runtime<D>>, f: impl FnOnce(&mut D)) {
    let Ok(mut runtime) = runtime.try_borrow_mut() else {
        trace!("nested DOM callback skipped");
        return;
    };
    f(&mut runtime.driver);
    runtime.sync();
}

fn start<D: Driver + 'static>(
    window: Window,
    target: Node,
    driver: D,
) -> Result<Shared<D>, JsValue> {
    let runtime = Rc::new(RefCell::new(Runtime {
        driver,
        pulse: Pulse::new(window, target),
    }));

    // Forgotten closures hold the runtime for the life of the page.
    let shared = Rc::clone(&runtime);
    let on_mutations = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        move |_records: js_sys::Array, _observer: MutationObserver| {
            with_driver(&shared, |driver: &mut D| driver.on_mutations());
        },
    );
    let observer = MutationObserver::new(on_mutations.as_ref().unchecked_ref())?;
    on_mutations.forget();

    let weak = Rc::downgrade(&runtime);
    let wake = Closure::<dyn FnMut()>::new(move || {
        if let Some(runtime) = weak.upgrade() {
            with_driver(&runtime, |driver: &mut D| driver.tick());
        }
    });

    {
        let mut borrowed = runtime.borrow_mut();
        borrowed.pulse.observer = Some(observer);
        borrowed.pulse.wake = Some(wake);
        borrowed.sync();
    }
    Ok(runtime)
}

/// Attach a delegated listener that hands typed events to `handler`.
fn listen<D, E>(
    target: &EventTarget,
    kind: &str,
    capture: bool,
    runtime: &Shared<D>,
    handler: fn(&mut D, &E),
) -> Result<(), JsValue>
where
    D: Driver + 'static,
    E: JsCast + 'static,
{
    let shared = Rc::clone(runtime);
    let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        let Ok(event) = event.dyn_into::<E>() else {
            return;
        };
        with_driver(&shared, |driver| handler(driver, &event));
    });
    target.add_event_listener_with_callback_and_bool(
        kind,
        closure.as_ref().unchecked_ref(),
        capture,
    )?;
    closure.forget();
    Ok(())
}

fn observe_root(document: &web_sys::Document) -> Result<Node, JsValue> {
    document
        .document_element()
        .map(Node::from)
        .ok_or_else(|| JsValue::from_str("document has no root element"))
}

fn start_host(
    window: Window,
    document: web_sys::Document,
    config: ThreadOpenerConfig,
) -> Result<(), JsValue> {
    let store = SessionStore::new(&window);
    let target = observe_root(&document)?;
    let driver = HostDriver::new(
        DomHost::new(window.clone(), document.clone()),
        store,
        config,
    );
    let runtime = start(window.clone(), target, driver)?;
    let wake = runtime.borrow().pulse.wake_function();
    if let Some(wake) = wake {
        runtime.borrow_mut().driver.set_clipboard_waker(wake);
    }
    host_events::attach(&window, &document, &runtime)?;
    info!("thread opener ready");
    Ok(())
}

fn start_embedded(
    window: Window,
    document: web_sys::Document,
    config: &ThreadOpenerConfig,
) -> Result<(), JsValue> {
    let fragment = window.location().hash().unwrap_or_default();
    let store = SessionStore::new(&window);
    let target = observe_root(&document)?;
    let mut session = AutofillSession::new(
        DomComposer::new(window.clone(), document),
        store,
        config.autofill_timeout(),
    );
    let state = session.start(&fragment);
    debug!(?state, "embedded panel document");
    start(window, target, session)?;
    Ok(())
}

/// Start the content script in the current frame. Safe to call more than once.
///
/// `config_json` may override any subset of the configuration fields.
#[wasm_bindgen]
pub fn init(config_json: Option<String>) -> Result<(), JsValue> {
    console::install_panic_hook();
    console::install_logging();

    let config = match config_json.as_deref() {
        Some(json) => ThreadOpenerConfig::from_json(json)
            .map_err(|err| JsValue::from_str(&err.to_string()))?,
        None => ThreadOpenerConfig::default(),
    };
    if STARTED.with(|started| started.replace(true)) {
        debug!("already started in this frame");
        return Ok(());
    }

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("window has no document"))?;
    let is_top_level = matches!(window.top(), Ok(Some(top)) if top == window);
    let fragment = window.location().hash().unwrap_or_default();

    match FrameRole::detect(is_top_level, &fragment) {
        FrameRole::Host => start_host(window, document, config),
        FrameRole::Embedded(panel) => {
            debug!(panel_id = %panel, "running inside a panel");
            start_embedded(window, document, &config)
        }
        FrameRole::Inert => {
            trace!("frame is neither the chat page nor a panel");
            Ok(())
        }
    }
}

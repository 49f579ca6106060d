#![forbid(unsafe_code)]

//! Browser console sinks: the panic hook and the `tracing` writer.

use std::io;

use js_sys::Reflect;
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

fn console_call(method: &str, msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(func) = Reflect::get(&console, &method.into()) else {
        return;
    };
    let Ok(func) = func.dyn_into::<js_sys::Function>() else {
        return;
    };
    let _ = func.call1(&console, &JsValue::from_str(msg));
}

pub(crate) fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "thread-opener panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("thread-opener panic: {info}")
            };
            console_call("error", &msg);
        }));
    });
}

/// One formatted event. Emitted to the console when dropped.
#[derive(Debug, Default)]
pub(crate) struct ConsoleLine {
    buf: Vec<u8>,
}

impl io::Write for ConsoleLine {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleLine {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        let method = if line.starts_with("ERROR") {
            "error"
        } else if line.starts_with(" WARN") || line.starts_with("WARN") {
            "warn"
        } else {
            "log"
        };
        console_call(method, line);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ConsoleWriter;

impl<'a> MakeWriter<'a> for ConsoleWriter {
    type Writer = ConsoleLine;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleLine::default()
    }
}

/// Route `tracing` events to the console. Later calls are no-ops.
pub(crate) fn install_logging() {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(ConsoleWriter)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

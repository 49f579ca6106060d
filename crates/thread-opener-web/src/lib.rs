#![forbid(unsafe_code)]

//! Browser content script for the thread opener.
//!
//! The extension's loader calls the exported `init(configJson?)` once per
//! frame. The top-level chat page gets a [`thread_opener_core::PanelManager`]
//! over the live DOM; a panel's embedded document gets an
//! [`thread_opener_core::autofill::AutofillSession`]; every other frame is
//! left untouched (see [`frame_role::FrameRole`]).
//!
//! DOM bindings live in the `wasm` module and only compile for `wasm32`. The
//! attribute vocabulary and frame-role logic compile everywhere.

pub mod dom_names;
pub mod frame_role;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::init;

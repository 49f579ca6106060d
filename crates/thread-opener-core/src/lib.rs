#![forbid(unsafe_code)]

//! `thread-opener-core` is the platform-independent half of the thread opener:
//! floating side-thread panels spun off a chat page's text selection.
//!
//! Design goals:
//! - **Host-driven**: the embedding page pushes events (keys, clicks, mutation
//!   batches, load signals) and owns the clock; nothing here blocks or spawns.
//! - **One owner**: [`manager::PanelManager`] holds the registry, tab strip,
//!   hijack guard flags, selection snapshot, timers, and polls.
//! - **Deterministic**: every deferred continuation is a deadline on the host's
//!   monotonic clock, so native tests replay browser timelines exactly.
//!
//! This crate does not bind to `wasm-bindgen`; `thread-opener-web` wraps it
//! with DOM implementations of [`host::PanelHost`],
//! [`autofill::ComposerHost`], and [`handoff::EphemeralStore`].

pub mod autofill;
pub mod config;
pub mod error;
pub mod geometry;
pub mod handoff;
pub mod hijack;
pub mod host;
pub mod keys;
pub mod manager;
pub mod panel;
pub mod poll;
pub mod relocate;
pub mod testing;
pub mod timers;

pub use config::ThreadOpenerConfig;
pub use error::{ConfigError, HostError};
pub use manager::PanelManager;
pub use panel::{LoadState, Panel, PanelId, VisualState};

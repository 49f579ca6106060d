#![forbid(unsafe_code)]

//! Error types shared by hosts and configuration loading.
//!
//! Panel lifecycle operations never fail: stale ids are no-ops and host
//! side-channel failures are logged and swallowed. These types exist for the
//! two places where a failure is a value: host side effects that the core
//! needs to observe, and configuration parsing.

use thiserror::Error;

/// Failure reported by a host side channel (clipboard, ephemeral store).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The clipboard write was rejected (document not focused, permission denied).
    #[error("clipboard write rejected: {0}")]
    ClipboardRejected(String),
    /// The tab-scoped ephemeral store refused the operation.
    #[error("ephemeral store unavailable: {0}")]
    StorageUnavailable(String),
}

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config field `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#![forbid(unsafe_code)]

//! Tuning knobs for panel placement, polling deadlines, and relocation.
//!
//! The extension loader may pass a JSON object overriding any subset of the
//! fields; missing fields keep their defaults.

use core::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::geometry::GeometryConfig;

/// Runtime configuration for the thread opener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThreadOpenerConfig {
    /// Minimum trimmed selection length (chars) that can seed a panel.
    pub min_selection_chars: usize,
    /// Initial panel width (px).
    pub panel_width: u32,
    /// Initial panel height (px).
    pub panel_height: u32,
    /// Right margin and minimum top offset for a freshly opened panel (px).
    pub panel_margin: u32,
    /// Resize clamp (px).
    pub min_panel_width: u32,
    /// Resize clamp (px).
    pub min_panel_height: u32,
    /// Embedded document load target.
    pub base_url: String,
    /// Query flag appended to `base_url` so the embedded document knows it is embedded.
    pub mode_flag: String,
    /// Upper bound for the reply-affordance watch started by a selection gesture.
    pub hijack_timeout_ms: u64,
    /// Upper bound for the embedded input-region watch.
    pub autofill_timeout_ms: u64,
    /// Grace period before an embedded document that never loaded shows its fallback.
    pub load_grace_ms: u64,
    /// Delay between the relocation scroll request and the text search.
    pub scroll_settle_ms: u64,
    /// How long relocated blocks stay highlighted before fading.
    pub highlight_hold_ms: u64,
    /// Fade duration before the highlight marker is removed.
    pub highlight_fade_ms: u64,
    /// Copy-hint flash duration after a clipboard write.
    pub copy_hint_ms: u64,
    /// Relocation fragments shorter than this (chars, after trimming) are ignored.
    pub min_fragment_chars: usize,
    /// Number of leading fragment chars used as the search key.
    pub search_key_chars: usize,
    /// Tab snippet truncation limit (chars, including the ellipsis).
    pub snippet_chars: usize,
}

impl Default for ThreadOpenerConfig {
    fn default() -> Self {
        Self {
            min_selection_chars: 10,
            panel_width: 480,
            panel_height: 600,
            panel_margin: 20,
            min_panel_width: 320,
            min_panel_height: 400,
            base_url: "https://claude.ai/new".to_owned(),
            mode_flag: "thread-opener=embedded".to_owned(),
            hijack_timeout_ms: 3_000,
            autofill_timeout_ms: 10_000,
            load_grace_ms: 5_000,
            scroll_settle_ms: 500,
            highlight_hold_ms: 2_000,
            highlight_fade_ms: 800,
            copy_hint_ms: 1_500,
            min_fragment_chars: 30,
            search_key_chars: 50,
            snippet_chars: 100,
        }
    }
}

impl ThreadOpenerConfig {
    /// Parse a (possibly partial) JSON object and validate the result.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a component degenerate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.base_url.trim().is_empty() {
            return invalid("base_url", "must not be empty");
        }
        if self.panel_width == 0 || self.panel_height == 0 {
            return invalid("panel_width", "panel dimensions must be positive");
        }
        if self.min_panel_width == 0 || self.min_panel_height == 0 {
            return invalid("min_panel_width", "minimum dimensions must be positive");
        }
        for (field, value) in [
            ("hijack_timeout_ms", self.hijack_timeout_ms),
            ("autofill_timeout_ms", self.autofill_timeout_ms),
            ("load_grace_ms", self.load_grace_ms),
        ] {
            if value == 0 {
                return invalid(field, "timeouts must be positive");
            }
        }
        if self.search_key_chars == 0 {
            return invalid("search_key_chars", "must be positive");
        }
        if self.snippet_chars < 4 {
            return invalid("snippet_chars", "must leave room for an ellipsis");
        }
        Ok(())
    }

    #[must_use]
    pub const fn hijack_timeout(&self) -> Duration {
        Duration::from_millis(self.hijack_timeout_ms)
    }

    #[must_use]
    pub const fn autofill_timeout(&self) -> Duration {
        Duration::from_millis(self.autofill_timeout_ms)
    }

    #[must_use]
    pub const fn load_grace(&self) -> Duration {
        Duration::from_millis(self.load_grace_ms)
    }

    #[must_use]
    pub const fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    #[must_use]
    pub const fn highlight_hold(&self) -> Duration {
        Duration::from_millis(self.highlight_hold_ms)
    }

    #[must_use]
    pub const fn highlight_fade(&self) -> Duration {
        Duration::from_millis(self.highlight_fade_ms)
    }

    #[must_use]
    pub const fn copy_hint(&self) -> Duration {
        Duration::from_millis(self.copy_hint_ms)
    }

    /// Resize clamp for panel surfaces.
    #[must_use]
    pub fn geometry(&self) -> GeometryConfig {
        GeometryConfig {
            min_width: f64::from(self.min_panel_width),
            min_height: f64::from(self.min_panel_height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ThreadOpenerConfig;
    use crate::error::ConfigError;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ThreadOpenerConfig::from_json(r#"{"panel_width": 520}"#)
            .expect("partial config should parse");
        assert_eq!(config.panel_width, 520);
        assert_eq!(config.panel_height, 600);
        assert_eq!(config.min_fragment_chars, 30);
        assert_eq!(config.geometry().min_width, 320.0);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ThreadOpenerConfig::from_json(r#"{"load_grace_ms": 0}"#)
            .expect_err("zero grace period should be invalid");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "load_grace_ms",
                ..
            }
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ThreadOpenerConfig::from_json("{not json").expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn default_config_validates() {
        assert!(ThreadOpenerConfig::default().validate().is_ok());
    }
}

//! Service configuration types.
//!
//! These types hold the concrete values that drive service behavior.
//! Construct a [`ServiceConfig`], adjust it with the `with_` methods, and
//! hand it to [`FenceService::new`](crate::dispatch::FenceService::new),
//! which normalizes it first.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `max_live_handles` | 1024 |
//! | `driver_name` | `"fenceline"` |
//! | `timeline_name` | `"buffer-timeline"` |

use serde::{Deserialize, Serialize};

use crate::fence::{DEFAULT_DRIVER_NAME, DEFAULT_TIMELINE_NAME};

/// Default cap on simultaneously live handles.
pub const DEFAULT_MAX_LIVE_HANDLES: usize = 1024;

/// Configuration for a [`FenceService`](crate::dispatch::FenceService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Maximum number of simultaneously live handles. CREATE fails with
    /// an exhaustion error once this many wrappers are open.
    pub max_live_handles: usize,
    /// Diagnostic driver name stamped on every created fence.
    pub driver_name: String,
    /// Diagnostic timeline name stamped on every created fence.
    pub timeline_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_live_handles: DEFAULT_MAX_LIVE_HANDLES,
            driver_name: DEFAULT_DRIVER_NAME.to_string(),
            timeline_name: DEFAULT_TIMELINE_NAME.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Sets the live-handle cap.
    #[must_use]
    pub fn with_max_live_handles(mut self, max: usize) -> Self {
        self.max_live_handles = max;
        self
    }

    /// Sets the diagnostic driver name.
    #[must_use]
    pub fn with_driver_name(mut self, name: impl Into<String>) -> Self {
        self.driver_name = name.into();
        self
    }

    /// Sets the diagnostic timeline name.
    #[must_use]
    pub fn with_timeline_name(mut self, name: impl Into<String>) -> Self {
        self.timeline_name = name.into();
        self
    }

    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.max_live_handles == 0 {
            self.max_live_handles = DEFAULT_MAX_LIVE_HANDLES;
        }
        if self.driver_name.is_empty() {
            self.driver_name = DEFAULT_DRIVER_NAME.to_string();
        }
        if self.timeline_name.is_empty() {
            self.timeline_name = DEFAULT_TIMELINE_NAME.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_live_handles, DEFAULT_MAX_LIVE_HANDLES);
        assert_eq!(config.driver_name, DEFAULT_DRIVER_NAME);
        assert_eq!(config.timeline_name, DEFAULT_TIMELINE_NAME);
    }

    #[test]
    fn normalize_rejects_degenerate_values() {
        let mut config = ServiceConfig::default()
            .with_max_live_handles(0)
            .with_driver_name("")
            .with_timeline_name("");
        config.normalize();
        assert_eq!(config.max_live_handles, DEFAULT_MAX_LIVE_HANDLES);
        assert_eq!(config.driver_name, DEFAULT_DRIVER_NAME);
        assert_eq!(config.timeline_name, DEFAULT_TIMELINE_NAME);
    }

    #[test]
    fn builders_set_fields() {
        let config = ServiceConfig::default()
            .with_max_live_handles(4)
            .with_driver_name("gpu")
            .with_timeline_name("frames");
        assert_eq!(config.max_live_handles, 4);
        assert_eq!(config.driver_name, "gpu");
        assert_eq!(config.timeline_name, "frames");
    }

    #[test]
    fn serde_round_trip_with_partial_input() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"max_live_handles": 8}"#).expect("deserialize");
        assert_eq!(config.max_live_handles, 8);
        // Unspecified fields fall back to defaults.
        assert_eq!(config.driver_name, DEFAULT_DRIVER_NAME);

        let text = serde_json::to_string(&config).expect("serialize");
        let back: ServiceConfig = serde_json::from_str(&text).expect("round trip");
        assert_eq!(back, config);
    }
}

//! Builder configuration.

use serde::{Deserialize, Serialize};

/// Default number of undoable commands kept.
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Tunables for a [`crate::PageBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuilderConfig {
    /// Undo history bound. Oldest commands are dropped first; `0` disables
    /// recording.
    pub max_history: usize,
    /// Activate a canvas whenever an item is placed on it.
    pub auto_activate: bool,
    /// Search for a free slot when a new item would overlap another.
    pub avoid_collisions: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            auto_activate: true,
            avoid_collisions: true,
        }
    }
}

impl BuilderConfig {
    /// Set the history bound.
    #[must_use]
    pub const fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuilderConfig::default();
        assert_eq!(config.max_history, 50);
        assert!(config.auto_activate);
        assert!(config.avoid_collisions);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: BuilderConfig = serde_json::from_str(r#"{"maxHistory": 5}"#).expect("parse");
        assert_eq!(config.max_history, 5);
        assert!(config.auto_activate);
    }
}

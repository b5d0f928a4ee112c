//! Registry configuration.

use serde::{Deserialize, Serialize};

/// How `Node::print` renders a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    /// `Display` rendering, e.g. `[3, 6, 10, 10]`.
    #[default]
    Display,
    /// Compact JSON, e.g. `[3,6,10,10]`.
    Json,
}

/// Tunables for a single registry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Longest dependency path a single resolve may walk. `None` means
    /// unbounded.
    pub max_depth: Option<usize>,

    /// When a rewire stops referencing a node and that node is left without
    /// dependents, drop its cached value.
    pub prune_detached: bool,

    /// Output format used by `print`.
    pub render: RenderFormat,
}

impl GraphConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_max_depth(mut self, limit: usize) -> Self {
        self.max_depth = Some(limit);
        self
    }

    pub fn with_prune_detached(mut self, prune: bool) -> Self {
        self.prune_detached = prune;
        self
    }

    pub fn with_render(mut self, render: RenderFormat) -> Self {
        self.render = render;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = GraphConfig::from_json("{}").unwrap();
        assert_eq!(config, GraphConfig::default());
        assert_eq!(config.render, RenderFormat::Display);
        assert!(!config.prune_detached);
    }

    #[test]
    fn partial_json_overrides() {
        let config = GraphConfig::from_json(r#"{"max_depth": 64, "render": "json"}"#).unwrap();
        assert_eq!(config.max_depth, Some(64));
        assert_eq!(config.render, RenderFormat::Json);
        assert!(!config.prune_detached);
    }

    #[test]
    fn unknown_render_format_is_rejected() {
        assert!(GraphConfig::from_json(r#"{"render": "yaml"}"#).is_err());
    }
}

//! Grounding configuration threaded through every key/curie derivation.
//!
//! There is no mutable global: callers build a [`Config`] (or borrow
//! [`DEFAULT_CONFIG`]) and pass it to `get_curie`, `get_key` and the
//! comparison predicates explicitly.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Namespaces preferred when a concept carries several groundings.
pub const DEFAULT_PREFIX_PRIORITY: &[&str] = &["ido"];

/// Immutable default configuration.
pub static DEFAULT_CONFIG: LazyLock<Config> = LazyLock::new(Config::default);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Namespace priority for `Concept::get_curie`; the first namespace
    /// present in a concept's identifiers wins.
    pub prefix_priority: Vec<String>,
    /// When set, a concept lacking grounding only matches another concept
    /// with the same fallback curie `("", name)`. When unset, grounding only
    /// separates concepts that are both grounded.
    pub match_ungrounded_by_name: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix_priority: DEFAULT_PREFIX_PRIORITY
                .iter()
                .map(|p| p.to_string())
                .collect(),
            match_ungrounded_by_name: false,
        }
    }
}

impl Config {
    pub fn with_prefix_priority<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_priority = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_name_matching(mut self, enabled: bool) -> Self {
        self.match_ungrounded_by_name = enabled;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = Config::from_json_str(r#"{"prefix_priority": ["ncit", "ido"]}"#).unwrap();
        assert_eq!(config.prefix_priority, vec!["ncit", "ido"]);
        assert!(!config.match_ungrounded_by_name);

        let empty = Config::from_json_str("{}").unwrap();
        assert_eq!(empty, *DEFAULT_CONFIG);
    }
}

//! Container settings.
//!
//! Deserializable from any serde format; missing fields take their
//! defaults.
//!
//! ```rust
//! use servitor_container::settings::Settings;
//!
//! let settings = Settings::default();
//! assert!(settings.defer_providers);
//! assert_eq!(settings.max_suggestions, 3);
//! ```

use serde::Deserialize;

/// Tunables for a [`Container`](crate::container::Container).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Honor `Provider::is_deferred`: wait with a deferred provider's
    /// registration until one of its ids is first requested.
    /// When off, every provider registers immediately.
    pub defer_providers: bool,

    /// How many "did you mean?" ids a `ServiceNotFound` error lists.
    pub max_suggestions: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            defer_providers: true,
            max_suggestions: 3,
        }
    }
}

impl Settings {
    pub fn defer_providers(mut self, defer: bool) -> Self {
        self.defer_providers = defer;
        self
    }

    pub fn max_suggestions(mut self, max: usize) -> Self {
        self.max_suggestions = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_partial() {
        let settings: Settings = serde_json::from_str(r#"{ "defer_providers": false }"#).unwrap();
        assert!(!settings.defer_providers);
        assert_eq!(settings.max_suggestions, 3);
    }

    #[test]
    fn deserialize_empty_is_default() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn builder_style_setters() {
        let settings = Settings::default().defer_providers(false).max_suggestions(0);
        assert!(!settings.defer_providers);
        assert_eq!(settings.max_suggestions, 0);
    }
}

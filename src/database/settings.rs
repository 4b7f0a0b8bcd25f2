//! Realtime Database settings
//!
//! # Native Reference
//! - `FIRDatabase databaseWithURL:` / `FIRDatabase database`
//! - `FIRDatabase persistenceEnabled`

use super::types::Location;

/// Settings for the Realtime Database bridge
///
/// Command arguments carry a database URL per call; an empty URL addresses
/// the default database, which `default_url` names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// URL of the default database
    ///
    /// Default: `None` (the data store's own default)
    pub default_url: Option<String>,

    /// Whether to enable the on-device cache
    ///
    /// # Native Reference
    /// - `FIRDatabase persistenceEnabled`
    ///
    /// Applied once, when the app is created.
    ///
    /// Default: true
    pub persistence_enabled: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            default_url: None,
            persistence_enabled: true,
        }
    }
}

impl DatabaseSettings {
    /// Creates default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Database URL a command addressed to `url` should use
    ///
    /// Blank URLs resolve to `default_url` (or the data store default).
    pub fn resolve_url(&self, url: &str) -> String {
        let url = url.trim();
        if !url.is_empty() {
            return url.to_string();
        }
        self.default_url.clone().unwrap_or_default()
    }

    /// Location of `path` in the database named by `url`
    pub fn location(&self, url: &str, path: &str) -> Location {
        Location::new(self.resolve_url(url), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_persistence_enabled() {
        let settings = DatabaseSettings::default();
        assert!(settings.persistence_enabled);
        assert_eq!(settings.default_url, None);
    }

    #[test]
    fn test_resolve_url() {
        let mut settings = DatabaseSettings::new();
        assert_eq!(settings.resolve_url(""), "");
        assert_eq!(settings.resolve_url("https://b.firebaseio.com"), "https://b.firebaseio.com");

        settings.default_url = Some("https://a.firebaseio.com".to_string());
        assert_eq!(settings.resolve_url("  "), "https://a.firebaseio.com");
        assert_eq!(settings.location("", "x/y").url(), "https://a.firebaseio.com");
    }
}

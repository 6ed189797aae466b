//! Widget configuration
//!
//! Everything the embedding page (or the CLI) can tune. Plan limits, colors
//! and other tenant settings come from the backend, not from here.

use serde::{Deserialize, Serialize};

use crate::infrastructure::api::ErrorClassifier;
use crate::shared::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STALE_SESSION_PATTERN,
    DEFAULT_STORAGE_PREFIX,
};
use crate::shared::errors::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetConfig {
    /// Backend origin, e.g. `https://api.example.com`
    pub api_base_url: String,
    /// Tenant's public widget key, sent with every request
    pub widget_key: Option<String>,
    /// Namespace for every persisted key
    pub storage_prefix: String,
    /// Native transport timeout (browsers apply their own)
    pub request_timeout_secs: u64,
    /// Fallback matcher for "session not found" errors when the backend
    /// does not send `sessionValid`
    pub stale_session_pattern: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            widget_key: None,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            stale_session_pattern: DEFAULT_STALE_SESSION_PATTERN.to_string(),
        }
    }
}

impl WidgetConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_widget_key(mut self, key: impl Into<String>) -> Self {
        self.widget_key = Some(key.into());
        self
    }

    pub fn with_storage_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_prefix = prefix.into();
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_stale_session_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.stale_session_pattern = pattern.into();
        self
    }

    /// Base URL without trailing slashes
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Check the values and build the error classifier they describe
    pub fn validate(&self) -> Result<ErrorClassifier> {
        let base = self.base_url();
        if !(base.starts_with("http://") || base.starts_with("https://") || base.starts_with('/')) {
            return Err(AppError::ConfigError(format!(
                "API base URL must be http(s) or root-relative: {}",
                self.api_base_url
            )));
        }

        if self.storage_prefix.is_empty() {
            return Err(AppError::ConfigError("Storage prefix must not be empty".to_string()));
        }

        if self.request_timeout_secs == 0 {
            return Err(AppError::ConfigError("Request timeout must be positive".to_string()));
        }

        ErrorClassifier::new(&self.stale_session_pattern).map_err(|e| {
            AppError::ConfigError(format!("Invalid stale-session pattern: {}", e))
        })
    }

    /// Overlay `WIDGET_*` environment variables on the defaults
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (environment, dotenv map, ...)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("WIDGET_API_URL") {
            config.api_base_url = url;
        }
        if let Some(key) = lookup("WIDGET_KEY").filter(|k| !k.is_empty()) {
            config.widget_key = Some(key);
        }
        if let Some(prefix) = lookup("WIDGET_STORAGE_PREFIX") {
            config.storage_prefix = prefix;
        }
        if let Some(timeout) = lookup("WIDGET_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout.parse().map_err(|_| {
                AppError::ConfigError(format!("WIDGET_TIMEOUT_SECS is not a number: {}", timeout))
            })?;
        }
        if let Some(pattern) = lookup("WIDGET_STALE_SESSION_PATTERN") {
            config.stale_session_pattern = pattern;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = WidgetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage_prefix, DEFAULT_STORAGE_PREFIX);
    }

    #[test]
    fn test_builder() {
        let config = WidgetConfig::new("https://api.example.com/")
            .with_widget_key("pk_live_123")
            .with_storage_prefix("acme_")
            .with_request_timeout_secs(5);

        assert_eq!(config.base_url(), "https://api.example.com");
        assert_eq!(config.widget_key.as_deref(), Some("pk_live_123"));
        assert_eq!(config.storage_prefix, "acme_");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_from_lookup() {
        let config = WidgetConfig::from_lookup(lookup_from(&[
            ("WIDGET_API_URL", "https://chat.example.com"),
            ("WIDGET_KEY", "pk_test"),
            ("WIDGET_TIMEOUT_SECS", "12"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "https://chat.example.com");
        assert_eq!(config.widget_key.as_deref(), Some("pk_test"));
        assert_eq!(config.request_timeout_secs, 12);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(WidgetConfig::from_lookup(lookup_from(&[("WIDGET_TIMEOUT_SECS", "soon")])).is_err());
        assert!(WidgetConfig::from_lookup(lookup_from(&[("WIDGET_API_URL", "ftp://x")])).is_err());
        assert!(WidgetConfig::default().with_stale_session_pattern("(").validate().is_err());
        assert!(WidgetConfig::default().with_storage_prefix("").validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: WidgetConfig =
            serde_json::from_str(r#"{"apiBaseUrl":"/","widgetKey":"pk"}"#).unwrap();

        assert_eq!(config.api_base_url, "/");
        assert_eq!(config.widget_key.as_deref(), Some("pk"));
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }
}

//! Application configuration.
//!
//! An [`AppConfig`] is built in code with [`AppConfig::builder`] or read from JSON with
//! [`AppConfig::from_json`]. Both paths validate; a bad value becomes
//! [`ZealError::Config`].
//!
//! ```json
//! { "root_id": "app", "update_mode": "batched", "log_filter": "zeal=debug" }
//! ```

use serde::{Deserialize, Serialize};
use zeal_core::ZealError;
use zeal_template::context::DEFAULT_SCOPE_PREFIX;

use crate::debug::logging;

/// Id of the host element an application mounts into by default.
pub const DEFAULT_ROOT_ID: &str = "app";

/// How a component applies a re-render to the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Patch synchronously inside the state write that triggered it.
    #[default]
    Immediate,
    /// Queue the patch and apply it on the next frame.
    Batched,
}

/// Settings shared by every component an [`App`](crate::App) mounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Id of the host element to mount into.
    pub root_id: String,
    /// Prefix of the scope-id attribute stamped on rendered elements.
    pub scope_prefix: String,
    /// How re-renders reach the document.
    pub update_mode: UpdateMode,
    /// `tracing` filter directives used when installing the subscriber.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_id: DEFAULT_ROOT_ID.to_owned(),
            scope_prefix: DEFAULT_SCOPE_PREFIX.to_owned(),
            update_mode: UpdateMode::default(),
            log_filter: logging::DEFAULT_FILTER.to_owned(),
        }
    }
}

impl AppConfig {
    /// Starts from the defaults.
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder {
            config: Self::default(),
        }
    }

    /// Reads a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ZealError::Config`] for malformed JSON, unknown fields and values
    /// [`AppConfig::validate`] rejects.
    pub fn from_json(text: &str) -> Result<Self, ZealError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|error| ZealError::Config(format!("invalid configuration: {error}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "root_id": self.root_id,
            "scope_prefix": self.scope_prefix,
            "update_mode": self.update_mode,
            "log_filter": self.log_filter,
        })
        .to_string()
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`ZealError::Config`] when the root id is empty or contains whitespace,
    /// when the scope prefix is not a usable attribute name, or when the log filter
    /// does not parse.
    pub fn validate(&self) -> Result<(), ZealError> {
        if self.root_id.is_empty() || self.root_id.contains(char::is_whitespace) {
            return Err(ZealError::Config(format!(
                "root id `{}` must be a non-empty id without whitespace",
                self.root_id
            )));
        }
        let invalid = |c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '=' | '<' | '>' | '/');
        if self.scope_prefix.is_empty() || self.scope_prefix.contains(invalid) {
            return Err(ZealError::Config(format!(
                "scope prefix `{}` is not a valid attribute name",
                self.scope_prefix
            )));
        }
        logging::parse_filter(&self.log_filter)?;
        Ok(())
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug, Clone)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Sets the id of the host element.
    #[must_use]
    pub fn root_id(mut self, id: impl Into<String>) -> Self {
        self.config.root_id = id.into();
        self
    }

    /// Sets the scope-id attribute prefix.
    #[must_use]
    pub fn scope_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.scope_prefix = prefix.into();
        self
    }

    /// Sets the update mode.
    #[must_use]
    pub const fn update_mode(mut self, mode: UpdateMode) -> Self {
        self.config.update_mode = mode;
        self
    }

    /// Sets the log filter directives.
    #[must_use]
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.log_filter = filter.into();
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::validate`].
    pub fn build(self) -> Result<AppConfig, ZealError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::builder().build().unwrap();
        assert_eq!(config.root_id, "app");
        assert_eq!(config.scope_prefix, "data-z-");
        assert_eq!(config.update_mode, UpdateMode::Immediate);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = AppConfig::from_json(r#"{ "update_mode": "batched", "root_id": "main" }"#).unwrap();
        assert_eq!(config.update_mode, UpdateMode::Batched);
        assert_eq!(config.root_id, "main");
        assert_eq!(config.scope_prefix, "data-z-");
    }

    #[test]
    fn json_output_reads_back() {
        let config = AppConfig::builder()
            .log_filter("zeal=debug")
            .update_mode(UpdateMode::Batched)
            .build()
            .unwrap();
        assert_eq!(AppConfig::from_json(&config.to_json()).unwrap(), config);
    }

    #[test_case(r#"{ "root_id": "" }"# ; "empty root id")]
    #[test_case(r#"{ "root_id": "my app" }"# ; "root id with whitespace")]
    #[test_case(r#"{ "scope_prefix": "data z" }"# ; "prefix with whitespace")]
    #[test_case(r#"{ "update_mode": "lazy" }"# ; "unknown mode")]
    #[test_case(r#"{ "theme": "dark" }"# ; "unknown field")]
    #[test_case(r#"{ "log_filter": "zeal=loud" }"# ; "bad filter")]
    #[test_case("not json" ; "malformed")]
    fn invalid_json_is_a_config_error(text: &str) {
        assert!(matches!(AppConfig::from_json(text), Err(ZealError::Config(_))));
    }

    #[test]
    fn builder_validates() {
        let error = AppConfig::builder().scope_prefix("").build().unwrap_err();
        assert!(matches!(error, ZealError::Config(message) if message.contains("scope prefix")));
    }
}

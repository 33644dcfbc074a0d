//! Extension configuration.
//!
//! Loaded from TOML with serde defaults for every field, then optionally
//! overridden from the environment:
//!
//! ```toml
//! reasoner_type = "DEL"
//! single_constraints = false
//!
//! [reasoner]
//! base_url = "http://localhost:9090"
//! timeout_secs = 30
//! max_retries = 3
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable overriding [`ReasonerConfig::base_url`].
pub const ENV_REASONER_URL: &str = "EPISTEMIC_REASONER_URL";
/// Environment variable overriding [`ExtensionConfig::reasoner_type`].
pub const ENV_REASONER_TYPE: &str = "EPISTEMIC_REASONER_TYPE";

/// How belief updates are sent to the reasoner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReasonerType {
    /// Public announcements of tracked literals.
    #[serde(rename = "PAL")]
    Pal,
    /// Event models built from `on(...)` plans.
    #[default]
    #[serde(rename = "DEL")]
    Del,
}

impl FromStr for ReasonerType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PAL" => Ok(Self::Pal),
            "DEL" => Ok(Self::Del),
            other => Err(ConfigError::InvalidValue {
                field: "reasoner_type",
                reason: format!("expected PAL or DEL, got '{other}'"),
            }),
        }
    }
}

/// Reasoner endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// Base URL of the reasoner service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the model-creation endpoint.
    #[serde(default = "default_create_model_path")]
    pub create_model_path: String,

    /// Path of the event-model endpoint.
    #[serde(default = "default_apply_event_path")]
    pub apply_event_path: String,

    /// Path of the batch evaluation endpoint.
    #[serde(default = "default_evaluate_path")]
    pub evaluate_path: String,

    /// Path of the single-formula evaluation endpoint.
    #[serde(default = "default_evaluate_single_path")]
    pub evaluate_single_path: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt on connection errors and 5xx
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles per retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_create_model_path() -> String {
    "/model/create".to_string()
}

fn default_apply_event_path() -> String {
    "/model/update".to_string()
}

fn default_evaluate_path() -> String {
    "/model/evaluate".to_string()
}

fn default_evaluate_single_path() -> String {
    "/model/evaluate/single".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    200
}

fn default_event_queue_capacity() -> usize {
    1024
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            create_model_path: default_create_model_path(),
            apply_event_path: default_apply_event_path(),
            evaluate_path: default_evaluate_path(),
            evaluate_single_path: default_evaluate_single_path(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl ReasonerConfig {
    /// Full URL for an endpoint path.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before retry number `attempt` (0-based), doubling each time.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(16)).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Top-level extension configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Reasoner endpoints.
    #[serde(default)]
    pub reasoner: ReasonerConfig,

    /// PAL or DEL updates.
    #[serde(default)]
    pub reasoner_type: ReasonerType,

    /// Emit mutual-exclusion constraints for `single(...)` rules.
    #[serde(default)]
    pub single_constraints: bool,

    /// Write model-creation constraints here as JSON lines before sending.
    #[serde(default)]
    pub dump_constraints_dir: Option<PathBuf>,

    /// Capacity of the pending belief-event queue.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            reasoner: ReasonerConfig::default(),
            reasoner_type: ReasonerType::default(),
            single_constraints: false,
            dump_constraints_dir: None,
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

impl ExtensionConfig {
    /// Parses TOML.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Applies `EPISTEMIC_REASONER_URL` and `EPISTEMIC_REASONER_TYPE`.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(ENV_REASONER_URL) {
            self.reasoner.base_url = url;
        }
        if let Some(kind) = lookup(ENV_REASONER_TYPE) {
            self.reasoner_type = kind.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.reasoner.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "reasoner.base_url",
                reason: format!("expected an http(s) URL, got '{base}'"),
            });
        }
        if self.reasoner.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reasoner.timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "event_queue_capacity",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = ExtensionConfig::from_toml_str("").unwrap();
        assert_eq!(config, ExtensionConfig::default());
        assert_eq!(config.reasoner_type, ReasonerType::Del);
        assert!(!config.single_constraints);
    }

    #[test]
    fn test_partial_toml() {
        let config = ExtensionConfig::from_toml_str(
            r#"
            reasoner_type = "PAL"
            single_constraints = true
            dump_constraints_dir = "/tmp/dumps"

            [reasoner]
            base_url = "http://reasoner:8080/"
            max_retries = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.reasoner_type, ReasonerType::Pal);
        assert!(config.single_constraints);
        assert_eq!(config.dump_constraints_dir, Some(PathBuf::from("/tmp/dumps")));
        assert_eq!(config.reasoner.max_retries, 0);
        assert_eq!(config.reasoner.timeout_secs, 30);
        assert_eq!(
            config.reasoner.endpoint(&config.reasoner.evaluate_path),
            "http://reasoner:8080/model/evaluate"
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ExtensionConfig::from_toml_str("reasoner_type = \"KRIPKE\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ExtensionConfig::from_toml_str("[reasoner]\nbase_url = \"ftp://x\""),
            Err(ConfigError::InvalidValue { field: "reasoner.base_url", .. })
        ));
        assert!(matches!(
            ExtensionConfig::from_toml_str("event_queue_capacity = 0"),
            Err(ConfigError::InvalidValue { field: "event_queue_capacity", .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_REASONER_URL, "https://epistemic.example"),
            (ENV_REASONER_TYPE, "pal"),
        ]
        .into_iter()
        .collect();
        let config = ExtensionConfig::default()
            .with_overrides(|k| env.get(k).map(ToString::to_string))
            .unwrap();
        assert_eq!(config.reasoner.base_url, "https://epistemic.example");
        assert_eq!(config.reasoner_type, ReasonerType::Pal);

        let err = ExtensionConfig::default()
            .with_overrides(|k| (k == ENV_REASONER_TYPE).then(|| "both".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "reasoner_type", .. }));
    }

    #[test]
    fn test_backoff_doubles() {
        let reasoner = ReasonerConfig::default();
        assert_eq!(reasoner.backoff(0), Duration::from_millis(200));
        assert_eq!(reasoner.backoff(2), Duration::from_millis(800));
        assert_eq!(reasoner.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epistemic.toml");
        std::fs::write(&path, "single_constraints = true\n").unwrap();
        assert!(ExtensionConfig::from_file(&path).unwrap().single_constraints);
        assert!(matches!(
            ExtensionConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}

//! Engine configuration.
//!
//! Every section has a `Default`, so a config file only needs the keys it
//! changes:
//!
//! ```
//! use mantic::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "dispatch": { "max_retries": 1 } }"#).unwrap();
//! assert_eq!(config.dispatch.max_retries, 1);
//! assert_eq!(config.selection.max_theories, 5);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictPolicy;
use crate::error::ValidationError;
use crate::judgment::ensure_unit;
use crate::provider::DispatchConfig;
use crate::selector::SelectionConfig;

/// Top-level configuration for [`crate::engine::DecisionEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub selection: SelectionConfig,
    pub dispatch: DispatchConfig,
    pub conflict: ConflictPolicy,
    /// Dispatch interpretations concurrently.
    pub parallel_interpretations: bool,
    /// Multiplier on the overall confidence when selection fell short.
    pub shortfall_penalty: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            selection: SelectionConfig::default(),
            dispatch: DispatchConfig::default(),
            conflict: ConflictPolicy::default(),
            parallel_interpretations: true,
            shortfall_penalty: 0.8,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON config.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for malformed JSON, or any validation error of
    /// the parsed values.
    pub fn from_json_str(s: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_str(s).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("parse config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read, plus everything
    /// [`EngineConfig::from_json_str`] returns.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("read {}: {e}", path.display()),
        })?;
        Self::from_json_str(&raw)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.selection.validate()?;
        self.dispatch.validate()?;
        self.conflict.validate()?;
        ensure_unit("shortfall_penalty", self.shortfall_penalty)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.selection.min_theories, 3);
        assert_eq!(config.dispatch.max_retries, 2);
        assert_eq!(config.dispatch.timeout_ms, 60_000);
        assert_eq!(config.dispatch.primary.as_deref(), Some("claude"));
        assert!(!config.dispatch.dual_verification);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json_str(
            r#"{
                "selection": { "min_theories": 2 },
                "dispatch": {
                    "primary": "deepseek",
                    "providers": [{ "name": "deepseek", "model": "deepseek-chat" }],
                    "backoff": { "initial_ms": 100 }
                },
                "conflict": { "severe_penalty": 0.7 },
                "parallel_interpretations": false
            }"#,
        )
        .unwrap();
        assert_eq!(config.selection.min_theories, 2);
        assert_eq!(config.selection.max_theories, 5);
        assert_eq!(config.dispatch.providers[0].model, "deepseek-chat");
        assert_eq!(config.dispatch.backoff.initial_ms, 100);
        assert_eq!(config.dispatch.backoff.max_ms, 4_000);
        assert!((config.conflict.severe_penalty - 0.7).abs() < 1e-12);
        assert!(!config.parallel_interpretations);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err =
            EngineConfig::from_json_str(r#"{ "selection": { "min_theories": 6 } }"#).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSelectionBounds { min: 6, max: 5 }));

        let err = EngineConfig::from_json_str(r#"{ "shortfall_penalty": 1.5 }"#).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfUnitRange { .. }));

        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfig { .. }));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "dispatch": {{ "dual_verification": true }} }}"#).unwrap();
        let config = EngineConfig::from_path(file.path()).unwrap();
        assert!(config.dispatch.dual_verification);

        let err = EngineConfig::from_path("/nonexistent/mantic.json").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfig { .. }));
    }
}

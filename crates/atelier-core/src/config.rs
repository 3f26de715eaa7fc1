//! Model configuration and per-call options.
//!
//! Defaults come from the backend (`GET /api/llm/config`); a local TOML file
//! under the user config directory can override them. Per-call options always
//! win over either.

use crate::error::{AtelierError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const CONFIG_DIR: &str = "atelier";
const CONFIG_FILE: &str = "config.toml";

/// Per-call model options. All fields are pass-through; unset fields are
/// filled from [`ModelConfig`] defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    /// Model identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelOptions {
    /// Sets the model id.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Server-side default model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model identifier.
    pub default_model: String,
    /// Default sampling temperature.
    pub temperature: f32,
    /// Default token budget.
    pub max_tokens: u32,
    /// Whether the backing model service reported itself available.
    #[serde(default)]
    pub available: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            available: false,
        }
    }
}

impl ModelConfig {
    /// Merges caller options under these defaults, producing fully-populated
    /// options. Caller-supplied fields always win.
    pub fn merge_under(&self, options: &ModelOptions) -> ModelOptions {
        ModelOptions {
            model: options
                .model
                .clone()
                .or_else(|| Some(self.default_model.clone())),
            temperature: options.temperature.or(Some(self.temperature)),
            max_tokens: options.max_tokens.or(Some(self.max_tokens)),
        }
    }

    /// Path of the local override file (`~/.config/atelier/config.toml`).
    pub fn local_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads the local override file if present, otherwise returns `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_local(base: Self) -> Result<Self> {
        let Some(path) = Self::local_path() else {
            return Ok(base);
        };
        Self::load_from(&path, base)
    }

    /// Loads an override file from an explicit path if it exists.
    pub fn load_from(path: &std::path::Path, base: Self) -> Result<Self> {
        if !path.exists() {
            return Ok(base);
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AtelierError::config(format!("failed to read {}: {e}", path.display())))?;
        let overrides: LocalOverrides = toml::from_str(&raw)?;
        debug!(path = %path.display(), "applying local model config overrides");
        Ok(Self {
            default_model: overrides.default_model.unwrap_or(base.default_model),
            temperature: overrides.temperature.unwrap_or(base.temperature),
            max_tokens: overrides.max_tokens.unwrap_or(base.max_tokens),
            available: base.available,
        })
    }
}

/// Shape of the local TOML override file. All keys optional.
#[derive(Debug, Default, Deserialize)]
struct LocalOverrides {
    default_model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_under_prefers_caller_options() {
        let config = ModelConfig {
            default_model: "base-model".into(),
            temperature: 0.7,
            max_tokens: 4096,
            available: true,
        };
        let options = ModelOptions::default().with_temperature(0.1);
        let merged = config.merge_under(&options);
        assert_eq!(merged.model.as_deref(), Some("base-model"));
        assert_eq!(merged.temperature, Some(0.1));
        assert_eq!(merged.max_tokens, Some(4096));
    }

    #[test]
    fn test_load_from_applies_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_tokens = 512\n").unwrap();

        let loaded = ModelConfig::load_from(&path, ModelConfig::default()).unwrap();
        assert_eq!(loaded.max_tokens, 512);
        assert_eq!(loaded.default_model, ModelConfig::default().default_model);
    }

    #[test]
    fn test_load_from_missing_file_returns_base() {
        let dir = tempfile::tempdir().unwrap();
        let loaded =
            ModelConfig::load_from(&dir.path().join("absent.toml"), ModelConfig::default())
                .unwrap();
        assert_eq!(loaded, ModelConfig::default());
    }
}

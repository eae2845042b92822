use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Composition jobs regularly run for minutes; anything shorter than this
/// fails healthy requests.
const MIN_LIPSYNC_TIMEOUT_SECS: u64 = 60;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Returns the default config location: `~/.lexora/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".lexora").join("config.json"))
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.queue_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "queue_capacity must be at least 1".to_string(),
        });
    }

    if !config.public_prefix.starts_with('/') {
        return Err(ConfigError::Validation {
            message: format!(
                "public_prefix must start with '/': {}",
                config.public_prefix
            ),
        });
    }

    let settings = &config.speech.voice_settings;
    for (name, value) in [
        ("stability", settings.stability),
        ("similarity_boost", settings.similarity_boost),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation {
                message: format!("speech.voice_settings.{} must be within [0, 1], got {}", name, value),
            });
        }
    }

    if config.lipsync.timeout_secs < MIN_LIPSYNC_TIMEOUT_SECS {
        return Err(ConfigError::Validation {
            message: format!(
                "lipsync.timeout_secs must be at least {} seconds, got {}",
                MIN_LIPSYNC_TIMEOUT_SECS, config.lipsync.timeout_secs
            ),
        });
    }

    if config.lipsync.timeout_secs < config.speech.timeout_secs {
        return Err(ConfigError::Validation {
            message: format!(
                "lipsync.timeout_secs ({}) must not be shorter than speech.timeout_secs ({})",
                config.lipsync.timeout_secs, config.speech.timeout_secs
            ),
        });
    }

    Ok(())
}

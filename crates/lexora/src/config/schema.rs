use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub lipsync: LipSyncConfig,
}

impl Config {
    /// Database location: the configured path, else `~/.lexora/data/lexora.db`,
    /// else `lexora.db` inside the upload directory.
    pub fn resolved_database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => crate::db::default_database_path()
                .unwrap_or_else(|| PathBuf::from(&self.upload_directory).join("lexora.db")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            upload_directory: default_upload_directory(),
            database_path: None,
            public_prefix: default_public_prefix(),
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            speech: SpeechConfig::default(),
            lipsync: LipSyncConfig::default(),
        }
    }
}

fn default_upload_directory() -> String {
    "uploads".to_string()
}

fn default_public_prefix() -> String {
    "/uploads".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, 4)
}

fn default_queue_capacity() -> usize {
    32
}

/// Text-to-speech provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Direct API key (lowest effort, least secure).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Path to a file holding the API key.
    #[serde(default)]
    pub api_key_file: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_speech_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_speech_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_speech_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub voice_settings: VoiceSettings,
}

fn default_speech_key_env() -> Option<String> {
    Some("ELEVENLABS_API_KEY".to_string())
}

fn default_speech_base_url() -> String {
    "https://api.elevenlabs.io/v1".to_string()
}

fn default_model_id() -> String {
    "eleven_monolingual_v1".to_string()
}

fn default_speech_timeout() -> u64 {
    60
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_file: None,
            api_key_env: default_speech_key_env(),
            base_url: default_speech_base_url(),
            model_id: default_model_id(),
            timeout_secs: default_speech_timeout(),
            voice_settings: VoiceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default = "default_voice_setting")]
    pub stability: f64,
    #[serde(default = "default_voice_setting")]
    pub similarity_boost: f64,
}

fn default_voice_setting() -> f64 {
    0.5
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: default_voice_setting(),
            similarity_boost: default_voice_setting(),
        }
    }
}

/// Lip-sync composition provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipSyncConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_lipsync_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_lipsync_url")]
    pub url: String,
    /// Composition takes minutes, so this is much longer than the speech timeout.
    #[serde(default = "default_lipsync_timeout")]
    pub timeout_secs: u64,
}

fn default_lipsync_key_env() -> Option<String> {
    Some("HUGGINGFACE_API_KEY".to_string())
}

fn default_lipsync_url() -> String {
    "https://suprath-lipsync.hf.space/run/predict".to_string()
}

fn default_lipsync_timeout() -> u64 {
    300
}

impl Default for LipSyncConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_file: None,
            api_key_env: default_lipsync_key_env(),
            url: default_lipsync_url(),
            timeout_secs: default_lipsync_timeout(),
        }
    }
}

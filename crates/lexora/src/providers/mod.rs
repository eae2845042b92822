//! Contracts and HTTP adapters for the two external media providers.
//!
//! Each call is a single attempt. Every failure (missing credential,
//! transport error, non-success status, unusable payload, file-system error)
//! comes back as a [`StageError`] value; nothing here panics on bad input.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::VoiceSettings;
use crate::error::StorageError;
use crate::sanitize::redact_path;

pub mod lipsync;
pub mod speech;

pub use lipsync::LipSyncClient;
pub use speech::{
    speak, ClonedVoice, ElevenLabsClient, SpeechClip, Subscription, UserInfo, Voice, VoiceSample,
    MAX_SPEECH_CHARS,
};

/// Why a single provider stage did not produce its artifact.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("{provider} credential is not configured")]
    NotConfigured { provider: &'static str },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("file error on '{}': {source}", redact_path(.path))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid payload encoding: {0}")]
    Encoding(String),

    #[error("provider returned no result")]
    MissingResult,

    #[error("provider returned an unusable result: {0}")]
    MalformedResult(String),

    #[error("result download failed: {0}")]
    Fetch(String),

    /// Rejected locally, before anything was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<StorageError> for StageError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::CreateDirectory { path, source }
            | StorageError::WriteFile { path, source }
            | StorageError::ReadFile { path, source }
            | StorageError::RemoveFile { path, source } => StageError::Io { path, source },
        }
    }
}

/// Turns text into an audio file at a caller-chosen location.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether a credential is available. Checked before any job is created.
    fn is_configured(&self) -> bool;

    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        settings: &VoiceSettings,
        output: &Path,
    ) -> Result<(), StageError>;
}

/// Turns an audio file and a still image into a talking-head video.
#[async_trait]
pub trait LipSyncComposer: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn compose(&self, audio: &Path, image: &Path, output: &Path) -> Result<(), StageError>;
}

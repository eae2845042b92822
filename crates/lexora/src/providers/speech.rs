//! ElevenLabs-compatible text-to-speech client and voice management.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{SpeechSynthesizer, StageError};
use crate::config::{SpeechConfig, VoiceSettings};
use crate::error::ConfigError;
use crate::sanitize::{redact_path, text_summary, truncate_body};
use crate::secrets::resolve_credential;
use crate::storage::filesystem::write_file;
use crate::storage::{ArtifactStorage, Bucket};

const PROVIDER: &str = "speech";

/// Longest text accepted for a standalone speech clip, in characters.
pub const MAX_SPEECH_CHARS: usize = 5000;

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

/// A voice offered by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
}

#[derive(Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<Voice>,
}

/// One recording uploaded to clone a voice.
#[derive(Debug, Clone)]
pub struct VoiceSample {
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClonedVoice {
    pub voice_id: String,
}

/// Account details of the configured credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub character_count: u64,
    #[serde(default)]
    pub character_limit: u64,
}

impl Subscription {
    pub fn remaining_characters(&self) -> u64 {
        self.character_limit.saturating_sub(self.character_count)
    }
}

/// A standalone clip stored in the audio bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechClip {
    pub audio_url: String,
    pub text: String,
    pub voice_id: String,
    pub voice_settings: VoiceSettings,
}

pub struct ElevenLabsClient {
    client: Client,
    api_key: Option<SecretString>,
    base_url: String,
    model_id: String,
}

impl ElevenLabsClient {
    /// Builds the client from configuration, resolving the credential.
    ///
    /// A credential that is simply absent leaves the client unconfigured.
    pub fn from_config(config: &SpeechConfig) -> Result<Self, ConfigError> {
        let api_key = resolve_credential(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env.as_deref(),
        )
        .map_err(|e| ConfigError::Credential {
            provider: PROVIDER,
            source: e,
        })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient {
                provider: PROVIDER,
                source: e,
            })?;

        Ok(Self::new(client, api_key, &config.base_url, &config.model_id))
    }

    pub fn new(
        client: Client,
        api_key: Option<SecretString>,
        base_url: &str,
        model_id: &str,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_id: model_id.to_string(),
        }
    }

    fn api_key(&self) -> Result<&SecretString, StageError> {
        self.api_key
            .as_ref()
            .ok_or(StageError::NotConfigured { provider: PROVIDER })
    }

    /// Lists the voices available to the configured account.
    pub async fn list_voices(&self) -> Result<Vec<Voice>, StageError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(format!("{}/voices", self.base_url))
            .header(ACCEPT, "application/json")
            .header("xi-api-key", api_key.expose_secret())
            .send()
            .await?;

        let voices: VoicesResponse = check_status(response).await?.json().await?;
        Ok(voices.voices)
    }

    /// Details of one voice. `None` if the provider does not know it.
    pub async fn get_voice(&self, voice_id: &str) -> Result<Option<Voice>, StageError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(format!("{}/voices/{}", self.base_url, voice_id))
            .header(ACCEPT, "application/json")
            .header("xi-api-key", api_key.expose_secret())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check_status(response).await?.json().await?))
    }

    /// Creates a cloned voice from one or more audio recordings.
    ///
    /// Every sample must look like audio by its file name. Nothing is sent
    /// when a sample is rejected.
    pub async fn clone_voice(
        &self,
        name: &str,
        description: &str,
        samples: Vec<VoiceSample>,
    ) -> Result<ClonedVoice, StageError> {
        let api_key = self.api_key()?;
        if name.trim().is_empty() {
            return Err(StageError::InvalidRequest("voice name is empty".to_string()));
        }
        if samples.is_empty() {
            return Err(StageError::InvalidRequest(
                "at least one audio sample is required".to_string(),
            ));
        }

        let mut form = Form::new()
            .text("name", name.to_string())
            .text("description", description.to_string());
        let sample_count = samples.len();
        for sample in samples {
            let mime = audio_mime(&sample.file_name)?;
            let part = Part::bytes(sample.content)
                .file_name(sample.file_name)
                .mime_str(&mime)?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(format!("{}/voices/add", self.base_url))
            .header(ACCEPT, "application/json")
            .header("xi-api-key", api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let cloned: ClonedVoice = check_status(response).await?.json().await?;
        info!(voice_id = %cloned.voice_id, samples = sample_count, "Voice cloned");
        Ok(cloned)
    }

    /// Deletes a voice. Returns `false` if the provider does not know it.
    pub async fn delete_voice(&self, voice_id: &str) -> Result<bool, StageError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .delete(format!("{}/voices/{}", self.base_url, voice_id))
            .header(ACCEPT, "application/json")
            .header("xi-api-key", api_key.expose_secret())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response).await?;
        info!(voice_id, "Voice deleted");
        Ok(true)
    }

    /// Subscription and usage of the configured account.
    pub async fn user_info(&self) -> Result<UserInfo, StageError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(format!("{}/user", self.base_url))
            .header(ACCEPT, "application/json")
            .header("xi-api-key", api_key.expose_secret())
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }
}

/// Narrates `text` into a fresh file of the audio bucket.
///
/// The text must be non-blank and at most [`MAX_SPEECH_CHARS`] characters,
/// and both settings must lie in `[0, 1]`. A failed synthesis leaves no file
/// behind.
pub async fn speak(
    speech: &dyn SpeechSynthesizer,
    storage: &ArtifactStorage,
    text: &str,
    voice_id: &str,
    settings: VoiceSettings,
) -> Result<SpeechClip, StageError> {
    let length = text.chars().count();
    if text.trim().is_empty() {
        return Err(StageError::InvalidRequest("text is empty".to_string()));
    }
    if length > MAX_SPEECH_CHARS {
        return Err(StageError::InvalidRequest(format!(
            "text is {} characters, at most {} allowed",
            length, MAX_SPEECH_CHARS
        )));
    }
    for (name, value) in [
        ("stability", settings.stability),
        ("similarity_boost", settings.similarity_boost),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(StageError::InvalidRequest(format!(
                "{} must be between 0 and 1, got {}",
                name, value
            )));
        }
    }

    let output = storage.allocate(Bucket::Audio, "mp3");
    if let Err(e) = speech.synthesize(text, voice_id, &settings, &output).await {
        if let Err(cleanup) = storage.remove_if_exists(&output).await {
            warn!(error = %cleanup, "Failed to remove partial speech clip");
        }
        return Err(e);
    }

    Ok(SpeechClip {
        audio_url: storage.public_reference(Bucket::Audio, &output),
        text: text.to_string(),
        voice_id: voice_id.to_string(),
        voice_settings: settings,
    })
}

async fn check_status(response: Response) -> Result<Response, StageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StageError::Status {
        status: status.as_u16(),
        body: truncate_body(&body),
    })
}

fn audio_mime(file_name: &str) -> Result<String, StageError> {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::AUDIO {
        return Err(StageError::InvalidRequest(format!(
            "{} is not an audio file",
            file_name
        )));
    }
    Ok(mime.essence_str().to_string())
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        settings: &VoiceSettings,
        output: &Path,
    ) -> Result<(), StageError> {
        let api_key = self.api_key()?;

        debug!(
            voice_id,
            text = %text_summary(text),
            output = %redact_path(output),
            "Requesting speech synthesis"
        );

        let body = SpeechRequest {
            text,
            model_id: &self.model_id,
            voice_settings: settings,
        };

        let response = self
            .client
            .post(format!("{}/text-to-speech/{}", self.base_url, voice_id))
            .header(ACCEPT, "audio/mpeg")
            .header("xi-api-key", api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let audio = check_status(response).await?.bytes().await?;
        write_file(output, &audio).await?;

        debug!(bytes = audio.len(), "Speech synthesis stored");
        Ok(())
    }
}

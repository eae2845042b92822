//! Gradio-compatible lip-sync composition client.
//!
//! The provider takes `{"data": [<audio data URI>, <image data URI>]}` and
//! answers with `{"data": [<result>]}`, where the result is either an inline
//! `data:video/...;base64,` payload or a URL to download.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;

use super::{LipSyncComposer, StageError};
use crate::config::LipSyncConfig;
use crate::error::ConfigError;
use crate::sanitize::{redact_path, redact_url, truncate_body};
use crate::secrets::resolve_credential;
use crate::storage::filesystem::write_file;

const PROVIDER: &str = "lip-sync";
const FALLBACK_AUDIO_MIME: &str = "audio/mpeg";
const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

pub struct LipSyncClient {
    client: Client,
    api_key: Option<SecretString>,
    url: String,
}

impl LipSyncClient {
    /// Builds the client from configuration. The configured timeout applies to
    /// both the composition request and the result download.
    pub fn from_config(config: &LipSyncConfig) -> Result<Self, ConfigError> {
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
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient {
                provider: PROVIDER,
                source: e,
            })?;

        Ok(Self::new(client, api_key, &config.url))
    }

    pub fn new(client: Client, api_key: Option<SecretString>, url: &str) -> Self {
        Self {
            client,
            api_key,
            url: url.to_string(),
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, StageError> {
        debug!(url = %redact_url(url), "Downloading composed video");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StageError::Fetch(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::Fetch(format!("status {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StageError::Fetch(e.without_url().to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl LipSyncComposer for LipSyncClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn compose(&self, audio: &Path, image: &Path, output: &Path) -> Result<(), StageError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(StageError::NotConfigured { provider: PROVIDER })?;

        let audio_uri = data_uri(audio, FALLBACK_AUDIO_MIME).await?;
        let image_uri = data_uri(image, FALLBACK_IMAGE_MIME).await?;

        debug!(
            audio = %redact_path(audio),
            image = %redact_path(image),
            url = %redact_url(&self.url),
            "Submitting lip-sync composition"
        );

        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()))
            .json(&json!({ "data": [audio_uri, image_uri] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body = response.bytes().await?;
        let video = match parse_result(&body)? {
            ComposedVideo::Inline(bytes) => bytes,
            ComposedVideo::Remote(url) => self.download(&url).await?,
        };

        write_file(output, &video).await?;

        debug!(bytes = video.len(), "Composed video stored");
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
enum ComposedVideo {
    Inline(Vec<u8>),
    Remote(String),
}

fn parse_result(body: &[u8]) -> Result<ComposedVideo, StageError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| StageError::MalformedResult(format!("response is not JSON: {}", e)))?;

    let first = match value.get("data").and_then(Value::as_array) {
        Some(items) if !items.is_empty() => &items[0],
        _ => return Err(StageError::MissingResult),
    };

    let Some(result) = first.as_str() else {
        return Err(StageError::MalformedResult(
            "first result is not a string".to_string(),
        ));
    };

    if result.starts_with("data:video") {
        let (_, encoded) = result.split_once(',').ok_or_else(|| {
            StageError::MalformedResult("inline video has no payload".to_string())
        })?;
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| StageError::Encoding(e.to_string()))?;
        return Ok(ComposedVideo::Inline(bytes));
    }

    if result.starts_with("http://") || result.starts_with("https://") {
        return Ok(ComposedVideo::Remote(result.to_string()));
    }

    Err(StageError::MalformedResult(format!(
        "unrecognized result ({} chars)",
        result.chars().count()
    )))
}

async fn data_uri(path: &Path, fallback_mime: &str) -> Result<String, StageError> {
    let content = tokio::fs::read(path).await.map_err(|e| StageError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mime = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(fallback_mime);
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(content)))
}

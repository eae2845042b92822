use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LexoraError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Submission rejected: {0}")]
    Submit(#[from] SubmitError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to resolve {provider} credential: {source}")]
    Credential {
        provider: &'static str,
        #[source]
        source: crate::secrets::SecretError,
    },

    #[error("Failed to build HTTP client for {provider}: {source}")]
    HttpClient {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Submission queue is full ({capacity} jobs waiting)")]
    QueueFull { capacity: usize },

    #[error("Worker pool has been shut down")]
    ChannelClosed,
}

/// Synchronous rejections returned by `VideoService::submit`.
///
/// None of these create a Video Job.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("{provider} provider credential is not configured")]
    ProviderNotConfigured { provider: &'static str },

    #[error("Lesson {0} not found")]
    LessonNotFound(i64),

    #[error("Lesson {0} has no text to narrate")]
    EmptyLesson(i64),

    #[error("No voice specified. Set a default voice or provide voice_id")]
    NoVoice,

    #[error("No avatar specified. Upload an avatar or set a default avatar")]
    NoAvatar,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

pub type Result<T> = std::result::Result<T, LexoraError>;

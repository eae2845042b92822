pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod providers;
pub mod sanitize;
pub mod secrets;
pub mod storage;

pub use config::{load_config, Config};
pub use db::Database;
pub use error::{ConfigError, LexoraError, Result, StorageError, SubmitError, WorkerError};
pub use jobs::{
    AvatarUpload, LeaseTimings, PoolSettings, RunOutcome, SubmitReceipt, SubmitRequest,
    VideoCatalog, VideoJob, VideoService, VideoStatus,
};
pub use pipeline::{GenerationFailure, VideoGenerator};
pub use providers::{ElevenLabsClient, LipSyncClient, LipSyncComposer, SpeechSynthesizer, StageError};
pub use secrets::{resolve_credential, resolve_secret, SecretError};
pub use storage::{ArtifactStorage, Bucket};

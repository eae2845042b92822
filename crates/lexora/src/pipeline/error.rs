use thiserror::Error;

use crate::providers::StageError;

/// A stage failure, tagged with the stage that produced it.
///
/// The display form is what gets persisted as a job's failure reason.
#[derive(Error, Debug)]
pub enum GenerationFailure {
    #[error("audio generation failed: {0}")]
    Audio(#[source] StageError),

    #[error("lip-sync video failed: {0}")]
    Video(#[source] StageError),
}

impl GenerationFailure {
    pub fn stage(&self) -> &'static str {
        match self {
            GenerationFailure::Audio(_) => "synthesize",
            GenerationFailure::Video(_) => "compose",
        }
    }
}

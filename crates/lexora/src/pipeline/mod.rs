pub mod error;
pub mod orchestrator;

pub use error::GenerationFailure;
pub use orchestrator::{GeneratedArtifacts, GenerationRequest, VideoGenerator};

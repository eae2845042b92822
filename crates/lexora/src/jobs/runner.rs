use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;

use futures_util::FutureExt;
use tracing::{error, info, info_span, warn, Instrument};

use crate::pipeline::{GenerationRequest, VideoGenerator};
use crate::sanitize;
use crate::storage::{ArtifactStorage, Bucket};

use super::job::JobTicket;
use super::store::VideoJobStore;

/// How a single run ended. Purely informational; the job row is the
/// source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    /// The job row was deleted while the pipeline ran.
    Vanished,
    /// The job row had already left `processing`.
    AlreadyTerminal,
}

/// Executes one job and writes its terminal state exactly once.
pub struct JobRunner {
    generator: VideoGenerator,
    store: VideoJobStore,
    storage: ArtifactStorage,
}

impl JobRunner {
    pub fn new(generator: VideoGenerator, store: VideoJobStore, storage: ArtifactStorage) -> Self {
        Self {
            generator,
            store,
            storage,
        }
    }

    /// Runs the pipeline for `ticket` and reconciles the job row.
    ///
    /// Never returns an error and never lets a pipeline panic escape.
    pub async fn run(&self, ticket: JobTicket) -> RunOutcome {
        let span = info_span!("job", job_id = %ticket.job_id, lesson_id = ticket.lesson_id);
        self.run_inner(ticket).instrument(span).await
    }

    async fn run_inner(&self, ticket: JobTicket) -> RunOutcome {
        let request = GenerationRequest {
            lesson_text: ticket.lesson_text,
            voice_id: ticket.voice_id,
            avatar_image: ticket.avatar_image,
            output_video: self.storage.allocate(Bucket::Videos, "mp4"),
            output_audio: self.storage.allocate(Bucket::Audio, "mp3"),
        };

        info!(
            text = %sanitize::text_summary(&request.lesson_text),
            "Starting video generation"
        );

        let result = AssertUnwindSafe(self.generator.generate(&request))
            .catch_unwind()
            .await;

        let failure_reason = match result {
            Ok(Ok(artifacts)) => {
                let video_url = self.storage.public_reference(Bucket::Videos, &artifacts.video);
                let audio_url = self.storage.public_reference(Bucket::Audio, &artifacts.audio);
                let (id, video, audio) = (ticket.job_id.clone(), video_url.clone(), audio_url);
                let completed = self
                    .store
                    .blocking(move |store| store.complete(&id, &video, &audio))
                    .await;
                match completed {
                    Ok(true) => {
                        info!(video = %video_url, "Video generation completed");
                        return RunOutcome::Completed;
                    }
                    // Deleted or already terminal: nothing will ever point at these files.
                    Ok(false) => {
                        self.remove_artifacts(&request).await;
                        return self.unreconciled(&ticket.job_id).await;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to record completed video");
                        format!("unexpected fault: {}", e)
                    }
                }
            }
            Ok(Err(failure)) => {
                warn!(stage = failure.stage(), error = %failure, "Video generation failed");
                failure.to_string()
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "Video generation panicked");
                format!("unexpected fault: {}", message)
            }
        };

        self.remove_artifacts(&request).await;

        let id = ticket.job_id.clone();
        let failed = self
            .store
            .blocking(move |store| store.fail(&id, &failure_reason))
            .await;
        match failed {
            Ok(true) => RunOutcome::Failed,
            Ok(false) => self.unreconciled(&ticket.job_id).await,
            Err(e) => {
                error!(error = %e, "Failed to record failed video");
                RunOutcome::Failed
            }
        }
    }

    /// Classifies a terminal write that matched no `processing` row.
    async fn unreconciled(&self, job_id: &str) -> RunOutcome {
        let id = job_id.to_string();
        match self.store.blocking(move |store| store.get(&id)).await {
            Ok(Some(job)) => {
                warn!(status = %job.status, "Job already terminal, result discarded");
                RunOutcome::AlreadyTerminal
            }
            Ok(None) => {
                info!("Job was deleted while running, result discarded");
                RunOutcome::Vanished
            }
            Err(e) => {
                warn!(error = %e, "Could not re-read job after terminal write");
                RunOutcome::Vanished
            }
        }
    }

    /// Removes whatever the pipeline wrote for this run. No record refers
    /// to these files once the run did not complete.
    async fn remove_artifacts(&self, request: &GenerationRequest) {
        for path in [&request.output_audio, &request.output_video] {
            self.remove_quietly(path).await;
        }
    }

    async fn remove_quietly(&self, path: &Path) {
        if let Err(e) = self.storage.remove_if_exists(path).await {
            warn!(
                file = %sanitize::redact_path(path),
                error = %e,
                "Failed to remove partial artifact"
            );
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

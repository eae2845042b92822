//! Entry point for callers: validates a generation request, creates the job
//! and hands it to the worker pool without waiting for the result.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::db::{lesson_repo, Database};
use crate::error::{LexoraError, SubmitError};
use crate::pipeline::VideoGenerator;
use crate::sanitize;
use crate::storage::{ArtifactStorage, Bucket};

use super::catalog::VideoCatalog;
use super::job::{JobTicket, VideoJob, VideoStatus};
use super::lease::{InstanceLease, LeaseTimings};
use super::pool::WorkerPool;
use super::runner::JobRunner;
use super::store::{NewVideoJob, VideoJobStore};

/// An avatar image uploaded together with the request.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub user_id: i64,
    pub lesson_id: i64,
    /// Overrides the user's default voice.
    pub voice_id: Option<String>,
    /// Overrides the user's default avatar.
    pub avatar: Option<AvatarUpload>,
}

/// Immediate acknowledgment of an accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    pub status: VideoStatus,
}

/// Worker pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub worker_count: usize,
    pub queue_capacity: usize,
}

pub struct VideoService {
    db: Database,
    store: VideoJobStore,
    storage: ArtifactStorage,
    catalog: VideoCatalog,
    generator: VideoGenerator,
    lease: InstanceLease,
    pool: WorkerPool,
}

impl VideoService {
    /// Prepares storage, takes a service lease, fails jobs whose owning
    /// service is gone and starts the workers. Must be called from within a
    /// Tokio runtime.
    pub async fn start(
        db: Database,
        storage: ArtifactStorage,
        generator: VideoGenerator,
        settings: PoolSettings,
    ) -> Result<Self, LexoraError> {
        Self::start_with_lease(db, storage, generator, settings, LeaseTimings::default()).await
    }

    /// [`start`](Self::start) with explicit lease timings.
    pub async fn start_with_lease(
        db: Database,
        storage: ArtifactStorage,
        generator: VideoGenerator,
        settings: PoolSettings,
        timings: LeaseTimings,
    ) -> Result<Self, LexoraError> {
        storage.ensure_layout()?;

        let lease = InstanceLease::acquire(db.clone(), timings).await?;
        let orphaned = match lease.sweep().await {
            Ok(count) => count,
            Err(e) => {
                lease.release().await;
                return Err(e.into());
            }
        };
        if orphaned > 0 {
            warn!(count = orphaned, "Failed jobs whose service stopped before finishing");
        }

        let store = VideoJobStore::new(db.clone()).owned_by(lease.instance_id());
        let catalog = VideoCatalog::new(db.clone(), storage.clone());
        let runner = Arc::new(JobRunner::new(
            generator.clone(),
            store.clone(),
            storage.clone(),
        ));
        let pool = WorkerPool::new(runner, settings.worker_count, settings.queue_capacity);

        Ok(Self {
            db,
            store,
            storage,
            catalog,
            generator,
            lease,
            pool,
        })
    }

    /// Validates the request and queues a new job.
    ///
    /// Every rejection happens before the job row exists, so a rejected
    /// submission never shows up in `get` or `list_for_lesson`.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitReceipt, SubmitError> {
        if let Some(provider) = self.generator.missing_provider() {
            return Err(SubmitError::ProviderNotConfigured { provider });
        }

        let (user_id, lesson_id) = (request.user_id, request.lesson_id);
        let (lesson, defaults) = self
            .db
            .call(move |db| {
                let lesson = lesson_repo::find_owned_lesson(db, user_id, lesson_id)?;
                let defaults = lesson_repo::find_user_defaults(db, user_id)?;
                Ok((lesson, defaults))
            })
            .await?;
        let lesson = lesson.ok_or(SubmitError::LessonNotFound(lesson_id))?;

        let lesson_text = lesson.narration_text().trim().to_string();
        if lesson_text.is_empty() {
            return Err(SubmitError::EmptyLesson(lesson.id));
        }
        let defaults = defaults.unwrap_or_default();

        let voice_id = non_blank(request.voice_id)
            .or_else(|| non_blank(defaults.voice_id))
            .ok_or(SubmitError::NoVoice)?;

        let (avatar_reference, avatar_image, uploaded) = match request.avatar {
            Some(upload) => {
                let path = self
                    .storage
                    .store_avatar(&upload.file_name, &upload.content)
                    .await?;
                let reference = self.storage.public_reference(Bucket::Avatars, &path);
                (reference, path.clone(), Some(path))
            }
            None => {
                let reference = non_blank(defaults.avatar_url).ok_or(SubmitError::NoAvatar)?;
                let path = self.storage.resolve_reference(&reference);
                (reference, path, None)
            }
        };

        match self
            .enqueue(&lesson, lesson_text, voice_id, avatar_reference, avatar_image)
            .await
        {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                if let Some(path) = uploaded {
                    if let Err(cleanup) = self.storage.remove_if_exists(&path).await {
                        warn!(error = %cleanup, "Failed to remove rejected avatar upload");
                    }
                }
                Err(e)
            }
        }
    }

    async fn enqueue(
        &self,
        lesson: &lesson_repo::OwnedLesson,
        lesson_text: String,
        voice_id: String,
        avatar_reference: String,
        avatar_image: PathBuf,
    ) -> Result<SubmitReceipt, SubmitError> {
        let slot = self.pool.reserve()?;

        let new_job = NewVideoJob {
            lesson_id: lesson.id,
            title: format!("Video for {}", lesson.title),
            voice_id: voice_id.clone(),
            avatar_reference,
        };
        let job = self
            .store
            .blocking(move |store| store.create(new_job))
            .await?;

        info!(
            job_id = %job.id,
            lesson_id = lesson.id,
            text = %sanitize::text_summary(&lesson_text),
            "Video job queued"
        );

        slot.send(JobTicket {
            job_id: job.id.clone(),
            lesson_id: lesson.id,
            lesson_text,
            voice_id,
            avatar_image,
        });

        Ok(SubmitReceipt {
            job_id: job.id,
            status: job.status,
        })
    }

    /// Current snapshot of a job.
    pub fn get(&self, job_id: &str) -> Result<Option<VideoJob>, LexoraError> {
        self.catalog.get(job_id)
    }

    /// Jobs of a lesson, newest first. `None` if the user does not own it.
    pub fn list_for_lesson(
        &self,
        user_id: i64,
        lesson_id: i64,
    ) -> Result<Option<Vec<VideoJob>>, LexoraError> {
        self.catalog.list_for_lesson(user_id, lesson_id)
    }

    /// See [`VideoCatalog::delete`].
    pub async fn delete(&self, user_id: i64, job_id: &str) -> Result<bool, LexoraError> {
        self.catalog.delete(user_id, job_id).await
    }

    pub fn catalog(&self) -> &VideoCatalog {
        &self.catalog
    }

    pub fn storage(&self) -> &ArtifactStorage {
        &self.storage
    }

    /// Id under which this service's jobs are recorded.
    pub fn instance_id(&self) -> &str {
        self.lease.instance_id()
    }

    /// Stops accepting submissions, waits for queued and running jobs, then
    /// gives up the service lease.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
        self.lease.release().await;
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

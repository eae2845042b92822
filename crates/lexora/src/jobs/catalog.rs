//! Read and delete access to video jobs, independent of the worker pool.
//!
//! Anything that only inspects or removes jobs goes through here, so it can
//! run in a process that never starts workers or sweeps for orphans.

use tracing::info;

use crate::db::{lesson_repo, Database};
use crate::error::LexoraError;
use crate::storage::ArtifactStorage;

use super::job::VideoJob;
use super::store::VideoJobStore;

#[derive(Clone)]
pub struct VideoCatalog {
    db: Database,
    store: VideoJobStore,
    storage: ArtifactStorage,
}

impl VideoCatalog {
    pub fn new(db: Database, storage: ArtifactStorage) -> Self {
        let store = VideoJobStore::new(db.clone());
        Self { db, store, storage }
    }

    /// Current snapshot of a job.
    pub fn get(&self, job_id: &str) -> Result<Option<VideoJob>, LexoraError> {
        Ok(self.store.get(job_id)?)
    }

    /// Jobs of a lesson, newest first. `None` if the user does not own it.
    pub fn list_for_lesson(
        &self,
        user_id: i64,
        lesson_id: i64,
    ) -> Result<Option<Vec<VideoJob>>, LexoraError> {
        if lesson_repo::find_owned_lesson(&self.db, user_id, lesson_id)?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.store.list_for_lesson(lesson_id)?))
    }

    /// Deletes a job together with its video and audio files.
    ///
    /// Returns `false` if the user owns no such job. The row goes first and
    /// the files named by that same row follow. A job still running at that
    /// point finds its row gone and removes its own files.
    pub async fn delete(&self, user_id: i64, job_id: &str) -> Result<bool, LexoraError> {
        let id = job_id.to_string();
        let deleted = self
            .store
            .blocking(move |store| store.delete_owned(user_id, &id))
            .await?;
        let Some(job) = deleted else {
            return Ok(false);
        };

        for reference in [job.video_url.as_deref(), job.audio_url.as_deref()]
            .into_iter()
            .flatten()
        {
            let path = self.storage.resolve_reference(reference);
            self.storage.remove_if_exists(&path).await?;
        }

        info!(job_id, status = %job.status, "Video job deleted");
        Ok(true)
    }

    pub fn storage(&self) -> &ArtifactStorage {
        &self.storage
    }
}

//! Typed access to persisted video jobs.

use chrono::Utc;
use uuid::Uuid;

use crate::db::video_repo::{self, VideoRow};
use crate::db::{Database, DatabaseError};

use super::job::{format_timestamp, VideoJob, VideoStatus};

/// Inputs captured when a job is created. They never change afterwards.
#[derive(Debug, Clone)]
pub struct NewVideoJob {
    pub lesson_id: i64,
    pub title: String,
    pub voice_id: String,
    pub avatar_reference: String,
}

#[derive(Clone)]
pub struct VideoJobStore {
    db: Database,
    owner: Option<String>,
}

impl VideoJobStore {
    pub fn new(db: Database) -> Self {
        Self { db, owner: None }
    }

    /// Jobs created through the returned store are tagged with `instance_id`,
    /// which keeps them out of other services' orphan sweeps.
    pub fn owned_by(self, instance_id: &str) -> Self {
        Self {
            owner: Some(instance_id.to_string()),
            ..self
        }
    }

    /// Runs `f` against this store on the blocking pool.
    pub async fn blocking<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&VideoJobStore) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        self.db.call(move |_| f(&store)).await
    }

    /// Inserts a fresh job in `processing`.
    pub fn create(&self, new_job: NewVideoJob) -> Result<VideoJob, DatabaseError> {
        let now = format_timestamp(Utc::now());
        let row = VideoRow {
            id: Uuid::new_v4().to_string(),
            lesson_id: new_job.lesson_id,
            title: new_job.title,
            voice_id: new_job.voice_id,
            avatar_reference: new_job.avatar_reference,
            status: VideoStatus::Processing.as_str().to_string(),
            video_url: None,
            audio_url: None,
            transcript: None,
            duration: None,
            failure_reason: None,
            owner_id: self.owner.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        video_repo::insert(&self.db, &row)?;
        VideoJob::from_row(row)
    }

    pub fn get(&self, id: &str) -> Result<Option<VideoJob>, DatabaseError> {
        video_repo::find_by_id(&self.db, id)?
            .map(VideoJob::from_row)
            .transpose()
    }

    pub fn list_for_lesson(&self, lesson_id: i64) -> Result<Vec<VideoJob>, DatabaseError> {
        video_repo::list_by_lesson(&self.db, lesson_id)?
            .into_iter()
            .map(VideoJob::from_row)
            .collect()
    }

    /// `processing → completed`. Returns `false` when the job is gone or
    /// already terminal.
    pub fn complete(
        &self,
        id: &str,
        video_url: &str,
        audio_url: &str,
    ) -> Result<bool, DatabaseError> {
        let now = format_timestamp(Utc::now());
        video_repo::mark_completed(&self.db, id, video_url, audio_url, &now)
    }

    /// `processing → failed`. Returns `false` when the job is gone or
    /// already terminal.
    pub fn fail(&self, id: &str, reason: &str) -> Result<bool, DatabaseError> {
        let now = format_timestamp(Utc::now());
        video_repo::mark_failed(&self.db, id, reason, &now)
    }

    /// Deletes a job the user owns and returns its last state, including
    /// any artifact references it had.
    pub fn delete_owned(&self, user_id: i64, id: &str) -> Result<Option<VideoJob>, DatabaseError> {
        video_repo::delete_owned(&self.db, user_id, id)?
            .map(VideoJob::from_row)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VideoJobStore {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO users (id, email) VALUES (1, 'a@example.com');
                 INSERT INTO topics (id, user_id, title) VALUES (1, 1, 'Rust');
                 INSERT INTO learning_paths (id, topic_id, title) VALUES (1, 1, 'Basics');
                 INSERT INTO lessons (id, learning_path_id, title, content)
                     VALUES (1, 1, 'Ownership', 'Every value has an owner.');",
            )?;
            Ok(())
        })
        .unwrap();
        VideoJobStore::new(db)
    }

    fn new_job() -> NewVideoJob {
        NewVideoJob {
            lesson_id: 1,
            title: "Video for Ownership".to_string(),
            voice_id: "voice-1".to_string(),
            avatar_reference: "/uploads/avatars/a.png".to_string(),
        }
    }

    #[test]
    fn test_create_starts_processing() {
        let store = store();
        let job = store.create(new_job()).unwrap();

        assert_eq!(job.status, VideoStatus::Processing);
        assert!(job.video_url.is_none());
        assert_eq!(job.created_at, job.updated_at);
        assert_eq!(store.get(&job.id).unwrap().unwrap(), job);
    }

    #[test]
    fn test_complete_then_fail_is_rejected() {
        let store = store();
        let job = store.create(new_job()).unwrap();

        assert!(store
            .complete(&job.id, "/uploads/videos/v.mp4", "/uploads/audio/a.mp3")
            .unwrap());
        assert!(!store.fail(&job.id, "late failure").unwrap());

        let done = store.get(&job.id).unwrap().unwrap();
        assert_eq!(done.status, VideoStatus::Completed);
        assert_eq!(done.video_url.as_deref(), Some("/uploads/videos/v.mp4"));
        assert!(done.failure_reason.is_none());
        assert!(done.updated_at >= done.created_at);
    }

    #[test]
    fn test_fail_records_reason() {
        let store = store();
        let job = store.create(new_job()).unwrap();

        assert!(store.fail(&job.id, "audio generation failed: x").unwrap());
        let failed = store.get(&job.id).unwrap().unwrap();
        assert_eq!(failed.status, VideoStatus::Failed);
        assert_eq!(
            failed.failure_reason.as_deref(),
            Some("audio generation failed: x")
        );
        assert!(failed.audio_url.is_none());
    }

    #[test]
    fn test_owned_store_tags_rows() {
        let store = store().owned_by("instance-a");
        let job = store.create(new_job()).unwrap();

        let row = video_repo::find_by_id(&store.db, &job.id).unwrap().unwrap();
        assert_eq!(row.owner_id.as_deref(), Some("instance-a"));
    }

    #[test]
    fn test_delete_owned_returns_last_state() {
        let store = store();
        let job = store.create(new_job()).unwrap();
        store
            .complete(&job.id, "/uploads/videos/v.mp4", "/uploads/audio/a.mp3")
            .unwrap();

        assert!(store.delete_owned(2, &job.id).unwrap().is_none());
        let deleted = store.delete_owned(1, &job.id).unwrap().unwrap();
        assert_eq!(deleted.video_url.as_deref(), Some("/uploads/videos/v.mp4"));
        assert!(store.get(&job.id).unwrap().is_none());
        assert!(!store.complete(&job.id, "/v", "/a").unwrap());
    }

    #[tokio::test]
    async fn test_blocking_runs_store_calls() {
        let store = store();
        let job = store.create(new_job()).unwrap();
        let id = job.id.clone();

        let failed = store
            .blocking(move |s| s.fail(&id, "audio generation failed: x"))
            .await
            .unwrap();
        assert!(failed);
        assert_eq!(store.get(&job.id).unwrap().unwrap().status, VideoStatus::Failed);
    }
}

//! Test harness for isolated service tests.
//!
//! Seeds one learning tree:
//! - user 1 (`owner@example.com`, default voice `voice-default`, no avatar)
//! - user 2 (`stranger@example.com`, no defaults, owns nothing)
//! - topic 10 → path 100 → lesson 1000 "Ownership" (with narration script)
//!   and lesson 1001 "Empty" (blank content, no script)

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use lexora::config::VoiceSettings;
use lexora::jobs::{LeaseTimings, PoolSettings, VideoJob, VideoService};
use lexora::{ArtifactStorage, Database, LipSyncComposer, SpeechSynthesizer, VideoGenerator};

pub const OWNER: i64 = 1;
pub const STRANGER: i64 = 2;
pub const LESSON: i64 = 1000;
pub const EMPTY_LESSON: i64 = 1001;
pub const LESSON_SCRIPT: &str = "Every value in Rust has exactly one owner.";

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");

        let db = Database::open_in_memory().expect("Failed to open database");
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, voice_id) VALUES (?1, 'owner@example.com', 'voice-default')",
                [OWNER],
            )?;
            conn.execute(
                "INSERT INTO users (id, email) VALUES (?1, 'stranger@example.com')",
                [STRANGER],
            )?;
            conn.execute_batch(
                "INSERT INTO topics (id, user_id, title) VALUES (10, 1, 'Rust');
                 INSERT INTO learning_paths (id, topic_id, title) VALUES (100, 10, 'Basics');
                 INSERT INTO lessons (id, learning_path_id, title, content, script)
                     VALUES (1000, 100, 'Ownership', 'Ownership lesson content.',
                             'Every value in Rust has exactly one owner.');
                 INSERT INTO lessons (id, learning_path_id, title, content)
                     VALUES (1001, 100, 'Empty', '   ');",
            )?;
            Ok(())
        })
        .expect("Failed to seed database");

        Self {
            temp_dir,
            upload_dir,
            db,
        }
    }

    pub fn storage(&self) -> ArtifactStorage {
        ArtifactStorage::new(&self.upload_dir, "/uploads")
    }

    pub fn set_default_voice(&self, user_id: i64, voice_id: Option<&str>) {
        self.db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE users SET voice_id = ?2 WHERE id = ?1",
                    rusqlite::params![user_id, voice_id],
                )?;
                Ok(())
            })
            .expect("Failed to update voice");
    }

    /// Writes an avatar image into the upload root and makes it the user's default.
    pub fn install_default_avatar(&self, user_id: i64) -> String {
        let avatars = self.upload_dir.join("avatars");
        std::fs::create_dir_all(&avatars).expect("Failed to create avatars dir");
        std::fs::write(avatars.join("default.png"), b"default-avatar")
            .expect("Failed to write avatar");

        let reference = "/uploads/avatars/default.png".to_string();
        self.db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE users SET avatar_url = ?2 WHERE id = ?1",
                    rusqlite::params![user_id, reference],
                )?;
                Ok(())
            })
            .expect("Failed to update avatar");
        reference
    }

    pub async fn start_service(
        &self,
        speech: Arc<dyn SpeechSynthesizer>,
        lipsync: Arc<dyn LipSyncComposer>,
    ) -> VideoService {
        self.start_service_with(
            speech,
            lipsync,
            PoolSettings {
                worker_count: 2,
                queue_capacity: 8,
            },
        )
        .await
    }

    pub async fn start_service_with(
        &self,
        speech: Arc<dyn SpeechSynthesizer>,
        lipsync: Arc<dyn LipSyncComposer>,
        settings: PoolSettings,
    ) -> VideoService {
        let generator = VideoGenerator::new(speech, lipsync, VoiceSettings::default());
        VideoService::start(self.db.clone(), self.storage(), generator, settings)
            .await
            .expect("Failed to start video service")
    }

    /// Starts a service whose lease heartbeat and expiry are `timings`.
    pub async fn start_service_with_lease(
        &self,
        speech: Arc<dyn SpeechSynthesizer>,
        lipsync: Arc<dyn LipSyncComposer>,
        timings: LeaseTimings,
    ) -> VideoService {
        let generator = VideoGenerator::new(speech, lipsync, VoiceSettings::default());
        let settings = PoolSettings {
            worker_count: 1,
            queue_capacity: 4,
        };
        VideoService::start_with_lease(
            self.db.clone(),
            self.storage(),
            generator,
            settings,
            timings,
        )
        .await
        .expect("Failed to start video service")
    }

    pub fn files_in(&self, bucket: &str) -> usize {
        std::fs::read_dir(self.upload_dir.join(bucket))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub fn video_count(&self) -> usize {
        self.db
            .with_conn(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM videos", [], |r| r.get(0))?;
                Ok(count as usize)
            })
            .expect("Failed to count videos")
    }
}

/// Polls `get` until the job leaves `processing`.
pub async fn wait_for_terminal(service: &VideoService, job_id: &str) -> VideoJob {
    for _ in 0..500 {
        let job = service
            .get(job_id)
            .expect("get failed")
            .expect("job disappeared");
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}

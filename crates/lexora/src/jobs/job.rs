use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::video_repo::VideoRow;
use crate::db::DatabaseError;

/// Lifecycle state of a video job. `Processing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DatabaseError> {
        match value {
            "processing" => Ok(VideoStatus::Processing),
            "completed" => Ok(VideoStatus::Completed),
            "failed" => Ok(VideoStatus::Failed),
            other => Err(DatabaseError::CorruptValue {
                column: "status",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, VideoStatus::Processing)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a video job, as returned to pollers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoJob {
    pub id: String,
    pub lesson_id: i64,
    pub title: String,
    pub voice_id: String,
    pub avatar_reference: String,
    pub status: VideoStatus,
    /// Set only when `status` is `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Set only when `status` is `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoJob {
    pub fn from_row(row: VideoRow) -> Result<Self, DatabaseError> {
        let status = VideoStatus::parse(&row.status)?;
        let completed = status == VideoStatus::Completed;
        let created_at = parse_timestamp(&row.created_at, &row.id);
        let updated_at = parse_timestamp(&row.updated_at, &row.id);

        Ok(Self {
            id: row.id,
            lesson_id: row.lesson_id,
            title: row.title,
            voice_id: row.voice_id,
            avatar_reference: row.avatar_reference,
            status,
            video_url: row.video_url.filter(|_| completed),
            audio_url: row.audio_url.filter(|_| completed),
            transcript: row.transcript,
            duration: row.duration,
            failure_reason: row.failure_reason,
            created_at,
            updated_at,
        })
    }
}

/// Work handed from submission to a worker: everything the pipeline needs
/// that is not re-read from the database.
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub job_id: String,
    pub lesson_id: i64,
    pub lesson_text: String,
    pub voice_id: String,
    pub avatar_image: PathBuf,
}

pub(crate) fn parse_timestamp(value: &str, job_id: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::warn!(job_id, "Failed to parse timestamp '{}': {}", value, e);
            Utc::now()
        })
}

pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

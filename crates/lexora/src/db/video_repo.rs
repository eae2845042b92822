//! Row-level access to the `videos` table.
//!
//! Terminal transitions are guarded by `status = 'processing'` in the
//! `WHERE` clause, so a row leaves `processing` at most once no matter how
//! many writers race on it.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw video row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRow {
    pub id: String,
    pub lesson_id: i64,
    pub title: String,
    pub voice_id: String,
    pub avatar_reference: String,
    pub status: String,
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub transcript: Option<String>,
    pub duration: Option<f64>,
    pub failure_reason: Option<String>,
    /// Service instance that queued the job; `None` for rows written
    /// outside a running service.
    pub owner_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl VideoRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            lesson_id: row.get("lesson_id")?,
            title: row.get("title")?,
            voice_id: row.get("voice_id")?,
            avatar_reference: row.get("avatar_reference")?,
            status: row.get("status")?,
            video_url: row.get("video_url")?,
            audio_url: row.get("audio_url")?,
            transcript: row.get("transcript")?,
            duration: row.get("duration")?,
            failure_reason: row.get("failure_reason")?,
            owner_id: row.get("owner_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new video row.
pub fn insert(db: &Database, video: &VideoRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO videos (id, lesson_id, title, voice_id, avatar_reference, status,
             video_url, audio_url, transcript, duration, failure_reason, owner_id,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                video.id,
                video.lesson_id,
                video.title,
                video.voice_id,
                video.avatar_reference,
                video.status,
                video.video_url,
                video.audio_url,
                video.transcript,
                video.duration,
                video.failure_reason,
                video.owner_id,
                video.created_at,
                video.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a video by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<VideoRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM videos WHERE id = ?1",
                params![id],
                VideoRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists all videos of a lesson, newest first.
pub fn list_by_lesson(db: &Database, lesson_id: i64) -> Result<Vec<VideoRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM videos WHERE lesson_id = ?1 ORDER BY created_at DESC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![lesson_id], VideoRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Moves a processing video to `completed` with both artifact references.
///
/// Returns `false` if no processing row with this id exists.
pub fn mark_completed(
    db: &Database,
    id: &str,
    video_url: &str,
    audio_url: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE videos SET status = 'completed', video_url = ?2, audio_url = ?3,
             failure_reason = NULL, updated_at = ?4
             WHERE id = ?1 AND status = 'processing'",
            params![id, video_url, audio_url, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// Moves a processing video to `failed`, clearing any artifact references.
///
/// Returns `false` if no processing row with this id exists.
pub fn mark_failed(
    db: &Database,
    id: &str,
    reason: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE videos SET status = 'failed', video_url = NULL, audio_url = NULL,
             failure_reason = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            params![id, reason, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// Deletes a video only if its lesson belongs to one of the user's topics,
/// returning the row as it was at deletion time.
///
/// The check, the delete and the read of the artifact references are one
/// statement, so a runner finishing concurrently either sees the row gone or
/// has already published references that the caller gets back here.
pub fn delete_owned(
    db: &Database,
    user_id: i64,
    id: &str,
) -> Result<Option<VideoRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "DELETE FROM videos
                 WHERE id = ?1 AND lesson_id IN (
                     SELECT l.id
                     FROM lessons l
                     JOIN learning_paths lp ON lp.id = l.learning_path_id
                     JOIN topics t ON t.id = lp.topic_id
                     WHERE t.user_id = ?2
                 )
                 RETURNING *",
                params![id, user_id],
                VideoRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

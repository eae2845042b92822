//! Ownership lookups along the topic → learning path → lesson chain.
//!
//! The learning tables are maintained elsewhere; this module only reads them.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// A lesson reachable from the requesting user's topics.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedLesson {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub script: Option<String>,
}

impl OwnedLesson {
    /// Text to narrate: the narration script when present, else the lesson content.
    pub fn narration_text(&self) -> &str {
        match self.script.as_deref() {
            Some(script) if !script.trim().is_empty() => script,
            _ => &self.content,
        }
    }
}

/// Per-user generation defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDefaults {
    pub voice_id: Option<String>,
    pub avatar_url: Option<String>,
}

/// Finds a lesson only if it belongs to one of the user's topics.
pub fn find_owned_lesson(
    db: &Database,
    user_id: i64,
    lesson_id: i64,
) -> Result<Option<OwnedLesson>, DatabaseError> {
    db.with_conn(|conn| {
        let lesson = conn
            .query_row(
                "SELECT l.id, l.title, l.content, l.script
                 FROM lessons l
                 JOIN learning_paths lp ON lp.id = l.learning_path_id
                 JOIN topics t ON t.id = lp.topic_id
                 WHERE l.id = ?1 AND t.user_id = ?2",
                params![lesson_id, user_id],
                |row| {
                    Ok(OwnedLesson {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        content: row.get(2)?,
                        script: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(lesson)
    })
}

/// Returns the user's default voice and avatar, or `None` for an unknown user.
pub fn find_user_defaults(
    db: &Database,
    user_id: i64,
) -> Result<Option<UserDefaults>, DatabaseError> {
    db.with_conn(|conn| {
        let defaults = conn
            .query_row(
                "SELECT voice_id, avatar_url FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(UserDefaults {
                        voice_id: row.get(0)?,
                        avatar_url: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(defaults)
    })
}

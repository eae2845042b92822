//! Versioned schema migrations recorded in `_migrations`.
//!
//! Column additions check `PRAGMA table_info` first, so a database that
//! already carries the column only gets the version recorded.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    kind: MigrationKind,
}

enum MigrationKind {
    Standard,
    /// ALTER TABLE ADD COLUMN, skipped if the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_learning_tables",
        sql: include_str!("sql/001_create_learning_tables.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "create_videos_table",
        sql: include_str!("sql/002_create_videos.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 3,
        description: "add_failure_reason_to_videos",
        sql: include_str!("sql/003_add_failure_reason.sql"),
        kind: MigrationKind::AddColumn {
            table: "videos",
            column: "failure_reason",
        },
    },
    Migration {
        version: 4,
        description: "create_service_leases",
        sql: include_str!("sql/004_create_service_leases.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 5,
        description: "add_owner_to_videos",
        sql: include_str!("sql/005_add_video_owner.sql"),
        kind: MigrationKind::AddColumn {
            table: "videos",
            column: "owner_id",
        },
    },
];

/// Applies every migration newer than the recorded version. Each migration
/// and its `_migrations` row commit together.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(conn, migration)?;
    }

    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let failed = |e: rusqlite::Error| DatabaseError::Migration {
        version: migration.version,
        reason: e.to_string(),
    };

    let needed = match &migration.kind {
        MigrationKind::Standard => true,
        MigrationKind::AddColumn { table, column } => !column_exists(conn, table, column)?,
    };

    let tx = conn.unchecked_transaction().map_err(failed)?;
    if needed {
        log::info!("Applying migration v{} ({})", migration.version, migration.description);
        tx.execute_batch(migration.sql).map_err(failed)?;
    } else {
        log::info!(
            "Migration v{} already reflected in the schema, recording only",
            migration.version
        );
    }
    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.description],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

/// Checks whether a column exists on a table using `PRAGMA table_info`.
fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    // Identifiers are interpolated, so only alphanumerics and underscores pass.
    if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("Invalid table name: {}", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .any(|r| r.map(|name| name == column).unwrap_or(false));
    Ok(exists)
}

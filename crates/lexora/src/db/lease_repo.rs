//! Service leases: which `VideoService` instances are alive.
//!
//! Each running service keeps a row here fresh. Jobs whose owner has no
//! live lease can no longer finish and are failed by whichever service
//! sweeps next.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Records a running instance, replacing any earlier row with the same id.
pub fn register(
    db: &Database,
    instance_id: &str,
    started_at: &str,
    now_ms: i64,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR REPLACE INTO service_leases (instance_id, started_at, heartbeat_ms)
             VALUES (?1, ?2, ?3)",
            params![instance_id, started_at, now_ms],
        )?;
        Ok(())
    })
}

/// Refreshes the heartbeat. Returns `false` if the lease was reaped in the
/// meantime.
pub fn renew(db: &Database, instance_id: &str, now_ms: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE service_leases SET heartbeat_ms = ?2 WHERE instance_id = ?1",
            params![instance_id, now_ms],
        )?;
        Ok(changed == 1)
    })
}

pub fn release(db: &Database, instance_id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM service_leases WHERE instance_id = ?1",
            params![instance_id],
        )?;
        Ok(())
    })
}

/// Drops leases whose heartbeat is older than `stale_before_ms`, then fails
/// every `processing` job without a live owner. Both happen in one
/// transaction. The calling instance's own lease is never dropped.
pub fn sweep_orphans(
    db: &Database,
    instance_id: &str,
    stale_before_ms: i64,
    reason: &str,
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM service_leases WHERE heartbeat_ms < ?1 AND instance_id <> ?2",
            params![stale_before_ms, instance_id],
        )?;
        let failed = tx.execute(
            "UPDATE videos SET status = 'failed', video_url = NULL, audio_url = NULL,
             failure_reason = ?1, updated_at = ?2
             WHERE status = 'processing'
               AND (owner_id IS NULL
                    OR owner_id NOT IN (SELECT instance_id FROM service_leases))",
            params![reason, updated_at],
        )?;
        tx.commit()?;
        Ok(failed)
    })
}

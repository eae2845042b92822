//! Liveness of a running `VideoService`.
//!
//! Several processes may share one database file. Each service holds a
//! lease it refreshes on an interval, and tags the jobs it queues with the
//! lease id. A sweep fails only `processing` jobs whose owner's lease has
//! lapsed, so starting a second service never touches jobs that are still
//! running elsewhere.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{lease_repo, Database, DatabaseError};

use super::job::format_timestamp;

/// Reason recorded on jobs whose owning service went away.
pub const INTERRUPTED_REASON: &str = "interrupted before completion";

/// Heartbeat and expiry timings.
#[derive(Debug, Clone, Copy)]
pub struct LeaseTimings {
    pub heartbeat: Duration,
    /// A lease not renewed for this long is considered dead.
    pub ttl: Duration,
}

impl Default for LeaseTimings {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(10),
            ttl: Duration::from_secs(60),
        }
    }
}

pub struct InstanceLease {
    instance_id: String,
    db: Database,
    timings: LeaseTimings,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl InstanceLease {
    /// Registers a fresh instance and starts its heartbeat.
    pub async fn acquire(db: Database, timings: LeaseTimings) -> Result<Self, DatabaseError> {
        let instance_id = Uuid::new_v4().to_string();
        let id = instance_id.clone();
        db.call(move |db| {
            lease_repo::register(db, &id, &format_timestamp(Utc::now()), now_ms())
        })
        .await?;

        let heartbeat = tokio::spawn(heartbeat_loop(db.clone(), instance_id.clone(), timings));
        info!(instance_id = %instance_id, "Service lease acquired");

        Ok(Self {
            instance_id,
            db,
            timings,
            heartbeat: Mutex::new(Some(heartbeat)),
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Fails `processing` jobs with no live owner. Returns how many.
    pub async fn sweep(&self) -> Result<usize, DatabaseError> {
        let id = self.instance_id.clone();
        let timings = self.timings;
        self.db.call(move |db| sweep(db, &id, timings)).await
    }

    /// Stops the heartbeat and removes the lease. Jobs still tagged with
    /// this instance become orphans for the next sweep.
    pub async fn release(&self) {
        let heartbeat = self.heartbeat.lock().ok().and_then(|mut h| h.take());
        let Some(heartbeat) = heartbeat else {
            return;
        };
        heartbeat.abort();
        let _ = heartbeat.await;

        let instance_id = self.instance_id.clone();
        match self
            .db
            .call(move |db| lease_repo::release(db, &instance_id))
            .await
        {
            Ok(()) => info!(instance_id = %self.instance_id, "Service lease released"),
            Err(e) => warn!(error = %e, "Failed to release service lease"),
        }
    }
}

impl Drop for InstanceLease {
    fn drop(&mut self) {
        // Without a release the row simply goes stale after `ttl`.
        if let Some(heartbeat) = self.heartbeat.get_mut().ok().and_then(Option::take) {
            heartbeat.abort();
        }
    }
}

fn sweep(db: &Database, instance_id: &str, timings: LeaseTimings) -> Result<usize, DatabaseError> {
    let ttl_ms = i64::try_from(timings.ttl.as_millis()).unwrap_or(i64::MAX);
    lease_repo::sweep_orphans(
        db,
        instance_id,
        now_ms().saturating_sub(ttl_ms),
        INTERRUPTED_REASON,
        &format_timestamp(Utc::now()),
    )
}

async fn heartbeat_loop(db: Database, instance_id: String, timings: LeaseTimings) {
    let mut interval = tokio::time::interval(timings.heartbeat);
    // The first tick completes immediately; registration already counts.
    interval.tick().await;

    loop {
        interval.tick().await;

        let id = instance_id.clone();
        let result = db
            .call(move |db| {
                if !lease_repo::renew(db, &id, now_ms())? {
                    // Reaped after a long stall; come back under the same id.
                    lease_repo::register(db, &id, &format_timestamp(Utc::now()), now_ms())?;
                }
                sweep(db, &id, timings)
            })
            .await;

        match result {
            Ok(0) => debug!(instance_id = %instance_id, "Lease renewed"),
            Ok(count) => warn!(count, "Failed jobs whose service stopped"),
            Err(e) => warn!(error = %e, "Lease heartbeat failed"),
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

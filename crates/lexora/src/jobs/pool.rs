use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, OwnedPermit, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::WorkerError;

use super::job::JobTicket;
use super::runner::{panic_message, JobRunner};

/// A reserved place in the submission queue.
///
/// Reserving before the job row exists means a full queue rejects the
/// submission without leaving a `processing` row behind. Dropping the slot
/// unused releases it.
pub struct SubmissionSlot {
    permit: OwnedPermit<JobTicket>,
}

impl SubmissionSlot {
    pub fn send(self, ticket: JobTicket) {
        self.permit.send(ticket);
    }
}

/// Fixed number of async workers draining one bounded queue.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<JobTicket>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
}

impl WorkerPool {
    /// Spawns the workers. Must be called from within a Tokio runtime.
    pub fn new(runner: Arc<JobRunner>, worker_count: usize, queue_capacity: usize) -> Self {
        let worker_count = worker_count.max(1);
        let capacity = queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel::<JobTicket>(capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers: Vec<JoinHandle<()>> = (0..worker_count)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let runner = Arc::clone(&runner);
                tokio::spawn(run_worker(worker_id, receiver, runner))
            })
            .collect();

        info!(worker_count, queue_capacity = capacity, "Started video workers");

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            capacity,
        }
    }

    /// Reserves a queue slot without waiting.
    pub fn reserve(&self) -> Result<SubmissionSlot, WorkerError> {
        let sender = self
            .sender
            .lock()
            .map_err(|_| WorkerError::ChannelClosed)?
            .clone()
            .ok_or(WorkerError::ChannelClosed)?;

        match sender.try_reserve_owned() {
            Ok(permit) => Ok(SubmissionSlot { permit }),
            Err(TrySendError::Full(_)) => Err(WorkerError::QueueFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Closed(_)) => Err(WorkerError::ChannelClosed),
        }
    }

    /// Stops accepting work, lets workers finish queued and running jobs,
    /// and waits for them to exit.
    pub async fn shutdown(&self) {
        info!("Shutting down video workers...");
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }

        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => Vec::new(),
        };

        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!("Worker {} terminated abnormally: {}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All video workers have stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<Receiver<JobTicket>>>,
    runner: Arc<JobRunner>,
) {
    debug!(worker = worker_id, "Worker started");

    loop {
        let ticket = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        let Some(ticket) = ticket else {
            debug!(worker = worker_id, "Queue closed");
            break;
        };

        let job_id = ticket.job_id.clone();
        debug!(worker = worker_id, job_id = %job_id, "Picked up job");

        // The runner already converts pipeline panics; this keeps a bug in
        // reconciliation from taking the worker down with it.
        if let Err(panic) = AssertUnwindSafe(runner.run(ticket)).catch_unwind().await {
            error!(
                worker = worker_id,
                job_id = %job_id,
                panic = %panic_message(panic.as_ref()),
                "Job runner panicked"
            );
        }
    }

    debug!(worker = worker_id, "Worker stopped");
}

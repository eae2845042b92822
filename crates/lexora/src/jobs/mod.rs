pub mod catalog;
pub mod job;
pub mod lease;
pub mod pool;
pub mod runner;
pub mod service;
pub mod store;

pub use catalog::VideoCatalog;
pub use job::{JobTicket, VideoJob, VideoStatus};
pub use lease::{InstanceLease, LeaseTimings, INTERRUPTED_REASON};
pub use pool::{SubmissionSlot, WorkerPool};
pub use runner::{JobRunner, RunOutcome};
pub use service::{AvatarUpload, PoolSettings, SubmitReceipt, SubmitRequest, VideoService};
pub use store::{NewVideoJob, VideoJobStore};

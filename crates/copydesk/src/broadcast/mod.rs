//! Real-time job observation: progress events and the snapshot store.

pub mod job_progress;
pub mod job_store;

pub use job_progress::{JobProgressBroadcaster, JobProgressEvent};
pub use job_store::{JobCounts, JobListResponse, JobQueryParams, JobStore};

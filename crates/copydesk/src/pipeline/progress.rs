use std::sync::Arc;

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent, JobStore};
use crate::job::{JobRecord, JobStatus};

/// Events emitted by the orchestrator after each record mutation.
/// Article bodies are omitted from broadcast events (can be large);
/// observers read them from the stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Status changed, or the current stage logged a line.
    Stage { message: String },
    Translation { language: String, message: String },
    Indexing { collaborator: String, message: String },
    /// The record reached a terminal status.
    Finished,
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, record: &JobRecord, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _record: &JobRecord, _event: ProgressEvent) {}
}

/// Stores every snapshot in the [`JobStore`] and streams a
/// [`JobProgressEvent`] to subscribers.
pub struct BroadcastProgress {
    store: Arc<JobStore>,
    broadcaster: JobProgressBroadcaster,
}

impl BroadcastProgress {
    pub fn new(store: Arc<JobStore>, broadcaster: JobProgressBroadcaster) -> Self {
        Self { store, broadcaster }
    }
}

fn finished_message(record: &JobRecord) -> String {
    match (record.status(), record.error()) {
        (JobStatus::Failed, Some(error)) => format!("Run failed: {}", error.message),
        (JobStatus::Failed, None) => "Run failed".to_string(),
        _ => format!(
            "Run completed: {} translation(s) errored, {} indexing submission(s) failed",
            record.errored_translations(),
            record.failed_submissions()
        ),
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, record: &JobRecord, event: ProgressEvent) {
        self.store.upsert(record);
        let event = match event {
            ProgressEvent::Stage { message } => JobProgressEvent::from_record(record, &message),
            ProgressEvent::Translation { language, message } => {
                JobProgressEvent::from_record(record, &message).with_language(&language)
            }
            ProgressEvent::Indexing {
                collaborator,
                message,
            } => JobProgressEvent::from_record(record, &message).with_collaborator(&collaborator),
            ProgressEvent::Finished => {
                JobProgressEvent::from_record(record, &finished_message(record))
            }
        };
        self.broadcaster.send(event);
    }
}

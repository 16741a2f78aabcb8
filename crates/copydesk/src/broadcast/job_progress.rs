//! Job progress broadcaster for real-time job status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{JobRecord, JobStatus};

/// Default channel capacity when none is configured.
pub const DEFAULT_CAPACITY: usize = 256;

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    /// Unique job identifier.
    pub job_id: String,
    /// Job status at the time of the event.
    pub status: JobStatus,
    /// Overall progress, 0–100.
    pub progress: u8,
    /// Human-readable message describing current activity.
    pub message: String,
    /// Timestamp of this event.
    pub timestamp: DateTime<Utc>,
    /// Target language, for translation task events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Indexing collaborator, for submission events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaborator: Option<String>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    /// Creates an event describing the current state of `record`.
    pub fn from_record(record: &JobRecord, message: &str) -> Self {
        Self {
            job_id: record.id().to_string(),
            status: record.status(),
            progress: record.progress(),
            message: message.to_string(),
            timestamp: Utc::now(),
            language: None,
            collaborator: None,
            error: record.error().map(|e| e.message.clone()),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn with_collaborator(mut self, collaborator: &str) -> Self {
        self.collaborator = Some(collaborator.to_string());
        self
    }

    /// Returns true if this is the last event of its job.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Broadcasts job progress events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    /// Creates a new job progress broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{SourceContent, SourceType};

    fn record() -> JobRecord {
        JobRecord::new(SourceType::Text, SourceContent::from_text("hello"))
    }

    #[test]
    fn test_broadcaster_send_receive() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let record = record();

        broadcaster.send(JobProgressEvent::from_record(&record, "queued"));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.job_id, record.id());
        assert_eq!(received.status, JobStatus::Input);
        assert_eq!(received.progress, 0);
        assert_eq!(received.message, "queued");
        assert!(!received.is_terminal());
    }

    #[test]
    fn test_send_without_subscribers() {
        let broadcaster = JobProgressBroadcaster::default();
        assert_eq!(broadcaster.receiver_count(), 0);
        broadcaster.send(JobProgressEvent::from_record(&record(), "nobody listens"));
    }

    #[test]
    fn test_event_serialization() {
        let event = JobProgressEvent::from_record(&record(), "translation started").with_language("fr");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "input");
        assert_eq!(json["language"], "fr");
        assert!(json.get("collaborator").is_none());
        assert!(json.get("error").is_none());
        assert!(json.get("jobId").is_some());
    }
}

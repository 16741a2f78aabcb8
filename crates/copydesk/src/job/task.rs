//! Per-language translation tasks and per-collaborator indexing submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::article::TranslatedContent;

/// Status of a single translation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Errored,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Errored)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Errored => write!(f, "errored"),
        }
    }
}

/// One target language's translation of the job's article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationTask {
    pub language_code: String,
    pub status: TaskStatus,
    /// Present only when `status` is `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<TranslatedContent>,
    /// Present only when `status` is `Errored`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TranslationTask {
    pub fn new(language_code: impl Into<String>) -> Self {
        Self {
            language_code: language_code.into(),
            status: TaskStatus::Pending,
            content: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn start(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    pub(crate) fn complete(&mut self, content: TranslatedContent) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.content = Some(content);
        self.finished_at = Some(Utc::now());
        true
    }

    /// Marks the task as errored. Accepted from any non-terminal status so
    /// that tasks abandoned before they started can be closed as well.
    pub(crate) fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Errored;
        self.error = Some(reason.into());
        self.finished_at = Some(Utc::now());
        true
    }
}

/// Outcome of submitting the canonical URL to one indexing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Submitted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingSubmission {
    pub collaborator: String,
    pub status: SubmissionStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl IndexingSubmission {
    pub fn new(collaborator: impl Into<String>) -> Self {
        Self {
            collaborator: collaborator.into(),
            status: SubmissionStatus::Pending,
            attempts: 0,
            error: None,
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != SubmissionStatus::Pending
    }
}

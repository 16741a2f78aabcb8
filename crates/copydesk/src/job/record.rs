//! The Job Record: durable state for one pipeline run.
//!
//! All mutators are crate-private. The orchestrator is the only writer; every
//! other party observes cloned snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::article::{Article, SeoMetadata, TranslatedContent};
use super::source::{SourceContent, SourceType};
use super::task::{IndexingSubmission, SubmissionStatus, TaskStatus, TranslationTask};

/// Authoritative state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Input,
    Generating,
    Optimizing,
    Translating,
    Indexing,
    Completed,
    Failed,
}

/// Inclusive slice of the 0–100 progress scale owned by one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressRange {
    pub start: u8,
    pub end: u8,
}

impl ProgressRange {
    /// Maps `done / total` into this range. An empty unit of work counts as
    /// finished.
    pub fn at(&self, done: usize, total: usize) -> u8 {
        if total == 0 || done >= total {
            return self.end;
        }
        let span = usize::from(self.end - self.start);
        self.start + (span * done / total) as u8
    }
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Forward edges of the state machine, plus the fatal edges out of the
    /// generation and optimization stages.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Input, Generating)
                | (Generating, Optimizing)
                | (Optimizing, Translating)
                | (Translating, Indexing)
                | (Indexing, Completed)
                | (Generating, Failed)
                | (Optimizing, Failed)
        )
    }

    pub fn progress_range(self) -> ProgressRange {
        let (start, end) = match self {
            JobStatus::Input => (0, 5),
            JobStatus::Generating => (5, 40),
            JobStatus::Optimizing => (40, 50),
            JobStatus::Translating => (50, 90),
            JobStatus::Indexing => (90, 100),
            JobStatus::Completed => (100, 100),
            JobStatus::Failed => (0, 0),
        };
        ProgressRange { start, end }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Input => write!(f, "input"),
            JobStatus::Generating => write!(f, "generating"),
            JobStatus::Optimizing => write!(f, "optimizing"),
            JobStatus::Translating => write!(f, "translating"),
            JobStatus::Indexing => write!(f, "indexing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One timestamped line of the job's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.timestamp.to_rfc3339(), self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    InvalidInput,
    Generation,
    Cancelled,
    /// The orchestrator hit a lifecycle violation on the record itself.
    Internal,
}

/// Structured failure attached to a `Failed` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
    /// Status the run was in when it failed.
    pub stage: JobStatus,
    pub occurred_at: DateTime<Utc>,
}

impl JobError {
    pub fn new(kind: JobErrorKind, stage: JobStatus, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stage,
            occurred_at: Utc::now(),
        }
    }
}

/// Violations of the record's lifecycle rules. These indicate a bug in the
/// orchestrator rather than a collaborator failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Job is already {0} and can no longer change")]
    Terminal(JobStatus),

    #[error("Illegal status transition from {from} to {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    #[error("Operation requires status {expected}, job is {actual}")]
    WrongStatus {
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("Article is not available")]
    MissingArticle,

    #[error("Unknown translation language '{0}'")]
    UnknownLanguage(String),

    #[error("Translation task '{language}' cannot move from {from}")]
    TaskState { language: String, from: TaskStatus },

    #[error("{0} translation task(s) have not finished")]
    TranslationsOpen(usize),

    #[error("Unknown indexing collaborator '{0}'")]
    UnknownCollaborator(String),

    #[error("{0} indexing submission(s) have not finished")]
    SubmissionsOpen(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    id: String,
    status: JobStatus,
    progress: u8,
    source_type: SourceType,
    source_content: SourceContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    article: Option<Article>,
    translations: BTreeMap<String, TranslationTask>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    indexing: Vec<IndexingSubmission>,
    log: Vec<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JobError>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(source_type: SourceType, source_content: SourceContent) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Input,
            progress: 0,
            source_type,
            source_content,
            article: None,
            translations: BTreeMap::new(),
            indexing: Vec::new(),
            log: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn source_content(&self) -> &SourceContent {
        &self.source_content
    }

    pub fn article(&self) -> Option<&Article> {
        self.article.as_ref()
    }

    pub fn translations(&self) -> &BTreeMap<String, TranslationTask> {
        &self.translations
    }

    pub fn translation(&self, language: &str) -> Option<&TranslationTask> {
        self.translations.get(language)
    }

    pub fn indexing(&self) -> &[IndexingSubmission] {
        &self.indexing
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Number of translation tasks in a terminal status, and the total.
    pub fn translation_counts(&self) -> (usize, usize) {
        let done = self
            .translations
            .values()
            .filter(|t| t.is_terminal())
            .count();
        (done, self.translations.len())
    }

    pub fn errored_translations(&self) -> usize {
        self.translations
            .values()
            .filter(|t| t.status == TaskStatus::Errored)
            .count()
    }

    pub fn failed_submissions(&self) -> usize {
        self.indexing
            .iter()
            .filter(|s| s.status == SubmissionStatus::Failed)
            .count()
    }

    // ─── Mutators (orchestrator only) ───────────────────────────────────────

    fn ensure_live(&self) -> Result<(), RecordError> {
        if self.status.is_terminal() {
            return Err(RecordError::Terminal(self.status));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: JobStatus) -> Result<(), RecordError> {
        if self.status != expected {
            return Err(RecordError::WrongStatus {
                expected,
                actual: self.status,
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Appends an audit line. Terminal records are immutable, so the line is
    /// dropped once the run has finished.
    pub(crate) fn append_log(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            log::warn!("Dropping log line for finished job {}", self.id);
            return;
        }
        self.log.push(LogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
        self.touch();
    }

    /// Raises progress to `value` (capped at 100). Lower values are ignored.
    pub(crate) fn advance_progress(&mut self, value: u8) {
        let value = value.min(100);
        if value > self.progress && !self.status.is_terminal() {
            self.progress = value;
            self.touch();
        }
    }

    pub(crate) fn transition(&mut self, next: JobStatus) -> Result<(), RecordError> {
        self.ensure_live()?;
        if !self.status.can_transition_to(next) || next == JobStatus::Failed {
            return Err(RecordError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        match self.status {
            JobStatus::Translating => {
                let (done, total) = self.translation_counts();
                if done < total {
                    return Err(RecordError::TranslationsOpen(total - done));
                }
            }
            JobStatus::Indexing => {
                let open = self.indexing.iter().filter(|s| !s.is_finished()).count();
                if open > 0 {
                    return Err(RecordError::SubmissionsOpen(open));
                }
            }
            _ => {}
        }

        let from = self.status;
        self.append_log(format!("status {} -> {}", from, next));
        let floor = next.progress_range().start;
        self.advance_progress(floor);
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.touch();
        Ok(())
    }

    /// Moves the record to `Failed`. Collaborator failures are only accepted
    /// from the generation and optimization stages. Cancellation and internal
    /// errors are accepted from any live status, and close any still-open
    /// translation task.
    pub(crate) fn fail(&mut self, error: JobError) -> Result<(), RecordError> {
        self.ensure_live()?;
        let abandon_reason = match error.kind {
            JobErrorKind::Cancelled => Some("run cancelled"),
            JobErrorKind::Internal => Some("run aborted"),
            JobErrorKind::InvalidInput | JobErrorKind::Generation => {
                if !self.status.can_transition_to(JobStatus::Failed) {
                    return Err(RecordError::IllegalTransition {
                        from: self.status,
                        to: JobStatus::Failed,
                    });
                }
                None
            }
        };
        if let Some(reason) = abandon_reason {
            self.abandon_translations(reason);
        }

        let from = self.status;
        self.append_log(format!("status {} -> failed: {}", from, error.message));
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Sets the validated draft and advances `Generating -> Optimizing`.
    pub(crate) fn complete_generation(&mut self, article: Article) -> Result<(), RecordError> {
        self.ensure_status(JobStatus::Generating)?;
        self.append_log(format!("generated article \"{}\"", article.title));
        self.article = Some(Article { seo: None, ..article });
        self.transition(JobStatus::Optimizing)
    }

    /// Attaches SEO metadata and advances `Optimizing -> Translating`. The
    /// rest of the article is left untouched.
    pub(crate) fn complete_optimization(&mut self, seo: SeoMetadata) -> Result<(), RecordError> {
        self.ensure_status(JobStatus::Optimizing)?;
        let article = self.article.as_mut().ok_or(RecordError::MissingArticle)?;
        let line = format!(
            "optimized: seo title \"{}\", {} keywords, canonical {}",
            seo.seo_title,
            seo.seo_keywords.len(),
            seo.canonical_url
        );
        article.seo = Some(seo);
        self.append_log(line);
        self.transition(JobStatus::Translating)
    }

    /// Creates one `Pending` task per language.
    pub(crate) fn open_translations(&mut self, languages: &[String]) -> Result<(), RecordError> {
        self.ensure_status(JobStatus::Translating)?;
        for language in languages {
            self.translations
                .entry(language.clone())
                .or_insert_with(|| TranslationTask::new(language.clone()));
        }
        self.append_log(format!(
            "translation fan-out: {} language(s)",
            self.translations.len()
        ));
        Ok(())
    }

    fn task_mut(&mut self, language: &str) -> Result<&mut TranslationTask, RecordError> {
        self.translations
            .get_mut(language)
            .ok_or_else(|| RecordError::UnknownLanguage(language.to_string()))
    }

    pub(crate) fn start_translation(&mut self, language: &str) -> Result<(), RecordError> {
        self.ensure_status(JobStatus::Translating)?;
        let task = self.task_mut(language)?;
        if !task.start() {
            return Err(RecordError::TaskState {
                language: language.to_string(),
                from: task.status,
            });
        }
        self.touch();
        Ok(())
    }

    pub(crate) fn finish_translation(
        &mut self,
        language: &str,
        outcome: Result<TranslatedContent, String>,
    ) -> Result<(), RecordError> {
        self.ensure_status(JobStatus::Translating)?;
        let task = self.task_mut(language)?;
        let from = task.status;
        let (accepted, line) = match outcome {
            Ok(content) => (task.complete(content), format!("translation {} completed", language)),
            Err(reason) => {
                let line = format!("translation {} errored: {}", language, reason);
                // Only running tasks report a result.
                let accepted = from == TaskStatus::Running && task.fail(reason);
                (accepted, line)
            }
        };
        if !accepted {
            return Err(RecordError::TaskState {
                language: language.to_string(),
                from,
            });
        }
        self.append_log(line);
        Ok(())
    }

    /// Closes every non-terminal task as errored. Returns how many were
    /// closed.
    pub(crate) fn abandon_translations(&mut self, reason: &str) -> usize {
        let mut closed = Vec::new();
        for (language, task) in self.translations.iter_mut() {
            if task.fail(format!("abandoned: {}", reason)) {
                closed.push(language.clone());
            }
        }
        if !closed.is_empty() {
            self.append_log(format!(
                "abandoned {} translation task(s): {}",
                closed.len(),
                closed.join(", ")
            ));
        }
        closed.len()
    }

    pub(crate) fn open_indexing(&mut self, collaborators: &[String]) -> Result<(), RecordError> {
        self.ensure_status(JobStatus::Indexing)?;
        self.indexing = collaborators
            .iter()
            .map(|name| IndexingSubmission::new(name.clone()))
            .collect();
        self.touch();
        Ok(())
    }

    pub(crate) fn record_submission(
        &mut self,
        collaborator: &str,
        attempts: u32,
        outcome: Result<(), String>,
    ) -> Result<(), RecordError> {
        self.ensure_status(JobStatus::Indexing)?;
        let submission = self
            .indexing
            .iter_mut()
            .find(|s| s.collaborator == collaborator && !s.is_finished())
            .ok_or_else(|| RecordError::UnknownCollaborator(collaborator.to_string()))?;
        submission.attempts = attempts;
        submission.finished_at = Some(Utc::now());
        let line = match outcome {
            Ok(()) => {
                submission.status = SubmissionStatus::Submitted;
                format!("indexing {} submitted", collaborator)
            }
            Err(reason) => {
                submission.status = SubmissionStatus::Failed;
                let line = format!("indexing {} failed: {}", collaborator, reason);
                submission.error = Some(reason);
                line
            }
        };
        self.append_log(line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        Article {
            title: "Rust in production".to_string(),
            body: "Body text".to_string(),
            excerpt: "Body text".to_string(),
            category: "engineering".to_string(),
            tags: vec!["rust".to_string()],
            image_ref: None,
            seo: None,
        }
    }

    fn seo() -> SeoMetadata {
        SeoMetadata {
            seo_title: "Rust in production".to_string(),
            seo_description: "Body text".to_string(),
            seo_keywords: vec!["rust".to_string()],
            slug: "rust-in-production".to_string(),
            canonical_url: "https://example.com/articles/rust-in-production".to_string(),
            structured_data: serde_json::json!({}),
        }
    }

    fn record_in_translating(languages: &[&str]) -> JobRecord {
        let mut record = JobRecord::new(SourceType::Text, SourceContent::from_text("hello"));
        record.transition(JobStatus::Generating).unwrap();
        record.complete_generation(article()).unwrap();
        record.complete_optimization(seo()).unwrap();
        let languages: Vec<String> = languages.iter().map(|l| l.to_string()).collect();
        record.open_translations(&languages).unwrap();
        record
    }

    #[test]
    fn test_new_record_defaults() {
        let record = JobRecord::new(SourceType::Url, SourceContent::from_url("https://a.b"));
        assert_eq!(record.status(), JobStatus::Input);
        assert_eq!(record.progress(), 0);
        assert!(record.article().is_none());
        assert!(record.log().is_empty());
        assert!(!record.id().is_empty());
    }

    #[test]
    fn test_allowed_edges() {
        use JobStatus::*;
        let all = [
            Input,
            Generating,
            Optimizing,
            Translating,
            Indexing,
            Completed,
            Failed,
        ];
        let mut edges = Vec::new();
        for from in all {
            for to in all {
                if from.can_transition_to(to) {
                    edges.push((from, to));
                }
            }
        }
        assert_eq!(
            edges,
            vec![
                (Input, Generating),
                (Generating, Optimizing),
                (Generating, Failed),
                (Optimizing, Translating),
                (Optimizing, Failed),
                (Translating, Indexing),
                (Indexing, Completed),
            ]
        );
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut record = JobRecord::new(SourceType::Text, SourceContent::from_text("x"));
        let err = record.transition(JobStatus::Translating).unwrap_err();
        assert_eq!(
            err,
            RecordError::IllegalTransition {
                from: JobStatus::Input,
                to: JobStatus::Translating
            }
        );
        assert_eq!(record.status(), JobStatus::Input);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut record = JobRecord::new(SourceType::Text, SourceContent::from_text("x"));
        record.transition(JobStatus::Generating).unwrap();
        assert_eq!(record.progress(), 5);
        record.advance_progress(30);
        record.advance_progress(10);
        assert_eq!(record.progress(), 30);
        record.advance_progress(250);
        assert_eq!(record.progress(), 100);
    }

    #[test]
    fn test_progress_range_mapping() {
        let range = JobStatus::Translating.progress_range();
        assert_eq!(range.at(0, 10), 50);
        assert_eq!(range.at(5, 10), 70);
        assert_eq!(range.at(10, 10), 90);
        assert_eq!(range.at(0, 0), 90);
    }

    #[test]
    fn test_generation_failure_from_generating() {
        let mut record = JobRecord::new(SourceType::Text, SourceContent::from_text("x"));
        record.transition(JobStatus::Generating).unwrap();
        record
            .fail(JobError::new(
                JobErrorKind::Generation,
                JobStatus::Generating,
                "timed out",
            ))
            .unwrap();
        assert_eq!(record.status(), JobStatus::Failed);
        assert_eq!(record.error().unwrap().kind, JobErrorKind::Generation);
        assert!(record.finished_at().is_some());
    }

    #[test]
    fn test_generation_failure_not_accepted_while_translating() {
        let mut record = record_in_translating(&["fr"]);
        let err = record
            .fail(JobError::new(
                JobErrorKind::Generation,
                JobStatus::Translating,
                "nope",
            ))
            .unwrap_err();
        assert!(matches!(err, RecordError::IllegalTransition { .. }));
        assert_eq!(record.status(), JobStatus::Translating);
    }

    #[test]
    fn test_cancellation_closes_open_tasks() {
        let mut record = record_in_translating(&["fr", "de"]);
        record.start_translation("fr").unwrap();
        record
            .fail(JobError::new(
                JobErrorKind::Cancelled,
                JobStatus::Translating,
                "cancelled by caller",
            ))
            .unwrap();
        assert_eq!(record.status(), JobStatus::Failed);
        assert!(record.translations().values().all(|t| t.is_terminal()));
        assert_eq!(record.errored_translations(), 2);
    }

    #[test]
    fn test_internal_error_fails_from_translating() {
        let mut record = record_in_translating(&["fr", "de"]);
        record.start_translation("fr").unwrap();
        record
            .fail(JobError::new(
                JobErrorKind::Internal,
                JobStatus::Translating,
                "Translation task 'fr' cannot move from running",
            ))
            .unwrap();
        assert_eq!(record.status(), JobStatus::Failed);
        assert!(record.finished_at().is_some());
        assert_eq!(
            record.translation("de").unwrap().error.as_deref(),
            Some("abandoned: run aborted")
        );
    }

    #[test]
    fn test_cannot_leave_translating_with_open_tasks() {
        let mut record = record_in_translating(&["fr", "de"]);
        record.start_translation("fr").unwrap();
        record
            .finish_translation(
                "fr",
                Ok(TranslatedContent {
                    title: "t".into(),
                    excerpt: "e".into(),
                    body: "b".into(),
                }),
            )
            .unwrap();
        assert_eq!(
            record.transition(JobStatus::Indexing),
            Err(RecordError::TranslationsOpen(1))
        );
        record.start_translation("de").unwrap();
        record
            .finish_translation("de", Err("timeout".to_string()))
            .unwrap();
        record.transition(JobStatus::Indexing).unwrap();
        assert_eq!(record.errored_translations(), 1);
    }

    #[test]
    fn test_seo_does_not_touch_body() {
        let record = record_in_translating(&[]);
        let article = record.article().unwrap();
        assert_eq!(article.body, "Body text");
        assert_eq!(article.seo_title(), Some("Rust in production"));
    }

    #[test]
    fn test_terminal_record_is_frozen() {
        let mut record = JobRecord::new(SourceType::Text, SourceContent::from_text("x"));
        record.transition(JobStatus::Generating).unwrap();
        record
            .fail(JobError::new(
                JobErrorKind::Cancelled,
                JobStatus::Generating,
                "cancelled",
            ))
            .unwrap();
        let snapshot = record.clone();

        record.append_log("late line");
        record.advance_progress(99);
        assert!(record.transition(JobStatus::Optimizing).is_err());
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_indexing_submissions() {
        let mut record = record_in_translating(&[]);
        record.transition(JobStatus::Indexing).unwrap();
        record
            .open_indexing(&["indexnow".to_string(), "bing".to_string()])
            .unwrap();
        assert_eq!(
            record.transition(JobStatus::Completed),
            Err(RecordError::SubmissionsOpen(2))
        );
        record.record_submission("indexnow", 1, Ok(())).unwrap();
        record
            .record_submission("bing", 2, Err("503".to_string()))
            .unwrap();
        record.transition(JobStatus::Completed).unwrap();
        assert_eq!(record.progress(), 100);
        assert_eq!(record.failed_submissions(), 1);
        assert_eq!(record.indexing()[1].attempts, 2);
    }
}

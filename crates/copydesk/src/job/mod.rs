//! Job Record data model.

pub mod article;
pub mod record;
pub mod source;
pub mod task;

pub use article::{Article, ArticleDraft, SeoMetadata, TranslatedContent};
pub use record::{
    JobError, JobErrorKind, JobRecord, JobStatus, LogEntry, ProgressRange, RecordError,
};
pub use source::{FileDescriptor, SourceContent, SourceType};
pub use task::{IndexingSubmission, SubmissionStatus, TaskStatus, TranslationTask};

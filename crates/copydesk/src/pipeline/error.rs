use std::time::Duration;

use thiserror::Error;

use crate::job::{JobErrorKind, JobStatus, RecordError, SourceType};
use crate::services::ServiceError;

/// No usable content was supplied for the declared source type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInputError {
    #[error("No content supplied for {0} input")]
    Empty(SourceType),

    #[error("Invalid source URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Attached file #{index} has no identifier")]
    InvalidFile { index: usize },
}

/// The generation collaborator failed or returned an unusable draft.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation service failed: {0}")]
    Service(#[from] ServiceError),

    #[error("Generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Generated draft has no title")]
    MissingTitle,

    #[error("Generated draft has no body")]
    MissingBody,

    #[error("Generated draft is malformed: {0}")]
    MalformedDraft(String),
}

/// One language's translation failed. Never fatal to the run.
#[derive(Error, Debug)]
pub enum TranslationTaskError {
    #[error("translation service failed: {0}")]
    Service(#[from] ServiceError),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("translation returned an empty {0}")]
    EmptyResult(&'static str),
}

/// One indexing collaborator's submission failed. Never fatal to the run.
#[derive(Error, Debug)]
pub enum IndexingSubmissionError {
    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// The caller cancelled the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Run cancelled by caller during {stage}")]
pub struct CancellationError {
    pub stage: JobStatus,
}

/// Fatal outcomes of a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    #[error("{0}")]
    Generation(#[from] GenerationError),

    #[error("{0}")]
    Cancelled(#[from] CancellationError),

    #[error("Job record rejected an update: {0}")]
    Record(#[from] RecordError),
}

impl PipelineError {
    /// The error kind recorded on the job.
    pub fn job_error_kind(&self) -> JobErrorKind {
        match self {
            PipelineError::InvalidInput(_) => JobErrorKind::InvalidInput,
            PipelineError::Generation(_) => JobErrorKind::Generation,
            PipelineError::Cancelled(_) => JobErrorKind::Cancelled,
            PipelineError::Record(_) => JobErrorKind::Internal,
        }
    }
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CopydeskError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Service error: {0}")]
    Service(#[from] crate::services::ServiceError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

impl From<crate::pipeline::InvalidInputError> for CopydeskError {
    fn from(err: crate::pipeline::InvalidInputError) -> Self {
        CopydeskError::Pipeline(err.into())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid URL in '{field}': {reason}")]
    InvalidUrl { field: String, reason: String },

    #[error("Invalid language code '{code}': {reason}")]
    InvalidLanguage { code: String, reason: String },

    #[error("Invalid indexing endpoint '{name}': {reason}")]
    InvalidEndpoint { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Unknown job '{0}'")]
    UnknownJob(String),

    #[error("Job '{0}' is still running")]
    JobRunning(String),

    #[error("Run for job '{0}' ended without a terminal snapshot")]
    RunLost(String),
}

pub type Result<T> = std::result::Result<T, CopydeskError>;

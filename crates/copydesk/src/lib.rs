pub mod broadcast;
pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod services;
pub mod worker;

pub use broadcast::{JobProgressBroadcaster, JobProgressEvent, JobQueryParams, JobStore};
pub use config::{load_config, load_config_from_str, Config};
pub use error::{ConfigError, CopydeskError, Result, WorkerError};
pub use job::{
    Article, JobError, JobErrorKind, JobRecord, JobStatus, SourceContent, SourceType,
    TaskStatus, TranslationTask,
};
pub use pipeline::{
    BroadcastProgress, NoopProgress, Pipeline, PipelineConfig, PipelineError, ProgressEvent,
    ProgressReporter,
};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use services::{Collaborators, Generator, Indexer, Translator};
pub use worker::PipelineService;

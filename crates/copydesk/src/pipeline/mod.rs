//! The content pipeline: input normalization, generation, SEO optimization,
//! translation fan-out and indexing, driven by [`Pipeline`].

pub mod config;
pub mod error;
pub mod generation;
pub mod indexing;
pub mod normalize;
pub mod progress;
pub mod runner;
pub mod seo;
pub mod translation;

pub use config::{PipelineConfig, RetryPolicy, SiteSettings};
pub use error::{
    CancellationError, GenerationError, IndexingSubmissionError, InvalidInputError,
    PipelineError, TranslationTaskError,
};
pub use generation::{validate_draft, GenerationStage};
pub use indexing::{IndexingStage, SubmissionOutcome};
pub use normalize::{normalize, GenerationRequest};
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::Pipeline;
pub use seo::{optimize, slugify};
pub use translation::{TranslationRun, TranslationStage, TranslationUpdate};

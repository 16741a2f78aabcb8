//! Contracts for the external collaborators the pipeline calls, and the
//! HTTP clients that implement them.
//!
//! The pipeline applies timeouts and retry policy around these calls; the
//! implementations only perform a single request.

pub mod error;
pub mod http;
pub mod indexers;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::job::{ArticleDraft, TranslatedContent};
use crate::pipeline::GenerationRequest;

pub use error::ServiceError;
pub use http::{HttpGenerator, HttpTranslator};
pub use indexers::{build_indexers, IndexNowIndexer, PingIndexer};

/// Turns a normalized input into an article draft.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<ArticleDraft, ServiceError>;
}

/// Input for one language's translation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub source_language: String,
    pub target_language: String,
}

/// Renders content into a target language. Must be safe to call
/// concurrently for different languages.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslatedContent, ServiceError>;
}

/// Acknowledgement from an indexing collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingAck {
    pub status: u16,
}

/// Registers a published URL with one external search system.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Stable name used in the job log and submission list.
    fn name(&self) -> &str;

    async fn submit(&self, url: &str) -> Result<IndexingAck, ServiceError>;
}

/// The set of collaborators one pipeline instance talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub translator: Arc<dyn Translator>,
    pub indexers: Vec<Arc<dyn Indexer>>,
}

impl Collaborators {
    /// Builds the HTTP implementations described by the config. Secrets are
    /// resolved here, so a missing key fails at startup rather than per job.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let generator = HttpGenerator::from_config(&config.generation)?;
        let translator = HttpTranslator::from_config(&config.translation)?;
        let indexers = build_indexers(&config.indexing)?;

        Ok(Self {
            generator: Arc::new(generator),
            translator: Arc::new(translator),
            indexers,
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.indexers.iter().map(|i| i.name()).collect();
        f.debug_struct("Collaborators")
            .field("indexers", &names)
            .finish_non_exhaustive()
    }
}

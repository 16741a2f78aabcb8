//! Shared fixtures for pipeline integration tests.
//!
//! Provides scripted collaborators (generator, translator, indexers) and a
//! progress reporter that records every snapshot the orchestrator emits.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use copydesk::job::{ArticleDraft, JobRecord, JobStatus, TranslatedContent};
use copydesk::pipeline::{
    GenerationRequest, Pipeline, PipelineConfig, ProgressEvent, ProgressReporter,
};
use copydesk::services::{
    Collaborators, Generator, IndexingAck, Indexer, ServiceError, TranslationRequest, Translator,
};

pub const SITE: &str = "https://blog.example.com";

pub const SOURCE_TEXT: &str = "Rust async runtimes schedule futures cooperatively. \
     Tokio runtimes spread tasks across worker threads.\n\n\
     Cancellation tokens let callers stop runtimes cleanly.";

/// What the scripted generator does when called.
#[derive(Debug, Clone)]
pub enum GeneratorScript {
    Draft(ArticleDraft),
    Reject(String),
    /// Never answers; the stage timeout must fire.
    Stall,
}

pub struct ScriptedGenerator {
    script: GeneratorScript,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(script: GeneratorScript) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<ArticleDraft, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            GeneratorScript::Draft(draft) => Ok(draft.clone()),
            GeneratorScript::Reject(reason) => Err(ServiceError::Rejected(reason.clone())),
            GeneratorScript::Stall => std::future::pending().await,
        }
    }
}

pub fn sample_draft() -> ArticleDraft {
    ArticleDraft {
        title: "Understanding Async Runtimes in Rust".to_string(),
        body: "Async runtimes schedule futures cooperatively. Runtimes like tokio spread \
               work across threads.\n\nCancellation lets callers stop runtimes cleanly."
            .to_string(),
        excerpt: Some("How async runtimes schedule work.".to_string()),
        category: Some("Engineering".to_string()),
        tags: vec!["rust".to_string(), "async".to_string()],
        image_ref: None,
    }
}

/// Translator that fails or stalls for chosen languages and succeeds for
/// the rest.
#[derive(Default)]
pub struct ScriptedTranslator {
    failing: HashSet<String>,
    stalling: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, languages: &[&str]) -> Self {
        self.failing = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn stalling(mut self, languages: &[&str]) -> Self {
        self.stalling = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslatedContent, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let language = request.target_language.as_str();
        if self.stalling.contains(language) {
            return std::future::pending().await;
        }
        if self.failing.contains(language) {
            return Err(ServiceError::Rejected(format!(
                "no model for {}",
                language
            )));
        }
        Ok(TranslatedContent {
            title: format!("[{}] {}", language, request.title),
            excerpt: format!("[{}] {}", language, request.excerpt),
            body: format!("[{}] {}", language, request.body),
        })
    }
}

pub struct ScriptedIndexer {
    name: String,
    fail: bool,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl ScriptedIndexer {
    pub fn ok(name: &str) -> Self {
        Self::with_outcome(name, false)
    }

    pub fn failing(name: &str) -> Self {
        Self::with_outcome(name, true)
    }

    fn with_outcome(name: &str, fail: bool) -> Self {
        Self {
            name: name.to_string(),
            fail,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Indexer for ScriptedIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, url: &str) -> Result<IndexingAck, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(ServiceError::Status {
                service: self.name.clone(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(IndexingAck { status: 200 })
    }
}

/// One observed report: the snapshot's status and progress, plus the event.
#[derive(Debug, Clone)]
pub struct Observation {
    pub status: JobStatus,
    pub progress: u8,
    pub event: ProgressEvent,
}

/// Records every report for later assertions.
#[derive(Default)]
pub struct RecordingProgress {
    observations: Mutex<Vec<Observation>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().unwrap().clone()
    }

    /// Distinct statuses in the order they were first observed.
    pub fn statuses(&self) -> Vec<JobStatus> {
        let mut seen: Vec<JobStatus> = Vec::new();
        for observation in self.observations() {
            if seen.last() != Some(&observation.status) {
                seen.push(observation.status);
            }
        }
        seen
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.observations().iter().map(|o| o.progress).collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, record: &JobRecord, event: ProgressEvent) {
        self.observations.lock().unwrap().push(Observation {
            status: record.status(),
            progress: record.progress(),
            event,
        });
    }
}

/// Collaborator handles kept by the test so call counts can be inspected.
pub struct Fixture {
    pub generator: Arc<ScriptedGenerator>,
    pub translator: Arc<ScriptedTranslator>,
    pub indexers: Vec<Arc<ScriptedIndexer>>,
}

impl Fixture {
    pub fn new(generator: ScriptedGenerator, translator: ScriptedTranslator) -> Self {
        Self {
            generator: Arc::new(generator),
            translator: Arc::new(translator),
            indexers: Vec::new(),
        }
    }

    /// Successful generation and translation, three healthy indexers.
    pub fn healthy() -> Self {
        Self::new(
            ScriptedGenerator::new(GeneratorScript::Draft(sample_draft())),
            ScriptedTranslator::new(),
        )
        .with_indexer(ScriptedIndexer::ok("google"))
        .with_indexer(ScriptedIndexer::ok("bing"))
        .with_indexer(ScriptedIndexer::ok("indexnow"))
    }

    pub fn with_indexer(mut self, indexer: ScriptedIndexer) -> Self {
        self.indexers.push(Arc::new(indexer));
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        let generator: Arc<dyn Generator> = self.generator.clone();
        let translator: Arc<dyn Translator> = self.translator.clone();
        let indexers = self
            .indexers
            .iter()
            .map(|i| {
                let indexer: Arc<dyn Indexer> = i.clone();
                indexer
            })
            .collect();
        Collaborators {
            generator,
            translator,
            indexers,
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline_with(PipelineConfig::for_site(SITE))
    }

    pub fn pipeline_with(&self, config: PipelineConfig) -> Pipeline {
        Pipeline::new(Arc::new(config), self.collaborators())
    }
}

/// Config with a short translation timeout, for tests that stall a language.
pub fn config_with_translation_timeout(timeout: Duration) -> PipelineConfig {
    let mut config = PipelineConfig::for_site(SITE);
    config.translation_timeout = timeout;
    config
}

/// Asserts that every consecutive pair of observed statuses is an edge of
/// the job state machine (or a repeat of the same status). A cancelled run
/// may also reach `Failed` from any live status.
pub fn assert_legal_edges(statuses: &[JobStatus], cancelled: bool) {
    for pair in statuses.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let legal = from == to
            || from.can_transition_to(to)
            || (cancelled && to == JobStatus::Failed && !from.is_terminal());
        assert!(legal, "illegal edge observed: {} -> {}", from, to);
    }
}

pub fn assert_monotonic(progress: &[u8]) {
    for pair in progress.windows(2) {
        assert!(
            pair[0] <= pair[1],
            "progress went backwards: {:?}",
            progress
        );
    }
}

//! Translation fan-out. One tokio task per target language, bounded by a
//! semaphore. Tasks never touch the job record: they report through a
//! channel and the orchestrator applies the updates.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info_span, warn, Instrument};

use super::error::TranslationTaskError;
use crate::job::{Article, TranslatedContent};
use crate::services::{TranslationRequest, Translator};

/// Lifecycle notifications sent by translation tasks.
#[derive(Debug)]
pub enum TranslationUpdate {
    /// The task acquired a concurrency slot and is calling the collaborator.
    Started(String),
    Finished {
        language: String,
        outcome: Result<TranslatedContent, TranslationTaskError>,
    },
}

pub struct TranslationStage {
    translator: Arc<dyn Translator>,
    timeout: Duration,
    concurrency: usize,
}

impl TranslationStage {
    pub fn new(translator: Arc<dyn Translator>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            translator,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Spawns one task per language. Must be called within a tokio runtime.
    pub fn spawn(
        &self,
        article: &Article,
        source_language: &str,
        languages: &[String],
    ) -> TranslationRun {
        let (sender, updates) = mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for language in languages {
            let request = TranslationRequest {
                title: article.title.clone(),
                excerpt: article.excerpt.clone(),
                body: article.body.clone(),
                source_language: source_language.to_string(),
                target_language: language.clone(),
            };
            let span = info_span!("translation", language = %language);
            tasks.spawn(
                translate_one(
                    Arc::clone(&self.translator),
                    request,
                    self.timeout,
                    Arc::clone(&permits),
                    sender.clone(),
                )
                .instrument(span),
            );
        }
        debug!(
            "Spawned {} translation task(s), at most {} in flight",
            languages.len(),
            self.concurrency
        );

        TranslationRun { updates, tasks }
    }
}

fn check_translation(content: TranslatedContent) -> Result<TranslatedContent, TranslationTaskError> {
    if content.title.trim().is_empty() {
        return Err(TranslationTaskError::EmptyResult("title"));
    }
    if content.body.trim().is_empty() {
        return Err(TranslationTaskError::EmptyResult("body"));
    }
    Ok(content)
}

async fn translate_one(
    translator: Arc<dyn Translator>,
    request: TranslationRequest,
    timeout: Duration,
    permits: Arc<Semaphore>,
    updates: mpsc::UnboundedSender<TranslationUpdate>,
) {
    let language = request.target_language.clone();
    // Never closed. A task without a slot stays open and is abandoned by the
    // orchestrator.
    let Ok(_permit) = permits.acquire_owned().await else {
        return;
    };

    // The receiver is gone once the run was cancelled; nothing left to do.
    if updates.send(TranslationUpdate::Started(language.clone())).is_err() {
        return;
    }

    let outcome = match tokio::time::timeout(timeout, translator.translate(&request)).await {
        Ok(Ok(content)) => check_translation(content),
        Ok(Err(e)) => Err(TranslationTaskError::Service(e)),
        Err(_) => Err(TranslationTaskError::Timeout(timeout)),
    };
    let _ = updates.send(TranslationUpdate::Finished { language, outcome });
}

/// Handle on a spawned fan-out.
pub struct TranslationRun {
    updates: mpsc::UnboundedReceiver<TranslationUpdate>,
    tasks: JoinSet<()>,
}

impl TranslationRun {
    /// Next update, or `None` once every task has dropped its sender.
    pub async fn next(&mut self) -> Option<TranslationUpdate> {
        self.updates.recv().await
    }

    /// Abandons every in-flight task. Results still in the channel are
    /// discarded.
    pub fn abort(&mut self) {
        self.tasks.abort_all();
        self.updates.close();
    }

    /// Reaps finished tasks. Returns how many ended by panicking.
    pub async fn finish(mut self) -> usize {
        let mut panicked = 0;
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    warn!("Translation task panicked: {}", e);
                    panicked += 1;
                }
            }
        }
        panicked
    }
}

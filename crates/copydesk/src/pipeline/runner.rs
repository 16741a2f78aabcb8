use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::job::{JobError, JobErrorKind, JobRecord, JobStatus, RecordError};
use crate::sanitize;
use crate::services::{Collaborators, ServiceError};

use super::config::PipelineConfig;
use super::error::{CancellationError, PipelineError};
use super::generation::GenerationStage;
use super::indexing::IndexingStage;
use super::normalize::normalize;
use super::progress::{ProgressEvent, ProgressReporter};
use super::seo;
use super::translation::{TranslationStage, TranslationUpdate};

/// Drives one job record through every stage. The record is borrowed
/// mutably for the whole run; stages only return results.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    generation: GenerationStage,
    translation: TranslationStage,
    indexing: IndexingStage,
}

impl Pipeline {
    pub fn new(config: Arc<PipelineConfig>, collaborators: Collaborators) -> Self {
        let generation = GenerationStage::new(
            collaborators.generator,
            config.generation_timeout,
            config.seo.excerpt_max_len,
        );
        let translation = TranslationStage::new(
            collaborators.translator,
            config.translation_timeout,
            config.translation_concurrency,
        );
        let indexing = IndexingStage::new(
            collaborators.indexers,
            config.indexing_timeout,
            config.indexing_retry,
        );
        Self {
            config,
            generation,
            translation,
            indexing,
        }
    }

    /// Production constructor: HTTP collaborators built from config.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let collaborators = Collaborators::from_config(config)?;
        Ok(Self::new(
            Arc::new(PipelineConfig::from_config(config)),
            collaborators,
        ))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline on `record`, which must still be in `Input`.
    ///
    /// Fatal errors are recorded on the record (status `Failed`) before
    /// being returned. Invalid input is the exception: the record stays in
    /// `Input` with the reason in its log.
    pub async fn run(
        &self,
        record: &mut JobRecord,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let span = info_span!(
            "pipeline",
            job_id = %record.id(),
            source_type = %record.source_type(),
            input_hash = %sanitize::hash_text(&record.source_content().text),
        );
        let result = self
            .run_stages(record, progress, cancel)
            .instrument(span)
            .await;
        match &result {
            Ok(()) => info!(
                "Job {} completed ({} translation(s) errored, {} indexing failure(s))",
                record.id(),
                record.errored_translations(),
                record.failed_submissions()
            ),
            Err(err) => self.record_failure(record, progress, err),
        }
        result
    }

    fn record_failure(
        &self,
        record: &mut JobRecord,
        progress: &dyn ProgressReporter,
        err: &PipelineError,
    ) {
        match err.job_error_kind() {
            JobErrorKind::InvalidInput => {
                warn!("Job {} rejected: {}", record.id(), err);
                record.append_log(err.to_string());
                progress.report(
                    record,
                    ProgressEvent::Stage {
                        message: err.to_string(),
                    },
                );
            }
            kind => {
                let stage = record.status();
                match record.fail(JobError::new(kind, stage, err.to_string())) {
                    Ok(()) => {
                        error!("Job {} failed during {}: {}", record.id(), stage, err);
                        progress.report(record, ProgressEvent::Finished);
                    }
                    // Only a record that already finished refuses `fail`.
                    Err(e) => error!("Job {} could not be marked failed: {}", record.id(), e),
                }
            }
        }
    }

    /// Stage boundary: fails the run if the caller asked to cancel.
    fn checkpoint(record: &JobRecord, cancel: &CancellationToken) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            return Err(CancellationError {
                stage: record.status(),
            }
            .into());
        }
        Ok(())
    }

    fn enter(
        record: &mut JobRecord,
        progress: &dyn ProgressReporter,
        next: JobStatus,
    ) -> Result<(), PipelineError> {
        record.transition(next)?;
        Self::report_status(record, progress);
        Ok(())
    }

    fn report_status(record: &JobRecord, progress: &dyn ProgressReporter) {
        let message = format!("status {}", record.status());
        let event = if record.is_terminal() {
            ProgressEvent::Finished
        } else {
            ProgressEvent::Stage { message }
        };
        progress.report(record, event);
    }

    async fn run_stages(
        &self,
        record: &mut JobRecord,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        // Input
        let request = {
            let _step = info_span!("normalize").entered();
            let request = normalize(record.source_type(), record.source_content())?;
            let line = request.describe();
            debug!("{}", line);
            record.append_log(line.clone());
            record.advance_progress(JobStatus::Input.progress_range().end);
            progress.report(record, ProgressEvent::Stage { message: line });
            request
        };
        Self::checkpoint(record, cancel)?;

        // Generating
        Self::enter(record, progress, JobStatus::Generating)?;
        let article = self
            .generation
            .run(&request)
            .instrument(info_span!("generate"))
            .await?;
        Self::checkpoint(record, cancel)?;
        record.complete_generation(article)?;
        Self::report_status(record, progress);

        // Optimizing
        let metadata = {
            let _step = info_span!("optimize").entered();
            let article = record.article().ok_or(RecordError::MissingArticle)?;
            seo::optimize(article, &self.config.site, &self.config.seo)?
        };
        Self::checkpoint(record, cancel)?;
        record.complete_optimization(metadata)?;
        Self::report_status(record, progress);

        // Translating
        self.translate(record, progress, cancel)
            .instrument(info_span!("translate"))
            .await?;
        Self::checkpoint(record, cancel)?;

        // Indexing
        Self::enter(record, progress, JobStatus::Indexing)?;
        self.index(record, progress)
            .instrument(info_span!("index"))
            .await?;

        Self::enter(record, progress, JobStatus::Completed)
    }

    async fn translate(
        &self,
        record: &mut JobRecord,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        record.open_translations(&self.config.languages)?;
        // One task per record entry; duplicate codes in the config collapse.
        let languages: Vec<String> = record.translations().keys().cloned().collect();
        progress.report(
            record,
            ProgressEvent::Stage {
                message: format!("translating into {} language(s)", languages.len()),
            },
        );

        let mut run = {
            let article = record.article().ok_or(RecordError::MissingArticle)?;
            self.translation
                .spawn(article, &self.config.site.source_language, &languages)
        };
        let range = JobStatus::Translating.progress_range();

        loop {
            let update = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    run.abort();
                    return Err(CancellationError { stage: JobStatus::Translating }.into());
                }
                update = run.next() => update,
            };
            let Some(update) = update else { break };

            match update {
                TranslationUpdate::Started(language) => {
                    record.start_translation(&language)?;
                    progress.report(
                        record,
                        ProgressEvent::Translation {
                            message: format!("translation {} started", language),
                            language,
                        },
                    );
                }
                TranslationUpdate::Finished { language, outcome } => {
                    let message = match &outcome {
                        Ok(_) => format!("translation {} completed", language),
                        Err(e) => {
                            warn!("Translation {} errored: {}", language, e);
                            format!("translation {} errored: {}", language, e)
                        }
                    };
                    record.finish_translation(&language, outcome.map_err(|e| e.to_string()))?;
                    let (done, total) = record.translation_counts();
                    record.advance_progress(range.at(done, total));
                    progress.report(record, ProgressEvent::Translation { language, message });
                }
            }
        }

        let panicked = run.finish().await;
        let reason = if panicked > 0 {
            "translation task panicked"
        } else {
            "translation task ended without a result"
        };
        if record.abandon_translations(reason) > 0 {
            progress.report(
                record,
                ProgressEvent::Stage {
                    message: reason.to_string(),
                },
            );
        }

        let (_, total) = record.translation_counts();
        let errored = record.errored_translations();
        record.advance_progress(range.end);
        let summary = format!(
            "translation finished: {} completed, {} errored",
            total - errored,
            errored
        );
        if errored > 0 {
            warn!("{}", summary);
        } else {
            info!("{}", summary);
        }
        record.append_log(summary.clone());
        progress.report(record, ProgressEvent::Stage { message: summary });
        Ok(())
    }

    async fn index(
        &self,
        record: &mut JobRecord,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        let url = record
            .article()
            .and_then(|a| a.canonical_url())
            .ok_or(RecordError::MissingArticle)?
            .to_string();
        let collaborators = self.indexing.collaborators();
        record.open_indexing(&collaborators)?;
        debug!(
            "Submitting {} to {} indexer(s)",
            sanitize::redact_url(&url),
            collaborators.len()
        );

        let range = JobStatus::Indexing.progress_range();
        let total = collaborators.len();
        let mut done = 0;
        let mut submissions = self.indexing.submit_all(&url);
        while let Some(outcome) = submissions.next().await {
            done += 1;
            let message = match &outcome.result {
                Ok(ack) => format!(
                    "indexing {} submitted (HTTP {})",
                    outcome.collaborator, ack.status
                ),
                Err(e) => {
                    warn!(
                        "Indexing {} failed after {} attempt(s): {}",
                        outcome.collaborator, outcome.attempts, e
                    );
                    format!("indexing {} failed: {}", outcome.collaborator, e)
                }
            };
            record.record_submission(
                &outcome.collaborator,
                outcome.attempts,
                outcome.result.map(|_| ()).map_err(|e| e.to_string()),
            )?;
            record.advance_progress(range.at(done, total));
            progress.report(
                record,
                ProgressEvent::Indexing {
                    collaborator: outcome.collaborator,
                    message,
                },
            );
        }

        let failed = record.failed_submissions();
        if failed > 0 {
            record.append_log(format!(
                "indexing finished: {} of {} submission(s) failed",
                failed, total
            ));
        }
        Ok(())
    }
}

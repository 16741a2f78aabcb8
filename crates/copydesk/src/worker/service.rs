use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use tokio::sync::{broadcast, watch, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::broadcast::{
    JobCounts, JobListResponse, JobProgressBroadcaster, JobProgressEvent, JobQueryParams, JobStore,
};
use crate::config::Config;
use crate::error::{CopydeskError, WorkerError};
use crate::job::{JobRecord, SourceContent, SourceType};
use crate::pipeline::{normalize, BroadcastProgress, Pipeline, ProgressEvent, ProgressReporter};

struct RunHandle {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

/// Entry point for callers: accepts submissions, runs each job on the tokio
/// runtime and exposes snapshots and progress events.
///
/// At most `worker_count` runs execute at once; further submissions are
/// registered immediately and wait for a slot.
pub struct PipelineService {
    pipeline: Arc<Pipeline>,
    store: Arc<JobStore>,
    broadcaster: JobProgressBroadcaster,
    permits: Arc<Semaphore>,
    runs: Mutex<HashMap<String, RunHandle>>,
    shutdown: CancellationToken,
}

impl PipelineService {
    pub fn new(pipeline: Pipeline, worker_count: usize, broadcast_capacity: usize) -> Self {
        let worker_count = worker_count.max(1);
        info!("Pipeline service ready with {} worker slot(s)", worker_count);
        Self {
            pipeline: Arc::new(pipeline),
            store: Arc::new(JobStore::new()),
            broadcaster: JobProgressBroadcaster::new(broadcast_capacity),
            permits: Arc::new(Semaphore::new(worker_count)),
            runs: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Builds the HTTP collaborators and pipeline described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, CopydeskError> {
        let pipeline = Pipeline::from_config(config)?;
        Ok(Self::new(
            pipeline,
            config.worker_count,
            config.broadcast_capacity,
        ))
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<String, RunHandle>> {
        match self.runs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Run table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Registers a job and starts its run. Input is validated up front:
    /// invalid input is returned as an error and no job is created.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(
        &self,
        source_type: SourceType,
        source_content: SourceContent,
    ) -> Result<String, CopydeskError> {
        if self.shutdown.is_cancelled() {
            return Err(WorkerError::ShuttingDown.into());
        }
        normalize(source_type, &source_content)?;

        let mut record = JobRecord::new(source_type, source_content);
        let job_id = record.id().to_string();
        let progress = BroadcastProgress::new(Arc::clone(&self.store), self.broadcaster.clone());
        progress.report(
            &record,
            ProgressEvent::Stage {
                message: "job queued".to_string(),
            },
        );

        let cancel = self.shutdown.child_token();
        let (done_tx, done_rx) = watch::channel(false);
        self.runs().insert(
            job_id.clone(),
            RunHandle {
                cancel: cancel.clone(),
                done: done_rx,
            },
        );

        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            // A job cancelled while queued still runs, and fails at its
            // first stage boundary.
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };
            if let Err(e) = pipeline.run(&mut record, &progress, &cancel).await {
                debug!("Run {} ended with error: {}", record.id(), e);
            }
            let _ = done_tx.send(true);
        });

        debug!("Submitted job {} ({} input)", job_id, source_type);
        Ok(job_id)
    }

    /// Latest snapshot of a job. Never blocks on a running stage.
    pub fn snapshot(&self, job_id: &str) -> Option<JobRecord> {
        self.store.get(job_id)
    }

    pub fn list(&self, params: &JobQueryParams) -> JobListResponse {
        self.store.list(params)
    }

    pub fn counts(&self) -> JobCounts {
        self.store.counts()
    }

    /// Creates a new subscriber for progress events of every job.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.broadcaster.subscribe()
    }

    /// Requests cancellation. Takes effect at the run's next stage
    /// boundary; cancelling a finished job has no effect.
    pub fn cancel(&self, job_id: &str) -> Result<(), WorkerError> {
        let runs = self.runs();
        let run = runs
            .get(job_id)
            .ok_or_else(|| WorkerError::UnknownJob(job_id.to_string()))?;
        info!("Cancellation requested for job {}", job_id);
        run.cancel.cancel();
        Ok(())
    }

    /// Waits for the run to finish and returns its terminal snapshot.
    pub async fn wait(&self, job_id: &str) -> Result<JobRecord, WorkerError> {
        let done = self.runs().get(job_id).map(|run| run.done.clone());
        if let Some(mut done) = done {
            // An error means the run task is gone; the store decides below.
            let _ = done.wait_for(|finished| *finished).await;
        }
        match self.store.get(job_id) {
            Some(record) if record.is_terminal() => Ok(record),
            Some(_) => Err(WorkerError::RunLost(job_id.to_string())),
            None => Err(WorkerError::UnknownJob(job_id.to_string())),
        }
    }

    /// Removes a finished job from the store.
    pub fn discard(&self, job_id: &str) -> Result<JobRecord, WorkerError> {
        let record = self.store.discard(job_id)?;
        self.runs().remove(job_id);
        Ok(record)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Refuses new submissions, cancels every live run and waits for the
    /// runs to settle.
    pub async fn shutdown(&self) {
        info!("Shutting down pipeline service...");
        self.shutdown.cancel();
        let pending: Vec<watch::Receiver<bool>> =
            self.runs().values().map(|run| run.done.clone()).collect();
        for mut done in pending {
            let _ = done.wait_for(|finished| *finished).await;
        }
        info!("All runs have stopped");
    }
}

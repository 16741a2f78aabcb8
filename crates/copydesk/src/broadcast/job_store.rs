//! In-memory store of job record snapshots.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::WorkerError;
use crate::job::{JobRecord, JobStatus, SourceType};

const DEFAULT_PAGE_SIZE: u64 = 100;

/// Query parameters for job listing.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQueryParams {
    pub status: Option<JobStatus>,
    pub source_type: Option<SourceType>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Response for job listing with pagination.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListResponse {
    pub jobs: Vec<JobRecord>,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Job counts by lifecycle phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Latest snapshot of every known job, keyed by id.
///
/// Uses `std::sync::RwLock`; every operation is a short in-memory update.
/// A poisoned lock is recovered rather than propagated.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Stores a snapshot. A terminal snapshot is never replaced; returns
    /// false when the update was ignored for that reason.
    pub fn upsert(&self, record: &JobRecord) -> bool {
        let mut jobs = self.write();
        if let Some(existing) = jobs.get(record.id()) {
            if existing.is_terminal() {
                log::warn!(
                    "Ignoring update for job {}: already {}",
                    record.id(),
                    existing.status()
                );
                return false;
            }
        }
        jobs.insert(record.id().to_string(), record.clone());
        true
    }

    /// Returns a specific job by ID.
    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.read().get(job_id).cloned()
    }

    /// Jobs matching `params`, newest first, paginated.
    pub fn list(&self, params: &JobQueryParams) -> JobListResponse {
        let mut jobs: Vec<JobRecord> = self
            .read()
            .values()
            .filter(|j| params.status.map_or(true, |s| j.status() == s))
            .filter(|j| params.source_type.map_or(true, |t| j.source_type() == t))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });

        let total = jobs.len() as u64;
        let offset = params.offset.unwrap_or(0) as usize;
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE) as usize;
        let jobs = jobs.into_iter().skip(offset).take(limit).collect();

        JobListResponse {
            jobs,
            total,
            limit: params.limit,
            offset: params.offset,
        }
    }

    /// Removes a finished job and returns its final snapshot. Live jobs
    /// cannot be discarded.
    pub fn discard(&self, job_id: &str) -> Result<JobRecord, WorkerError> {
        let mut jobs = self.write();
        match jobs.get(job_id) {
            None => Err(WorkerError::UnknownJob(job_id.to_string())),
            Some(job) if !job.is_terminal() => Err(WorkerError::JobRunning(job_id.to_string())),
            Some(_) => jobs
                .remove(job_id)
                .ok_or_else(|| WorkerError::UnknownJob(job_id.to_string())),
        }
    }

    /// Returns the count of jobs by phase.
    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for job in self.read().values() {
            match job.status() {
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                _ => counts.running += 1,
            }
        }
        counts
    }
}

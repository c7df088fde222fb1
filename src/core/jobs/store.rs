//! In-memory registry of bulk jobs and their results.

use crate::core::error::{AppError, Result};
use crate::core::models::{Job, JobId, JobResult, JobStatus};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct JobTables {
    jobs: HashMap<JobId, Job>,
    results: HashMap<JobId, Arc<JobResult>>,
}

/// Concurrency-safe job registry.
///
/// A single mutex covers both the job table and the result table, so a job flips to
/// `Finished` in the same critical section that publishes its result. The lock is only held
/// for map operations and is never held across an `.await`.
#[derive(Default)]
pub struct JobStore {
    tables: Mutex<JobTables>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new running job.
    pub fn create(&self, id: JobId, total_records: usize) -> Result<Job> {
        let mut tables = self.tables.lock();
        if tables.jobs.contains_key(&id) {
            return Err(AppError::DuplicateJob(id));
        }
        let job = Job::new(id.clone(), total_records);
        tables.jobs.insert(id, job.clone());
        Ok(job)
    }

    /// Snapshot of the job's current metadata.
    pub fn get(&self, id: &str) -> Result<Job> {
        self.tables
            .lock()
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    /// Records that one more address has been accounted for. Returns the new processed count.
    ///
    /// The count never exceeds `total_records`, and finished jobs are left untouched.
    pub fn increment_processed(&self, id: &str) -> Result<usize> {
        let mut tables = self.tables.lock();
        let job = tables
            .jobs
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        if job.status == JobStatus::Finished {
            return Err(AppError::AlreadyFinalized(id.to_string()));
        }
        if job.total_processed < job.total_records {
            job.total_processed += 1;
        } else {
            tracing::warn!(target: "job_store", "[Job {}] Ignoring progress beyond {} records.", id, job.total_records);
        }
        Ok(job.total_processed)
    }

    /// Publishes the job's result and marks it finished. Rejected if the job already finished.
    pub fn finalize(&self, id: &str, result: JobResult) -> Result<Job> {
        let mut tables = self.tables.lock();
        let job = tables
            .jobs
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        if job.status == JobStatus::Finished {
            return Err(AppError::AlreadyFinalized(id.to_string()));
        }
        job.status = JobStatus::Finished;
        job.finished_at = Some(Utc::now());
        let snapshot = job.clone();
        tables.results.insert(id.to_string(), Arc::new(result));
        Ok(snapshot)
    }

    /// The aggregated result, available only once the job has finished.
    pub fn get_result(&self, id: &str) -> Result<Arc<JobResult>> {
        self.tables
            .lock()
            .results
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    /// Drops finished jobs (and their results) that finished before `cutoff`.
    /// Running jobs are never evicted. Returns how many jobs were removed.
    pub fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut tables = self.tables.lock();
        let expired: Vec<JobId> = tables
            .jobs
            .values()
            .filter(|job| job.finished_at.is_some_and(|at| at < cutoff))
            .map(|job| job.id.clone())
            .collect();
        for id in &expired {
            tables.jobs.remove(id);
            tables.results.remove(id);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.tables.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

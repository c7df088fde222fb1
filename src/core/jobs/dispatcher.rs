//! Starts bulk verification jobs and drives them to completion in the background.

use super::store::JobStore;
use crate::core::error::{AppError, Result};
use crate::core::models::{Job, JobId, JobResult};
use crate::verification::source::VerificationSource;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use ulid::Ulid;

/// Creates jobs, spawns one consumer task per job, and answers status/result queries.
#[derive(Clone)]
pub struct JobDispatcher {
    store: Arc<JobStore>,
    source: Arc<dyn VerificationSource>,
}

impl JobDispatcher {
    pub fn new(store: Arc<JobStore>, source: Arc<dyn VerificationSource>) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn source(&self) -> &Arc<dyn VerificationSource> {
        &self.source
    }

    /// Registers a job for `addresses` and returns its id without waiting for verification.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, addresses: Vec<String>) -> Result<JobId> {
        if addresses.is_empty() {
            return Err(AppError::InvalidRequest(
                "emails must contain at least one address".to_string(),
            ));
        }

        let job_id = Ulid::new().to_string();
        let job = self.store.create(job_id.clone(), addresses.len())?;
        tracing::info!(target: "job_dispatch", "[Job {}] Created for {} addresses.", job.id, job.total_records);

        tokio::spawn(run_job(
            Arc::clone(&self.store),
            Arc::clone(&self.source),
            job_id.clone(),
            addresses,
        ));

        Ok(job_id)
    }

    pub fn status(&self, job_id: &str) -> Result<Job> {
        self.store.get(job_id)
    }

    /// Results of a finished job. Unknown and unfinished jobs are both `NotFound`.
    pub fn results(&self, job_id: &str) -> Result<Arc<JobResult>> {
        self.store.get_result(job_id)
    }
}

/// Drains the job's outcome stream, reporting progress, then publishes the aggregate.
///
/// This task is the only writer for its job, so the final `finalize` cannot race with an
/// `increment_processed` for the same job.
async fn run_job(
    store: Arc<JobStore>,
    source: Arc<dyn VerificationSource>,
    job_id: JobId,
    addresses: Vec<String>,
) {
    let task_label = format!("[Job {}]", job_id);
    let start_time = Instant::now();

    let mut pending: HashMap<String, usize> = HashMap::new();
    for address in &addresses {
        *pending.entry(address.clone()).or_default() += 1;
    }

    let mut outcomes = source.verify_bulk_stream(addresses);
    let mut aggregate = JobResult::default();

    while let Some(outcome) = outcomes.next().await {
        match pending.get_mut(&outcome.address) {
            Some(remaining) if *remaining > 0 => *remaining -= 1,
            _ => {
                tracing::warn!(target: "job_dispatch", "{} Ignoring unexpected outcome for '{}'.", task_label, outcome.address);
                continue;
            }
        }

        if let Err(e) = store.increment_processed(&job_id) {
            tracing::error!(target: "job_dispatch", "{} Failed to record progress: {}", task_label, e);
            return;
        }

        match outcome.result {
            Ok(result) => aggregate.results.push(result),
            Err(e) => {
                tracing::debug!(target: "job_dispatch", "{} '{}' failed verification: {}", task_label, outcome.address, e);
                aggregate.errors.push(e.to_string());
            }
        }
    }

    // A source that ends early still has to account for every address.
    for (address, remaining) in pending {
        for _ in 0..remaining {
            tracing::warn!(target: "job_dispatch", "{} No outcome was produced for '{}'.", task_label, address);
            if let Err(e) = store.increment_processed(&job_id) {
                tracing::error!(target: "job_dispatch", "{} Failed to record progress: {}", task_label, e);
                return;
            }
            aggregate
                .errors
                .push(format!("verification produced no outcome for {}", address));
        }
    }

    let (succeeded, failed) = (aggregate.results.len(), aggregate.errors.len());
    match store.finalize(&job_id, aggregate) {
        Ok(job) => tracing::info!(target: "job_dispatch",
            "{} Finished: {} processed ({} ok, {} errors) in {:.2?}.",
            task_label, job.total_processed, succeeded, failed, start_time.elapsed()
        ),
        Err(e) => tracing::error!(target: "job_dispatch", "{} Failed to finalize: {}", task_label, e),
    }
}

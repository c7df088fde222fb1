//! # Mailprobe Core Library
//!
//! Email address verification with asynchronous bulk jobs, plus a probe that tells whether an
//! address belongs to a Microsoft 365 tenant.
//!
//! It is designed to be used either directly as a library or via the `mailprobe` binary, which
//! serves the HTTP API.

mod core;
mod server;
mod utils;
mod verification;

pub use crate::core::config::{Config, ConfigBuilder, ConfigFile};
pub use crate::core::error::{AppError, Result};
pub use crate::core::jobs::{JobDispatcher, JobStore, RetentionSweeper};
pub use crate::core::models::{
    BulkVerification, FederationCheck, Job, JobId, JobResult, JobStatus, Reachability,
    SmtpDetails, SyntaxDetails, VerificationResult,
};
pub use crate::server::{create_app, ApiError, AppState};
pub use crate::verification::{
    FederationProbe, MailboxVerifier, OutcomeStream, VerificationOutcome, VerificationSource,
};

use std::sync::Arc;
use tokio::task::JoinHandle;

/// Builds the shipped verifier (DNS resolver and, if enabled, the SMTP prober).
pub fn initialize_verifier(config: Arc<Config>) -> Result<Arc<MailboxVerifier>> {
    Ok(Arc::new(MailboxVerifier::new(config)?))
}

/// Performs an early check for outbound SMTP connectivity.
pub async fn check_smtp_connectivity(config: &Config) -> Result<()> {
    utils::smtp::test_smtp_connectivity(config).await
}

/// Wires the job engine and the federation probe around `source`.
pub fn build_state(config: &Config, source: Arc<dyn VerificationSource>) -> Result<Arc<AppState>> {
    let store = Arc::new(JobStore::new());
    let dispatcher = JobDispatcher::new(store, source);
    let probe = FederationProbe::new(config)?;
    Ok(AppState::new(dispatcher, probe))
}

/// Starts the retention sweeper when `config.job_retention` is set.
pub fn spawn_retention_sweeper(config: &Config, state: &AppState) -> Option<JoinHandle<()>> {
    let retention = config.job_retention?;
    tracing::info!(target: "job_store",
        "Evicting finished jobs after {:?} (sweep every {:?}).", retention, config.sweep_interval
    );
    let sweeper = RetentionSweeper::new(
        Arc::clone(state.dispatcher.store()),
        retention,
        config.sweep_interval,
    );
    Some(sweeper.spawn())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::source::tests::StubSource;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sweeper_only_with_retention() {
        let config = Config::default();
        let state = build_state(&config, Arc::new(StubSource::instant())).unwrap();
        assert!(spawn_retention_sweeper(&config, &state).is_none());

        let config = Config {
            job_retention: Some(Duration::from_secs(60)),
            ..Config::default()
        };
        let handle = spawn_retention_sweeper(&config, &state).unwrap();
        handle.abort();
    }

    #[tokio::test]
    async fn test_build_state_rejects_bad_discovery_url() {
        let config = Config {
            discovery_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(build_state(&config, Arc::new(StubSource::instant())).is_err());
    }
}

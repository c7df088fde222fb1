//! The per-address verification capability consumed by the job engine.
//!
//! A [`VerificationSource`] answers for one address at a time. Bulk and streaming variants are
//! provided on top of [`VerificationSource::verify`]; implementations only override them when
//! they have a better strategy.

use crate::core::error::Result;
use crate::core::models::{BulkVerification, VerificationResult};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome for a single submitted address.
#[derive(Debug)]
pub struct VerificationOutcome {
    pub address: String,
    pub result: Result<VerificationResult>,
}

/// Sending half paired with an [`OutcomeStream`].
pub type OutcomeSender = mpsc::Sender<VerificationOutcome>;

/// Finite, single-pass sequence of outcomes in arrival order.
///
/// The stream ends once every producer handle has been dropped.
#[derive(Debug)]
pub struct OutcomeStream {
    rx: mpsc::Receiver<VerificationOutcome>,
}

impl OutcomeStream {
    /// Creates a connected sender/stream pair. `capacity` bounds how far the producer may run
    /// ahead of the consumer.
    pub fn channel(capacity: usize) -> (OutcomeSender, OutcomeStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, OutcomeStream { rx })
    }

    /// Builds an already-complete stream from a list of outcomes.
    pub fn from_outcomes(outcomes: Vec<VerificationOutcome>) -> Self {
        let (tx, stream) = Self::channel(outcomes.len());
        for outcome in outcomes {
            // Capacity matches the number of outcomes, so this cannot fill up.
            let _ = tx.try_send(outcome);
        }
        stream
    }

    /// Waits for the next outcome. `None` means the stream is exhausted.
    pub async fn next(&mut self) -> Option<VerificationOutcome> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait VerificationSource: Send + Sync + 'static {
    /// Verifies one address. Addresses that cannot be checked at all (bad syntax, internal
    /// failures) are errors; negative findings are reported inside the result.
    async fn verify(&self, address: &str) -> Result<VerificationResult>;

    /// How many addresses of one bulk request may be in flight at once.
    fn max_concurrency(&self) -> usize {
        1
    }

    /// Verifies every address and splits the outcomes into results and error descriptions.
    async fn verify_bulk(&self, addresses: Vec<String>) -> BulkVerification {
        let limit = self.max_concurrency().max(1);
        let mut outcomes = stream::iter(addresses)
            .map(move |address| async move {
                let result = self.verify(&address).await;
                VerificationOutcome { address, result }
            })
            .buffer_unordered(limit);

        let mut bulk = BulkVerification::default();
        while let Some(outcome) = outcomes.next().await {
            match outcome.result {
                Ok(result) => bulk.results.push(result),
                Err(e) => bulk.errors.push(e.to_string()),
            }
        }
        bulk
    }

    /// Starts verifying `addresses` in the background and returns the stream of outcomes,
    /// one per address, in completion order.
    fn verify_bulk_stream(self: Arc<Self>, addresses: Vec<String>) -> OutcomeStream {
        let limit = self.max_concurrency().max(1);
        let (tx, outcome_stream) = OutcomeStream::channel(limit);

        tokio::spawn(async move {
            let source = &*self;
            let mut outcomes = stream::iter(addresses)
                .map(move |address| async move {
                    let result = source.verify(&address).await;
                    VerificationOutcome { address, result }
                })
                .buffer_unordered(limit);

            while let Some(outcome) = outcomes.next().await {
                if tx.send(outcome).await.is_err() {
                    tracing::debug!(target: "verifier", "Outcome stream consumer went away; stopping producer.");
                    break;
                }
            }
        });

        outcome_stream
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::error::AppError;
    use crate::core::models::{Reachability, SyntaxDetails};
    use std::time::Duration;

    pub(crate) fn sample_result(address: &str) -> VerificationResult {
        let (username, domain) = address.split_once('@').unwrap_or((address, ""));
        VerificationResult {
            email: address.to_string(),
            reachable: Reachability::Unknown,
            syntax: SyntaxDetails {
                username: username.to_string(),
                domain: domain.to_string(),
                valid: true,
            },
            has_mx_records: true,
            mx_host: None,
            smtp: None,
            role_account: false,
        }
    }

    /// Accepts anything with an `@`, optionally pausing before each answer.
    pub(crate) struct StubSource {
        pub(crate) delay: Duration,
        pub(crate) concurrency: usize,
    }

    impl StubSource {
        pub(crate) fn instant() -> Self {
            Self {
                delay: Duration::ZERO,
                concurrency: 4,
            }
        }

        pub(crate) fn slow(delay: Duration) -> Self {
            Self {
                delay,
                concurrency: 1,
            }
        }
    }

    #[async_trait]
    impl VerificationSource for StubSource {
        async fn verify(&self, address: &str) -> Result<VerificationResult> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if address.contains('@') {
                Ok(sample_result(address))
            } else {
                Err(AppError::InvalidSyntax(address.to_string()))
            }
        }

        fn max_concurrency(&self) -> usize {
            self.concurrency
        }
    }

    #[tokio::test]
    async fn test_stream_yields_one_outcome_per_address() {
        let source = Arc::new(StubSource::instant());
        let addresses: Vec<String> = ["a@x.com", "b@y.org", "nope", "c@z.net"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut stream = source.verify_bulk_stream(addresses.clone());
        let mut seen = Vec::new();
        while let Some(outcome) = stream.next().await {
            seen.push((outcome.address.clone(), outcome.result.is_ok()));
        }
        seen.sort();

        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], ("a@x.com".to_string(), true));
        assert_eq!(seen[3], ("nope".to_string(), false));
    }

    #[tokio::test]
    async fn test_verify_bulk_splits_results_and_errors() {
        let source = StubSource::instant();
        let bulk = source
            .verify_bulk(vec!["a@x.com".to_string(), "bad-address".to_string()])
            .await;

        assert_eq!(bulk.results.len(), 1);
        assert_eq!(bulk.results[0].email, "a@x.com");
        assert_eq!(bulk.errors.len(), 1);
        assert!(bulk.errors[0].contains("bad-address"));
    }

    #[tokio::test]
    async fn test_from_outcomes_is_finite() {
        let mut stream = OutcomeStream::from_outcomes(vec![VerificationOutcome {
            address: "a@x.com".to_string(),
            result: Ok(sample_result("a@x.com")),
        }]);
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }
}

//! Data shapes exchanged by the verifier, the job engine and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque job identifier (a ULID rendered as a string).
pub type JobId = String;

/// Lifecycle of a bulk verification job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Finished,
}

/// Metadata of a bulk verification job, as returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "job_id")]
    pub id: JobId,
    #[serde(rename = "job_status")]
    pub status: JobStatus,
    pub total_records: usize,
    pub total_processed: usize,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub(crate) fn new(id: JobId, total_records: usize) -> Self {
        Self {
            id,
            status: JobStatus::Running,
            total_records,
            total_processed: 0,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == JobStatus::Finished
    }
}

/// Aggregated outcome of a finished job. Written once per job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub results: Vec<VerificationResult>,
    pub errors: Vec<String>,
}

impl JobResult {
    pub fn len(&self) -> usize {
        self.results.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Response body of the synchronous bulk endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkVerification {
    pub results: Vec<VerificationResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Whether a mailbox is believed to accept mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    Yes,
    No,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxDetails {
    pub username: String,
    pub domain: String,
    pub valid: bool,
}

/// Outcome of the SMTP RCPT probe against the domain's mail server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpDetails {
    pub host_exists: bool,
    pub deliverable: Option<bool>,
    pub catch_all: bool,
    pub message: String,
}

/// Per-address verification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub email: String,
    pub reachable: Reachability,
    pub syntax: SyntaxDetails,
    pub has_mx_records: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mx_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpDetails>,
    pub role_account: bool,
}

/// Answer of the federation probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationCheck {
    pub federated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_serializes_with_wire_field_names() {
        let job = Job::new("01HZX".to_string(), 3);
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["job_id"], "01HZX");
        assert_eq!(value["job_status"], "Running");
        assert_eq!(value["total_records"], 3);
        assert_eq!(value["total_processed"], 0);
        assert!(value["finished_at"].is_null());
        assert!(value["created_at"].is_string());
    }

    #[test]
    fn bulk_verification_omits_empty_errors() {
        let body = serde_json::to_string(&BulkVerification::default()).unwrap();
        assert_eq!(body, r#"{"results":[]}"#);

        let job_result = serde_json::to_string(&JobResult::default()).unwrap();
        assert_eq!(job_result, r#"{"results":[],"errors":[]}"#);
    }
}

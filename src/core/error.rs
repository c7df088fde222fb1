//! Error type shared by the library.

use thiserror::Error;

/// Errors produced by the verification engine, the job subsystem and the federation probe.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    DuplicateJob(String),

    #[error("Job already finalized: {0}")]
    AlreadyFinalized(String),

    #[error("email address syntax is invalid: {0}")]
    InvalidSyntax(String),

    #[error("Federation discovery protocol error: {0}")]
    Protocol(String),

    #[error("DNS resolution failed: {0}")]
    Dns(#[from] trust_dns_resolver::error::ResolveError),

    #[error("Domain does not exist (NXDOMAIN): {0}")]
    NxDomain(String),

    #[error("No MX or address records found for: {0}")]
    NoDnsRecords(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("SMTP check inconclusive: {0}")]
    SmtpInconclusive(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

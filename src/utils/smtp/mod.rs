//! SMTP mailbox probing.

mod client;
mod error;

pub use client::test_smtp_connectivity;
pub(crate) use client::SmtpProber;

/// What an SMTP conversation told us about one mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SmtpProbeResult {
    /// `Some(true)` accepted, `Some(false)` rejected, `None` inconclusive.
    pub exists: Option<bool>,
    pub message: String,
    pub is_catch_all: bool,
}

impl SmtpProbeResult {
    pub(crate) fn conclusive(exists: bool, message: String) -> Self {
        Self {
            exists: Some(exists),
            message,
            is_catch_all: false,
        }
    }

    pub(crate) fn inconclusive(message: String) -> Self {
        Self {
            exists: None,
            message,
            is_catch_all: false,
        }
    }

    pub(crate) fn catch_all(message: String) -> Self {
        Self {
            exists: None,
            message,
            is_catch_all: true,
        }
    }
}

//! Address verification: the source abstraction, the shipped mailbox verifier and the
//! Microsoft 365 federation probe.

pub mod federation;
pub mod mailbox;
pub mod source;

pub use federation::FederationProbe;
pub use mailbox::MailboxVerifier;
pub use source::{OutcomeStream, VerificationOutcome, VerificationSource};

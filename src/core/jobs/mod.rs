//! Asynchronous bulk verification jobs.
//!
//! - `JobStore` keeps job metadata and finished results behind one lock
//! - `JobDispatcher` creates jobs and runs one background consumer per job
//! - `RetentionSweeper` optionally evicts old finished jobs

pub mod dispatcher;
pub mod store;
pub mod sweeper;

pub use dispatcher::JobDispatcher;
pub use store::JobStore;
pub use sweeper::RetentionSweeper;

pub mod config;
pub mod error;
pub mod jobs;
pub mod models;

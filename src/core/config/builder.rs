//! Provides the `ConfigBuilder` for fluent configuration construction.

use super::loading::{apply_file_config, load_config_file};
use super::validation::validate_config;
use super::{Config, ConfigFile, Result};
use crate::AppError;
use std::path::Path;
use std::time::Duration;

/// Builder pattern for creating `Config` instances fluently.
///
/// Settings are layered: defaults, then a config file (explicit path or one of the default
/// locations), then the overrides set on the builder. The result is validated before use.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    config_file_path: Option<String>,
    overrides: ConfigFile,
}

impl ConfigBuilder {
    /// Creates a new builder with default configuration values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify an optional configuration file path to load.
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file_path = Some(path.into());
        self
    }

    pub fn listen_addr(mut self, value: impl Into<String>) -> Self {
        self.overrides.server.listen_addr = Some(value.into());
        self
    }
    pub fn max_concurrency(mut self, value: usize) -> Self {
        self.overrides.verification.max_concurrency = Some(value);
        self
    }
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.overrides.network.request_timeout = Some(duration.as_secs());
        self
    }
    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.overrides.network.user_agent = Some(value.into());
        self
    }
    pub fn dns_timeout(mut self, duration: Duration) -> Self {
        self.overrides.dns.dns_timeout = Some(duration.as_secs());
        self
    }
    pub fn dns_servers(mut self, servers: Vec<String>) -> Self {
        self.overrides.dns.dns_servers = Some(servers);
        self
    }
    pub fn enable_smtp_check(mut self, enable: bool) -> Self {
        self.overrides.smtp.enabled = Some(enable);
        self
    }
    pub fn smtp_timeout(mut self, duration: Duration) -> Self {
        self.overrides.smtp.smtp_timeout = Some(duration.as_secs());
        self
    }
    pub fn smtp_sender_email(mut self, value: impl Into<String>) -> Self {
        self.overrides.smtp.smtp_sender_email = Some(value.into());
        self
    }
    pub fn generic_email_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.overrides.verification.generic_email_prefixes = Some(prefixes);
        self
    }
    pub fn discovery_url(mut self, url: impl Into<String>) -> Self {
        self.overrides.federation.discovery_url = Some(url.into());
        self
    }
    pub fn confirmation_url_template(mut self, template: impl Into<String>) -> Self {
        self.overrides.federation.confirmation_url_template = Some(template.into());
        self
    }
    pub fn job_retention(mut self, retention: Option<Duration>) -> Self {
        self.overrides.jobs.retention_secs = Some(retention.map_or(0, |d| d.as_secs()));
        self
    }

    /// Builds the final `Config` object, applying defaults, file settings, overrides, and validation.
    pub fn build(mut self) -> Result<Config> {
        let mut loaded_path: Option<String> = None;

        if let Some(ref path) = self.config_file_path {
            match load_config_file(path) {
                Ok(file_config) => {
                    apply_file_config(&mut self.config, &file_config)?;
                    loaded_path = Some(path.clone());
                    tracing::info!("Loaded base configuration from specified file: {}", path);
                }
                Err(e) => {
                    tracing::error!("Failed to load specified config file '{}': {:#}", path, e);
                    return Err(AppError::Config(format!(
                        "Failed to load specified configuration file '{}': {:#}",
                        path, e
                    )));
                }
            }
        } else {
            tracing::debug!("No config file specified, checking default locations.");
            for path_str in ["./mailprobe.toml", "./config.toml"] {
                if Path::new(path_str).exists() {
                    tracing::debug!("Found potential default config file: {}", path_str);
                    match load_config_file(path_str) {
                        Ok(file_config) => {
                            apply_file_config(&mut self.config, &file_config)?;
                            loaded_path = Some(path_str.to_string());
                            tracing::info!(
                                "Loaded base configuration from default location: {}",
                                path_str
                            );
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Failed to load or parse default config '{}': {:#}",
                                path_str,
                                e
                            );
                        }
                    }
                }
            }
            if loaded_path.is_none() {
                tracing::info!("No configuration file found. Using default values and overrides.");
            }
        }

        apply_file_config(&mut self.config, &self.overrides)?;
        self.config.loaded_config_path = loaded_path;
        validate_config(&mut self.config)?;

        tracing::debug!("Final configuration built successfully.");
        Ok(self.config)
    }
}

//! Handles loading configuration from files and applying it to the Config struct.

use super::{Config, ConfigFile, Result};
use crate::core::error::AppError;
use anyhow::Context;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Loads configuration settings from a TOML file.
/// Internal to the builder logic.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    parse_config_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))
}

pub(crate) fn parse_config_str(content: &str) -> anyhow::Result<ConfigFile> {
    let config_file_content: ConfigFile = toml::from_str(content)?;
    Ok(config_file_content)
}

/// Merges the settings present in `file_config` onto `config`.
/// Absent fields leave the current value untouched.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) -> Result<()> {
    // Server
    if let Some(ref addr) = file_config.server.listen_addr {
        config.listen_addr = addr.trim().to_string();
    }

    // Network
    if let Some(timeout) = file_config.network.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref user_agent) = file_config.network.user_agent {
        config.user_agent = user_agent.clone();
    }

    // DNS
    if let Some(timeout) = file_config.dns.dns_timeout {
        config.dns_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref servers) = file_config.dns.dns_servers {
        if !servers.is_empty() {
            config.dns_servers = servers.clone();
        }
    }

    // SMTP
    if let Some(enabled) = file_config.smtp.enabled {
        config.enable_smtp_check = enabled;
    }
    if let Some(timeout) = file_config.smtp.smtp_timeout {
        config.smtp_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref sender) = file_config.smtp.smtp_sender_email {
        config.smtp_sender_email = sender.clone();
    }
    if let Some(port) = file_config.smtp.smtp_port {
        config.smtp_port = port;
    }

    // Verification
    if let Some(ref pattern) = file_config.verification.email_pattern {
        config.email_regex = Regex::new(pattern).map_err(|e| {
            AppError::Config(format!("Invalid email pattern '{}': {}", pattern, e))
        })?;
    }
    if let Some(ref prefixes) = file_config.verification.generic_email_prefixes {
        config.generic_email_prefixes = prefixes.iter().map(|p| p.to_lowercase()).collect();
    }
    if let Some(concurrency) = file_config.verification.max_concurrency {
        config.max_concurrency = concurrency;
    }

    // Federation
    if let Some(ref url) = file_config.federation.discovery_url {
        config.discovery_url = url.trim().to_string();
    }
    if let Some(ref template) = file_config.federation.confirmation_url_template {
        config.confirmation_url_template = template.trim().to_string();
    }

    // Jobs
    if let Some(secs) = file_config.jobs.retention_secs {
        config.job_retention = if secs == 0 {
            None
        } else {
            Some(Duration::from_secs(secs))
        };
    }
    if let Some(secs) = file_config.jobs.sweep_interval_secs {
        config.sweep_interval = Duration::from_secs(secs);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_partial_file() {
        let file = parse_config_str(
            r#"
            [network]
            request_timeout = 3

            [smtp]
            enabled = true
            smtp_port = 2525

            [jobs]
            retention_secs = 600
            "#,
        )
        .unwrap();

        let mut config = Config::default();
        apply_file_config(&mut config, &file).unwrap();

        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert!(config.enable_smtp_check);
        assert_eq!(config.smtp_port, 2525);
        assert_eq!(config.job_retention, Some(Duration::from_secs(600)));
        // Untouched sections keep their defaults.
        assert_eq!(config.max_concurrency, Config::default().max_concurrency);
        assert_eq!(config.discovery_url, super::super::DEFAULT_DISCOVERY_URL);
    }

    #[test]
    fn test_zero_retention_disables_eviction() {
        let file = parse_config_str("[jobs]\nretention_secs = 0\n").unwrap();
        let mut config = Config {
            job_retention: Some(Duration::from_secs(5)),
            ..Config::default()
        };
        apply_file_config(&mut config, &file).unwrap();
        assert_eq!(config.job_retention, None);
    }

    #[test]
    fn test_invalid_email_pattern_rejected() {
        let file = parse_config_str("[verification]\nemail_pattern = \"([a-z\"\n").unwrap();
        let mut config = Config::default();
        assert!(matches!(
            apply_file_config(&mut config, &file),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_toml_is_parse_error() {
        assert!(parse_config_str("[network]\nrequest_timeout = \"soon\"\n").is_err());
    }
}

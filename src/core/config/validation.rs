//! Contains validation logic for the final Config struct.

use super::{Config, Result};
use crate::core::error::AppError;
use std::time::Duration;
use url::Url;

/// Validates the configuration settings after loading and potential overrides.
/// Mutates the config to clamp values where a sane fallback exists.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    if config.listen_addr.parse::<std::net::SocketAddr>().is_err() {
        return Err(AppError::Config(format!(
            "Invalid listen address: {}",
            config.listen_addr
        )));
    }
    if config.request_timeout.is_zero() {
        tracing::warn!("Request timeout was set to 0. Setting to 1s.");
        config.request_timeout = Duration::from_secs(1);
    }
    if config.dns_servers.is_empty() {
        tracing::warn!("DNS servers list is empty. Resolver might use system defaults or fail.");
    }
    if config.max_concurrency == 0 {
        tracing::warn!("Max concurrency was set to 0. Setting to 1.");
        config.max_concurrency = 1;
    }
    if config.enable_smtp_check
        && (!config.smtp_sender_email.contains('@') || !config.smtp_sender_email.contains('.'))
    {
        return Err(AppError::Config(format!(
            "Invalid SMTP sender email format: {}",
            config.smtp_sender_email
        )));
    }

    Url::parse(&config.discovery_url).map_err(|e| {
        AppError::Config(format!(
            "Invalid discovery URL '{}': {}",
            config.discovery_url, e
        ))
    })?;
    for placeholder in ["{tenant}", "{user}", "{domain}"] {
        if !config.confirmation_url_template.contains(placeholder) {
            return Err(AppError::Config(format!(
                "Confirmation URL template is missing the {} placeholder: {}",
                placeholder, config.confirmation_url_template
            )));
        }
    }

    if config.sweep_interval.is_zero() {
        tracing::warn!("Job sweep interval was set to 0. Setting to 60s.");
        config.sweep_interval = Duration::from_secs(60);
    }
    if config.job_retention.is_none() {
        tracing::debug!("Job retention disabled; finished jobs stay in memory.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let mut config = Config::default();
        assert!(validate_config(&mut config).is_ok());
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let mut config = Config {
            max_concurrency: 0,
            ..Config::default()
        };
        validate_config(&mut config).unwrap();
        assert_eq!(config.max_concurrency, 1);
    }

    #[test]
    fn test_template_requires_placeholders() {
        let mut config = Config {
            confirmation_url_template: "https://{tenant}.example.com/{user}".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            validate_config(&mut config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_bad_sender_only_matters_with_smtp() {
        let mut config = Config {
            smtp_sender_email: "nobody".to_string(),
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_ok());

        config.enable_smtp_check = true;
        assert!(validate_config(&mut config).is_err());
    }
}

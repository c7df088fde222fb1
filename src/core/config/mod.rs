//! Runtime configuration: defaults, TOML file mirror, fluent builder and validation.

mod builder;
mod loading;
mod validation;

pub use builder::ConfigBuilder;

pub(crate) use crate::core::error::Result;

use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_DISCOVERY_URL: &str =
    "https://autodiscover-s.outlook.com/autodiscover/autodiscover.svc";
pub const DEFAULT_CONFIRMATION_URL_TEMPLATE: &str =
    "https://{tenant}-my.sharepoint.com/personal/{user}_{domain}/_layouts/15/onedrive.aspx";

const DEFAULT_EMAIL_PATTERN: &str =
    r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$";

/// Effective configuration used by the server, the verifier and the probe.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,

    pub request_timeout: Duration,
    pub user_agent: String,

    pub dns_timeout: Duration,
    pub dns_servers: Vec<String>,

    pub enable_smtp_check: bool,
    pub smtp_timeout: Duration,
    pub smtp_sender_email: String,
    pub smtp_port: u16,

    pub email_regex: Regex,
    pub generic_email_prefixes: HashSet<String>,
    pub max_concurrency: usize,

    pub discovery_url: String,
    pub confirmation_url_template: String,

    /// Finished jobs older than this are evicted. `None` keeps them forever.
    pub job_retention: Option<Duration>,
    pub sweep_interval: Duration,

    pub loaded_config_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            request_timeout: Duration::from_secs(10),
            user_agent: format!("mailprobe/{}", env!("CARGO_PKG_VERSION")),
            dns_timeout: Duration::from_secs(5),
            dns_servers: vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()],
            enable_smtp_check: false,
            smtp_timeout: Duration::from_secs(5),
            smtp_sender_email: "verify@mailprobe.dev".to_string(),
            smtp_port: 25,
            email_regex: default_email_regex(),
            generic_email_prefixes: [
                "admin", "contact", "help", "hello", "hr", "info", "jobs", "marketing", "noreply",
                "no-reply", "office", "sales", "support", "team",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_concurrency: 8,
            discovery_url: DEFAULT_DISCOVERY_URL.to_string(),
            confirmation_url_template: DEFAULT_CONFIRMATION_URL_TEMPLATE.to_string(),
            job_retention: None,
            sweep_interval: Duration::from_secs(60),
            loaded_config_path: None,
        }
    }
}

fn default_email_regex() -> Regex {
    Regex::new(DEFAULT_EMAIL_PATTERN).expect("built-in email pattern is valid")
}

/// Mirror of `Config` as it appears in a TOML file. Every field is optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub network: NetworkSection,
    pub dns: DnsSection,
    pub smtp: SmtpSection,
    pub verification: VerificationSection,
    pub federation: FederationSection,
    pub jobs: JobsSection,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen_addr: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub request_timeout: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DnsSection {
    pub dns_timeout: Option<u64>,
    pub dns_servers: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpSection {
    pub enabled: Option<bool>,
    pub smtp_timeout: Option<u64>,
    pub smtp_sender_email: Option<String>,
    pub smtp_port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct VerificationSection {
    pub email_pattern: Option<String>,
    pub generic_email_prefixes: Option<Vec<String>>,
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FederationSection {
    pub discovery_url: Option<String>,
    pub confirmation_url_template: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct JobsSection {
    pub retention_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

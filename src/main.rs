//! # Mailprobe
//!
//! Binary for the `mailprobe_core` library. Parses arguments, builds the configuration and
//! either serves the HTTP API or runs a single verification/probe and prints JSON.

use mailprobe_core::{
    build_state, check_smtp_connectivity, create_app, initialize_verifier,
    spawn_retention_sweeper, Config, ConfigBuilder, FederationCheck, FederationProbe,
    VerificationSource,
};

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Verifies email addresses over HTTP, with asynchronous bulk jobs.",
    long_about = "Mailprobe checks address syntax, mail servers and (optionally) SMTP acceptance, runs large batches as background jobs, and detects Microsoft 365 accounts."
)]
struct AppArgs {
    /// Path to a configuration file (TOML format). CLI args override file settings.
    #[arg(long, env = "MAILPROBE_CONFIG")]
    config_file: Option<String>,

    /// Address to listen on, e.g. 0.0.0.0:8080.
    #[arg(short, long, env = "MAILPROBE_LISTEN")]
    listen: Option<String>,

    /// Maximum number of addresses of one request verified concurrently.
    #[arg(short, long, env = "MAILPROBE_CONCURRENCY")]
    concurrency: Option<usize>,

    /// HTTP request timeout in seconds for the federation probe.
    #[arg(long, env = "MAILPROBE_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// DNS resolution timeout in seconds.
    #[arg(long, env = "MAILPROBE_DNS_TIMEOUT")]
    dns_timeout: Option<u64>,

    /// Comma-separated list of DNS servers to use for lookups.
    #[arg(long, value_delimiter = ',', env = "MAILPROBE_DNS_SERVERS")]
    dns_servers: Option<Vec<String>>,

    /// Probe mailboxes over SMTP (needs outbound port 25).
    #[arg(long, action = clap::ArgAction::SetTrue, env = "MAILPROBE_ENABLE_SMTP")]
    enable_smtp: Option<bool>,

    /// Sender address used in SMTP MAIL FROM.
    #[arg(long, env = "MAILPROBE_SMTP_SENDER")]
    smtp_sender: Option<String>,

    /// SMTP connection/command timeout in seconds.
    #[arg(long, env = "MAILPROBE_SMTP_TIMEOUT")]
    smtp_timeout: Option<u64>,

    /// Evict finished jobs this many seconds after they finish.
    #[arg(long, env = "MAILPROBE_RETENTION")]
    retention: Option<u64>,

    /// Verify one address, print the result and exit.
    #[arg(long, conflicts_with = "probe")]
    verify: Option<String>,

    /// Run the Microsoft 365 federation probe for one address, print the result and exit.
    #[arg(long)]
    probe: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting up tracing subscriber failed")?;

    tracing::info!("Mailprobe v{} starting...", env!("CARGO_PKG_VERSION"));

    let args = AppArgs::parse();
    tracing::debug!("Parsed CLI arguments: {:?}", args);

    let config = Arc::new(build_config(&args)?);
    tracing::debug!("Effective configuration loaded: {:?}", *config);

    if let Some(ref email) = args.probe {
        return run_probe(&config, email).await;
    }

    let verifier = initialize_verifier(Arc::clone(&config))
        .map_err(|e| anyhow::anyhow!("Failed to initialize verifier: {}", e))?;

    if let Some(ref email) = args.verify {
        let result = verifier
            .verify(email)
            .await
            .with_context(|| format!("Verification of {} failed", email))?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if config.enable_smtp_check {
        match check_smtp_connectivity(&config).await {
            Ok(()) => tracing::info!("SMTP connectivity test passed (outbound port {} likely open).", config.smtp_port),
            Err(e) => {
                tracing::error!("SMTP connectivity test failed: {}", e);
                tracing::warn!("SMTP probes will likely come back inconclusive.");
            }
        }
    }

    serve(config, verifier).await
}

fn build_config(args: &AppArgs) -> Result<Config> {
    let mut config_builder = ConfigBuilder::new();

    if let Some(ref path) = args.config_file {
        config_builder = config_builder.config_file(path);
    }
    if let Some(ref addr) = args.listen {
        config_builder = config_builder.listen_addr(addr);
    }
    if let Some(c) = args.concurrency {
        config_builder = config_builder.max_concurrency(c);
    }
    if let Some(t) = args.request_timeout {
        config_builder = config_builder.request_timeout(Duration::from_secs(t));
    }
    if let Some(t) = args.dns_timeout {
        config_builder = config_builder.dns_timeout(Duration::from_secs(t));
    }
    if let Some(ref servers) = args.dns_servers {
        if !servers.is_empty() {
            config_builder = config_builder.dns_servers(servers.clone());
        }
    }
    if args.enable_smtp == Some(true) {
        config_builder = config_builder.enable_smtp_check(true);
    }
    if let Some(ref s) = args.smtp_sender {
        config_builder = config_builder.smtp_sender_email(s);
    }
    if let Some(t) = args.smtp_timeout {
        config_builder = config_builder.smtp_timeout(Duration::from_secs(t));
    }
    if let Some(secs) = args.retention {
        config_builder = config_builder.job_retention((secs > 0).then(|| Duration::from_secs(secs)));
    }

    config_builder.build().map_err(|e| {
        tracing::error!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to build configuration: {}", e)
    })
}

async fn run_probe(config: &Config, email: &str) -> Result<()> {
    let probe = FederationProbe::new(config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize federation probe: {}", e))?;
    let federated = probe
        .probe(email)
        .await
        .with_context(|| format!("Federation probe for {} failed", email))?;
    println!("{}", serde_json::to_string_pretty(&FederationCheck { federated })?);
    Ok(())
}

async fn serve(config: Arc<Config>, verifier: Arc<dyn VerificationSource>) -> Result<()> {
    let state = build_state(&config, verifier)
        .map_err(|e| anyhow::anyhow!("Failed to initialize server state: {}", e))?;
    let _sweeper = spawn_retention_sweeper(&config, &state);

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!("Listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received.");
}

//! DNS helpers: resolver construction and mail server lookup.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};

use std::net::IpAddr;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::TokioAsyncResolver;

/// The mail exchanger selected for a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MailServer {
    pub exchange: String,
    pub preference: u16,
}

/// Builds a resolver using the configured name servers, or the system defaults if none parse.
pub(crate) fn create_resolver(config: &Config) -> Result<TokioAsyncResolver> {
    let ips: Vec<IpAddr> = config
        .dns_servers
        .iter()
        .filter_map(|server| match server.trim().parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(e) => {
                tracing::warn!("Ignoring invalid DNS server '{}': {}", server, e);
                None
            }
        })
        .collect();

    let resolver_config = if ips.is_empty() {
        tracing::info!("Using default resolver configuration.");
        ResolverConfig::default()
    } else {
        tracing::debug!("Using DNS servers: {:?}", ips);
        ResolverConfig::from_parts(None, vec![], NameServerConfigGroup::from_ips_clear(&ips, 53, true))
    };

    let mut opts = ResolverOpts::default();
    opts.timeout = config.dns_timeout;
    opts.attempts = 2;

    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}

/// Finds the preferred mail server for `domain`.
///
/// Falls back to the domain itself when it has no MX records but does have an address record.
/// A null MX (`.`) means the domain accepts no mail.
pub(crate) async fn resolve_mail_server(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> Result<MailServer> {
    match resolver.mx_lookup(domain).await {
        Ok(lookup) => {
            let best = lookup
                .iter()
                .min_by_key(|mx| mx.preference())
                .map(|mx| MailServer {
                    exchange: mx.exchange().to_utf8().trim_end_matches('.').to_string(),
                    preference: mx.preference(),
                });
            match best {
                Some(server) if !server.exchange.is_empty() => {
                    tracing::debug!("MX for {}: {} (pref {})", domain, server.exchange, server.preference);
                    return Ok(server);
                }
                Some(_) => {
                    tracing::info!("Domain {} publishes a null MX; it accepts no mail.", domain);
                    return Err(AppError::NoDnsRecords(domain.to_string()));
                }
                None => {}
            }
        }
        Err(e) => match classify(domain, e) {
            AppError::NoDnsRecords(_) => {}
            other => return Err(other),
        },
    }

    tracing::debug!("No MX records for {}, trying address records.", domain);
    match resolver.lookup_ip(domain).await {
        Ok(ips) if ips.iter().next().is_some() => Ok(MailServer {
            exchange: domain.to_string(),
            preference: 0,
        }),
        Ok(_) => Err(AppError::NoDnsRecords(domain.to_string())),
        Err(e) => Err(classify(domain, e)),
    }
}

fn classify(domain: &str, error: ResolveError) -> AppError {
    let (no_records, nxdomain) = match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            (true, *response_code == ResponseCode::NXDomain)
        }
        _ => (false, false),
    };

    if nxdomain {
        AppError::NxDomain(domain.to_string())
    } else if no_records {
        AppError::NoDnsRecords(domain.to_string())
    } else {
        AppError::Dns(error)
    }
}

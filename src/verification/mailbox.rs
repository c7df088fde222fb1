//! The production [`VerificationSource`]: syntax, MX lookup and an optional SMTP probe.

use super::source::VerificationSource;
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{Reachability, SmtpDetails, VerificationResult};
use crate::utils::dns::{create_resolver, resolve_mail_server, MailServer};
use crate::utils::domain::{is_role_account, parse_syntax};
use crate::utils::smtp::{SmtpProbeResult, SmtpProber};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use trust_dns_resolver::TokioAsyncResolver;

pub struct MailboxVerifier {
    config: Arc<Config>,
    resolver: TokioAsyncResolver,
    smtp: Option<SmtpProber>,
}

impl MailboxVerifier {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let resolver = create_resolver(&config)?;
        let smtp = if config.enable_smtp_check {
            Some(SmtpProber::new(&config)?)
        } else {
            tracing::debug!(target: "verifier", "SMTP probing disabled; results stop at DNS.");
            None
        };

        Ok(Self {
            config,
            resolver,
            smtp,
        })
    }

    async fn lookup_mail_server(&self, domain: &str) -> Result<Option<MailServer>> {
        match resolve_mail_server(&self.resolver, domain).await {
            Ok(server) => Ok(Some(server)),
            Err(AppError::NxDomain(_)) | Err(AppError::NoDnsRecords(_)) => {
                tracing::info!(target: "verifier", "Domain {} has no mail server.", domain);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl VerificationSource for MailboxVerifier {
    async fn verify(&self, address: &str) -> Result<VerificationResult> {
        let start_time = Instant::now();
        let email = address.trim();

        let syntax = parse_syntax(&self.config, email);
        if !syntax.valid {
            tracing::debug!(target: "verifier", "Rejecting '{}': invalid syntax.", email);
            return Err(AppError::InvalidSyntax(email.to_string()));
        }
        let role_account = is_role_account(&self.config, &syntax.username);

        let mail_server = self.lookup_mail_server(&syntax.domain).await?;

        let smtp = match (&self.smtp, &mail_server) {
            (Some(prober), Some(server)) => {
                let probe = prober.probe(email, &syntax.domain, &server.exchange).await;
                Some(smtp_details(probe))
            }
            _ => None,
        };

        let result = VerificationResult {
            email: email.to_string(),
            reachable: reachability(mail_server.as_ref(), smtp.as_ref()),
            has_mx_records: mail_server.is_some(),
            mx_host: mail_server.map(|server| server.exchange),
            syntax,
            smtp,
            role_account,
        };

        tracing::debug!(target: "verifier",
            "Verified {} in {:.2?}: reachable={:?}", email, start_time.elapsed(), result.reachable
        );
        Ok(result)
    }

    fn max_concurrency(&self) -> usize {
        self.config.max_concurrency
    }
}

fn smtp_details(probe: SmtpProbeResult) -> SmtpDetails {
    SmtpDetails {
        host_exists: true,
        deliverable: probe.exists,
        catch_all: probe.is_catch_all,
        message: probe.message,
    }
}

fn reachability(mail_server: Option<&MailServer>, smtp: Option<&SmtpDetails>) -> Reachability {
    if mail_server.is_none() {
        return Reachability::No;
    }
    match smtp {
        Some(details) if details.catch_all => Reachability::Unknown,
        Some(details) => match details.deliverable {
            Some(true) => Reachability::Yes,
            Some(false) => Reachability::No,
            None => Reachability::Unknown,
        },
        None => Reachability::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> MailServer {
        MailServer {
            exchange: "mx.example.com".to_string(),
            preference: 10,
        }
    }

    fn details(deliverable: Option<bool>, catch_all: bool) -> SmtpDetails {
        SmtpDetails {
            host_exists: true,
            deliverable,
            catch_all,
            message: String::new(),
        }
    }

    #[test]
    fn test_reachability_rules() {
        assert_eq!(reachability(None, None), Reachability::No);
        assert_eq!(reachability(Some(&server()), None), Reachability::Unknown);
        assert_eq!(
            reachability(Some(&server()), Some(&details(Some(true), false))),
            Reachability::Yes
        );
        assert_eq!(
            reachability(Some(&server()), Some(&details(Some(false), false))),
            Reachability::No
        );
        assert_eq!(
            reachability(Some(&server()), Some(&details(None, true))),
            Reachability::Unknown
        );
    }

    #[tokio::test]
    async fn test_invalid_syntax_is_an_error() {
        let verifier = MailboxVerifier::new(Arc::new(Config::default())).unwrap();
        let err = verifier.verify("not-an-address").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidSyntax(_)));
        assert!(err.to_string().starts_with("email address syntax is invalid"));
    }

    #[tokio::test]
    async fn test_concurrency_comes_from_config() {
        let config = Config {
            max_concurrency: 3,
            ..Config::default()
        };
        let verifier = MailboxVerifier::new(Arc::new(config)).unwrap();
        assert_eq!(verifier.max_concurrency(), 3);
    }
}

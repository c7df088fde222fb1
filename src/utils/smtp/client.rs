//! Blocking SMTP conversation used to ask a mail server about a recipient.

use super::error::classify_smtp_error;
use super::SmtpProbeResult;
use crate::core::config::Config;
use crate::core::error::{AppError, Result};

use lettre::transport::smtp::client::SmtpConnection;
use lettre::transport::smtp::commands::{Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::response::{Code, Response, Severity};
use lettre::Address;
use rand::Rng;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

const CONNECTIVITY_TEST_SERVER: &str = "gmail-smtp-in.l.google.com";

/// Runs `MAIL FROM` / `RCPT TO` against a domain's mail server without sending any message.
#[derive(Debug, Clone)]
pub(crate) struct SmtpProber {
    sender: Address,
    port: u16,
    timeout: Duration,
}

impl SmtpProber {
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let sender = Address::from_str(&config.smtp_sender_email).map_err(|e| {
            AppError::Config(format!(
                "Invalid SMTP sender '{}': {}",
                config.smtp_sender_email, e
            ))
        })?;
        Ok(Self {
            sender,
            port: config.smtp_port,
            timeout: config.smtp_timeout,
        })
    }

    /// Asks `mail_server` whether it would accept mail for `email`.
    ///
    /// lettre's connection is synchronous, so the conversation runs on the blocking pool.
    pub(crate) async fn probe(&self, email: &str, domain: &str, mail_server: &str) -> SmtpProbeResult {
        let prober = self.clone();
        let (email, domain, server) = (email.to_string(), domain.to_string(), mail_server.to_string());

        match tokio::task::spawn_blocking(move || prober.probe_blocking(&email, &domain, &server)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(target: "smtp_task", "SMTP probe task for {} failed: {}", mail_server, e);
                SmtpProbeResult::inconclusive(format!("SMTP probe task failed: {}", e))
            }
        }
    }

    fn probe_blocking(&self, email: &str, domain: &str, mail_server: &str) -> SmtpProbeResult {
        let recipient = match Address::from_str(email) {
            Ok(address) => address,
            Err(e) => {
                return SmtpProbeResult::conclusive(false, format!("invalid recipient address: {}", e))
            }
        };

        let Some(socket_addr) = resolve_socket_addr(mail_server, self.port) else {
            return SmtpProbeResult::inconclusive(format!(
                "could not resolve mail server {}",
                mail_server
            ));
        };

        tracing::debug!(target: "smtp_task", "Connecting to {} ({}) for <{}>", mail_server, socket_addr, email);
        let hello = ClientId::Domain("localhost".to_string());
        let mut conn = match SmtpConnection::connect(socket_addr, Some(self.timeout), &hello, None, None) {
            Ok(conn) => conn,
            Err(e) => return classify_smtp_error(&e, mail_server),
        };

        let result = self.converse(&mut conn, &recipient, domain, mail_server);
        if let Err(e) = conn.quit() {
            tracing::debug!(target: "smtp_task", "QUIT to {} failed: {}", mail_server, e);
        }

        tracing::info!(target: "smtp_task",
            "SMTP result for <{}> via {}: exists={:?}, catch_all={}, msg='{}'",
            email, mail_server, result.exists, result.is_catch_all, result.message
        );
        result
    }

    fn converse(
        &self,
        conn: &mut SmtpConnection,
        recipient: &Address,
        domain: &str,
        mail_server: &str,
    ) -> SmtpProbeResult {
        match conn.command(Mail::new(Some(self.sender.clone()), vec![])) {
            Ok(response) if response.is_positive() => {}
            Ok(response) => {
                return SmtpProbeResult::inconclusive(format!(
                    "MAIL FROM rejected: {} {}",
                    response.code(),
                    joined_message(&response)
                ))
            }
            Err(e) => return classify_smtp_error(&e, mail_server),
        }

        let response = match conn.command(Rcpt::new(recipient.clone(), vec![])) {
            Ok(response) => response,
            Err(e) => return classify_smtp_error(&e, mail_server),
        };
        let code = response.code();
        let message = joined_message(&response);

        if code.severity == Severity::PositiveCompletion && accepts_anything(conn, domain, mail_server) {
            return SmtpProbeResult::catch_all(format!("accepted, but {} is catch-all: {} {}", domain, code, message));
        }

        evaluate_rcpt_response(code, &message)
    }
}

/// Sends `RCPT TO` for a random local part; acceptance means the domain takes any recipient.
fn accepts_anything(conn: &mut SmtpConnection, domain: &str, mail_server: &str) -> bool {
    let mut rng = rand::thread_rng();
    let probe = format!("mailprobe-{:x}{:x}@{}", rng.gen::<u32>(), rng.gen::<u32>(), domain);

    let Ok(address) = Address::from_str(&probe) else {
        tracing::warn!(target: "smtp_task", "Could not build catch-all probe address for {}", domain);
        return false;
    };

    match conn.command(Rcpt::new(address, vec![])) {
        Ok(response) if response.code().severity == Severity::PositiveCompletion => {
            tracing::info!(target: "smtp_task", "{} (MX {}) accepted random recipient {}", domain, mail_server, probe);
            true
        }
        Ok(_) => false,
        Err(e) => {
            tracing::debug!(target: "smtp_task", "Catch-all probe on {} rejected: {}", mail_server, e);
            false
        }
    }
}

/// Reads an `RCPT TO` reply that lettre returned as `Ok`.
///
/// lettre turns 4xx/5xx replies into `Err`, which `classify_smtp_error` handles; only the
/// positive arm is reached from `converse`.
fn evaluate_rcpt_response(code: Code, message: &str) -> SmtpProbeResult {
    match code.severity {
        Severity::PositiveCompletion => {
            SmtpProbeResult::conclusive(true, format!("SMTP accepted: {} {}", code, message))
        }
        Severity::PermanentNegativeCompletion => {
            SmtpProbeResult::conclusive(false, format!("SMTP rejected: {} {}", code, message))
        }
        Severity::TransientNegativeCompletion | Severity::PositiveIntermediate => {
            SmtpProbeResult::inconclusive(format!("SMTP deferred: {} {}", code, message))
        }
    }
}

fn joined_message(response: &Response) -> String {
    response.message().collect::<Vec<&str>>().join(" ")
}

fn resolve_socket_addr(host: &str, port: u16) -> Option<SocketAddr> {
    match (host, port).to_socket_addrs() {
        Ok(mut addrs) => addrs.next(),
        Err(e) => {
            tracing::warn!(target: "smtp_task", "Resolving {}:{} failed: {}", host, port, e);
            None
        }
    }
}

/// Checks that outbound SMTP connections are possible at all.
pub async fn test_smtp_connectivity(config: &Config) -> Result<()> {
    tracing::info!("Testing outbound SMTP (port {}) connectivity...", config.smtp_port);
    let (port, timeout) = (config.smtp_port, config.smtp_timeout);

    let outcome = tokio::task::spawn_blocking(move || -> Result<()> {
        let socket_addr = resolve_socket_addr(CONNECTIVITY_TEST_SERVER, port).ok_or_else(|| {
            AppError::Config(format!("Could not resolve {}", CONNECTIVITY_TEST_SERVER))
        })?;
        let hello = ClientId::Domain("localhost".to_string());
        let mut conn = SmtpConnection::connect(socket_addr, Some(timeout), &hello, None, None)?;
        conn.quit().ok();
        Ok(())
    })
    .await
    .map_err(|e| AppError::Task(e.to_string()))?;

    match outcome {
        Ok(()) => {
            tracing::info!("SMTP connectivity test successful ({}).", CONNECTIVITY_TEST_SERVER);
            Ok(())
        }
        Err(AppError::Smtp(e)) => {
            tracing::error!("SMTP connectivity test failed: {}", e);
            Err(AppError::SmtpInconclusive(format!(
                "cannot reach {} on port {}: {}",
                CONNECTIVITY_TEST_SERVER, port, e
            )))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lettre::transport::smtp::response::{Category, Detail};

    #[test]
    fn test_new_rejects_bad_sender() {
        let config = Config {
            smtp_sender_email: "not an address".to_string(),
            ..Config::default()
        };
        assert!(matches!(SmtpProber::new(&config), Err(AppError::Config(_))));
        assert!(SmtpProber::new(&Config::default()).is_ok());
    }

    #[test]
    fn test_evaluate_rcpt_response() {
        let ok = Code::new(Severity::PositiveCompletion, Category::MailSystem, Detail::Zero);
        let gone = Code::new(Severity::PermanentNegativeCompletion, Category::MailSystem, Detail::Zero);
        let later = Code::new(Severity::TransientNegativeCompletion, Category::MailSystem, Detail::One);

        assert_eq!(evaluate_rcpt_response(ok, "OK").exists, Some(true));
        assert_eq!(evaluate_rcpt_response(gone, "no such user").exists, Some(false));
        assert_eq!(evaluate_rcpt_response(later, "try later").exists, None);
    }

    #[tokio::test]
    async fn test_unresolvable_server_is_inconclusive() {
        let prober = SmtpProber::new(&Config::default()).unwrap();
        let result = prober
            .probe("a@example.invalid", "example.invalid", "mx.example.invalid")
            .await;
        assert_eq!(result.exists, None);
        assert!(!result.is_catch_all);
    }
}

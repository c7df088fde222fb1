//! Microsoft 365 federation probe.
//!
//! Two steps:
//! 1. Ask the Exchange Autodiscover service (`GetFederationInformation`) which domains are
//!    federated with the address's domain. A `*.onmicrosoft.com` entry names the tenant.
//! 2. Request the predicted OneDrive for Business URL of the user in that tenant:
//!    `https://{tenant}-my.sharepoint.com/personal/{user_path}_{domain_path}/...`.
//!    Status codes 200, 302, 401 and 403 are read as "this personal site exists".
//!
//! Discovery failures are errors because without the tenant nothing can be concluded. The
//! confirmation request never errors: anything other than a recognised status means "no".

use crate::core::config::Config;
use crate::core::error::{AppError, Result};

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_TYPE, USER_AGENT};
use reqwest::{redirect, Client, StatusCode};
use url::Url;

const SOAP_ACTION: &str = "\"http://schemas.microsoft.com/exchange/2010/Autodiscover/Autodiscover/GetFederationInformation\"";
const DISCOVERY_USER_AGENT: &str = "AutodiscoverClient";
const TENANT_SUFFIX: &str = "onmicrosoft.com";

/// Element path (local names) of each federated domain in the discovery response.
const DOMAIN_PATH: [&[u8]; 6] = [
    b"Envelope",
    b"Body",
    b"GetFederationInformationResponseMessage",
    b"Response",
    b"Domains",
    b"Domain",
];

/// Determines whether an address belongs to a Microsoft 365 tenant with a provisioned OneDrive.
#[derive(Clone)]
pub struct FederationProbe {
    discovery_client: Client,
    confirmation_client: Client,
    discovery_url: Url,
    confirmation_url_template: String,
}

impl FederationProbe {
    pub fn new(config: &Config) -> Result<Self> {
        let discovery_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                AppError::Initialization(format!("Failed to build discovery HTTP client: {}", e))
            })?;
        // 302 is one of the positive answers, so redirects must not be followed.
        let confirmation_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| {
                AppError::Initialization(format!(
                    "Failed to build confirmation HTTP client: {}",
                    e
                ))
            })?;

        Ok(Self {
            discovery_client,
            confirmation_client,
            discovery_url: Url::parse(&config.discovery_url)?,
            confirmation_url_template: config.confirmation_url_template.clone(),
        })
    }

    /// Returns `Ok(true)` if `email` appears to be a Microsoft 365 account.
    ///
    /// Input without an `@` is simply not federated.
    pub async fn probe(&self, email: &str) -> Result<bool> {
        let task_label = format!("[Federation Probe: {}]", email);

        let Some((user, domain)) = email.split_once('@') else {
            tracing::debug!(target: "federation_probe", "{} No '@' in input; not federated.", task_label);
            return Ok(false);
        };
        if domain.is_empty() {
            tracing::debug!(target: "federation_probe", "{} Empty domain; not federated.", task_label);
            return Ok(false);
        }

        let federated_domains = self.discover_domains(domain, &task_label).await?;
        let Some(tenant) = select_tenant(&federated_domains) else {
            tracing::info!(target: "federation_probe", "{} No {} domain among {} federated domains.",
                task_label, TENANT_SUFFIX, federated_domains.len());
            return Ok(false);
        };
        tracing::debug!(target: "federation_probe", "{} Tenant '{}' discovered.", task_label, tenant);

        let url = confirmation_url(&self.confirmation_url_template, tenant, user, domain);
        Ok(self.confirm(&url, &task_label).await)
    }

    async fn discover_domains(&self, domain: &str, task_label: &str) -> Result<Vec<String>> {
        tracing::debug!(target: "federation_probe", "{} Sending GetFederationInformation to {}", task_label, self.discovery_url);

        let response = self
            .discovery_client
            .post(self.discovery_url.clone())
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", SOAP_ACTION)
            .header(USER_AGENT, DISCOVERY_USER_AGENT)
            .header(ACCEPT_ENCODING, "identity")
            .body(discovery_request_body(domain, self.discovery_url.as_str()))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "federation_probe", "{} Discovery request failed: {}", task_label, e);
                AppError::Protocol(format!("discovery request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::Protocol(format!("failed to read discovery response: {}", e))
        })?;
        tracing::debug!(target: "federation_probe", "{} Discovery answered {} ({} bytes).", task_label, status, body.len());

        parse_federation_domains(&body).inspect_err(|e| {
            tracing::error!(target: "federation_probe", "{} Unreadable discovery response (status {}): {}", task_label, status, e);
        })
    }

    async fn confirm(&self, url: &str, task_label: &str) -> bool {
        let url = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(target: "federation_probe", "{} Confirmation URL '{}' is invalid: {}", task_label, url, e);
                return false;
            }
        };

        tracing::debug!(target: "federation_probe", "{} Sending GET to {}", task_label, url);
        match self.confirmation_client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                let exists = is_existence_status(status);
                tracing::info!(target: "federation_probe", "{} Confirmation status {} => federated={}", task_label, status, exists);
                exists
            }
            Err(e) => {
                if e.is_timeout() {
                    tracing::warn!(target: "federation_probe", "{} Confirmation timed out: {}", task_label, e);
                } else {
                    tracing::warn!(target: "federation_probe", "{} Confirmation failed: {}", task_label, e);
                }
                false
            }
        }
    }
}

fn is_existence_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::FOUND
    )
}

/// First `*.onmicrosoft.com` entry's leading label.
fn select_tenant(domains: &[String]) -> Option<&str> {
    domains
        .iter()
        .filter(|d| d.to_ascii_lowercase().ends_with(TENANT_SUFFIX))
        .filter_map(|d| d.split('.').next())
        .find(|tenant| !tenant.is_empty())
}

/// Fills the template; dots in the user and domain become underscores, as in OneDrive paths.
fn confirmation_url(template: &str, tenant: &str, user: &str, domain: &str) -> String {
    template
        .replace("{tenant}", tenant)
        .replace("{user}", &user.replace('.', "_"))
        .replace("{domain}", &domain.replace('.', "_"))
}

fn discovery_request_body(domain: &str, endpoint: &str) -> String {
    let domain = quick_xml::escape::escape(domain);
    let endpoint = quick_xml::escape::escape(endpoint);
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:exm="http://schemas.microsoft.com/exchange/services/2006/messages" xmlns:ext="http://schemas.microsoft.com/exchange/services/2006/types" xmlns:a="http://www.w3.org/2005/08/addressing" xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
    <soap:Header>
        <a:Action soap:mustUnderstand="1">http://schemas.microsoft.com/exchange/2010/Autodiscover/Autodiscover/GetFederationInformation</a:Action>
        <a:To soap:mustUnderstand="1">{endpoint}</a:To>
        <a:ReplyTo>
            <a:Address>http://www.w3.org/2005/08/addressing/anonymous</a:Address>
        </a:ReplyTo>
    </soap:Header>
    <soap:Body>
        <GetFederationInformationRequestMessage xmlns="http://schemas.microsoft.com/exchange/2010/Autodiscover">
            <Request>
                <Domain>{domain}</Domain>
            </Request>
        </GetFederationInformationRequestMessage>
    </soap:Body>
</soap:Envelope>
"#
    )
}

/// Extracts the federated domain list from a `GetFederationInformation` response.
///
/// Namespace prefixes are ignored. The document root must be an `Envelope`; reading stops once
/// it closes, so trailing content is ignored. Character data of one `<Domain>` is joined across
/// comments and CDATA sections. Anything that is not well-formed XML up to the end of the root is
/// a protocol error. A well-formed envelope without a domain list yields an empty list.
pub(crate) fn parse_federation_domains(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);

    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut saw_root = false;
    let mut domains = Vec::new();
    let mut domain_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if path.is_empty() {
                    check_root(&name)?;
                    saw_root = true;
                }
                path.push(name);
                if at_domain(&path) {
                    domain_text.clear();
                }
            }
            Ok(Event::Empty(e)) => {
                if path.is_empty() {
                    check_root(e.local_name().as_ref())?;
                    return Ok(domains);
                }
            }
            Ok(Event::End(_)) => {
                if at_domain(&path) {
                    push_domain(&mut domains, &domain_text);
                    domain_text.clear();
                }
                path.pop();
                if path.is_empty() {
                    return Ok(domains);
                }
            }
            Ok(Event::Text(t)) if at_domain(&path) => {
                let text = t
                    .unescape()
                    .map_err(|e| AppError::Protocol(format!("bad text in <Domain>: {}", e)))?;
                domain_text.push_str(&text);
            }
            Ok(Event::CData(c)) if at_domain(&path) => {
                domain_text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(AppError::Protocol(format!(
                    "malformed XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        }
    }

    if !saw_root {
        return Err(AppError::Protocol(
            "response does not contain an XML document".to_string(),
        ));
    }
    Err(AppError::Protocol("unexpected end of XML document".to_string()))
}

fn check_root(name: &[u8]) -> Result<()> {
    if name != b"Envelope" {
        return Err(AppError::Protocol(format!(
            "expected element <Envelope> but found <{}>",
            String::from_utf8_lossy(name)
        )));
    }
    Ok(())
}

fn at_domain(path: &[Vec<u8>]) -> bool {
    path.len() == DOMAIN_PATH.len()
        && path
            .iter()
            .zip(DOMAIN_PATH.iter())
            .all(|(actual, expected)| actual.as_slice() == *expected)
}

fn push_domain(domains: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        domains.push(text.to_string());
    }
}

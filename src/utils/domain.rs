//! Utility functions for splitting and classifying email addresses.

use crate::core::config::Config;
use crate::core::models::SyntaxDetails;

/// Splits an address at its last `@` into local part and domain.
///
/// Returns `None` when either side would be empty.
pub(crate) fn split_address(address: &str) -> Option<(&str, &str)> {
    let (username, domain) = address.rsplit_once('@')?;
    if username.is_empty() || domain.is_empty() {
        return None;
    }
    Some((username, domain))
}

/// Lowercases a domain and strips a trailing root dot.
pub(crate) fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_lowercase()
}

/// Checks `address` against the configured email pattern and splits it.
pub(crate) fn parse_syntax(config: &Config, address: &str) -> SyntaxDetails {
    let trimmed = address.trim();
    tracing::trace!("Checking syntax of '{}'", trimmed);

    match split_address(trimmed) {
        Some((username, domain)) => SyntaxDetails {
            username: username.to_string(),
            domain: normalize_domain(domain),
            valid: config.email_regex.is_match(trimmed),
        },
        None => SyntaxDetails {
            username: String::new(),
            domain: String::new(),
            valid: false,
        },
    }
}

/// Whether the local part is a shared mailbox such as `info` or `support`.
pub(crate) fn is_role_account(config: &Config, username: &str) -> bool {
    let local = username.to_lowercase();
    let base = local.split('+').next().unwrap_or(&local);
    config.generic_email_prefixes.contains(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_address() {
        assert_eq!(split_address("john@example.com"), Some(("john", "example.com")));
        assert_eq!(
            split_address("\"odd@local\"@example.com"),
            Some(("\"odd@local\"", "example.com"))
        );
        assert_eq!(split_address("no-at-sign"), None);
        assert_eq!(split_address("@example.com"), None);
        assert_eq!(split_address("john@"), None);
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("Example.COM."), "example.com");
        assert_eq!(normalize_domain(" sub.example.org "), "sub.example.org");
    }

    #[test]
    fn test_parse_syntax_valid() {
        let config = Config::default();
        let syntax = parse_syntax(&config, " John.Doe@Example.com ");
        assert!(syntax.valid);
        assert_eq!(syntax.username, "John.Doe");
        assert_eq!(syntax.domain, "example.com");
    }

    #[test]
    fn test_parse_syntax_invalid() {
        let config = Config::default();
        assert!(!parse_syntax(&config, "bad-address").valid);
        assert!(!parse_syntax(&config, "john@localhost").valid);
        assert!(!parse_syntax(&config, "john doe@example.com").valid);
        assert!(!parse_syntax(&config, "john@-example.com").valid);
        assert!(!parse_syntax(&config, "").valid);
    }

    #[test]
    fn test_role_accounts() {
        let config = Config::default();
        assert!(is_role_account(&config, "info"));
        assert!(is_role_account(&config, "Support+billing"));
        assert!(!is_role_account(&config, "jane"));
    }
}

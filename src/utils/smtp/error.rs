//! Classification of lettre SMTP errors raised mid-conversation.

use super::SmtpProbeResult;
use lettre::transport::smtp::Error as SmtpError;

const UNKNOWN_USER_PHRASES: &[&str] = &[
    "does not exist",
    "no such user",
    "user unknown",
    "recipient not found",
    "invalid mailbox",
    "mailbox unavailable",
    "address rejected",
    "invalid recipient",
    "nosuchuser",
];

/// Maps an error from a connect or command call onto a probe result.
///
/// Only a 550 naming an unknown recipient is treated as a definite answer.
pub(crate) fn classify_smtp_error(error: &SmtpError, server: &str) -> SmtpProbeResult {
    classify_error_text(&error.to_string(), server)
}

fn classify_error_text(text: &str, server: &str) -> SmtpProbeResult {
    let lowered = text.to_lowercase();

    if lowered.contains("550") && UNKNOWN_USER_PHRASES.iter().any(|p| lowered.contains(p)) {
        tracing::info!(target: "smtp_task", "{} rejected the recipient: {}", server, text);
        return SmtpProbeResult::conclusive(false, format!("SMTP rejected recipient: {}", text));
    }

    if lowered.contains("starttls") || (lowered.contains("530") && lowered.contains("5.7.0")) {
        tracing::warn!(target: "smtp_task", "{} requires STARTTLS: {}", server, text);
        return SmtpProbeResult::inconclusive(format!("server requires TLS: {}", text));
    }

    if lowered.contains("timed out")
        || lowered.contains("connection refused")
        || lowered.contains("network is unreachable")
    {
        tracing::error!(target: "smtp_task", "Could not reach {}: {}. Outbound port 25 may be blocked.", server, text);
        return SmtpProbeResult::inconclusive(format!("connection failed ({}), port 25 blocked?", text));
    }

    if lowered.contains("greylist") || lowered.contains("temporar") || lowered.contains("transient") {
        tracing::warn!(target: "smtp_task", "Transient SMTP error from {}: {}", server, text);
        return SmtpProbeResult::inconclusive(format!("SMTP transient error: {}", text));
    }

    tracing::warn!(target: "smtp_task", "Unclassified SMTP error from {}: {}", server, text);
    SmtpProbeResult::inconclusive(format!("SMTP error: {}", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_user_is_conclusive() {
        let result = classify_error_text("permanent error (550): 5.1.1 User unknown", "mx.test");
        assert_eq!(result.exists, Some(false));
    }

    #[test]
    fn test_policy_550_stays_inconclusive() {
        let result = classify_error_text("permanent error (550): spam policy", "mx.test");
        assert_eq!(result.exists, None);
    }

    #[test]
    fn test_network_errors_are_inconclusive() {
        for text in [
            "Connection refused (os error 111)",
            "operation timed out",
            "Must issue a STARTTLS command first",
            "transient error (451): greylisted, try again",
        ] {
            let result = classify_error_text(text, "mx.test");
            assert_eq!(result.exists, None, "{}", text);
            assert!(!result.is_catch_all);
        }
    }
}

//! Semantic checks on a parsed configuration.
//!
//! Parsing already rejects malformed files; these checks catch values that
//! parse fine but will misbehave at runtime (duplicate channel ids, missing
//! SMTP settings, unknown log levels).

use std::{collections::HashSet, fmt};

use secrecy::ExposeSecret;

use crate::schema::{ChannelConfig, HeraldConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "channels[1].smtp_port"
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn push(&mut self, severity: Severity, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate a parsed configuration.
pub fn validate(config: &HeraldConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !LOG_LEVELS.contains(&config.log_level.to_ascii_lowercase().as_str()) {
        result.push(
            Severity::Warning,
            "log_level",
            format!("unknown level '{}', info is used", config.log_level),
        );
    }
    if config.alerts_path.trim().is_empty() {
        result.push(Severity::Error, "alerts_path", "must not be empty");
    }
    if let Some(tz) = &config.scheduler.timezone
        && tz.parse::<chrono_tz::Tz>().is_err()
    {
        result.push(
            Severity::Error,
            "scheduler.timezone",
            format!("unknown timezone '{tz}'"),
        );
    }
    if config.dispatch.workers == 0 {
        result.push(Severity::Error, "dispatch.workers", "must be at least 1");
    }
    if config.dispatch.queue_capacity == 0 {
        result.push(Severity::Error, "dispatch.queue_capacity", "must be at least 1");
    }

    let mut seen = HashSet::new();
    for (i, channel) in config.channels.iter().enumerate() {
        let path = format!("channels[{i}]");
        if channel.id().is_empty() {
            result.push(Severity::Error, format!("{path}.id"), "must not be empty");
        } else if !seen.insert(channel.id()) {
            result.push(
                Severity::Warning,
                format!("{path}.id"),
                format!("duplicate channel id '{}', the last definition wins", channel.id()),
            );
        }
        match channel {
            ChannelConfig::Email(email) => {
                if email.smtp_host.is_empty() {
                    result.push(Severity::Error, format!("{path}.smtp_host"), "is required");
                }
                if email.smtp_port == 0 {
                    result.push(Severity::Error, format!("{path}.smtp_port"), "is required");
                }
                if email.smtp_auth_user.is_empty() || email.smtp_auth_pass.expose_secret().is_empty()
                {
                    result.push(
                        Severity::Warning,
                        format!("{path}.smtp_auth_user"),
                        "no SMTP credentials (set SMTP_AUTH_USER / SMTP_AUTH_PASS)",
                    );
                }
                if email.max_msg_size == Some(0) {
                    result.push(Severity::Error, format!("{path}.max_msg_size"), "must be > 0");
                }
            },
            ChannelConfig::Webhook(hook) => {
                if url::Url::parse(&hook.url).is_err() {
                    result.push(
                        Severity::Error,
                        format!("{path}.url"),
                        format!("invalid url '{}'", hook.url),
                    );
                }
                if hook.max_msg_size == Some(0) {
                    result.push(Severity::Error, format!("{path}.max_msg_size"), "must be > 0");
                }
            },
        }
    }

    result
}

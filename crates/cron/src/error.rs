use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid cron expression '{expr}': {message}")]
    InvalidExpression { expr: String, message: String },

    #[error("unknown timezone: {timezone}")]
    UnknownTimezone { timezone: String },

    #[error("trigger not found: {id}")]
    TriggerNotFound { id: u64 },
}

impl Error {
    #[must_use]
    pub fn invalid_expression(expr: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::InvalidExpression {
            expr: expr.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_timezone(timezone: impl Into<String>) -> Self {
        Self::UnknownTimezone {
            timezone: timezone.into(),
        }
    }

    #[must_use]
    pub fn trigger_not_found(id: u64) -> Self {
        Self::TriggerNotFound { id }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

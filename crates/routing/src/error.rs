use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no alert with id '{alert_id}'")]
    NotFound { alert_id: String },

    #[error("invalid alert definition: {message}")]
    Validation { message: String },

    #[error("{message}")]
    Message { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] herald_config::Error),

    #[error(transparent)]
    Cron(#[from] herald_cron::Error),
}

impl Error {
    #[must_use]
    pub fn not_found(alert_id: impl Into<String>) -> Self {
        Self::NotFound {
            alert_id: alert_id.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl std::fmt::Display) -> Self {
        Self::Validation {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// Whether the error was caused by the caller's input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl herald_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

herald_common::impl_context!();

use std::error::Error as StdError;

/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed channel errors shared across channel kinds.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Mandatory channel configuration is missing or malformed.
    #[error("channel '{channel_id}' is misconfigured: {message}")]
    Configuration { channel_id: String, message: String },

    /// Delivery parameters do not fit the channel.
    #[error("invalid delivery input: {message}")]
    InvalidInput { message: String },

    /// `deliver` was called before `initialize`.
    #[error("channel '{channel_id}' is not initialized")]
    NotInitialized { channel_id: String },

    /// The remote side rejected the delivery.
    #[error("delivery via '{channel_id}' failed: {message}")]
    Delivery { channel_id: String, message: String },

    /// Wrapped source error from the transport.
    #[error("channel operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn configuration(channel_id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Configuration {
            channel_id: channel_id.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn not_initialized(channel_id: impl Into<String>) -> Self {
        Self::NotInitialized {
            channel_id: channel_id.into(),
        }
    }

    #[must_use]
    pub fn delivery(channel_id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Delivery {
            channel_id: channel_id.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether the error comes from configuration rather than delivery.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    /// Alert IDs double as file names, so only a safe subset is accepted.
    #[error("invalid alert id '{alert_id}': use letters, digits, '.', '_' or '-'")]
    InvalidAlertId { alert_id: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    #[must_use]
    pub fn invalid_alert_id(alert_id: impl Into<String>) -> Self {
        Self::InvalidAlertId {
            alert_id: alert_id.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can be built from a bare message.
///
/// Every herald crate implements this for its `Error` so that
/// [`impl_context!`] can turn foreign errors (I/O, YAML, cron parsing) into a
/// `Message` variant prefixed with what was being attempted.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Expands to a module-local `Context` trait with `.context()` and
/// `.with_context()` on `Result` and `Option`, producing the module's own
/// `Result<T>`. The calling module must define `Error: FromMessage` and the
/// `Result<T>` alias.
///
/// ```ignore
/// // crates/routing/src/error.rs
/// herald_common::impl_context!();
///
/// // crates/routing/src/store_yaml.rs
/// fs::rename(&tmp, path)
///     .await
///     .with_context(|| format!("failed to replace {}", path.display()))?;
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;
            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                let ctx = context.into();
                self.map_err(|source| {
                    <Error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.map_err(|source| {
                    let ctx = f().into();
                    <Error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }
        }

        impl<T> Context<T> for Option<T> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(context.into()))
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(f().into()))
            }
        }
    };
}

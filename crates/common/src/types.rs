//! Types shared between the channel, routing and gateway crates.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A fired alert on its way to a delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub alert_id: String,
    pub message: String,
}

impl AlertEvent {
    pub fn new(alert_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            alert_id: alert_id.into(),
            message: message.into(),
        }
    }
}

/// Channel-specific parameters carried by a schedule entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryParams {
    /// Recipient list for an email channel.
    Email { recipients: Vec<String> },
    /// No channel-specific parameters (webhook).
    #[default]
    None,
}

impl DeliveryParams {
    /// Build parameters from an optional recipient list.
    pub fn from_recipients(recipients: &[String]) -> Self {
        if recipients.is_empty() {
            Self::None
        } else {
            Self::Email {
                recipients: recipients.to_vec(),
            }
        }
    }
}

/// Check that an alert ID is usable as a table key and as a file name.
pub fn validate_alert_id(alert_id: &str) -> Result<()> {
    let mut chars = alert_id.chars();
    let valid_first = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid_first && valid_rest {
        Ok(())
    } else {
        Err(Error::invalid_alert_id(alert_id))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_map_to_email_params() {
        let params = DeliveryParams::from_recipients(&["ops@example.com".into()]);
        assert_eq!(params, DeliveryParams::Email {
            recipients: vec!["ops@example.com".into()],
        });
        assert_eq!(DeliveryParams::from_recipients(&[]), DeliveryParams::None);
    }

    #[test]
    fn delivery_params_serialize_tagged() {
        let v = serde_json::to_value(DeliveryParams::None).unwrap();
        assert_eq!(v["kind"], "none");
    }

    #[test]
    fn accepts_plain_alert_ids() {
        for id in ["db-down", "nightly", "watcher1.yml", "A_1"] {
            assert!(validate_alert_id(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn rejects_path_like_alert_ids() {
        for id in ["", "../etc", ".hidden", "a/b", "a b", "-x"] {
            assert!(validate_alert_id(id).is_err(), "{id:?} should be rejected");
        }
    }
}

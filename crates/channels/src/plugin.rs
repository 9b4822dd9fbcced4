use {
    async_trait::async_trait,
    herald_common::{AlertEvent, DeliveryParams},
    serde::Serialize,
};

use crate::Result;

/// Core delivery channel trait. Each channel kind implements this.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Channel identifier referenced by schedule entries (e.g. "gmail").
    fn id(&self) -> &str;

    /// Channel kind name ("email", "webhook").
    fn kind(&self) -> &'static str;

    /// Validate configuration and build the transport. Called once, before
    /// the channel is shared.
    fn initialize(&mut self) -> Result<()>;

    /// Resolved configuration with defaults applied. Never includes secrets.
    fn describe(&self) -> ChannelDescription;

    /// Deliver one alert event.
    async fn deliver(&self, event: &AlertEvent, params: &DeliveryParams) -> Result<()>;
}

/// Configuration snapshot of a channel, as reported by the management API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelDescription {
    Email {
        id: String,
        smtp_host: String,
        smtp_port: u16,
        smtp_auth_user: String,
        starttls: bool,
        from: String,
        msg_hdr: String,
        max_msg_size: usize,
    },
    Webhook {
        id: String,
        url: String,
        max_msg_size: usize,
    },
}

impl ChannelDescription {
    pub fn id(&self) -> &str {
        match self {
            Self::Email { id, .. } | Self::Webhook { id, .. } => id,
        }
    }
}

/// Cut `message` to at most `max` bytes, backing off to the previous char
/// boundary so the result stays valid UTF-8.
pub fn truncate_message(message: &str, max: usize) -> &str {
    if message.len() <= max {
        return message;
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

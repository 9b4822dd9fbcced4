use {
    herald_config::ChannelConfig,
    std::{collections::HashMap, sync::Arc},
    tracing::{info, warn},
};

use crate::{
    Result,
    email::EmailChannel,
    plugin::{ChannelDescription, DeliveryChannel},
    webhook::WebhookChannel,
};

/// Registry of all initialized delivery channels, keyed by channel id.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: HashMap<String, Arc<dyn DeliveryChannel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and initialize every configured channel, in order.
    ///
    /// A later definition with the same id replaces the earlier one. Any
    /// initialization failure aborts the whole build.
    pub fn from_config(configs: &[ChannelConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            let channel: Arc<dyn DeliveryChannel> = match config {
                ChannelConfig::Email(c) => {
                    let mut ch = EmailChannel::new(c.clone());
                    ch.initialize()?;
                    Arc::new(ch)
                },
                ChannelConfig::Webhook(c) => {
                    let mut ch = WebhookChannel::new(c.clone());
                    ch.initialize()?;
                    Arc::new(ch)
                },
            };
            registry.register(channel);
        }
        info!(channels = registry.len(), "channel registry built");
        Ok(registry)
    }

    /// Insert an initialized channel, returning the one it replaced.
    pub fn register(&mut self, channel: Arc<dyn DeliveryChannel>) -> Option<Arc<dyn DeliveryChannel>> {
        let id = channel.id().to_string();
        let previous = self.channels.insert(id.clone(), channel);
        if previous.is_some() {
            warn!(channel = %id, "duplicate channel id, replacing earlier definition");
        }
        previous
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn DeliveryChannel>> {
        self.channels.get(id).cloned()
    }

    /// Channel ids, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Descriptions of every channel, sorted by id.
    pub fn describe_all(&self) -> Vec<ChannelDescription> {
        self.list()
            .into_iter()
            .filter_map(|id| self.channels.get(id).map(|c| c.describe()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

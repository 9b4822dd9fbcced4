use {
    async_trait::async_trait,
    herald_common::{AlertEvent, DeliveryParams},
    herald_config::schema::{DEFAULT_MAX_MSG_SIZE, WebhookChannelConfig},
    serde_json::json,
    tracing::debug,
    url::Url,
};

use crate::{
    Error, Result,
    plugin::{ChannelDescription, DeliveryChannel, truncate_message},
};

/// Posts `{"text": "<alert_id>: <message>"}` to a fixed URL.
pub struct WebhookChannel {
    config: WebhookChannelConfig,
    url: Option<Url>,
    http: Option<reqwest::Client>,
}

impl WebhookChannel {
    pub fn new(config: WebhookChannelConfig) -> Self {
        Self {
            config,
            url: None,
            http: None,
        }
    }

    fn max_msg_size(&self) -> usize {
        self.config.max_msg_size.unwrap_or(DEFAULT_MAX_MSG_SIZE)
    }

    fn payload(&self, event: &AlertEvent) -> serde_json::Value {
        let message = truncate_message(&event.message, self.max_msg_size());
        json!({ "text": format!("{}: {}", event.alert_id, message) })
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn kind(&self) -> &'static str {
        "webhook"
    }

    fn initialize(&mut self) -> Result<()> {
        let id = self.config.id.clone();
        let url = Url::parse(&self.config.url)
            .map_err(|e| Error::configuration(&id, format!("bad url '{}': {e}", self.config.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration(
                id,
                format!("url scheme must be http or https, got '{}'", url.scheme()),
            ));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::external("failed to build http client", e))?;

        debug!(channel = %id, url = %url, "webhook channel initialized");
        self.url = Some(url);
        self.http = Some(http);
        Ok(())
    }

    fn describe(&self) -> ChannelDescription {
        ChannelDescription::Webhook {
            id: self.config.id.clone(),
            url: self.config.url.clone(),
            max_msg_size: self.max_msg_size(),
        }
    }

    async fn deliver(&self, event: &AlertEvent, _params: &DeliveryParams) -> Result<()> {
        let (Some(url), Some(http)) = (&self.url, &self.http) else {
            return Err(Error::not_initialized(&self.config.id));
        };

        let resp = http
            .post(url.clone())
            .json(&self.payload(event))
            .send()
            .await
            .map_err(|e| Error::delivery(&self.config.id, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::delivery(
                &self.config.id,
                format!("webhook returned {status}: {body}"),
            ));
        }

        debug!(channel = %self.config.id, alert_id = %event.alert_id, "webhook delivered");
        Ok(())
    }
}

//! SMTP delivery channel.
//!
//! The message is sent raw: the configured header block, the alert ID, a CRLF
//! and the (truncated) message text. Recipients come from the schedule entry.

use {
    async_trait::async_trait,
    herald_common::{AlertEvent, DeliveryParams},
    herald_config::schema::{
        DEFAULT_EMAIL_FROM, DEFAULT_EMAIL_MSG_HDR, DEFAULT_MAX_MSG_SIZE, EmailChannelConfig,
    },
    lettre::{
        Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor, address::Envelope,
        transport::smtp::authentication::Credentials,
    },
    secrecy::ExposeSecret,
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    plugin::{ChannelDescription, DeliveryChannel, truncate_message},
};

pub struct EmailChannel {
    config: EmailChannelConfig,
    sender: Option<Address>,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl EmailChannel {
    pub fn new(config: EmailChannelConfig) -> Self {
        Self {
            config,
            sender: None,
            transport: None,
        }
    }

    fn from_addr(&self) -> &str {
        self.config.from.as_deref().unwrap_or(DEFAULT_EMAIL_FROM)
    }

    fn msg_hdr(&self) -> &str {
        self.config.msg_hdr.as_deref().unwrap_or(DEFAULT_EMAIL_MSG_HDR)
    }

    fn max_msg_size(&self) -> usize {
        self.config.max_msg_size.unwrap_or(DEFAULT_MAX_MSG_SIZE)
    }

    /// Raw message bytes as written to the SMTP DATA command.
    pub(crate) fn raw_message(&self, event: &AlertEvent) -> String {
        format!(
            "{}{}\r\n{}",
            self.msg_hdr(),
            event.alert_id,
            truncate_message(&event.message, self.max_msg_size())
        )
    }

    fn envelope(&self, recipients: &[String]) -> Result<Envelope> {
        let sender = self
            .sender
            .clone()
            .ok_or_else(|| Error::not_initialized(&self.config.id))?;
        let to = recipients
            .iter()
            .map(|r| {
                r.parse::<Address>()
                    .map_err(|e| Error::invalid_input(format!("bad recipient '{r}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Envelope::new(Some(sender), to).map_err(Error::invalid_input)
    }
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn kind(&self) -> &'static str {
        "email"
    }

    fn initialize(&mut self) -> Result<()> {
        let id = self.config.id.clone();
        if self.config.smtp_host.is_empty() {
            return Err(Error::configuration(id, "smtp_host is required"));
        }
        if self.config.smtp_port == 0 {
            return Err(Error::configuration(id, "smtp_port is required"));
        }

        let sender = self
            .from_addr()
            .parse::<Address>()
            .map_err(|e| Error::configuration(&id, format!("bad sender address: {e}")))?;

        let host = self.config.smtp_host.as_str();
        let builder = if self.config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| Error::configuration(&id, e))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        let mut builder = builder.port(self.config.smtp_port);
        if self.config.smtp_auth_user.is_empty() {
            warn!(channel = %id, "no SMTP credentials configured");
        } else {
            builder = builder.credentials(Credentials::new(
                self.config.smtp_auth_user.clone(),
                self.config.smtp_auth_pass.expose_secret().clone(),
            ));
        }

        self.sender = Some(sender);
        self.transport = Some(builder.build());
        debug!(channel = %id, host, port = self.config.smtp_port, "email channel initialized");
        Ok(())
    }

    fn describe(&self) -> ChannelDescription {
        ChannelDescription::Email {
            id: self.config.id.clone(),
            smtp_host: self.config.smtp_host.clone(),
            smtp_port: self.config.smtp_port,
            smtp_auth_user: self.config.smtp_auth_user.clone(),
            starttls: self.config.starttls,
            from: self.from_addr().to_string(),
            msg_hdr: self.msg_hdr().to_string(),
            max_msg_size: self.max_msg_size(),
        }
    }

    async fn deliver(&self, event: &AlertEvent, params: &DeliveryParams) -> Result<()> {
        let recipients = match params {
            DeliveryParams::Email { recipients } if !recipients.is_empty() => recipients,
            DeliveryParams::Email { .. } | DeliveryParams::None => {
                return Err(Error::invalid_input(format!(
                    "email channel '{}' needs at least one recipient",
                    self.config.id
                )));
            },
        };
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| Error::not_initialized(&self.config.id))?;

        let envelope = self.envelope(recipients)?;
        let body = self.raw_message(event);
        transport
            .send_raw(&envelope, body.as_bytes())
            .await
            .map_err(|e| Error::delivery(&self.config.id, e))?;

        debug!(
            channel = %self.config.id,
            alert_id = %event.alert_id,
            recipients = recipients.len(),
            "email sent"
        );
        Ok(())
    }
}

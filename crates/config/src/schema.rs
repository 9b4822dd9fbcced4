/// Config schema types (server, logging, scheduler, dispatch, channels).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Default cap on the message portion of a delivered alert, in bytes.
pub const DEFAULT_MAX_MSG_SIZE: usize = 160;

/// Default sender address for email channels.
pub const DEFAULT_EMAIL_FROM: &str = "alerts@gregland.dev";

/// Default raw header block prepended to every email body.
pub const DEFAULT_EMAIL_MSG_HDR: &str = "To: alerts@gregland.dev\r\nSubject: ";

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    pub server: ServerConfig,
    /// Directory holding one persisted alert definition per file.
    pub alerts_path: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    pub log_format: LogFormat,
    pub scheduler: SchedulerConfig,
    pub dispatch: DispatchConfig,
    /// Ordered channel definitions. A later duplicate id replaces an earlier one.
    pub channels: Vec<ChannelConfig>,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            alerts_path: "/etc/herald/alerts.d".into(),
            log_level: "info".into(),
            log_format: LogFormat::default(),
            scheduler: SchedulerConfig::default(),
            dispatch: DispatchConfig::default(),
            channels: Vec::new(),
        }
    }
}

/// HTTP management server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0".
    pub bind: String,
    /// Port to listen on. Defaults to 8000.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// IANA timezone for start/end expressions (e.g. "Europe/Paris").
    /// Local time when unset.
    pub timezone: Option<String>,
}

/// Delivery worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of deliveries running at the same time.
    pub workers: usize,
    /// Maximum number of deliveries waiting for a worker.
    pub queue_capacity: usize,
    /// Per-delivery timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 16,
            queue_capacity: 1024,
            timeout_secs: 30,
        }
    }
}

/// A configured delivery channel, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelConfig {
    Email(EmailChannelConfig),
    Webhook(WebhookChannelConfig),
}

impl ChannelConfig {
    /// Channel identifier referenced by schedule entries.
    pub fn id(&self) -> &str {
        match self {
            Self::Email(c) => &c.id,
            Self::Webhook(c) => &c.id,
        }
    }

    /// Channel kind name as written in the config file.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Email(_) => "email",
            Self::Webhook(_) => "webhook",
        }
    }
}

/// SMTP delivery channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailChannelConfig {
    pub id: String,
    /// Required.
    pub smtp_host: String,
    /// Required.
    pub smtp_port: u16,
    /// Falls back to `SMTP_AUTH_USER` when empty.
    pub smtp_auth_user: String,
    /// Falls back to `SMTP_AUTH_PASS` when empty.
    #[serde(serialize_with = "serialize_secret")]
    pub smtp_auth_pass: Secret<String>,
    /// Upgrade the connection with STARTTLS. Defaults to true.
    pub starttls: bool,
    /// Sender address. Defaults to [`DEFAULT_EMAIL_FROM`].
    pub from: Option<String>,
    /// Raw header block written before the alert ID.
    pub msg_hdr: Option<String>,
    /// Defaults to [`DEFAULT_MAX_MSG_SIZE`].
    pub max_msg_size: Option<usize>,
}

impl Default for EmailChannelConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            smtp_host: String::new(),
            smtp_port: 0,
            smtp_auth_user: String::new(),
            smtp_auth_pass: Secret::new(String::new()),
            starttls: true,
            from: None,
            msg_hdr: None,
            max_msg_size: None,
        }
    }
}

/// HTTP webhook delivery channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookChannelConfig {
    pub id: String,
    pub url: String,
    /// Defaults to [`DEFAULT_MAX_MSG_SIZE`].
    pub max_msg_size: Option<usize>,
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server:
  port: 8000
alerts_path: etc/alerts.d
channels:
  - id: gmail
    type: email
    smtp_host: smtp.gmail.com
    smtp_port: 587
  - id: elastic
    type: webhook
    url: https://elastic.example.com:9200
"#;

    #[test]
    fn parses_tagged_channels_in_order() {
        let cfg: HeraldConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.alerts_path, "etc/alerts.d");
        assert_eq!(cfg.channels.len(), 2);
        assert_eq!(cfg.channels[0].id(), "gmail");
        assert_eq!(cfg.channels[0].kind(), "email");
        let ChannelConfig::Email(email) = &cfg.channels[0] else {
            panic!("expected email channel");
        };
        assert_eq!(email.smtp_port, 587);
        assert!(email.starttls);
        assert!(email.max_msg_size.is_none());
        let ChannelConfig::Webhook(hook) = &cfg.channels[1] else {
            panic!("expected webhook channel");
        };
        assert_eq!(hook.url, "https://elastic.example.com:9200");
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg: HeraldConfig = serde_yaml::from_str("log_format: text").unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.log_format, LogFormat::Text);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.dispatch.workers, 16);
        assert!(cfg.scheduler.timezone.is_none());
    }

    #[test]
    fn unknown_channel_type_is_rejected() {
        let raw = "channels:\n  - id: x\n    type: pager\n";
        assert!(serde_yaml::from_str::<HeraldConfig>(raw).is_err());
    }

    #[test]
    fn debug_output_redacts_password() {
        let cfg = EmailChannelConfig {
            smtp_auth_pass: Secret::new("hunter2".into()),
            ..Default::default()
        };
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}

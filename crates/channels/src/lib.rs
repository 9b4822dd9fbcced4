//! Delivery channels.
//!
//! Each channel kind (email, webhook) implements the [`DeliveryChannel`]
//! trait. The [`ChannelRegistry`] builds and initializes every configured
//! channel once at startup and is read-only afterwards.

pub mod email;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod webhook;

pub use {
    email::EmailChannel,
    error::{Error, Result},
    plugin::{ChannelDescription, DeliveryChannel, truncate_message},
    registry::ChannelRegistry,
    webhook::WebhookChannel,
};

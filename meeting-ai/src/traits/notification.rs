//! Notification transport trait.

use crate::types::notification::{OutboundMessage, Receipt};
use crate::Error;
use async_trait::async_trait;

/// Abstraction for delivering a rendered message to a list of recipients.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Send one message to all recipients as a single transport operation.
    async fn send(&self, message: OutboundMessage) -> std::result::Result<Receipt, Error>;

    /// Return unique identifier for this transport (e.g., "smtp", "mailersend").
    fn provider_id(&self) -> &'static str;

    /// Check the transport is reachable and accepts our credentials.
    async fn health_check(&self) -> std::result::Result<bool, Error>;
}

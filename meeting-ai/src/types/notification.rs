//! Types for outbound notifications.

use serde::{Deserialize, Serialize};

/// A fully rendered message addressed to its recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Aggregate status of one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Every recipient was accepted
    Sent,
    /// The transport accepted only some recipients
    Partial,
}

/// Transport acknowledgement of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Recipients the transport accepted
    pub delivered: Vec<String>,
    pub status: DeliveryStatus,
    pub message_id: Option<String>,
}

impl Receipt {
    /// Receipt for a transport that accepts or rejects the message as a whole.
    pub fn all_accepted(recipients: &[String], message_id: Option<String>) -> Self {
        Self {
            delivered: recipients.to_vec(),
            status: DeliveryStatus::Sent,
            message_id,
        }
    }
}

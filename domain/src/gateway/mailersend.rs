//! MailerSend transport for insight emails.

use super::{bearer_headers, build_client, error_for_status, send_error};
use async_trait::async_trait;
use log::*;
use meeting_ai::traits::notification::Sender;
use meeting_ai::types::notification::{OutboundMessage, Receipt};
use meeting_ai::Error;
use serde::{Deserialize, Serialize};

pub const PROVIDER_ID: &str = "mailersend";

/// MailerSend API client for sending transactional emails
pub struct MailerSendClient {
    client: reqwest::Client,
    base_url: String,
    from: EmailSender,
}

/// Email recipient with name and email address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Email sender with name and email address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSender {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Request payload for sending an email via MailerSend
#[derive(Debug, Serialize)]
pub struct SendEmailRequest {
    pub from: EmailSender,
    pub to: Vec<EmailRecipient>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl MailerSendClient {
    /// Create a new MailerSend client with authentication
    pub fn new(
        api_key: &str,
        base_url: &str,
        from_email: &str,
        from_name: &str,
    ) -> Result<Self, Error> {
        let mut headers = bearer_headers(api_key)?;
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        Ok(Self {
            client: build_client(headers)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            from: EmailSender {
                email: from_email.to_string(),
                name: Some(from_name.to_string()),
            },
        })
    }

    fn request(&self, message: OutboundMessage) -> SendEmailRequest {
        SendEmailRequest {
            from: self.from.clone(),
            to: message
                .recipients
                .into_iter()
                .map(|email| EmailRecipient { email, name: None })
                .collect(),
            subject: message.subject,
            text: message.text_body,
            html: message.html_body,
        }
    }
}

#[async_trait]
impl Sender for MailerSendClient {
    async fn send(&self, message: OutboundMessage) -> Result<Receipt, Error> {
        let url = format!("{}/email", self.base_url);
        let recipients = message.recipients.clone();

        info!("Sending email to {} recipients", recipients.len());
        debug!("Email subject: {}", message.subject);

        let response = self
            .client
            .post(&url)
            .json(&self.request(message))
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;
        let response = error_for_status(PROVIDER_ID, response).await?;

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        info!("Email sent successfully, message_id: {:?}", message_id);
        Ok(Receipt::all_accepted(&recipients, message_id))
    }

    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    /// A key that can read its own API quota is valid and active
    async fn health_check(&self) -> Result<bool, Error> {
        let url = format!("{}/api-quota", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;
        Ok(response.status().is_success())
    }
}

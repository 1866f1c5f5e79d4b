//! SMTP transport for insight emails.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::*;
use meeting_ai::traits::notification::Sender;
use meeting_ai::types::notification::{OutboundMessage, Receipt};
use meeting_ai::Error;

pub const PROVIDER_ID: &str = "smtp";

/// Relay and sender identity; the password never leaves this struct except into lettre.
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: String,
    pub from_name: String,
}

pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    /// Uses STARTTLS with credentials when a username is configured, otherwise a plain
    /// unauthenticated connection (local relays and test servers).
    pub fn new(settings: SmtpSettings) -> Result<Self, Error> {
        let address = settings.from_email.parse().map_err(|e| {
            Error::Configuration(format!("invalid sender address {}: {e}", settings.from_email))
        })?;
        let from = Mailbox::new(Some(settings.from_name.clone()), address);

        let transport = match (settings.username, settings.password) {
            (Some(username), password) => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                    .map_err(|e| {
                        Error::Configuration(format!("invalid SMTP relay {}: {e}", settings.host))
                    })?
                    .port(settings.port)
                    .credentials(Credentials::new(username, password.unwrap_or_default()))
                    .build()
            }
            (None, _) => {
                warn!(
                    "No SMTP username configured, connecting to {} without TLS or authentication",
                    settings.host
                );
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                    .port(settings.port)
                    .build()
            }
        };

        Ok(Self { transport, from })
    }

    /// Recipients go in `Bcc` so attendees do not see each other's addresses.
    fn build_message(&self, message: OutboundMessage) -> Result<Message, Error> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject);
        for recipient in &message.recipients {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|e| Error::Validation(format!("invalid recipient {recipient}: {e}")))?;
            builder = builder.bcc(mailbox);
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                message.text_body,
                message.html_body,
            ))
            .map_err(|e| Error::Validation(format!("failed to build email: {e}")))
    }
}

/// Maps lettre's SMTP failures onto the adapter taxonomy.
fn classify(err: lettre::transport::smtp::Error) -> Error {
    let code = err.status().map(|code| code.to_string());
    warn!("SMTP send failed ({code:?}): {err}");

    if err.is_timeout() {
        Error::Timeout("SMTP server did not respond in time".to_string())
    } else if err.is_transient() {
        Error::Provider(format!("SMTP server deferred the message: {err}"))
    } else if err.is_permanent() {
        match code.as_deref() {
            Some("530") | Some("534") | Some("535") => {
                Error::Authentication("SMTP server rejected the credentials".to_string())
            }
            _ => Error::Validation(format!("SMTP server rejected the message: {err}")),
        }
    } else {
        Error::Network(format!("SMTP connection failed: {err}"))
    }
}

#[async_trait]
impl Sender for SmtpSender {
    async fn send(&self, message: OutboundMessage) -> Result<Receipt, Error> {
        let recipients = message.recipients.clone();
        let email = self.build_message(message)?;

        debug!("Sending insight email to {} recipient(s)", recipients.len());
        let response = self.transport.send(email).await.map_err(classify)?;

        // The relay accepts or rejects the whole transaction, so success covers every recipient.
        let message_id = response.message().next().map(str::to_string);
        info!("SMTP accepted message for {} recipient(s)", recipients.len());
        Ok(Receipt::all_accepted(&recipients, message_id))
    }

    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn health_check(&self) -> Result<bool, Error> {
        self.transport.test_connection().await.map_err(classify)
    }
}

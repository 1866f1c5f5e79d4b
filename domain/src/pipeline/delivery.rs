//! Delivery stage: renders the insight record and sends it to the session's recipients.

use super::Orchestrator;
use crate::error::{DomainErrorKind, Error};
use crate::lifecycle::Lifecycle;
use crate::render::{render, RenderedMessage};
use crate::{insight_records, sessions, Id};
use email_address::EmailAddress;
use entity::delivery_outcome::DeliveryOutcome;
use entity::lists::TextList;
use entity::pipeline_stage::PipelineStage;
use entity_api::insight_record::DeliveryTracking;
use entity_api::session::{InsightChange, Transition};
use log::*;
use meeting_ai::types::notification::{DeliveryStatus, OutboundMessage};
use meeting_ai::Error as AdapterError;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const STAGE: PipelineStage = PipelineStage::Deliver;

/// Trims the override list and drops blanks and case-insensitive duplicates, keeping the
/// first spelling.
fn dedup_recipients(recipients: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    recipients
        .into_iter()
        .map(|recipient| recipient.trim().to_string())
        .filter(|recipient| !recipient.is_empty())
        .filter(|recipient| seen.insert(recipient.to_lowercase()))
        .collect()
}

impl Orchestrator {
    /// Sends the insight record to `recipients`, or to the attendees when no override is
    /// given.
    ///
    /// A `delivered` session is only resent with `force_resend`, which rewrites the
    /// delivery tracking and nothing else.
    pub async fn deliver(
        &self,
        id: Id,
        recipients: Option<Vec<String>>,
        force_resend: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<insight_records::Model, Error> {
        let session = self.store().get(id).await?;
        self.check_admission(&session, STAGE, force_resend)?;

        let recipients = self.resolve_recipients(id, recipients).await?;
        let insight = self
            .store()
            .insight(id)
            .await?
            .ok_or_else(|| Error::validation("session has no insight record to deliver"))?;

        let claimed = self
            .claim(id, STAGE, force_resend, &session, cancel)
            .await?;

        let worker = self.clone();
        tokio::spawn(async move { worker.run_delivery(claimed, insight, recipients).await })
            .await?
    }

    /// Renders the delivery email without sending it or touching the session.
    pub async fn preview(&self, id: Id) -> Result<RenderedMessage, Error> {
        let session = self.store().get(id).await?;
        let insight = self.store().insight(id).await?.ok_or_else(Error::not_found)?;
        render(&session, &insight)
    }

    async fn resolve_recipients(
        &self,
        id: Id,
        recipients: Option<Vec<String>>,
    ) -> Result<Vec<String>, Error> {
        let resolved = match recipients {
            Some(recipients) => dedup_recipients(recipients),
            None => dedup_recipients(
                self.store()
                    .attendees(id)
                    .await?
                    .into_iter()
                    .map(|attendee| attendee.email)
                    .collect(),
            ),
        };

        if resolved.is_empty() {
            return Err(Error::validation("no recipients to deliver to"));
        }
        if let Some(invalid) = resolved
            .iter()
            .find(|recipient| !EmailAddress::is_valid(recipient))
        {
            return Err(Error::validation(format!(
                "invalid recipient email address: {invalid}"
            )));
        }

        Ok(resolved)
    }

    async fn run_delivery(
        &self,
        session: sessions::Model,
        insight: insight_records::Model,
        recipients: Vec<String>,
    ) -> Result<insight_records::Model, Error> {
        let id = session.id;

        let rendered = match render(&session, &insight) {
            Ok(rendered) => rendered,
            Err(err) => {
                let message = match err.error_kind {
                    DomainErrorKind::Validation(message) => message,
                    other => other.to_string(),
                };
                return Err(self
                    .fail(id, STAGE, AdapterError::Validation(message))
                    .await);
            }
        };

        let message = OutboundMessage {
            recipients: recipients.clone(),
            subject: rendered.subject,
            html_body: rendered.html_body,
            text_body: rendered.text_body,
        };
        let sender = Arc::clone(&self.adapters().sender);
        let operation = format!("{} delivery of session {id}", sender.provider_id());

        let outcome = self
            .call_adapter(&operation, || {
                let sender = Arc::clone(&sender);
                let message = message.clone();
                async move {
                    let receipt = sender.send(message).await?;
                    if receipt.delivered.is_empty() {
                        return Err(AdapterError::Validation(
                            "every recipient was rejected".to_string(),
                        ));
                    }
                    Ok(receipt)
                }
            })
            .await;

        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(err) => return Err(self.fail(id, STAGE, err).await),
        };

        let outcome = if receipt.status == DeliveryStatus::Partial
            || receipt.delivered.len() < recipients.len()
        {
            DeliveryOutcome::Partial
        } else {
            DeliveryOutcome::Sent
        };
        info!(
            "Session {id} delivered to {}/{} recipient(s) ({outcome}), message id {:?}",
            receipt.delivered.len(),
            recipients.len(),
            receipt.message_id
        );

        let tracking = DeliveryTracking {
            delivered_at: chrono::Utc::now().into(),
            recipients: TextList(receipt.delivered),
            outcome,
        };
        let done = Lifecycle::completed(STAGE);
        let transition = Transition::to(done.state, done.failed_stage)
            .with_insight(InsightChange::Delivery(tracking))
            .clearing_failure();
        self.complete(id, STAGE, transition).await?;

        self.store()
            .insight(id)
            .await?
            .ok_or_else(|| Error::persistence(format!("insight record of session {id} is missing")))
    }
}

//! Session bookkeeping around the stages: creation, lookups, cost estimates and adapter
//! health.

use super::Orchestrator;
use crate::error::Error;
use crate::{attendees, insight_records, sessions, Id};
use email_address::EmailAddress;
use entity_api::attendee::NewAttendee;
use entity::session_state::SessionState;
use entity_api::session::{NewSession, SessionFilter};
use log::*;
use serde::Serialize;
use std::future::Future;
use utoipa::ToSchema;

/// Page size of a session listing that names none.
pub const DEFAULT_LIST_LIMIT: u64 = 50;
/// Largest page a session listing returns.
pub const MAX_LIST_LIMIT: u64 = 200;

/// A new session with the attendees known up front.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateSession {
    pub title: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub attendees: Vec<NewAttendee>,
}

/// Estimated provider spend for a session, derived from stored data only.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct CostEstimate {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Id,
    /// Provider the estimate for transcription is priced at
    pub transcription_provider: Option<String>,
    /// Absent until the audio duration is known
    pub transcription_usd: Option<f64>,
    pub synthesis_model: String,
    /// Absent until a transcript exists
    pub synthesis_usd: Option<f64>,
    pub total_usd: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ProviderStatus {
    pub provider: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ProviderHealth {
    pub transcription: Vec<ProviderStatus>,
    pub extraction: ProviderStatus,
    pub notification: ProviderStatus,
}

impl ProviderHealth {
    pub fn all_healthy(&self) -> bool {
        self.transcription.iter().all(|status| status.healthy)
            && self.extraction.healthy
            && self.notification.healthy
    }
}

/// Trims an attendee and rejects blank names or invalid addresses.
fn normalize_attendee(attendee: NewAttendee) -> Result<NewAttendee, Error> {
    let name = attendee.name.trim().to_string();
    let email = attendee.email.trim().to_string();

    if name.is_empty() {
        return Err(Error::validation("attendee name must not be blank"));
    }
    if !EmailAddress::is_valid(&email) {
        return Err(Error::validation(format!(
            "invalid attendee email address: {email}"
        )));
    }

    Ok(NewAttendee {
        name,
        email,
        is_organizer: attendee.is_organizer,
    })
}

impl Orchestrator {
    pub async fn create_session(
        &self,
        request: CreateSession,
    ) -> Result<(sessions::Model, Vec<attendees::Model>), Error> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::validation("session title must not be blank"));
        }
        let attendees = request
            .attendees
            .into_iter()
            .map(normalize_attendee)
            .collect::<Result<Vec<_>, _>>()?;

        let new_session = NewSession {
            title,
            description: request
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            language: request.language,
        };

        let (session, attendees) = self.store().create_session(new_session, attendees).await?;
        info!(
            "Created session {} \"{}\" with {} attendee(s)",
            session.id,
            session.title,
            attendees.len()
        );
        Ok((session, attendees))
    }

    pub async fn status(&self, id: Id) -> Result<sessions::Model, Error> {
        self.store().get(id).await
    }

    /// Lists sessions newest first, e.g. the ones failed at a given stage.
    pub async fn list_sessions(&self, filter: SessionFilter) -> Result<Vec<sessions::Model>, Error> {
        if filter.failed_stage.is_some()
            && filter.state.is_some_and(|state| state != SessionState::Failed)
        {
            return Err(Error::validation(
                "failed_stage only applies to failed sessions",
            ));
        }

        let filter = SessionFilter {
            title: filter
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            limit: Some(
                filter
                    .limit
                    .unwrap_or(DEFAULT_LIST_LIMIT)
                    .clamp(1, MAX_LIST_LIMIT),
            ),
            ..filter
        };

        let sessions = self.store().list(&filter).await?;
        debug!("Listed {} session(s) matching {filter:?}", sessions.len());
        Ok(sessions)
    }

    /// Returns `NotFound` for an unknown session and for one that was never synthesized.
    pub async fn insight(&self, id: Id) -> Result<insight_records::Model, Error> {
        self.store().get(id).await?;
        self.store().insight(id).await?.ok_or_else(Error::not_found)
    }

    pub async fn attendees(&self, id: Id) -> Result<Vec<attendees::Model>, Error> {
        self.store().get(id).await?;
        self.store().attendees(id).await
    }

    pub async fn add_attendee(
        &self,
        id: Id,
        new_attendee: NewAttendee,
    ) -> Result<attendees::Model, Error> {
        let new_attendee = normalize_attendee(new_attendee)?;
        let attendee = self.store().add_attendee(id, new_attendee).await?;
        debug!("Added attendee {} to session {id}", attendee.email);
        Ok(attendee)
    }

    /// Deletes the session with its attendees and insight record.
    pub async fn delete_session(&self, id: Id) -> Result<(), Error> {
        self.store().delete(id).await?;
        info!("Deleted session {id}");
        Ok(())
    }

    /// Prices the session's stored audio duration and transcript without contacting any
    /// provider.
    pub async fn estimate_costs(&self, id: Id) -> Result<CostEstimate, Error> {
        let session = self.store().get(id).await?;
        let adapters = self.adapters();

        let transcriber = session
            .transcription_provider
            .as_deref()
            .and_then(|used| {
                adapters
                    .transcribers
                    .iter()
                    .find(|provider| provider.provider_id() == used)
            })
            .or_else(|| adapters.transcribers.first());

        let transcription_usd = match (transcriber, session.audio_duration_seconds) {
            (Some(provider), Some(duration)) => Some(provider.estimate_cost(duration)),
            _ => None,
        };
        let synthesis_usd = session
            .word_count
            .map(|words| adapters.extractor.estimate_cost(words.max(0) as u64));

        Ok(CostEstimate {
            session_id: session.id,
            transcription_provider: transcriber.map(|provider| provider.provider_id().to_string()),
            transcription_usd,
            synthesis_model: adapters.extractor.model(),
            synthesis_usd,
            total_usd: transcription_usd.unwrap_or_default() + synthesis_usd.unwrap_or_default(),
        })
    }

    /// Runs every adapter's health check, each bounded by the stage timeout.
    pub async fn health(&self) -> ProviderHealth {
        let adapters = self.adapters();

        let mut transcription = Vec::with_capacity(adapters.transcribers.len());
        for provider in &adapters.transcribers {
            transcription.push(
                self.probe(provider.provider_id(), provider.health_check())
                    .await,
            );
        }

        ProviderHealth {
            transcription,
            extraction: self
                .probe(
                    adapters.extractor.provider_id(),
                    adapters.extractor.health_check(),
                )
                .await,
            notification: self
                .probe(adapters.sender.provider_id(), adapters.sender.health_check())
                .await,
        }
    }

    async fn probe<Fut>(&self, provider: &str, check: Fut) -> ProviderStatus
    where
        Fut: Future<Output = Result<bool, meeting_ai::Error>>,
    {
        let outcome = tokio::time::timeout(self.settings().stage_timeout, check).await;
        let (healthy, error) = match outcome {
            Ok(Ok(healthy)) => (healthy, None),
            Ok(Err(err)) => (false, Some(err.to_string())),
            Err(_) => (false, Some("health check timed out".to_string())),
        };
        if !healthy {
            warn!("Provider {provider} is unhealthy: {error:?}");
        }

        ProviderStatus {
            provider: provider.to_string(),
            healthy,
            error,
        }
    }
}

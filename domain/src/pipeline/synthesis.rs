//! Synthesis stage: extracts the insight record from the stored transcript.

use super::Orchestrator;
use crate::error::Error;
use crate::lifecycle::Lifecycle;
use crate::store::CasOutcome;
use crate::{insight_records, sessions, Id};
use entity::lists::{ActionItem, ActionItems, TextList};
use entity::pipeline_stage::PipelineStage;
use entity_api::insight_record::NewInsight;
use entity_api::session::{InsightChange, Transition};
use log::*;
use meeting_ai::types::insights::{Extraction, ExtractionRequest};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const STAGE: PipelineStage = PipelineStage::Synthesize;

impl Orchestrator {
    /// Produces the session's insight record, or returns the stored one.
    ///
    /// Without `force_regenerate` an existing record is returned with no extractor call.
    /// With it, the record is overwritten in place.
    pub async fn synthesize(
        &self,
        id: Id,
        force_regenerate: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<insight_records::Model, Error> {
        let session = self.store().get(id).await?;

        if !force_regenerate {
            if let Some(existing) = self.store().insight(id).await? {
                debug!("Session {id} already has insight record {}", existing.id);
                self.settle_failed_regeneration(id, &session).await?;
                return Ok(existing);
            }
        }

        self.check_admission(&session, STAGE, force_regenerate)?;

        let transcript = session
            .transcript
            .clone()
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::validation("session has no transcript to synthesize"))?;
        let request = ExtractionRequest {
            transcript,
            title: Some(session.title.clone()),
        };

        self.claim(id, STAGE, force_regenerate, &session, cancel)
            .await?;

        let worker = self.clone();
        tokio::spawn(async move { worker.run_synthesis(id, request).await }).await?
    }

    /// A failed forced regeneration leaves the previous record intact; a plain synthesis
    /// request returns that record and moves the session back to `synthesized`.
    async fn settle_failed_regeneration(
        &self,
        id: Id,
        session: &sessions::Model,
    ) -> Result<(), Error> {
        let failed = Lifecycle::failed(STAGE);
        if Lifecycle::of(session) != failed {
            return Ok(());
        }

        let done = Lifecycle::completed(STAGE);
        let transition = Transition::to(done.state, done.failed_stage).clearing_failure();
        match self.store().cas_transition(id, failed, transition).await? {
            CasOutcome::Applied(_) => info!("Session {id} restored to {done} from {failed}"),
            CasOutcome::Conflict => debug!("Session {id} left {failed} concurrently"),
        }
        Ok(())
    }

    async fn run_synthesis(
        &self,
        id: Id,
        request: ExtractionRequest,
    ) -> Result<insight_records::Model, Error> {
        let started = Instant::now();
        let extractor = Arc::clone(&self.adapters().extractor);
        let operation = format!(
            "{} extraction of session {id}",
            extractor.provider_id()
        );

        let outcome = self
            .call_adapter(&operation, || {
                let extractor = Arc::clone(&extractor);
                let request = request.clone();
                async move {
                    let extraction = extractor.extract(request).await?;
                    extraction.insights.validate()?;
                    Ok(extraction)
                }
            })
            .await;

        let extraction = match outcome {
            Ok(extraction) => extraction,
            Err(err) => return Err(self.fail(id, STAGE, err).await),
        };

        let new_insight = new_insight(
            extraction,
            extractor.provider_id(),
            started.elapsed().as_secs_f64(),
        );
        info!(
            "Session {id} synthesized: {} decision(s), {} action item(s), {} tokens",
            new_insight.decisions.len(),
            new_insight.action_items.len(),
            new_insight.tokens_used
        );

        let done = Lifecycle::completed(STAGE);
        let transition = Transition::to(done.state, done.failed_stage)
            .with_insight(InsightChange::Upsert(new_insight))
            .clearing_failure();
        self.complete(id, STAGE, transition).await?;

        self.store()
            .insight(id)
            .await?
            .ok_or_else(|| Error::persistence(format!("insight record of session {id} is missing")))
    }
}

fn new_insight(extraction: Extraction, provider_id: &str, extraction_seconds: f64) -> NewInsight {
    let Extraction { insights, usage } = extraction;

    NewInsight {
        summary: insights.summary,
        decisions: TextList(insights.decisions),
        action_items: ActionItems(
            insights
                .action_items
                .into_iter()
                .map(|item| ActionItem {
                    task: item.task,
                    owner: item.owner,
                    due_date: item.due_date,
                })
                .collect(),
        ),
        open_questions: TextList(insights.open_questions),
        topics: TextList(insights.topics),
        extraction_provider: provider_id.to_string(),
        extraction_model: usage.model,
        tokens_used: i32::try_from(usage.tokens_used).unwrap_or(i32::MAX),
        extraction_seconds,
    }
}

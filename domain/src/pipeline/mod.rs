//! The pipeline orchestrator: drives a session through transcription, synthesis and
//! delivery.
//!
//! Every stage trigger follows the same sequence:
//! 1. load the session and ask [`Lifecycle::admit`] whether the stage may start,
//! 2. validate the caller's input,
//! 3. claim the session with a compare-and-set into the stage's in-progress state,
//! 4. run the adapter calls on a spawned task, which always writes a terminal state.
//!
//! Steps 1 and 2 never write. A cancellation token is honoured up to step 3 only.

use crate::error::{failure_kind_of, sanitize_message, DomainErrorKind, Error};
use crate::lifecycle::{Admission, Lifecycle};
use crate::store::{CasOutcome, RecordStore};
use crate::{sessions, Id};
use entity::failure_kind::FailureKind;
use entity::pipeline_stage::PipelineStage;
use entity_api::session::Transition;
use log::*;
use meeting_ai::traits::analysis::Extractor;
use meeting_ai::traits::notification::Sender;
use meeting_ai::traits::transcription::Provider as TranscriptionProvider;
use meeting_ai::{Error as AdapterError, RetryPolicy};
use service::config::{Config, DEFAULT_MAX_AUDIO_BYTES};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod delivery;
mod records;
mod synthesis;
mod transcription;

#[cfg(test)]
mod tests;

pub use records::{CostEstimate, CreateSession, ProviderHealth, ProviderStatus};
pub use transcription::TranscriptionInput;

/// Lost compare-and-set races tolerated before a trigger gives up as already running.
const MAX_CLAIM_ATTEMPTS: usize = 3;

/// The adapters a pipeline runs against.
pub struct Adapters {
    /// Tried in order; the first is the primary provider.
    pub transcribers: Vec<Arc<dyn TranscriptionProvider>>,
    pub extractor: Arc<dyn Extractor>,
    pub sender: Arc<dyn Sender>,
}

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub retry: RetryPolicy,
    /// Upper bound of one adapter call
    pub stage_timeout: Duration,
    pub max_audio_bytes: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            stage_timeout: Duration::from_secs(300),
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::new(config.transient_retry_budget, config.malformed_retry_budget)
                .with_delays(
                    Duration::from_millis(config.retry_base_delay_ms),
                    Duration::from_millis(config.retry_max_delay_ms),
                ),
            stage_timeout: Duration::from_secs(config.stage_timeout_secs),
            max_audio_bytes: config.max_audio_bytes,
        }
    }
}

struct Inner {
    store: Arc<dyn RecordStore>,
    adapters: Adapters,
    settings: PipelineSettings,
}

/// Cheap to clone; clones share the store and adapters.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn RecordStore>, adapters: Adapters, settings: PipelineSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                adapters,
                settings,
            }),
        }
    }

    fn store(&self) -> &dyn RecordStore {
        self.inner.store.as_ref()
    }

    fn adapters(&self) -> &Adapters {
        &self.inner.adapters
    }

    fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }

    /// Rejects a trigger the session's current lifecycle does not allow.
    fn check_admission(
        &self,
        session: &sessions::Model,
        stage: PipelineStage,
        force: bool,
    ) -> Result<(), Error> {
        match Lifecycle::of(session).admit(stage, force) {
            Admission::Admit { .. } => Ok(()),
            Admission::AlreadyRunning => Err(Error::new(DomainErrorKind::StageAlreadyRunning {
                stage,
            })),
            Admission::OutOfSequence => Err(Error::new(DomainErrorKind::StageSequence {
                stage,
                state: session.state,
            })),
        }
    }

    /// Moves the session into `stage`'s in-progress state.
    ///
    /// A lost race reloads the session and runs the guard again, so a concurrent holder of
    /// the stage surfaces as `StageAlreadyRunning` and any other change as `StageSequence`.
    async fn claim(
        &self,
        id: Id,
        stage: PipelineStage,
        force: bool,
        loaded: &sessions::Model,
        cancel: Option<&CancellationToken>,
    ) -> Result<sessions::Model, Error> {
        let mut session = loaded.clone();

        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let observed = Lifecycle::of(&session);
            self.check_admission(&session, stage, force)?;

            if cancel.is_some_and(|token| token.is_cancelled()) {
                info!("{stage} of session {id} cancelled before it started");
                return Err(Error::new(DomainErrorKind::Cancelled));
            }

            let next = Lifecycle::in_progress(stage);
            match self
                .store()
                .cas_transition(id, observed, Transition::to(next.state, next.failed_stage))
                .await?
            {
                CasOutcome::Applied(claimed) => {
                    info!("Session {id} moved from {observed} to {next}");
                    return Ok(claimed);
                }
                CasOutcome::Conflict => {
                    debug!("Session {id} changed while claiming {stage}, re-checking");
                    session = self.store().get(id).await?;
                }
            }
        }

        warn!("Giving up claiming {stage} for session {id} after repeated conflicts");
        Err(Error::new(DomainErrorKind::StageAlreadyRunning { stage }))
    }

    /// Runs one adapter call under the retry policy, bounding every attempt by the stage
    /// timeout.
    async fn call_adapter<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let timeout = self.settings().stage_timeout;
        self.settings()
            .retry
            .execute(operation, |_| {
                let attempt = call();
                async move {
                    tokio::time::timeout(timeout, attempt)
                        .await
                        .unwrap_or_else(|_| {
                            Err(AdapterError::Timeout(format!(
                                "no response within {}s",
                                timeout.as_secs()
                            )))
                        })
                }
            })
            .await
    }

    /// Writes the terminal transition of a stage that this process claimed.
    async fn finish(
        &self,
        id: Id,
        stage: PipelineStage,
        transition: Transition,
    ) -> Result<sessions::Model, Error> {
        let target = Lifecycle::new(transition.state, transition.failed_stage);
        match self
            .store()
            .cas_transition(id, Lifecycle::in_progress(stage), transition)
            .await?
        {
            CasOutcome::Applied(session) => {
                info!("Session {id} finished {stage} as {target}");
                Ok(session)
            }
            CasOutcome::Conflict => {
                error!("Session {id} left {stage} while it was running, dropping {target}");
                Err(Error::persistence(format!(
                    "session {id} is no longer in {}",
                    Lifecycle::in_progress(stage)
                )))
            }
        }
    }

    /// Writes the successful outcome of a stage.
    ///
    /// If that write errors, the session is moved to `FAILED(stage)` in a second write so it
    /// is not left claimed, and the caller gets `Persistence`.
    async fn complete(
        &self,
        id: Id,
        stage: PipelineStage,
        transition: Transition,
    ) -> Result<sessions::Model, Error> {
        let err = match self.finish(id, stage, transition).await {
            Ok(session) => return Ok(session),
            Err(err) => err,
        };
        error!("Storing the {stage} result of session {id} failed: {err}");

        let running = Lifecycle::in_progress(stage);
        let failed = Lifecycle::failed(stage);
        let release = Transition::to(failed.state, failed.failed_stage).recording_failure(
            FailureKind::TransientProviderError,
            format!("the {stage} result could not be stored"),
        );
        match self.store().cas_transition(id, running, release).await {
            Ok(CasOutcome::Applied(_)) => warn!("Session {id} released from {running} as {failed}"),
            Ok(CasOutcome::Conflict) => debug!("Session {id} already left {running}"),
            Err(release_err) => error!("Session {id} is stuck in {running}: {release_err}"),
        }

        Err(match err.error_kind {
            DomainErrorKind::Persistence => err,
            _ => Error::persistence(err.to_string()),
        })
    }

    /// Records `err` on the session as `FAILED(stage)` and returns the caller-facing error.
    async fn fail(&self, id: Id, stage: PipelineStage, err: AdapterError) -> Error {
        let failed = Lifecycle::failed(stage);
        let transition = Transition::to(failed.state, failed.failed_stage)
            .recording_failure(failure_kind_of(&err), sanitize_message(&err.to_string()));

        match self.finish(id, stage, transition).await {
            Ok(_) => Error::stage_failed(stage, err),
            Err(persistence) => persistence,
        }
    }
}

//! The pipeline state machine.
//!
//! [`Lifecycle::admit`] is the only place that decides whether a stage may start. Every
//! trigger consults it before the compare-and-set claim of the session and again after a
//! lost race, so a rejected trigger never changes state.

use crate::sessions;
use entity::pipeline_stage::PipelineStage;
use entity::session_state::SessionState;
use std::fmt;

/// The persisted `(state, failed_stage)` pair that every transition is conditioned on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Lifecycle {
    pub state: SessionState,
    pub failed_stage: Option<PipelineStage>,
}

/// Verdict of the guard for one stage trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The trigger may claim the session by moving it to `next`.
    Admit { next: Lifecycle },
    /// The session is already in this stage's in-progress state.
    AlreadyRunning,
    OutOfSequence,
}

impl Lifecycle {
    pub const fn new(state: SessionState, failed_stage: Option<PipelineStage>) -> Self {
        Self {
            state,
            failed_stage,
        }
    }

    pub fn of(session: &sessions::Model) -> Self {
        Self::new(session.state, session.failed_stage)
    }

    pub const fn in_progress(stage: PipelineStage) -> Self {
        let state = match stage {
            PipelineStage::Transcribe => SessionState::Transcribing,
            PipelineStage::Synthesize => SessionState::Synthesizing,
            PipelineStage::Deliver => SessionState::Delivering,
        };
        Self::new(state, None)
    }

    pub const fn completed(stage: PipelineStage) -> Self {
        let state = match stage {
            PipelineStage::Transcribe => SessionState::Transcribed,
            PipelineStage::Synthesize => SessionState::Synthesized,
            PipelineStage::Deliver => SessionState::Delivered,
        };
        Self::new(state, None)
    }

    pub const fn failed(stage: PipelineStage) -> Self {
        Self::new(SessionState::Failed, Some(stage))
    }

    /// Decides whether `stage` may start from this lifecycle.
    ///
    /// `force` is the stage's override flag: `force_regenerate` for synthesis and
    /// `force_resend` for delivery. Transcription has no override.
    pub fn admit(&self, stage: PipelineStage, force: bool) -> Admission {
        if *self == Self::in_progress(stage) {
            return Admission::AlreadyRunning;
        }

        let admitted = *self == Self::failed(stage)
            || match stage {
                PipelineStage::Transcribe => self.state == SessionState::Created,
                PipelineStage::Synthesize => {
                    self.state == SessionState::Transcribed
                        || (force
                            && (self.state == SessionState::Synthesized
                                || self.state == SessionState::Delivered
                                || *self == Self::failed(PipelineStage::Deliver)))
                }
                PipelineStage::Deliver => {
                    self.state == SessionState::Synthesized
                        || (force && self.state == SessionState::Delivered)
                }
            };

        if admitted {
            Admission::Admit {
                next: Self::in_progress(stage),
            }
        } else {
            Admission::OutOfSequence
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.failed_stage {
            Some(stage) => write!(f, "{}({stage})", self.state),
            None => write!(f, "{}", self.state),
        }
    }
}

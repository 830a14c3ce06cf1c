use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use tutor_core::model::{
    DEFAULT_COMPLETION_MESSAGE, EditorBuffers, ExpertiseLevel, Session, SessionId, Step,
};

use crate::backend::{NextStepRequest, StepOutcome, TutorBackend};
use crate::error::SessionError;

/// A validated "next step" answer, not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAdvance {
    Step {
        step: Step,
        total_steps: Option<usize>,
    },
    Completed {
        message: String,
    },
}

/// How the session moved after applying a `StepAdvance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTransition {
    /// The first step arrived; the pointer stays at 0.
    Started { index: usize },
    /// The pointer moved forward by one.
    Advanced { index: usize },
    Completed { message: String },
}

/// Fetches steps from the service and applies them to a `Session`.
#[derive(Clone)]
pub struct StepController {
    backend: Arc<dyn TutorBackend>,
}

impl StepController {
    #[must_use]
    pub fn new(backend: Arc<dyn TutorBackend>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn request_for(session: &Session, current_code: &str) -> NextStepRequest {
        NextStepRequest {
            session_id: session.id().clone(),
            project_type: session.project_type(),
            expertise_level: session.expertise_level(),
            project_idea: session.setup().idea_or_default().to_owned(),
            step_index: session.current_step_index(),
            current_code: current_code.to_owned(),
        }
    }

    /// Ask the service for the next step and validate what comes back.
    ///
    /// Nothing is applied here, so a failure leaves the session untouched.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Backend` for transport/parse failures and
    /// `SessionError::Domain` when the returned step is malformed.
    pub async fn request_next_step(
        &self,
        request: &NextStepRequest,
    ) -> Result<(SessionId, StepAdvance), SessionError> {
        let reply = self.backend.next_step(request).await?;
        let advance = match reply.outcome {
            StepOutcome::Step { draft, total_steps } => StepAdvance::Step {
                step: draft.validate()?,
                total_steps,
            },
            StepOutcome::Completed { message } => StepAdvance::Completed { message },
        };
        Ok((reply.session_id, advance))
    }

    /// Apply a validated answer to the session.
    ///
    /// The announced total is an upper bound: a step that would land past it
    /// completes the project instead.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Domain` if the session is already completed; the
    /// session is unchanged in that case.
    pub fn apply(
        session: &mut Session,
        advance: StepAdvance,
        now: DateTime<Utc>,
    ) -> Result<StepTransition, SessionError> {
        match advance {
            StepAdvance::Completed { message } => {
                session.complete(message.clone(), now)?;
                Ok(StepTransition::Completed { message })
            }
            StepAdvance::Step { step, total_steps } => {
                let bound = total_steps.or(session.total_steps());
                let past_bound = !session.steps().is_empty()
                    && bound.is_some_and(|total| session.current_step_index() + 1 >= total);
                if past_bound {
                    info!(
                        session_id = %session.id(),
                        step = session.current_step_index(),
                        total_steps = ?bound,
                        "step offered past the announced total, completing project"
                    );
                    let message = DEFAULT_COMPLETION_MESSAGE.to_owned();
                    session.complete(message.clone(), now)?;
                    return Ok(StepTransition::Completed { message });
                }

                let transition = if session.steps().is_empty() {
                    let index = session.push_step(step)?;
                    StepTransition::Started { index }
                } else if session.steps().len() == session.current_step_index() + 1 {
                    session.push_step(step)?;
                    StepTransition::Advanced {
                        index: session.advance()?,
                    }
                } else {
                    // The plan already listed the following step.
                    debug!(
                        session_id = %session.id(),
                        "next step already known, keeping the planned one"
                    );
                    StepTransition::Advanced {
                        index: session.advance()?,
                    }
                };
                if let Some(total) = total_steps {
                    session.set_total_steps(total);
                }
                Ok(transition)
            }
        }
    }

    /// Starter code is only handed out to beginners on the very first step.
    #[must_use]
    pub fn starter_code_allowed(session: &Session) -> bool {
        session.expertise_level() == ExpertiseLevel::Beginner && session.current_step_index() == 0
    }

    /// Fresh editor for the session's current step.
    #[must_use]
    pub fn editor_for_current_step(session: &Session) -> EditorBuffers {
        let mut editor = EditorBuffers::empty(session.project_type());
        if Self::starter_code_allowed(session) {
            if let Some(code) = session.current_step().and_then(Step::suggested_code) {
                editor.load_starter(session.project_type(), code);
            }
        }
        editor
    }
}

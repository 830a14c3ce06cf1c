use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use tutor_core::Clock;
use tutor_core::model::{
    EditorBuffers, EditorLanguage, ExecutionReport, GradingResult, QuestionId, QuizSession,
    ResourceHandle, RunId, Session, SessionId, SessionSetup, StepDraft,
};

use super::quiz::QuizGate;
use super::resources::{PreviewOutcome, ResourceTracker};
use super::state::{SessionPhase, SessionProgress, SessionSnapshot};
use super::steps::{StepController, StepTransition};
use crate::backend::{
    AskRequest, HttpTutorBackend, PreviewRequest, StartSessionReply, StartSessionRequest,
    TutorBackend,
};
use crate::config::OrchestratorConfig;
use crate::error::SessionError;

/// Result of submitting a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizOutcome {
    /// Not passed; answers and feedback stay for another attempt.
    Retry(GradingResult),
    /// Passed and moved on.
    Passed {
        result: GradingResult,
        transition: StepTransition,
    },
}

//
// ─── SLOT ─────────────────────────────────────────────────────────────────────
//

/// Everything owned by one lifetime of the session.
struct Slot {
    run: RunId,
    busy: bool,
    phase: SessionPhase,
    session: Option<Session>,
    editor: Option<EditorBuffers>,
    last_answer: Option<String>,
    last_run: Option<ExecutionReport>,
    last_error: Option<String>,
}

impl Slot {
    fn fresh() -> Self {
        Self {
            run: RunId::new(),
            busy: false,
            phase: SessionPhase::AwaitingStep,
            session: None,
            editor: None,
            last_answer: None,
            last_run: None,
            last_error: None,
        }
    }

    fn session_id(&self) -> Result<SessionId, SessionError> {
        self.session
            .as_ref()
            .map(|s| s.id().clone())
            .ok_or(SessionError::NoSession)
    }

    fn current_code(&self) -> String {
        self.editor
            .as_ref()
            .map(|e| e.current_code().to_owned())
            .unwrap_or_default()
    }

    /// Record a user-visible message and hand the error back.
    fn fail(&mut self, err: SessionError) -> SessionError {
        self.last_error = Some(err.to_string());
        err
    }
}

/// Clears the busy flag when dropped, unless the slot was reset meanwhile.
struct BusyGuard {
    slot: Arc<Mutex<Slot>>,
    run: RunId,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.run == self.run {
            slot.busy = false;
        }
    }
}

//
// ─── ORCHESTRATOR ─────────────────────────────────────────────────────────────
//

/// Entry point for every learner action on a guided project.
///
/// One action runs at a time: a second action while a request is in flight
/// fails with `SessionError::Busy`. `reset` is always accepted; replies that
/// arrive for a session that was reset in the meantime are dropped.
#[derive(Clone)]
pub struct SessionOrchestrator {
    backend: Arc<dyn TutorBackend>,
    steps: StepController,
    quiz: QuizGate,
    resources: ResourceTracker,
    config: OrchestratorConfig,
    clock: Clock,
    slot: Arc<Mutex<Slot>>,
}

impl SessionOrchestrator {
    #[must_use]
    pub fn new(backend: Arc<dyn TutorBackend>, config: OrchestratorConfig) -> Self {
        Self {
            steps: StepController::new(Arc::clone(&backend)),
            quiz: QuizGate::new(Arc::clone(&backend)),
            resources: ResourceTracker::new(Arc::clone(&backend)),
            backend,
            config,
            clock: Clock::default(),
            slot: Arc::new(Mutex::new(Slot::fresh())),
        }
    }

    /// Orchestrator talking HTTP to the service configured in the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(
            Arc::new(HttpTutorBackend::from_env()),
            OrchestratorConfig::from_env(),
        )
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Slot>, SessionError> {
        self.slot
            .lock()
            .map_err(|e| SessionError::Poisoned(e.to_string()))
    }

    /// Mark the slot busy. Must be the last check before any mutation.
    fn begin(&self, slot: &mut Slot) -> Result<BusyGuard, SessionError> {
        if slot.busy {
            return Err(SessionError::Busy);
        }
        slot.busy = true;
        slot.last_error = None;
        Ok(BusyGuard {
            slot: Arc::clone(&self.slot),
            run: slot.run,
        })
    }

    /// Re-lock after a request, refusing replies for a session that is gone.
    fn resume(
        &self,
        guard: &BusyGuard,
        reply_session: Option<&SessionId>,
    ) -> Result<MutexGuard<'_, Slot>, SessionError> {
        let slot = self.lock()?;
        let current = slot.session.as_ref().map(Session::id);
        let same_session = match (reply_session, current) {
            (Some(reply), Some(current)) => reply == current,
            (Some(_), None) => false,
            (None, _) => true,
        };
        if slot.run != guard.run || !same_session {
            warn!(
                reply_session = ?reply_session,
                current_session = ?current,
                "discarding response for a session that is no longer active"
            );
            return Err(SessionError::Stale);
        }
        Ok(slot)
    }

    //
    // ─── READ ─────────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `SessionError::Poisoned` if the state lock is poisoned.
    pub fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let slot = self.lock()?;
        Ok(SessionSnapshot {
            busy: slot.busy,
            phase: slot.phase.clone(),
            session: slot.session.clone(),
            editor: slot.editor.clone(),
            last_answer: slot.last_answer.clone(),
            last_run: slot.last_run.clone(),
            last_error: slot.last_error.clone(),
        })
    }

    /// # Errors
    ///
    /// Returns `SessionError::Poisoned` if the state lock is poisoned.
    pub fn progress(&self) -> Result<Option<SessionProgress>, SessionError> {
        let slot = self.lock()?;
        Ok(slot
            .session
            .as_ref()
            .map(|s| SessionProgress::from_session(s, &slot.phase, slot.busy)))
    }

    /// # Errors
    ///
    /// Returns `SessionError::Poisoned` if the state lock is poisoned.
    pub fn is_busy(&self) -> Result<bool, SessionError> {
        Ok(self.lock()?.busy)
    }

    //
    // ─── START / RESET ────────────────────────────────────────────────────────
    //

    /// Create a session with the service and load its plan.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyStarted` if a session exists,
    /// `SessionError::Busy` while another request runs, and backend or
    /// payload errors; nothing is stored on failure.
    pub async fn start_session(&self, setup: SessionSetup) -> Result<(), SessionError> {
        let (guard, request) = {
            let mut slot = self.lock()?;
            if slot.session.is_some() {
                return Err(SessionError::AlreadyStarted);
            }
            let guard = self.begin(&mut slot)?;
            let request = StartSessionRequest {
                project_type: setup.project_type,
                expertise_level: setup.expertise_level,
                project_idea: setup.project_idea.clone(),
            };
            (guard, request)
        };

        info!(
            project_type = %setup.project_type,
            expertise_level = %setup.expertise_level,
            "starting project session"
        );
        let reply = self.backend.start_session(&request).await;

        let mut slot = self.resume(&guard, None)?;
        let session = match reply
            .map_err(SessionError::from)
            .and_then(|reply| self.build_session(reply, setup))
        {
            Ok(session) => session,
            Err(err) => return Err(slot.fail(err)),
        };

        info!(
            session_id = %session.id(),
            steps = session.steps().len(),
            total_steps = ?session.total_steps(),
            "project session started"
        );
        slot.phase = if session.steps().is_empty() {
            SessionPhase::AwaitingStep
        } else {
            SessionPhase::InStep
        };
        slot.editor = Some(StepController::editor_for_current_step(&session));
        slot.session = Some(session);
        Ok(())
    }

    fn build_session(
        &self,
        reply: StartSessionReply,
        setup: SessionSetup,
    ) -> Result<Session, SessionError> {
        let outline = reply.outline;
        let mut session = Session::new(reply.session_id, setup, self.clock.now()).with_outline(
            outline.title,
            outline.description,
            outline.total_steps,
        );
        for draft in outline.steps {
            session.push_step(StepDraft::validate(draft)?)?;
        }
        Ok(session)
    }

    /// Discard the session and stop its preview process.
    ///
    /// Always succeeds; a failed stop is only logged. Requests still in
    /// flight for the old session will have their replies dropped.
    pub async fn reset(&self) {
        let (handle, previous) = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = slot.session.as_ref().map(|s| s.id().clone());
            let handle = slot.session.as_mut().and_then(Session::take_resource);
            *slot = Slot::fresh();
            (handle, previous)
        };
        self.slot.clear_poison();

        self.resources.release(handle).await;
        match previous {
            Some(session_id) => info!(%session_id, "project session reset"),
            None => debug!("reset without an active session"),
        }
    }

    //
    // ─── EDITOR ───────────────────────────────────────────────────────────────
    //

    /// Replace one editor buffer and make it active.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSession` before a session starts.
    pub fn update_code(
        &self,
        language: EditorLanguage,
        code: impl Into<String>,
    ) -> Result<(), SessionError> {
        let mut slot = self.lock()?;
        let editor = slot.editor.as_mut().ok_or(SessionError::NoSession)?;
        editor.set(language, code);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::NoSession` before a session starts.
    pub fn select_language(&self, language: EditorLanguage) -> Result<(), SessionError> {
        let mut slot = self.lock()?;
        let editor = slot.editor.as_mut().ok_or(SessionError::NoSession)?;
        editor.select(language);
        Ok(())
    }

    //
    // ─── RUN CODE ─────────────────────────────────────────────────────────────
    //

    /// Run the active editor buffer, or render the page for web projects.
    ///
    /// A running preview is stopped first, so at most one is ever attached.
    ///
    /// # Errors
    ///
    /// Returns phase errors outside `InStep`, `SessionError::Busy`, and
    /// backend errors from starting the run.
    pub async fn run_code(&self) -> Result<PreviewOutcome, SessionError> {
        let (guard, previous, request) = {
            let mut slot = self.lock()?;
            match &slot.phase {
                SessionPhase::InStep => {}
                SessionPhase::Completed => return Err(SessionError::Completed),
                other => {
                    return Err(SessionError::InvalidPhase {
                        action: "run code",
                        phase: other.name(),
                    });
                }
            }
            let editor = slot.editor.as_ref().ok_or(SessionError::NoSession)?;
            let request = PreviewRequest::for_editor(editor);
            let guard = self.begin(&mut slot)?;
            let previous = slot.session.as_mut().and_then(Session::take_resource);
            (guard, previous, request)
        };

        self.resources.release(previous).await;
        let started = self.resources.acquire(&request).await;

        let outcome = match started {
            Ok(outcome) => outcome,
            Err(err) => {
                let mut slot = self.resume(&guard, None)?;
                return Err(slot.fail(err.into()));
            }
        };
        match self.attach_preview(&guard, outcome) {
            Ok(outcome) => Ok(outcome),
            Err((err, orphan)) => {
                self.resources.release(orphan).await;
                Err(err)
            }
        }
    }

    /// Store a run's result. On failure, hands back a handle that must be
    /// released because nothing owns it.
    fn attach_preview(
        &self,
        guard: &BusyGuard,
        outcome: PreviewOutcome,
    ) -> Result<PreviewOutcome, (SessionError, Option<ResourceHandle>)> {
        let running = match &outcome {
            PreviewOutcome::Running(handle) => Some(handle.clone()),
            PreviewOutcome::Finished(_) => None,
        };
        let mut slot = match self.resume(guard, None) {
            Ok(slot) => slot,
            Err(err) => return Err((err, running)),
        };
        let slot = &mut *slot;

        match &outcome {
            PreviewOutcome::Running(handle) => {
                let Some(session) = slot.session.as_mut() else {
                    return Err((SessionError::NoSession, running));
                };
                if let Err(err) = session.attach_resource(handle.clone()) {
                    return Err((slot.fail(err.into()), running));
                }
                slot.last_run = None;
            }
            PreviewOutcome::Finished(report) => {
                slot.last_run = Some(report.clone());
            }
        }
        Ok(outcome)
    }

    //
    // ─── STEPS ────────────────────────────────────────────────────────────────
    //

    /// Move on without a quiz, or fetch the first step of a new session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuizRequired` from `InStep` when quizzes are
    /// mandatory, phase errors elsewhere, and backend errors; the session is
    /// unchanged on failure.
    pub async fn next_step(&self) -> Result<StepTransition, SessionError> {
        let (guard, fallback) = {
            let mut slot = self.lock()?;
            if slot.session.is_none() {
                return Err(SessionError::NoSession);
            }
            match &slot.phase {
                SessionPhase::AwaitingStep => {}
                SessionPhase::InStep if !self.config.require_quiz => {}
                SessionPhase::InStep => return Err(SessionError::QuizRequired),
                SessionPhase::Completed => return Err(SessionError::Completed),
                other => {
                    return Err(SessionError::InvalidPhase {
                        action: "move to the next step",
                        phase: other.name(),
                    });
                }
            }
            let fallback = slot.phase.clone();
            (self.begin(&mut slot)?, fallback)
        };
        self.advance(&guard, fallback).await
    }

    /// Stop the preview, fetch the next step and apply it.
    ///
    /// On failure the phase is set to `fallback`.
    async fn advance(
        &self,
        guard: &BusyGuard,
        fallback: SessionPhase,
    ) -> Result<StepTransition, SessionError> {
        let (handle, request) = {
            let mut slot = self.resume(guard, None)?;
            let code = slot.current_code();
            let session = slot.session.as_mut().ok_or(SessionError::NoSession)?;
            let request = StepController::request_for(session, &code);
            (session.take_resource(), request)
        };

        self.resources.release(handle).await;
        debug!(
            session_id = %request.session_id,
            step = request.step_index,
            "requesting next step"
        );
        let fetched = self.steps.request_next_step(&request).await;

        let mut slot = self.resume(guard, fetched.as_ref().ok().map(|(id, _)| id))?;
        let advance = match fetched {
            Ok((_, advance)) => advance,
            Err(err) => {
                slot.phase = fallback;
                return Err(slot.fail(err));
            }
        };

        let now = self.clock.now();
        let slot = &mut *slot;
        let Some(session) = slot.session.as_mut() else {
            return Err(SessionError::NoSession);
        };
        match StepController::apply(session, advance, now) {
            Ok(transition) => {
                if let StepTransition::Completed { message } = &transition {
                    info!(session_id = %session.id(), %message, "project completed");
                    slot.phase = SessionPhase::Completed;
                } else {
                    info!(
                        session_id = %session.id(),
                        step = session.current_step_index(),
                        "moved to step"
                    );
                    slot.editor = Some(StepController::editor_for_current_step(session));
                    slot.phase = SessionPhase::InStep;
                }
                Ok(transition)
            }
            Err(err) => {
                slot.phase = fallback;
                Err(slot.fail(err))
            }
        }
    }

    //
    // ─── QUIZ ─────────────────────────────────────────────────────────────────
    //

    /// Ask to finish the current step: fetches its quiz.
    ///
    /// # Errors
    ///
    /// Returns phase errors outside `InStep`, `SessionError::Busy`, and fetch
    /// errors (including an empty question list); the phase stays `InStep`.
    pub async fn complete_step(&self) -> Result<QuizSession, SessionError> {
        let (guard, session_id, step_index) = {
            let mut slot = self.lock()?;
            let session_id = slot.session_id()?;
            let step_index = slot
                .session
                .as_ref()
                .map_or(0, Session::current_step_index);
            match &slot.phase {
                SessionPhase::InStep => {}
                SessionPhase::Completed => return Err(SessionError::Completed),
                other => {
                    return Err(SessionError::InvalidPhase {
                        action: "complete the step",
                        phase: other.name(),
                    });
                }
            }
            (self.begin(&mut slot)?, session_id, step_index)
        };

        let fetched = self.quiz.fetch_questions(&session_id, step_index).await;

        let mut slot = self.resume(&guard, fetched.as_ref().ok().map(|(id, _)| id))?;
        match fetched {
            Ok((_, quiz)) => {
                info!(
                    %session_id,
                    step = step_index,
                    questions = quiz.questions().len(),
                    "quiz opened"
                );
                slot.phase = SessionPhase::QuizPending(quiz.clone());
                Ok(quiz)
            }
            Err(err) => {
                slot.phase = SessionPhase::InStep;
                Err(slot.fail(err))
            }
        }
    }

    /// Record the learner's choice for one question.
    ///
    /// # Errors
    ///
    /// Returns a phase error when no quiz is open for answers.
    pub fn record_answer(
        &self,
        question_id: QuestionId,
        option: impl Into<String>,
    ) -> Result<(), SessionError> {
        let mut slot = self.lock()?;
        match &mut slot.phase {
            SessionPhase::QuizPending(quiz) => {
                quiz.record_answer(question_id, option);
                Ok(())
            }
            SessionPhase::Completed => Err(SessionError::Completed),
            other => Err(SessionError::InvalidPhase {
                action: "answer the quiz",
                phase: other.name(),
            }),
        }
    }

    /// Close the open quiz and go back to the step.
    ///
    /// # Errors
    ///
    /// Returns a phase error when no quiz is open.
    pub fn cancel_quiz(&self) -> Result<(), SessionError> {
        let mut slot = self.lock()?;
        if slot.busy {
            return Err(SessionError::Busy);
        }
        match &slot.phase {
            SessionPhase::QuizPending(_) => {
                slot.phase = SessionPhase::InStep;
                Ok(())
            }
            other => Err(SessionError::InvalidPhase {
                action: "cancel the quiz",
                phase: other.name(),
            }),
        }
    }

    /// Submit the answers for grading and move on if they pass.
    ///
    /// A quiz that already passed but could not advance is not graded again;
    /// submitting it only retries the step request.
    ///
    /// # Errors
    ///
    /// Returns the unanswered count as a validation error without contacting
    /// the service, phase errors outside `QuizPending`, `SessionError::Busy`,
    /// and backend errors. A failed grading keeps the quiz open; a failed step
    /// request after a pass keeps the passed quiz open.
    pub async fn submit_quiz(&self) -> Result<QuizOutcome, SessionError> {
        let (guard, mut quiz, request) = {
            let mut slot = self.lock()?;
            let session_id = slot.session_id()?;
            let quiz = match &slot.phase {
                SessionPhase::QuizPending(quiz) => quiz.clone(),
                SessionPhase::Completed => return Err(SessionError::Completed),
                other => {
                    return Err(SessionError::InvalidPhase {
                        action: "submit the quiz",
                        phase: other.name(),
                    });
                }
            };
            let request = if quiz.is_passed() {
                None
            } else {
                Some(QuizGate::prepare_submission(&session_id, &quiz)?)
            };
            let guard = self.begin(&mut slot)?;
            slot.phase = SessionPhase::QuizGrading(quiz.clone());
            (guard, quiz, request)
        };

        if let Some(request) = request {
            let graded = self.quiz.submit(&request).await;

            let mut slot = self.resume(&guard, graded.as_ref().ok().map(|(id, _)| id))?;
            let result = match graded {
                Ok((_, result)) => result,
                Err(err) => {
                    slot.phase = SessionPhase::QuizPending(quiz);
                    return Err(slot.fail(err));
                }
            };
            quiz.apply_result(result.clone());

            if !result.correct() {
                info!(
                    session_id = %request.session_id,
                    step = request.step_index,
                    score = result.score(),
                    "quiz not passed"
                );
                slot.phase = SessionPhase::QuizPending(quiz);
                return Ok(QuizOutcome::Retry(result));
            }

            info!(
                session_id = %request.session_id,
                step = request.step_index,
                score = result.score(),
                "quiz passed"
            );
            if let (Some(feedback), Some(step)) = (
                result.feedback(),
                slot.session.as_mut().and_then(Session::current_step_mut),
            ) {
                if step.set_feedback(feedback).is_err() {
                    debug!("step already has feedback, keeping it");
                }
            }
            slot.phase = SessionPhase::QuizGrading(quiz.clone());
        }

        let Some(result) = quiz.result().cloned() else {
            return Err(SessionError::InvalidPhase {
                action: "advance",
                phase: "the quiz has no result",
            });
        };

        if !self.config.advance_delay.is_zero() {
            tokio::time::sleep(self.config.advance_delay).await;
        }

        let transition = self
            .advance(&guard, SessionPhase::QuizPending(quiz))
            .await?;
        Ok(QuizOutcome::Passed { result, transition })
    }

    //
    // ─── QUESTIONS ────────────────────────────────────────────────────────────
    //

    /// Ask the tutor a free-form question about the current code.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyQuestion` for blank input, then session,
    /// busy and backend errors.
    pub async fn ask_question(&self, question: &str) -> Result<String, SessionError> {
        if question.trim().is_empty() {
            return Err(SessionError::EmptyQuestion);
        }

        let (guard, request) = {
            let mut slot = self.lock()?;
            let session = slot.session.as_ref().ok_or(SessionError::NoSession)?;
            let request = AskRequest {
                session_id: session.id().clone(),
                project_type: session.project_type(),
                question: question.trim().to_owned(),
                current_code: slot.current_code(),
            };
            (self.begin(&mut slot)?, request)
        };

        let reply = self.backend.ask_question(&request).await;

        let mut slot = self.resume(&guard, reply.as_ref().ok().map(|r| &r.session_id))?;
        match reply {
            Ok(reply) => {
                slot.last_answer = Some(reply.answer.clone());
                Ok(reply.answer)
            }
            Err(err) => Err(slot.fail(err.into())),
        }
    }
}

impl fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SessionOrchestrator");
        s.field("config", &self.config);
        if let Ok(slot) = self.slot.try_lock() {
            s.field("busy", &slot.busy)
                .field("phase", &slot.phase.name())
                .field("session_id", &slot.session.as_ref().map(Session::id));
        }
        s.finish_non_exhaustive()
    }
}

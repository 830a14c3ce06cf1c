use tutor_core::model::{EditorBuffers, ExecutionReport, QuizSession, Session};

/// Where the learner is in the step/quiz cycle.
///
/// The quiz lives inside the variants that need it, so a quiz can never
/// outlive its gate or coexist with a completed project.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No session yet, or waiting for its first step.
    #[default]
    AwaitingStep,
    /// Editing and running code for the current step.
    InStep,
    /// Questions fetched; collecting answers.
    QuizPending(QuizSession),
    /// Answers submitted; waiting for the grade or the next step.
    QuizGrading(QuizSession),
    Completed,
}

impl SessionPhase {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::AwaitingStep => "waiting for a step",
            SessionPhase::InStep => "working on a step",
            SessionPhase::QuizPending(_) => "answering the quiz",
            SessionPhase::QuizGrading(_) => "grading the quiz",
            SessionPhase::Completed => "the project is completed",
        }
    }

    #[must_use]
    pub fn quiz(&self) -> Option<&QuizSession> {
        match self {
            SessionPhase::QuizPending(quiz) | SessionPhase::QuizGrading(quiz) => Some(quiz),
            _ => None,
        }
    }
}

/// Copy of everything a front end needs to render the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub busy: bool,
    pub phase: SessionPhase,
    pub session: Option<Session>,
    pub editor: Option<EditorBuffers>,
    pub last_answer: Option<String>,
    pub last_run: Option<ExecutionReport>,
    pub last_error: Option<String>,
}

/// Aggregated view of step progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    /// 1-based number of the current step.
    pub step_number: usize,
    pub total_steps: Option<usize>,
    pub is_last_step: bool,
    pub is_complete: bool,
    pub busy: bool,
    pub phase: &'static str,
}

impl SessionProgress {
    #[must_use]
    pub fn from_session(session: &Session, phase: &SessionPhase, busy: bool) -> Self {
        Self {
            step_number: session.current_step_index() + 1,
            total_steps: session.total_steps(),
            is_last_step: session.is_last_step(),
            is_complete: session.is_completed(),
            busy,
            phase: phase.name(),
        }
    }
}

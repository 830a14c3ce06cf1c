//! Shared error types for the services crate.

use thiserror::Error;

use tutor_core::model::{ProjectParseError, QuizError, SessionStateError, StepError};

/// Errors emitted by `TutorBackend` implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("tutor service request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("could not understand the tutor service response: {0}")]
    Parse(String),
    #[error("tutor service error: {0}")]
    Service(String),
    #[error("preview failed to start: {0}")]
    StartupFailed(String),
}

/// Errors emitted by the session controllers.
///
/// Every variant leaves the session as it was before the action.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no project session is active")]
    NoSession,
    #[error("a project session is already running")]
    AlreadyStarted,
    #[error("another request is still in progress")]
    Busy,
    #[error("the project is already completed")]
    Completed,
    #[error("cannot {action} while {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: &'static str,
    },
    #[error("pass the step quiz to move on")]
    QuizRequired,
    #[error("please enter a question")]
    EmptyQuestion,
    #[error("the response belongs to a session that is no longer active")]
    Stale,
    #[error("session state is unavailable: {0}")]
    Poisoned(String),
    #[error(transparent)]
    Domain(#[from] tutor_core::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SessionError {
    /// True for failures detected locally, before any request was sent.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SessionError::EmptyQuestion
                | SessionError::QuizRequired
                | SessionError::Domain(tutor_core::Error::Quiz(QuizError::Unanswered { .. }))
                | SessionError::Domain(tutor_core::Error::Project(_))
        )
    }
}

impl From<ProjectParseError> for SessionError {
    fn from(err: ProjectParseError) -> Self {
        Self::Domain(err.into())
    }
}

impl From<StepError> for SessionError {
    fn from(err: StepError) -> Self {
        Self::Domain(err.into())
    }
}

impl From<QuizError> for SessionError {
    fn from(err: QuizError) -> Self {
        Self::Domain(err.into())
    }
}

impl From<SessionStateError> for SessionError {
    fn from(err: SessionStateError) -> Self {
        Self::Domain(err.into())
    }
}

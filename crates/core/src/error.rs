use thiserror::Error;

use crate::model::{ProjectParseError, QuizError, SessionStateError, StepError};

/// Any validation failure raised by the domain model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Project(#[from] ProjectParseError),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Session(#[from] SessionStateError),
}

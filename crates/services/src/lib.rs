#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod error;
pub mod sessions;

pub use tutor_core::Clock;
pub use sessions as session;

pub use backend::{HttpTutorBackend, TutorBackend, TutorServiceConfig};
pub use config::OrchestratorConfig;
pub use error::{BackendError, SessionError};

pub use sessions::{
    PreviewOutcome, QuizOutcome, SessionOrchestrator, SessionPhase, SessionProgress,
    SessionSnapshot, StepTransition,
};

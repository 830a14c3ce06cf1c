mod orchestrator;
mod quiz;
mod resources;
mod state;
mod steps;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use orchestrator::{QuizOutcome, SessionOrchestrator};
pub use quiz::QuizGate;
pub use resources::{PreviewOutcome, ResourceTracker};
pub use state::{SessionPhase, SessionProgress, SessionSnapshot};
pub use steps::{StepAdvance, StepController, StepTransition};

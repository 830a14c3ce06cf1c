mod editor;
mod ids;
mod project;
mod quiz;
mod resource;
mod session;
mod step;

pub use editor::{EditorBuffers, starter_language};
pub use ids::{ExecutionId, QuestionId, RunId, SessionId};
pub use project::{EditorLanguage, ExpertiseLevel, ProjectParseError, ProjectType};
pub use quiz::{AnswerSubmission, GradingResult, Question, QuestionFeedback, QuizError, QuizSession};
pub use resource::{ExecutionReport, ResourceHandle};
pub use session::{
    Completion, DEFAULT_COMPLETION_MESSAGE, DEFAULT_PROJECT_IDEA, Session, SessionSetup,
    SessionStateError,
};
pub use step::{Step, StepDraft, StepError};

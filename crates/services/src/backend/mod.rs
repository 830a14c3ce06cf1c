//! Contract with the remote tutoring/execution service.
//!
//! Controllers only ever talk to a `TutorBackend`; the HTTP transport and the
//! scripted in-memory backend are interchangeable behind it.

mod http;
mod payload;
mod scripted;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use tutor_core::model::{
    AnswerSubmission, EditorBuffers, EditorLanguage, ExecutionId, ExpertiseLevel, GradingResult, ProjectType,
    Question, SessionId, StepDraft,
};

use crate::error::BackendError;

pub use http::{HttpTutorBackend, TutorServiceConfig};
pub use payload::{parse_project_outline, parse_step_outcome};
pub use scripted::{BackendCall, ScriptedBackend};

//
// ─── REQUESTS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartSessionRequest {
    pub project_type: ProjectType,
    pub expertise_level: ExpertiseLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_idea: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextStepRequest {
    pub session_id: SessionId,
    pub project_type: ProjectType,
    pub expertise_level: ExpertiseLevel,
    pub project_idea: String,
    #[serde(rename = "current_step")]
    pub step_index: usize,
    #[serde(rename = "user_code")]
    pub current_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizRequest {
    pub session_id: SessionId,
    pub step_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeRequest {
    pub session_id: SessionId,
    pub step_index: usize,
    pub answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskRequest {
    pub session_id: SessionId,
    pub project_type: ProjectType,
    pub question: String,
    #[serde(rename = "code")]
    pub current_code: String,
}

/// What to run for a preview.
///
/// Python goes to the execution endpoint; web projects render the HTML and
/// CSS buffers together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PreviewRequest {
    Execute {
        code: String,
        language: EditorLanguage,
    },
    Website {
        html_code: String,
        css_code: String,
    },
}

impl PreviewRequest {
    /// Build the request for whatever the editor currently shows.
    #[must_use]
    pub fn for_editor(editor: &EditorBuffers) -> Self {
        match editor.active() {
            EditorLanguage::Python => Self::Execute {
                code: editor.current_code().to_owned(),
                language: EditorLanguage::Python,
            },
            EditorLanguage::Html | EditorLanguage::Css | EditorLanguage::Javascript => {
                Self::Website {
                    html_code: editor.get(EditorLanguage::Html).to_owned(),
                    css_code: editor.get(EditorLanguage::Css).to_owned(),
                }
            }
        }
    }
}

//
// ─── REPLIES ──────────────────────────────────────────────────────────────────
//

/// Project plan returned when a session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectOutline {
    pub title: Option<String>,
    pub description: Option<String>,
    pub total_steps: Option<usize>,
    pub steps: Vec<StepDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSessionReply {
    pub session_id: SessionId,
    pub outline: ProjectOutline,
}

/// What the service answered to a "next step" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Step {
        draft: StepDraft,
        total_steps: Option<usize>,
    },
    Completed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextStepReply {
    pub session_id: SessionId,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestionsReply {
    pub session_id: SessionId,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeReply {
    pub session_id: SessionId,
    pub result: GradingResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskReply {
    pub session_id: SessionId,
    pub answer: String,
}

/// Raw result of starting a preview or execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewReply {
    pub execution_id: Option<ExecutionId>,
    pub is_long_running: bool,
    pub address: Option<Url>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub startup_error: Option<String>,
}

//
// ─── CONTRACT ─────────────────────────────────────────────────────────────────
//

/// Operations consumed from the AI/code-execution service.
#[async_trait]
pub trait TutorBackend: Send + Sync {
    /// Create a session and receive the initial project plan.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport failures or unparseable payloads.
    async fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> Result<StartSessionReply, BackendError>;

    /// Ask for the step after `request.step_index`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport failures or unparseable payloads.
    async fn next_step(&self, request: &NextStepRequest) -> Result<NextStepReply, BackendError>;

    /// # Errors
    ///
    /// Returns `BackendError` on transport failures or unparseable payloads.
    async fn fetch_quiz_questions(
        &self,
        request: &QuizRequest,
    ) -> Result<QuizQuestionsReply, BackendError>;

    /// # Errors
    ///
    /// Returns `BackendError` on transport failures or unparseable payloads.
    async fn grade_quiz(&self, request: &GradeRequest) -> Result<GradeReply, BackendError>;

    /// # Errors
    ///
    /// Returns `BackendError` on transport failures or unparseable payloads.
    async fn ask_question(&self, request: &AskRequest) -> Result<AskReply, BackendError>;

    /// Run code, either to completion or as a long-lived preview app.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport failures or unparseable payloads.
    async fn start_preview(&self, request: &PreviewRequest) -> Result<PreviewReply, BackendError>;

    /// Stop a long-lived preview app.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the stop request fails.
    async fn stop_preview(&self, execution_id: &ExecutionId) -> Result<(), BackendError>;
}

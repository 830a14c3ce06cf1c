use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tutor_core::model::{ExecutionId, GradingResult, Question, QuestionFeedback, SessionId};

use super::payload::{ExecuteWire, parse_project_outline, parse_step_outcome};
use super::{
    AskReply, AskRequest, GradeReply, GradeRequest, NextStepReply, NextStepRequest,
    PreviewReply, PreviewRequest, QuizQuestionsReply, QuizRequest, StartSessionReply,
    StartSessionRequest, TutorBackend,
};
use crate::error::BackendError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Clone, Debug)]
pub struct TutorServiceConfig {
    pub base_url: String,
}

impl TutorServiceConfig {
    /// Reads `TUTOR_SERVICE_URL`, defaulting to a local service.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var("TUTOR_SERVICE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());
        Self { base_url }
    }
}

impl Default for TutorServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
        }
    }
}

/// JSON-over-HTTP client for the tutoring service.
#[derive(Clone)]
pub struct HttpTutorBackend {
    client: Client,
    config: TutorServiceConfig,
}

impl HttpTutorBackend {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(TutorServiceConfig::from_env())
    }

    #[must_use]
    pub fn new(config: TutorServiceConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // FastAPI-style `{"detail": "..."}` bodies carry a readable reason.
            return Err(match serde_json::from_str::<ErrorBody>(&text) {
                Ok(ErrorBody { detail }) if !detail.trim().is_empty() => {
                    BackendError::Service(detail)
                }
                _ => BackendError::HttpStatus(status),
            });
        }

        debug!(path, status = status.as_u16(), "tutor service responded");
        serde_json::from_str(&text).map_err(|e| BackendError::Parse(format!("{path}: {e}")))
    }
}

#[async_trait]
impl TutorBackend for HttpTutorBackend {
    async fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> Result<StartSessionReply, BackendError> {
        let wire: StartProjectWire = self.post("start_project", request).await?;
        Ok(StartSessionReply {
            session_id: wire.session_id,
            outline: parse_project_outline(&wire.response)?,
        })
    }

    async fn next_step(&self, request: &NextStepRequest) -> Result<NextStepReply, BackendError> {
        let wire: EmbeddedWire = self.post("next_step", request).await?;
        Ok(NextStepReply {
            session_id: wire.session_id.unwrap_or_else(|| request.session_id.clone()),
            outcome: parse_step_outcome(&wire.response)?,
        })
    }

    async fn fetch_quiz_questions(
        &self,
        request: &QuizRequest,
    ) -> Result<QuizQuestionsReply, BackendError> {
        let wire: QuizWire = self.post("quiz_questions", request).await?;
        Ok(QuizQuestionsReply {
            session_id: wire.session_id.unwrap_or_else(|| request.session_id.clone()),
            questions: wire.questions,
        })
    }

    async fn grade_quiz(&self, request: &GradeRequest) -> Result<GradeReply, BackendError> {
        let wire: GradeWire = self.post("grade_quiz", request).await?;
        let result = GradingResult::new(
            wire.correct,
            wire.score,
            wire.question_feedback,
            wire.feedback,
        )
        .map_err(|e| BackendError::Parse(e.to_string()))?;
        Ok(GradeReply {
            session_id: wire.session_id.unwrap_or_else(|| request.session_id.clone()),
            result,
        })
    }

    async fn ask_question(&self, request: &AskRequest) -> Result<AskReply, BackendError> {
        let wire: EmbeddedWire = self.post("ask_question", request).await?;
        Ok(AskReply {
            session_id: wire.session_id.unwrap_or_else(|| request.session_id.clone()),
            answer: wire.response,
        })
    }

    async fn start_preview(&self, request: &PreviewRequest) -> Result<PreviewReply, BackendError> {
        match request {
            PreviewRequest::Execute { .. } => {
                let wire: ExecuteWire = self.post("execute", request).await?;
                wire.into_reply()
            }
            // The page is rendered client-side; the service only acknowledges it.
            PreviewRequest::Website { .. } => {
                let _: IgnoredAny = self.post("render_website", request).await?;
                Ok(PreviewReply {
                    exit_code: Some(0),
                    ..PreviewReply::default()
                })
            }
        }
    }

    async fn stop_preview(&self, execution_id: &ExecutionId) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.url("stop_execution"))
            .json(&StopBody { execution_id })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

//
// ─── WIRE SHAPES ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, Deserialize)]
struct StartProjectWire {
    session_id: SessionId,
    response: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddedWire {
    #[serde(default)]
    session_id: Option<SessionId>,
    response: String,
}

#[derive(Debug, Deserialize)]
struct QuizWire {
    #[serde(default)]
    session_id: Option<SessionId>,
    #[serde(default)]
    questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
struct GradeWire {
    #[serde(default)]
    session_id: Option<SessionId>,
    correct: bool,
    #[serde(default)]
    score: u32,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    question_feedback: Vec<QuestionFeedback>,
}

#[derive(Debug, Serialize)]
struct StopBody<'a> {
    execution_id: &'a ExecutionId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let backend = HttpTutorBackend::new(TutorServiceConfig {
            base_url: "http://tutor.local:9000/".into(),
        });
        assert_eq!(backend.url("next_step"), "http://tutor.local:9000/next_step");
    }

    #[test]
    fn next_step_body_uses_service_field_names() {
        use tutor_core::model::{ExpertiseLevel, ProjectType};

        let body = serde_json::to_value(NextStepRequest {
            session_id: SessionId::new("s1"),
            project_type: ProjectType::HtmlCssJs,
            expertise_level: ExpertiseLevel::Beginner,
            project_idea: "Portfolio".into(),
            step_index: 2,
            current_code: "<p>hi</p>".into(),
        })
        .unwrap();
        assert_eq!(body["project_type"], "html+css+js");
        assert_eq!(body["current_step"], 2);
        assert_eq!(body["user_code"], "<p>hi</p>");
        assert_eq!(body["session_id"], "s1");
    }

    #[test]
    fn preview_bodies_match_their_endpoints() {
        let execute = serde_json::to_value(PreviewRequest::Execute {
            code: "print(1)".into(),
            language: tutor_core::model::EditorLanguage::Python,
        })
        .unwrap();
        assert_eq!(execute, serde_json::json!({"code": "print(1)", "language": "python"}));

        let website = serde_json::to_value(PreviewRequest::Website {
            html_code: "<h1>hi</h1>".into(),
            css_code: "h1 { color: red; }".into(),
        })
        .unwrap();
        assert_eq!(
            website,
            serde_json::json!({"html_code": "<h1>hi</h1>", "css_code": "h1 { color: red; }"})
        );
    }

    #[test]
    fn grade_wire_accepts_missing_optionals() {
        let wire: GradeWire = serde_json::from_str(r#"{"correct": false}"#).unwrap();
        assert!(!wire.correct);
        assert_eq!(wire.score, 0);
        assert!(wire.question_feedback.is_empty());
    }
}

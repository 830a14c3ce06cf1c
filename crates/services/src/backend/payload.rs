use serde::Deserialize;
use serde_json::Value;
use url::Url;

use tutor_core::model::{DEFAULT_COMPLETION_MESSAGE, ExecutionId, StepDraft};

use super::{PreviewReply, ProjectOutline, StepOutcome};
use crate::error::BackendError;

#[derive(Debug, Deserialize)]
struct OutlineWire {
    #[serde(default)]
    project_title: Option<String>,
    #[serde(default)]
    project_description: Option<String>,
    #[serde(default)]
    total_steps: Option<usize>,
    #[serde(default)]
    steps: Vec<StepDraft>,
}

/// Parse the project plan the service embeds as a JSON string.
///
/// # Errors
///
/// Returns `BackendError::Parse` if the text is not a plan document.
pub fn parse_project_outline(raw: &str) -> Result<ProjectOutline, BackendError> {
    let wire: OutlineWire = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| BackendError::Parse(format!("project outline: {e}")))?;

    Ok(ProjectOutline {
        title: wire.project_title,
        description: wire.project_description,
        total_steps: wire.total_steps,
        steps: wire.steps,
    })
}

/// Parse a "next step" document: either a step or a completion signal.
///
/// # Errors
///
/// Returns `BackendError::Parse` if the text is neither.
pub fn parse_step_outcome(raw: &str) -> Result<StepOutcome, BackendError> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| BackendError::Parse(format!("next step: {e}")))?;

    if value.get("completed").and_then(Value::as_bool) == Some(true) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_COMPLETION_MESSAGE)
            .to_owned();
        return Ok(StepOutcome::Completed { message });
    }

    let total_steps = value
        .get("total_steps")
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok());
    let draft: StepDraft = serde_json::from_value(value)
        .map_err(|e| BackendError::Parse(format!("next step: {e}")))?;

    Ok(StepOutcome::Step { draft, total_steps })
}

/// Model output sometimes arrives wrapped in a markdown code fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Debug, Deserialize)]
pub(super) struct ExecuteWire {
    #[serde(default)]
    execution_id: Option<String>,
    #[serde(default)]
    is_long_running: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    exit_code: Option<i32>,
    #[serde(default)]
    error: Option<String>,
}

impl ExecuteWire {
    pub(super) fn into_reply(self) -> Result<PreviewReply, BackendError> {
        let address = self
            .url
            .filter(|u| !u.trim().is_empty())
            .map(|u| Url::parse(&u).map_err(|e| BackendError::Parse(format!("preview url: {e}"))))
            .transpose()?;

        Ok(PreviewReply {
            execution_id: self
                .execution_id
                .filter(|id| !id.is_empty())
                .map(ExecutionId::new),
            is_long_running: self.is_long_running,
            address,
            stdout: self.stdout.unwrap_or_default(),
            stderr: self.stderr.unwrap_or_default(),
            exit_code: self.exit_code,
            startup_error: self.error.filter(|e| !e.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_reads_plan_fields() {
        let raw = r#"{
            "project_title": "Todo app",
            "project_description": "A small todo list",
            "total_steps": 5,
            "steps": [{"title": "Step 1: Markup", "description": "Write the page", "code": "<html></html>"}]
        }"#;
        let outline = parse_project_outline(raw).unwrap();
        assert_eq!(outline.title.as_deref(), Some("Todo app"));
        assert_eq!(outline.total_steps, Some(5));
        assert_eq!(outline.steps.len(), 1);
        assert_eq!(outline.steps[0].suggested_code.as_deref(), Some("<html></html>"));
    }

    #[test]
    fn outline_rejects_plain_text() {
        let err = parse_project_outline("Sure! Here is your project").unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[test]
    fn step_outcome_detects_completion() {
        let outcome = parse_step_outcome(r#"{"completed": true, "message": "All done"}"#).unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Completed {
                message: "All done".into()
            }
        );

        let defaulted = parse_step_outcome(r#"{"completed": true}"#).unwrap();
        assert!(matches!(defaulted, StepOutcome::Completed { message } if !message.is_empty()));
    }

    #[test]
    fn step_outcome_reads_step_and_total() {
        let raw = r#"{"title": "Style it", "description": "Add CSS", "total_steps": 4, "feedback": "Good markup"}"#;
        let StepOutcome::Step { draft, total_steps } = parse_step_outcome(raw).unwrap() else {
            panic!("expected a step");
        };
        assert_eq!(draft.title, "Style it");
        assert_eq!(draft.feedback.as_deref(), Some("Good markup"));
        assert_eq!(total_steps, Some(4));
    }

    #[test]
    fn fenced_json_is_accepted() {
        let raw = "```json\n{\"title\": \"T\", \"description\": \"D\"}\n```";
        assert!(matches!(
            parse_step_outcome(raw).unwrap(),
            StepOutcome::Step { .. }
        ));
    }

    #[test]
    fn execute_wire_maps_to_reply() {
        let wire: ExecuteWire = serde_json::from_str(
            r#"{"execution_id": "e1", "is_long_running": true, "url": "http://localhost:8501"}"#,
        )
        .unwrap();
        let reply = wire.into_reply().unwrap();
        assert_eq!(reply.execution_id, Some(ExecutionId::new("e1")));
        assert!(reply.is_long_running);
        assert_eq!(reply.address.unwrap().port(), Some(8501));
    }

    #[test]
    fn execute_wire_rejects_bad_url() {
        let wire: ExecuteWire =
            serde_json::from_str(r#"{"execution_id": "e1", "is_long_running": true, "url": "not a url"}"#)
                .unwrap();
        assert!(matches!(wire.into_reply(), Err(BackendError::Parse(_))));
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepError {
    #[error("step has no description")]
    MissingDescription,
    #[error("step feedback has already been recorded")]
    FeedbackAlreadySet,
}

//
// ─── DRAFT ────────────────────────────────────────────────────────────────────
//

/// Unvalidated step as produced by the tutoring service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "code")]
    pub suggested_code: Option<String>,
    #[serde(default)]
    pub expected_outcome: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub quiz_question: Option<String>,
}

impl StepDraft {
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_suggested_code(mut self, code: impl Into<String>) -> Self {
        self.suggested_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    /// Validate the draft into an immutable `Step`.
    ///
    /// Blank optional fields are normalized to `None`.
    ///
    /// # Errors
    ///
    /// Returns `StepError::MissingDescription` when the description is blank.
    pub fn validate(self) -> Result<Step, StepError> {
        if self.description.trim().is_empty() {
            return Err(StepError::MissingDescription);
        }

        Ok(Step {
            title: self.title.trim().to_owned(),
            description: self.description,
            suggested_code: non_blank(self.suggested_code),
            expected_outcome: non_blank(self.expected_outcome),
            quiz_question: non_blank(self.quiz_question),
            feedback: non_blank(self.feedback),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

//
// ─── STEP ─────────────────────────────────────────────────────────────────────
//

/// One unit of guidance in a project.
///
/// Everything except `feedback` is fixed at construction. Feedback can be
/// recorded once, either by the service alongside the step or later when an
/// evaluation returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    title: String,
    description: String,
    suggested_code: Option<String>,
    expected_outcome: Option<String>,
    quiz_question: Option<String>,
    feedback: Option<String>,
}

impl Step {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn suggested_code(&self) -> Option<&str> {
        self.suggested_code.as_deref()
    }

    #[must_use]
    pub fn expected_outcome(&self) -> Option<&str> {
        self.expected_outcome.as_deref()
    }

    #[must_use]
    pub fn quiz_question(&self) -> Option<&str> {
        self.quiz_question.as_deref()
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    /// Title prefixed with its 1-based step number, e.g. `Step 2: Add styles`.
    ///
    /// A number already present in the title is replaced so the prefix always
    /// matches the step's position.
    #[must_use]
    pub fn display_title(&self, step_number: usize) -> String {
        let bare = strip_step_prefix(&self.title);
        if bare.is_empty() {
            format!("Step {step_number}")
        } else {
            format!("Step {step_number}: {bare}")
        }
    }

    /// Record evaluation feedback.
    ///
    /// # Errors
    ///
    /// Returns `StepError::FeedbackAlreadySet` if feedback was recorded before.
    pub fn set_feedback(&mut self, feedback: impl Into<String>) -> Result<(), StepError> {
        if self.feedback.is_some() {
            return Err(StepError::FeedbackAlreadySet);
        }
        self.feedback = Some(feedback.into());
        Ok(())
    }
}

/// Removes a leading `Step <digits>:` label.
fn strip_step_prefix(title: &str) -> &str {
    let trimmed = title.trim();
    let Some(rest) = trimmed.strip_prefix("Step") else {
        return trimmed;
    };
    let rest = rest.trim_start();
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return trimmed;
    }
    match rest[digits..].strip_prefix(':') {
        Some(tail) => tail.trim_start(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_description() {
        let err = StepDraft::new("Setup", "   ").validate().unwrap_err();
        assert_eq!(err, StepError::MissingDescription);
    }

    #[test]
    fn validate_drops_blank_optionals() {
        let step = StepDraft::new("Setup", "Create the page")
            .with_suggested_code("  ")
            .validate()
            .unwrap();
        assert_eq!(step.suggested_code(), None);
        assert_eq!(step.feedback(), None);
    }

    #[test]
    fn display_title_normalizes_numbering() {
        let step = StepDraft::new("Step 3: Add a header", "d").validate().unwrap();
        assert_eq!(step.display_title(2), "Step 2: Add a header");

        let plain = StepDraft::new("Add a header", "d").validate().unwrap();
        assert_eq!(plain.display_title(1), "Step 1: Add a header");

        let untitled = StepDraft::new("", "d").validate().unwrap();
        assert_eq!(untitled.display_title(4), "Step 4");

        let stepping = StepDraft::new("Stepping stones", "d").validate().unwrap();
        assert_eq!(stepping.display_title(1), "Step 1: Stepping stones");
    }

    #[test]
    fn feedback_is_set_once() {
        let mut step = StepDraft::new("t", "d").validate().unwrap();
        step.set_feedback("nice work").unwrap();
        assert_eq!(step.feedback(), Some("nice work"));
        assert_eq!(
            step.set_feedback("again"),
            Err(StepError::FeedbackAlreadySet)
        );
        assert_eq!(step.feedback(), Some("nice work"));
    }

    #[test]
    fn draft_reads_service_field_names() {
        let json = r#"{"title":"T","description":"D","code":"print(1)","expected_outcome":"1"}"#;
        let draft: StepDraft = serde_json::from_str(json).unwrap();
        let step = draft.validate().unwrap();
        assert_eq!(step.suggested_code(), Some("print(1)"));
        assert_eq!(step.expected_outcome(), Some("1"));
    }
}

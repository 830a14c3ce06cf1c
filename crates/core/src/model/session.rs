use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::SessionId;
use crate::model::project::{ExpertiseLevel, ProjectParseError, ProjectType};
use crate::model::resource::ResourceHandle;
use crate::model::step::Step;

/// Idea forwarded to the service when the learner did not provide one.
pub const DEFAULT_PROJECT_IDEA: &str = "AI suggested project";

/// Message recorded when the project ends without one from the service.
pub const DEFAULT_COMPLETION_MESSAGE: &str = "Congratulations, the project is complete!";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session already completed")]
    Completed,

    #[error("no step is available after step {index}")]
    NoNextStep { index: usize },

    #[error("a preview process is already attached to the session")]
    ResourceActive,
}

/// What the learner chose before the session started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetup {
    pub project_type: ProjectType,
    pub expertise_level: ExpertiseLevel,
    pub project_idea: Option<String>,
}

impl SessionSetup {
    #[must_use]
    pub fn new(project_type: ProjectType, expertise_level: ExpertiseLevel) -> Self {
        Self {
            project_type,
            expertise_level,
            project_idea: None,
        }
    }

    /// Build a setup from the raw choices of a setup form.
    ///
    /// # Errors
    ///
    /// Returns `ProjectParseError` for an unknown project type or level.
    pub fn parse(
        project_type: &str,
        expertise_level: &str,
        project_idea: Option<&str>,
    ) -> Result<Self, ProjectParseError> {
        let setup = Self::new(project_type.parse()?, expertise_level.parse()?);
        Ok(match project_idea {
            Some(idea) => setup.with_project_idea(idea),
            None => setup,
        })
    }

    #[must_use]
    pub fn with_project_idea(mut self, idea: impl Into<String>) -> Self {
        let idea = idea.into();
        self.project_idea = (!idea.trim().is_empty()).then_some(idea);
        self
    }

    /// Idea as sent to the service, falling back to the default wording.
    #[must_use]
    pub fn idea_or_default(&self) -> &str {
        self.project_idea.as_deref().unwrap_or(DEFAULT_PROJECT_IDEA)
    }
}

/// Terminal marker recorded when the service reports the project done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub message: String,
    pub completed_at: DateTime<Utc>,
}

/// A learner's guided-project run.
///
/// Steps are append-only and the step pointer only moves forward. Once
/// completed, the session refuses further step and resource changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    setup: SessionSetup,
    title: Option<String>,
    description: Option<String>,
    steps: Vec<Step>,
    current_step_index: usize,
    total_steps: Option<usize>,
    completion: Option<Completion>,
    active_resource: Option<ResourceHandle>,
    started_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn new(id: SessionId, setup: SessionSetup, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            setup,
            title: None,
            description: None,
            steps: Vec::new(),
            current_step_index: 0,
            total_steps: None,
            completion: None,
            active_resource: None,
            started_at,
        }
    }

    #[must_use]
    pub fn with_outline(
        mut self,
        title: Option<String>,
        description: Option<String>,
        total_steps: Option<usize>,
    ) -> Self {
        self.title = title;
        self.description = description;
        self.total_steps = total_steps;
        self
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn setup(&self) -> &SessionSetup {
        &self.setup
    }

    #[must_use]
    pub fn project_type(&self) -> ProjectType {
        self.setup.project_type
    }

    #[must_use]
    pub fn expertise_level(&self) -> ExpertiseLevel {
        self.setup.expertise_level
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    #[must_use]
    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.current_step_index)
    }

    pub fn current_step_mut(&mut self) -> Option<&mut Step> {
        self.steps.get_mut(self.current_step_index)
    }

    #[must_use]
    pub fn total_steps(&self) -> Option<usize> {
        self.total_steps
    }

    pub fn set_total_steps(&mut self, total: usize) {
        self.total_steps = Some(total);
    }

    /// True when the pointer sits on the last step the service announced.
    #[must_use]
    pub fn is_last_step(&self) -> bool {
        self.total_steps
            .is_some_and(|total| self.current_step_index + 1 >= total)
    }

    #[must_use]
    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completion.is_some()
    }

    #[must_use]
    pub fn active_resource(&self) -> Option<&ResourceHandle> {
        self.active_resource.as_ref()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Append a step without moving the pointer.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::Completed` on a finished session.
    pub fn push_step(&mut self, step: Step) -> Result<usize, SessionStateError> {
        self.ensure_open()?;
        self.steps.push(step);
        Ok(self.steps.len() - 1)
    }

    /// Move the pointer to the next known step.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::Completed` on a finished session and
    /// `SessionStateError::NoNextStep` if no step follows the current one.
    pub fn advance(&mut self) -> Result<usize, SessionStateError> {
        self.ensure_open()?;
        let next = self.current_step_index + 1;
        if next >= self.steps.len() {
            return Err(SessionStateError::NoNextStep {
                index: self.current_step_index,
            });
        }
        self.current_step_index = next;
        Ok(next)
    }

    /// Mark the project finished.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::Completed` if already finished.
    pub fn complete(
        &mut self,
        message: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), SessionStateError> {
        self.ensure_open()?;
        self.completion = Some(Completion {
            message: message.into(),
            completed_at,
        });
        Ok(())
    }

    /// Attach a running preview process.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::ResourceActive` while another handle is
    /// attached, or `SessionStateError::Completed` on a finished session.
    pub fn attach_resource(&mut self, handle: ResourceHandle) -> Result<(), SessionStateError> {
        self.ensure_open()?;
        if self.active_resource.is_some() {
            return Err(SessionStateError::ResourceActive);
        }
        self.active_resource = Some(handle);
        Ok(())
    }

    /// Detach the running preview process, if any.
    pub fn take_resource(&mut self) -> Option<ResourceHandle> {
        self.active_resource.take()
    }

    fn ensure_open(&self) -> Result<(), SessionStateError> {
        if self.is_completed() {
            Err(SessionStateError::Completed)
        } else {
            Ok(())
        }
    }
}

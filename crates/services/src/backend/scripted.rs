use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use tutor_core::model::ExecutionId;

use super::{
    AskReply, AskRequest, GradeReply, GradeRequest, NextStepReply, NextStepRequest,
    PreviewReply, PreviewRequest, QuizQuestionsReply, QuizRequest, StartSessionReply,
    StartSessionRequest, TutorBackend,
};
use crate::error::BackendError;

/// A call observed by `ScriptedBackend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    StartSession(StartSessionRequest),
    NextStep(NextStepRequest),
    FetchQuiz(QuizRequest),
    GradeQuiz(GradeRequest),
    Ask(AskRequest),
    StartPreview(PreviewRequest),
    StopPreview(ExecutionId),
}

#[derive(Default)]
struct Scripts {
    start: VecDeque<Result<StartSessionReply, BackendError>>,
    next: VecDeque<Result<NextStepReply, BackendError>>,
    quiz: VecDeque<Result<QuizQuestionsReply, BackendError>>,
    grade: VecDeque<Result<GradeReply, BackendError>>,
    ask: VecDeque<Result<AskReply, BackendError>>,
    preview: VecDeque<Result<PreviewReply, BackendError>>,
    stop: VecDeque<Result<(), BackendError>>,
    calls: Vec<BackendCall>,
}

/// In-memory backend that replays queued replies, for tests and prototyping.
///
/// Each operation pops the next queued reply; an empty queue yields a
/// `BackendError::Service`. Stopping a preview succeeds unless a failure was
/// queued. Every call is recorded in order.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    scripts: Arc<Mutex<Scripts>>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn scripts(&self) -> Result<MutexGuard<'_, Scripts>, BackendError> {
        self.scripts
            .lock()
            .map_err(|e| BackendError::Service(e.to_string()))
    }

    fn with_scripts(&self, f: impl FnOnce(&mut Scripts)) {
        if let Ok(mut scripts) = self.scripts.lock() {
            f(&mut scripts);
        }
    }

    pub fn push_start(&self, reply: Result<StartSessionReply, BackendError>) {
        self.with_scripts(|s| s.start.push_back(reply));
    }

    pub fn push_next(&self, reply: Result<NextStepReply, BackendError>) {
        self.with_scripts(|s| s.next.push_back(reply));
    }

    pub fn push_quiz(&self, reply: Result<QuizQuestionsReply, BackendError>) {
        self.with_scripts(|s| s.quiz.push_back(reply));
    }

    pub fn push_grade(&self, reply: Result<GradeReply, BackendError>) {
        self.with_scripts(|s| s.grade.push_back(reply));
    }

    pub fn push_ask(&self, reply: Result<AskReply, BackendError>) {
        self.with_scripts(|s| s.ask.push_back(reply));
    }

    pub fn push_preview(&self, reply: Result<PreviewReply, BackendError>) {
        self.with_scripts(|s| s.preview.push_back(reply));
    }

    pub fn push_stop(&self, reply: Result<(), BackendError>) {
        self.with_scripts(|s| s.stop.push_back(reply));
    }

    /// Calls recorded so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.scripts
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn count(&self, matches: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }
}

fn missing<T>(operation: &str) -> Result<T, BackendError> {
    Err(BackendError::Service(format!("no scripted reply for {operation}")))
}

#[async_trait]
impl TutorBackend for ScriptedBackend {
    async fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> Result<StartSessionReply, BackendError> {
        let mut s = self.scripts()?;
        s.calls.push(BackendCall::StartSession(request.clone()));
        s.start.pop_front().unwrap_or_else(|| missing("start_session"))
    }

    async fn next_step(&self, request: &NextStepRequest) -> Result<NextStepReply, BackendError> {
        let mut s = self.scripts()?;
        s.calls.push(BackendCall::NextStep(request.clone()));
        s.next.pop_front().unwrap_or_else(|| missing("next_step"))
    }

    async fn fetch_quiz_questions(
        &self,
        request: &QuizRequest,
    ) -> Result<QuizQuestionsReply, BackendError> {
        let mut s = self.scripts()?;
        s.calls.push(BackendCall::FetchQuiz(request.clone()));
        s.quiz.pop_front().unwrap_or_else(|| missing("fetch_quiz_questions"))
    }

    async fn grade_quiz(&self, request: &GradeRequest) -> Result<GradeReply, BackendError> {
        let mut s = self.scripts()?;
        s.calls.push(BackendCall::GradeQuiz(request.clone()));
        s.grade.pop_front().unwrap_or_else(|| missing("grade_quiz"))
    }

    async fn ask_question(&self, request: &AskRequest) -> Result<AskReply, BackendError> {
        let mut s = self.scripts()?;
        s.calls.push(BackendCall::Ask(request.clone()));
        s.ask.pop_front().unwrap_or_else(|| missing("ask_question"))
    }

    async fn start_preview(&self, request: &PreviewRequest) -> Result<PreviewReply, BackendError> {
        let mut s = self.scripts()?;
        s.calls.push(BackendCall::StartPreview(request.clone()));
        s.preview.pop_front().unwrap_or_else(|| missing("start_preview"))
    }

    async fn stop_preview(&self, execution_id: &ExecutionId) -> Result<(), BackendError> {
        let mut s = self.scripts()?;
        s.calls.push(BackendCall::StopPreview(execution_id.clone()));
        s.stop.pop_front().unwrap_or(Ok(()))
    }
}

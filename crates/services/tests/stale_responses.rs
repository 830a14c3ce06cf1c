use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use tutor_core::model::{
    ExecutionId, ExpertiseLevel, GradingResult, ProjectType, Question, QuestionId, SessionId,
    SessionSetup, StepDraft,
};
use tutor_services::backend::{
    AskReply, AskRequest, BackendCall, GradeReply, GradeRequest, NextStepReply, NextStepRequest,
    PreviewReply, PreviewRequest, ProjectOutline, QuizQuestionsReply, QuizRequest,
    ScriptedBackend, StartSessionReply, StartSessionRequest, StepOutcome, TutorBackend,
};
use tutor_services::{
    BackendError, OrchestratorConfig, SessionError, SessionOrchestrator, SessionPhase,
};
use url::Url;

/// Operation held back until the test lets it through.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Gate {
    NextStep,
    Grade,
    Ask,
    Preview,
}

#[derive(Clone)]
struct GatedBackend {
    inner: ScriptedBackend,
    gate: Gate,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl GatedBackend {
    fn new(inner: ScriptedBackend, gate: Gate) -> Self {
        Self {
            inner,
            gate,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    async fn hold(&self, operation: Gate) {
        if operation != self.gate {
            return;
        }
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[async_trait]
impl TutorBackend for GatedBackend {
    async fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> Result<StartSessionReply, BackendError> {
        self.inner.start_session(request).await
    }

    async fn next_step(&self, request: &NextStepRequest) -> Result<NextStepReply, BackendError> {
        self.hold(Gate::NextStep).await;
        self.inner.next_step(request).await
    }

    async fn fetch_quiz_questions(
        &self,
        request: &QuizRequest,
    ) -> Result<QuizQuestionsReply, BackendError> {
        self.inner.fetch_quiz_questions(request).await
    }

    async fn grade_quiz(&self, request: &GradeRequest) -> Result<GradeReply, BackendError> {
        self.hold(Gate::Grade).await;
        self.inner.grade_quiz(request).await
    }

    async fn ask_question(&self, request: &AskRequest) -> Result<AskReply, BackendError> {
        self.hold(Gate::Ask).await;
        self.inner.ask_question(request).await
    }

    async fn start_preview(&self, request: &PreviewRequest) -> Result<PreviewReply, BackendError> {
        self.hold(Gate::Preview).await;
        self.inner.start_preview(request).await
    }

    async fn stop_preview(&self, execution_id: &ExecutionId) -> Result<(), BackendError> {
        self.inner.stop_preview(execution_id).await
    }
}

fn started(id: &str) -> StartSessionReply {
    StartSessionReply {
        session_id: SessionId::new(id),
        outline: ProjectOutline {
            steps: vec![StepDraft::new("One", "First")],
            ..ProjectOutline::default()
        },
    }
}

fn setup() -> SessionSetup {
    SessionSetup::new(ProjectType::PythonStreamlit, ExpertiseLevel::Beginner)
}

fn orchestrator(gated: &GatedBackend) -> SessionOrchestrator {
    SessionOrchestrator::new(
        Arc::new(gated.clone()),
        OrchestratorConfig::immediate().with_require_quiz(false),
    )
}

#[tokio::test]
async fn second_action_while_busy_is_rejected() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(started("s-1")));
    backend.push_ask(Ok(AskReply {
        session_id: SessionId::new("s-1"),
        answer: "Use st.write.".into(),
    }));
    let gated = GatedBackend::new(backend.clone(), Gate::Ask);
    let orch = orchestrator(&gated);
    orch.start_session(setup()).await.unwrap();

    let pending = tokio::spawn({
        let orch = orch.clone();
        async move { orch.ask_question("How do I print?").await }
    });
    gated.entered.notified().await;

    assert!(orch.is_busy().unwrap());
    assert!(matches!(
        orch.ask_question("Another one?").await,
        Err(SessionError::Busy)
    ));
    assert!(matches!(orch.complete_step().await, Err(SessionError::Busy)));

    gated.release.notify_one();
    assert_eq!(pending.await.unwrap().unwrap(), "Use st.write.");
    assert!(!orch.is_busy().unwrap());
    assert_eq!(backend.count(|c| matches!(c, BackendCall::Ask(_))), 1);
}

#[tokio::test]
async fn reply_for_a_reset_session_is_dropped() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(started("s-1")));
    backend.push_start(Ok(started("s-2")));
    backend.push_ask(Ok(AskReply {
        session_id: SessionId::new("s-1"),
        answer: "old answer".into(),
    }));
    let gated = GatedBackend::new(backend.clone(), Gate::Ask);
    let orch = orchestrator(&gated);
    orch.start_session(setup()).await.unwrap();

    let pending = tokio::spawn({
        let orch = orch.clone();
        async move { orch.ask_question("Still there?").await }
    });
    gated.entered.notified().await;

    orch.reset().await;
    orch.start_session(setup()).await.unwrap();
    gated.release.notify_one();

    assert!(matches!(pending.await.unwrap(), Err(SessionError::Stale)));
    let snap = orch.snapshot().unwrap();
    assert_eq!(snap.session.unwrap().id(), &SessionId::new("s-2"));
    assert!(snap.last_answer.is_none());
    assert!(!snap.busy);
}

#[tokio::test]
async fn preview_started_for_a_reset_session_is_stopped() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(started("s-1")));
    backend.push_preview(Ok(PreviewReply {
        execution_id: Some(ExecutionId::new("e-old")),
        is_long_running: true,
        address: Some(Url::parse("http://localhost:8501").unwrap()),
        ..PreviewReply::default()
    }));
    let gated = GatedBackend::new(backend.clone(), Gate::Preview);
    let orch = orchestrator(&gated);
    orch.start_session(setup()).await.unwrap();

    let pending = tokio::spawn({
        let orch = orch.clone();
        async move { orch.run_code().await }
    });
    gated.entered.notified().await;

    orch.reset().await;
    gated.release.notify_one();

    assert!(matches!(pending.await.unwrap(), Err(SessionError::Stale)));
    assert_eq!(
        backend.count(|c| *c == BackendCall::StopPreview(ExecutionId::new("e-old"))),
        1
    );
    assert!(orch.snapshot().unwrap().session.is_none());
}

#[tokio::test]
async fn step_reply_for_a_reset_session_is_dropped() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(started("s-1")));
    backend.push_start(Ok(started("s-2")));
    backend.push_next(Ok(NextStepReply {
        session_id: SessionId::new("s-1"),
        outcome: StepOutcome::Step {
            draft: StepDraft::new("Two", "Second"),
            total_steps: None,
        },
    }));
    let gated = GatedBackend::new(backend.clone(), Gate::NextStep);
    let orch = orchestrator(&gated);
    orch.start_session(setup()).await.unwrap();

    let pending = tokio::spawn({
        let orch = orch.clone();
        async move { orch.next_step().await }
    });
    gated.entered.notified().await;

    orch.reset().await;
    orch.start_session(setup()).await.unwrap();
    let fresh = orch.snapshot().unwrap();
    gated.release.notify_one();

    assert!(matches!(pending.await.unwrap(), Err(SessionError::Stale)));
    let snap = orch.snapshot().unwrap();
    assert_eq!(snap.phase, SessionPhase::InStep);
    assert_eq!(snap.session, fresh.session);
    let session = snap.session.unwrap();
    assert_eq!(session.id(), &SessionId::new("s-2"));
    assert_eq!(session.steps().len(), 1);
    assert_eq!(session.current_step_index(), 0);
    assert!(!snap.busy);
}

#[tokio::test]
async fn grade_for_a_reset_session_is_dropped() {
    let backend = ScriptedBackend::new();
    backend.push_start(Ok(started("s-1")));
    backend.push_start(Ok(started("s-2")));
    backend.push_quiz(Ok(QuizQuestionsReply {
        session_id: SessionId::new("s-1"),
        questions: vec![Question {
            id: QuestionId::new("q1"),
            text: "Which call prints text?".into(),
            options: vec!["st.write".into(), "st.sidebar".into()],
            correct_answer: Some("st.write".into()),
        }],
    }));
    backend.push_grade(Ok(GradeReply {
        session_id: SessionId::new("s-1"),
        result: GradingResult::new(true, 100, Vec::new(), None).unwrap(),
    }));
    let gated = GatedBackend::new(backend.clone(), Gate::Grade);
    let orch = orchestrator(&gated);
    orch.start_session(setup()).await.unwrap();
    orch.complete_step().await.unwrap();
    orch.record_answer(QuestionId::new("q1"), "st.write").unwrap();

    let pending = tokio::spawn({
        let orch = orch.clone();
        async move { orch.submit_quiz().await }
    });
    gated.entered.notified().await;

    orch.reset().await;
    orch.start_session(setup()).await.unwrap();
    gated.release.notify_one();

    assert!(matches!(pending.await.unwrap(), Err(SessionError::Stale)));
    let snap = orch.snapshot().unwrap();
    assert_eq!(snap.phase, SessionPhase::InStep);
    let session = snap.session.unwrap();
    assert_eq!(session.id(), &SessionId::new("s-2"));
    assert_eq!(session.steps().len(), 1);
    assert!(session.steps()[0].feedback().is_none());
    assert_eq!(backend.count(|c| matches!(c, BackendCall::NextStep(_))), 0);
}

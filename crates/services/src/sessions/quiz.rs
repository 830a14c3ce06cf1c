use std::sync::Arc;

use tutor_core::model::{GradingResult, QuizSession, SessionId};

use crate::backend::{GradeRequest, QuizRequest, TutorBackend};
use crate::error::SessionError;

/// Verification gate between a step and the next one.
#[derive(Clone)]
pub struct QuizGate {
    backend: Arc<dyn TutorBackend>,
}

impl QuizGate {
    #[must_use]
    pub fn new(backend: Arc<dyn TutorBackend>) -> Self {
        Self { backend }
    }

    /// Fetch the questions for a step and open a quiz for them.
    ///
    /// Returns the session id the reply was issued for alongside the quiz.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Backend` on transport failures and
    /// `SessionError::Domain` when the service sent no usable questions.
    pub async fn fetch_questions(
        &self,
        session_id: &SessionId,
        step_index: usize,
    ) -> Result<(SessionId, QuizSession), SessionError> {
        let reply = self
            .backend
            .fetch_quiz_questions(&QuizRequest {
                session_id: session_id.clone(),
                step_index,
            })
            .await?;
        let quiz = QuizSession::new(step_index, reply.questions)?;
        Ok((reply.session_id, quiz))
    }

    /// Build the grading request, refusing incomplete answer sets.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Unanswered` (wrapped) with the number of questions
    /// still missing an answer. No request is built in that case.
    pub fn prepare_submission(
        session_id: &SessionId,
        quiz: &QuizSession,
    ) -> Result<GradeRequest, SessionError> {
        Ok(GradeRequest {
            session_id: session_id.clone(),
            step_index: quiz.step_index(),
            answers: quiz.submission()?,
        })
    }

    /// # Errors
    ///
    /// Returns `SessionError::Backend` when grading fails.
    pub async fn submit(
        &self,
        request: &GradeRequest,
    ) -> Result<(SessionId, GradingResult), SessionError> {
        let reply = self.backend.grade_quiz(request).await?;
        Ok((reply.session_id, reply.result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, QuizQuestionsReply, ScriptedBackend};
    use tutor_core::model::{Question, QuestionId, QuizError};

    fn questions(n: usize) -> Vec<Question> {
        (1..=n)
            .map(|i| Question {
                id: QuestionId::new(format!("q{i}")),
                text: format!("Q{i}"),
                options: vec!["yes".into(), "no".into()],
                correct_answer: Some("yes".into()),
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_question_list_fails_fetch() {
        let backend = ScriptedBackend::new();
        backend.push_quiz(Ok(QuizQuestionsReply {
            session_id: SessionId::new("s1"),
            questions: Vec::new(),
        }));
        let gate = QuizGate::new(Arc::new(backend));

        let err = gate
            .fetch_questions(&SessionId::new("s1"), 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Domain(tutor_core::Error::Quiz(QuizError::NoQuestions))
        ));
    }

    #[tokio::test]
    async fn fetched_quiz_is_scoped_to_step() {
        let backend = ScriptedBackend::new();
        backend.push_quiz(Ok(QuizQuestionsReply {
            session_id: SessionId::new("s1"),
            questions: questions(3),
        }));
        let gate = QuizGate::new(Arc::new(backend.clone()));

        let (sid, quiz) = gate.fetch_questions(&SessionId::new("s1"), 2).await.unwrap();
        assert_eq!(sid, SessionId::new("s1"));
        assert_eq!(quiz.step_index(), 2);
        assert_eq!(quiz.questions().len(), 3);
        assert_eq!(
            backend.calls(),
            vec![BackendCall::FetchQuiz(QuizRequest {
                session_id: SessionId::new("s1"),
                step_index: 2
            })]
        );
    }

    #[test]
    fn incomplete_answers_never_build_a_request() {
        let mut quiz = QuizSession::new(0, questions(3)).unwrap();
        quiz.record_answer(QuestionId::new("q1"), "yes");
        quiz.record_answer(QuestionId::new("q3"), "no");

        let err = QuizGate::prepare_submission(&SessionId::new("s1"), &quiz).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "please answer all questions (1 unanswered)");
    }

    #[test]
    fn complete_answers_carry_reference_answers() {
        let mut quiz = QuizSession::new(1, questions(2)).unwrap();
        quiz.record_answer(QuestionId::new("q1"), "yes");
        quiz.record_answer(QuestionId::new("q2"), "no");

        let request = QuizGate::prepare_submission(&SessionId::new("s1"), &quiz).unwrap();
        assert_eq!(request.step_index, 1);
        assert_eq!(request.answers.len(), 2);
        assert_eq!(request.answers[1].answer, "no");
        assert_eq!(request.answers[1].correct_answer.as_deref(), Some("yes"));
    }
}

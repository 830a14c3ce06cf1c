use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no quiz questions were returned for this step")]
    NoQuestions,
    #[error("duplicate quiz question id: {0}")]
    DuplicateQuestion(QuestionId),
    #[error("please answer all questions ({count} unanswered)")]
    Unanswered { count: usize },
    #[error("quiz score {0} is outside 0-100")]
    ScoreOutOfRange(u32),
}

//
// ─── QUESTIONS ────────────────────────────────────────────────────────────────
//

/// A multiple-choice verification question.
///
/// `correct_answer` is an opaque reference that is only echoed back to the
/// grading service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

/// One answer as sent for grading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub answer: String,
    pub correct_answer: Option<String>,
}

//
// ─── GRADING ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionFeedback {
    pub question_id: QuestionId,
    pub correct: bool,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Outcome of grading a quiz submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingResult {
    correct: bool,
    score: u8,
    per_question: Vec<QuestionFeedback>,
    feedback: Option<String>,
}

impl GradingResult {
    /// # Errors
    ///
    /// Returns `QuizError::ScoreOutOfRange` if `score` exceeds 100.
    pub fn new(
        correct: bool,
        score: u32,
        per_question: Vec<QuestionFeedback>,
        feedback: Option<String>,
    ) -> Result<Self, QuizError> {
        let score = u8::try_from(score)
            .ok()
            .filter(|s| *s <= 100)
            .ok_or(QuizError::ScoreOutOfRange(score))?;
        Ok(Self {
            correct,
            score,
            per_question,
            feedback: feedback.filter(|f| !f.trim().is_empty()),
        })
    }

    #[must_use]
    pub fn correct(&self) -> bool {
        self.correct
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn per_question(&self) -> &[QuestionFeedback] {
        &self.per_question
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    #[must_use]
    pub fn feedback_for(&self, id: &QuestionId) -> Option<&QuestionFeedback> {
        self.per_question.iter().find(|f| &f.question_id == id)
    }
}

//
// ─── QUIZ SESSION ─────────────────────────────────────────────────────────────
//

/// Quiz state for a single step's verification gate.
///
/// Answers and the most recent grading result survive a failed attempt so the
/// learner can correct answers without fetching the questions again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    step_index: usize,
    questions: Vec<Question>,
    answers: BTreeMap<QuestionId, String>,
    result: Option<GradingResult>,
}

impl QuizSession {
    /// # Errors
    ///
    /// Returns `QuizError::NoQuestions` for an empty list and
    /// `QuizError::DuplicateQuestion` if two questions share an id.
    pub fn new(step_index: usize, questions: Vec<Question>) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(&question.id) {
                return Err(QuizError::DuplicateQuestion(question.id.clone()));
            }
        }

        Ok(Self {
            step_index,
            questions,
            answers: BTreeMap::new(),
            result: None,
        })
    }

    #[must_use]
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answer(&self, id: &QuestionId) -> Option<&str> {
        self.answers.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn result(&self) -> Option<&GradingResult> {
        self.result.as_ref()
    }

    /// True once a grading result marked the quiz correct.
    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.result.as_ref().is_some_and(GradingResult::correct)
    }

    pub fn record_answer(&mut self, id: QuestionId, option: impl Into<String>) {
        self.answers.insert(id, option.into());
    }

    /// Number of fetched questions without a non-empty answer.
    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| self.answer(&q.id).is_none_or(|a| a.trim().is_empty()))
            .count()
    }

    /// Build the grading payload, in question order.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Unanswered` with the number of missing answers.
    pub fn submission(&self) -> Result<Vec<AnswerSubmission>, QuizError> {
        let count = self.unanswered_count();
        if count > 0 {
            return Err(QuizError::Unanswered { count });
        }

        Ok(self
            .questions
            .iter()
            .filter_map(|q| {
                self.answers.get(&q.id).map(|answer| AnswerSubmission {
                    question_id: q.id.clone(),
                    answer: answer.clone(),
                    correct_answer: q.correct_answer.clone(),
                })
            })
            .collect())
    }

    pub fn apply_result(&mut self, result: GradingResult) {
        self.result = Some(result);
    }
}

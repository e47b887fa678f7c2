// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Represents the 'quizzes' table in the database.
/// `questions` holds the full authored question set as a JSON array;
/// `total_questions` is the per-attempt subset size, `min(10, authored)`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub classroom_id: i64,
    pub faculty_id: i64,
    pub title: String,
    #[serde(skip)]
    pub questions: String,
    pub total_questions: i64,
    pub duration_minutes: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Quiz {
    /// Decodes the stored question set.
    pub fn question_set(&self) -> Result<Vec<Question>, AppError> {
        serde_json::from_str(&self.questions)
            .map_err(|e| AppError::InternalServerError(format!("corrupt question set: {e}")))
    }
}

/// One authored question. The answer key is the correct option's text,
/// matched against recorded answers by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct: String,
}

/// DTO for presenting a question to a student (answer key stripped).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub question: String,
    pub options: Vec<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            question: q.question.clone(),
            options: q.options.clone(),
        }
    }
}

/// DTO for listing quizzes (question set withheld).
#[derive(Debug, Serialize, FromRow)]
pub struct QuizSummary {
    pub id: i64,
    pub classroom_id: i64,
    pub title: String,
    pub total_questions: i64,
    pub duration_minutes: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a quiz from an uploaded question-set JSON array.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 1, max = 180))]
    pub duration_minutes: Option<i64>,
    /// Raw question-set payload; validated by [`parse_question_set`].
    pub questions: serde_json::Value,
}

/// Validated boundary for externally-authored question sets.
///
/// The payload must be a non-empty JSON array of
/// `{ "question": str, "options": [str, ...], "correct": str }` records.
/// The answer key must appear among the options, since a key matching no
/// option could never be scored correct.
pub fn parse_question_set(value: &serde_json::Value) -> Result<Vec<Question>, AppError> {
    let items = value
        .as_array()
        .ok_or_else(|| AppError::BadRequest("question set must be a JSON array".to_string()))?;

    if items.is_empty() {
        return Err(AppError::BadRequest(
            "question set must not be empty".to_string(),
        ));
    }

    let mut questions = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let question: Question = serde_json::from_value(item.clone()).map_err(|e| {
            AppError::BadRequest(format!("malformed question at index {idx}: {e}"))
        })?;

        if question.question.trim().is_empty() {
            return Err(AppError::BadRequest(format!(
                "question at index {idx} has empty prompt text"
            )));
        }
        if question.options.is_empty() {
            return Err(AppError::BadRequest(format!(
                "question at index {idx} has no options"
            )));
        }
        if question.options.iter().any(|o| o.trim().is_empty()) {
            return Err(AppError::BadRequest(format!(
                "question at index {idx} has an empty option"
            )));
        }
        if !question.options.contains(&question.correct) {
            return Err(AppError::BadRequest(format!(
                "question at index {idx}: answer key is not among the options"
            )));
        }

        questions.push(question);
    }

    Ok(questions)
}

// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'quiz_attempts' table in the database.
/// Append-only: created exactly once per (quiz, student) and never mutated.
/// The presented question subset is persisted verbatim so historical results
/// stay valid if the quiz is edited later.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,
    /// JSON array of the presented question subset.
    pub questions: String,
    /// JSON map of question position to the chosen option text.
    pub answers: String,
    pub score: i64,
    pub total_questions: i64,
    pub time_taken_seconds: i64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// An attempt joined with the quiz title, for the student's own
/// performance history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudentAttemptRow {
    pub quiz_id: i64,
    pub quiz_title: String,
    pub score: i64,
    pub total_questions: i64,
    pub time_taken_seconds: i64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// An attempt joined with the student's name, for class-scoped views
/// (class performance, leaderboards, quiz results).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClassAttemptRow {
    pub quiz_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub score: i64,
    pub total_questions: i64,
    pub time_taken_seconds: i64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Why a session was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    Manual,
    Timeout,
}

/// DTO for recording an answer into a live session.
#[derive(Debug, Deserialize)]
pub struct RecordAnswerRequest {
    /// 0-based position within the presented subset.
    pub position: usize,
    /// Chosen option text. Not validated against the question's options;
    /// last write for a position wins.
    pub answer: String,
}

/// DTO for submitting a live session.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub reason: SubmitReason,
}

/// DTO returned on a successful submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub score: i64,
    pub total_questions: i64,
    pub time_taken_seconds: i64,
}

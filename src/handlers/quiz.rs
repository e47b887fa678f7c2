// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::classroom::{ensure_access, ensure_owner},
    models::{
        attempt::ClassAttemptRow,
        quiz::{CreateQuizRequest, Quiz, QuizSummary, parse_question_set},
    },
    session::MAX_PRESENTED_QUESTIONS,
    stats::{self, AttemptFacts},
    utils::jwt::Claims,
};

const DEFAULT_DURATION_MINUTES: i64 = 10;

pub(crate) async fn fetch_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, classroom_id, faculty_id, title, questions, total_questions,
               duration_minutes, created_at
        FROM quizzes
        WHERE id = ?
        "#,
    )
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Creates a quiz from an uploaded question-set JSON array. Owner only.
///
/// The question set is validated at the boundary; each attempt will present
/// a random subset of `min(10, authored)` questions.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(classroom_id): Path<i64>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let faculty_id = claims.user_id()?;
    ensure_owner(&pool, classroom_id, faculty_id).await?;

    let questions = parse_question_set(&payload.questions)?;
    let total_questions = MAX_PRESENTED_QUESTIONS.min(questions.len()) as i64;
    let duration_minutes = payload.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    let questions_json = serde_json::to_string(&questions)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let result = sqlx::query(
        r#"
        INSERT INTO quizzes (classroom_id, faculty_id, title, questions,
                             total_questions, duration_minutes, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(classroom_id)
    .bind(faculty_id)
    .bind(&payload.title)
    .bind(&questions_json)
    .bind(total_questions)
    .bind(duration_minutes)
    .bind(chrono::Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": result.last_insert_rowid() })),
    ))
}

/// Lists a classroom's quizzes, newest first. Question sets are withheld.
pub async fn list_quizzes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(classroom_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_access(&pool, classroom_id, &claims).await?;

    let quizzes = sqlx::query_as::<_, QuizSummary>(
        r#"
        SELECT id, classroom_id, title, total_questions, duration_minutes, created_at
        FROM quizzes
        WHERE classroom_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(classroom_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(quizzes))
}

/// One row of the per-quiz leaderboard (key = raw attempt score).
#[derive(Debug, Clone, Serialize)]
struct QuizLeaderboardEntry {
    student_id: i64,
    student_name: String,
    score: i64,
    total_questions: i64,
    accuracy: f64,
    time_taken_seconds: i64,
    completed_at: chrono::DateTime<chrono::Utc>,
}

/// Faculty results view for one quiz: rollup statistics plus the ranked
/// attempt list.
pub async fn quiz_results(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&pool, quiz_id).await?;
    ensure_owner(&pool, quiz.classroom_id, claims.user_id()?).await?;

    let rows = sqlx::query_as::<_, ClassAttemptRow>(
        r#"
        SELECT a.quiz_id, a.student_id, u.full_name AS student_name, a.score,
               a.total_questions, a.time_taken_seconds, a.completed_at
        FROM quiz_attempts a
        JOIN users u ON a.student_id = u.id
        WHERE a.quiz_id = ?
        ORDER BY a.completed_at DESC
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    let facts: Vec<AttemptFacts> = rows
        .iter()
        .map(|r| AttemptFacts {
            score: r.score,
            total_questions: r.total_questions,
            time_taken_seconds: r.time_taken_seconds,
            completed_at: r.completed_at,
        })
        .collect();
    let rollup = stats::quiz_rollup(&facts);

    let entries: Vec<QuizLeaderboardEntry> = rows
        .iter()
        .map(|r| QuizLeaderboardEntry {
            student_id: r.student_id,
            student_name: r.student_name.clone(),
            score: r.score,
            total_questions: r.total_questions,
            accuracy: if r.total_questions == 0 {
                0.0
            } else {
                r.score as f64 / r.total_questions as f64 * 100.0
            },
            time_taken_seconds: r.time_taken_seconds,
            completed_at: r.completed_at,
        })
        .collect();
    let leaderboard = stats::rank(entries, |e| (e.score, e.completed_at));

    Ok(Json(serde_json::json!({
        "quiz": {
            "id": quiz.id,
            "classroom_id": quiz.classroom_id,
            "title": quiz.title,
            "total_questions": quiz.total_questions,
            "duration_minutes": quiz.duration_minutes,
        },
        "stats": rollup,
        "leaderboard": leaderboard,
    })))
}

/// Overall classroom leaderboard: students ranked by the sum of their
/// scores across all quizzes in the classroom. Accessible to the owner and
/// enrolled students.
pub async fn classroom_leaderboard(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(classroom_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_access(&pool, classroom_id, &claims).await?;

    let rows = sqlx::query_as::<_, ClassAttemptRow>(
        r#"
        SELECT a.quiz_id, a.student_id, u.full_name AS student_name, a.score,
               a.total_questions, a.time_taken_seconds, a.completed_at
        FROM quiz_attempts a
        JOIN quizzes q ON a.quiz_id = q.id
        JOIN users u ON a.student_id = u.id
        WHERE q.classroom_id = ?
        ORDER BY a.completed_at DESC
        "#,
    )
    .bind(classroom_id)
    .fetch_all(&pool)
    .await?;

    let groups = stats::group_by_student(rows.into_iter().map(|r| {
        (
            r.student_id,
            r.student_name,
            AttemptFacts {
                score: r.score,
                total_questions: r.total_questions,
                time_taken_seconds: r.time_taken_seconds,
                completed_at: r.completed_at,
            },
        )
    }));

    let entries = stats::overall_entries(&groups);
    let leaderboard = stats::rank(entries, |e| (e.total_score, e.first_completed_at));

    Ok(Json(leaderboard))
}

// src/handlers/session.rs
//
// HTTP surface of the quiz session controller: start a session, record
// answers, submit. Submission also runs from the countdown task when the
// timer expires.

use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    error::{AppError, is_unique_violation},
    handlers::{classroom::ensure_member, quiz::fetch_quiz},
    models::attempt::{RecordAnswerRequest, SubmitReason, SubmitRequest, SubmitResponse},
    session::{SessionPoll, SessionStore},
    utils::jwt::Claims,
};

/// Starts a quiz session for the calling student, or re-enters the live
/// one. Fails with 409 once an attempt for this (quiz, student) exists.
pub async fn start_session(
    State(pool): State<SqlitePool>,
    State(sessions): State<SessionStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if claims.role != "student" {
        return Err(AppError::Forbidden(
            "Only students can take quizzes".to_string(),
        ));
    }
    let student_id = claims.user_id()?;

    let quiz = fetch_quiz(&pool, quiz_id).await?;
    ensure_member(&pool, quiz.classroom_id, student_id).await?;

    // Fast-path precondition; the UNIQUE constraint on quiz_attempts is the
    // backstop for races that slip past this read.
    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM quiz_attempts WHERE quiz_id = ? AND student_id = ?",
    )
    .bind(quiz_id)
    .bind(student_id)
    .fetch_optional(&pool)
    .await?;

    if existing.is_some() {
        return Err(AppError::AlreadyAttempted);
    }

    let authored = quiz.question_set()?;
    let view = sessions
        .start(quiz_id, student_id, authored, quiz.duration_minutes, Utc::now())
        .await;

    if !view.resumed {
        spawn_countdown(pool, sessions, quiz_id, student_id);
    }

    Ok(Json(view))
}

/// Records one answer into the live session. Free-form text; the last
/// write for a position wins.
pub async fn record_answer(
    State(sessions): State<SessionStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<RecordAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    sessions
        .record_answer(quiz_id, student_id, payload.position, payload.answer)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Abandons the live session without recording an attempt. The quiz stays
/// open for a later fresh start.
pub async fn abandon_session(
    State(sessions): State<SessionStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    sessions.abandon(quiz_id, student_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Submits the live session and persists the attempt.
pub async fn submit_session(
    State(pool): State<SqlitePool>,
    State(sessions): State<SessionStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let response =
        finalize_submission(&pool, &sessions, quiz_id, student_id, payload.reason).await?;
    Ok(Json(response))
}

/// Grades the session under the store lock and writes exactly one attempt
/// row. On a UNIQUE violation the attempt already exists and the session is
/// dropped; on any other write failure the session is re-opened so the
/// student can re-submit.
pub(crate) async fn finalize_submission(
    pool: &SqlitePool,
    sessions: &SessionStore,
    quiz_id: i64,
    student_id: i64,
    reason: SubmitReason,
) -> Result<SubmitResponse, AppError> {
    let now = Utc::now();
    let pending = sessions.begin_submit(quiz_id, student_id, now).await?;

    let questions_json = serde_json::to_string(&pending.questions)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    let answers_json = serde_json::to_string(&pending.answers)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    let total_questions = pending.questions.len() as i64;

    let result = sqlx::query(
        r#"
        INSERT INTO quiz_attempts (quiz_id, student_id, questions, answers,
                                   score, total_questions, time_taken_seconds, completed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(quiz_id)
    .bind(student_id)
    .bind(&questions_json)
    .bind(&answers_json)
    .bind(pending.score)
    .bind(total_questions)
    .bind(pending.time_taken_seconds)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            sessions.finish_submit(quiz_id, student_id).await;
            tracing::info!(
                quiz_id,
                student_id,
                score = pending.score,
                ?reason,
                "quiz attempt recorded"
            );
            Ok(SubmitResponse {
                score: pending.score,
                total_questions,
                time_taken_seconds: pending.time_taken_seconds,
            })
        }
        Err(e) if is_unique_violation(&e) => {
            sessions.finish_submit(quiz_id, student_id).await;
            Err(AppError::AlreadyAttempted)
        }
        Err(e) => {
            sessions.abort_submit(quiz_id, student_id).await;
            Err(AppError::SubmissionFailed(e.to_string()))
        }
    }
}

/// One-tick-per-second countdown for a live session. When the remaining
/// time reaches zero it is finalized with reason `timeout` exactly once. The
/// task stops only once the session is gone: an in-flight submission may
/// still fail and re-open the session, so the watcher polls through it,
/// and a failed timeout write is retried on the next tick.
fn spawn_countdown(pool: SqlitePool, sessions: SessionStore, quiz_id: i64, student_id: i64) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            match sessions.poll(quiz_id, student_id, Utc::now()).await {
                SessionPoll::Gone => return,
                SessionPoll::Submitting => continue,
                SessionPoll::Active { remaining_seconds } if remaining_seconds > 0 => continue,
                SessionPoll::Active { .. } => {}
            }

            match finalize_submission(&pool, &sessions, quiz_id, student_id, SubmitReason::Timeout)
                .await
            {
                Ok(response) => {
                    tracing::info!(
                        quiz_id,
                        student_id,
                        score = response.score,
                        "session timed out and was auto-submitted"
                    );
                    return;
                }
                // A manual submit won the race; nothing left to do.
                Err(AppError::NotFound(_)) => return,
                // A submission went in flight between the poll and the grab;
                // keep watching in case its write fails.
                Err(AppError::Conflict(_)) => continue,
                Err(e) => {
                    tracing::error!(
                        quiz_id,
                        student_id,
                        "failed to auto-submit timed-out session, will retry: {}",
                        e
                    );
                }
            }
        }
    });
}

// src/handlers/performance.rs
//
// Performance analytics: the student self view and the faculty class view.
// Both re-fetch attempt rows and aggregate in process.

use std::cmp::Ordering;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    handlers::classroom::ensure_owner,
    models::attempt::{ClassAttemptRow, StudentAttemptRow},
    stats::{
        self, AttemptFacts, CLASS_IMPROVEMENT_WINDOW, SELF_IMPROVEMENT_WINDOW, StudentStats,
    },
    utils::jwt::Claims,
};

fn facts_of(score: i64, total: i64, time: i64, completed_at: chrono::DateTime<chrono::Utc>) -> AttemptFacts {
    AttemptFacts {
        score,
        total_questions: total,
        time_taken_seconds: time,
        completed_at,
    }
}

/// One attempt in the student's history, with its accuracy precomputed.
#[derive(Debug, Serialize)]
struct AttemptHistoryEntry {
    quiz_id: i64,
    quiz_title: String,
    score: i64,
    total_questions: i64,
    accuracy: f64,
    time_taken_seconds: i64,
    completed_at: chrono::DateTime<chrono::Utc>,
}

/// The calling student's own performance: rollup statistics plus the
/// attempt history, newest first.
pub async fn my_performance(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let rows = sqlx::query_as::<_, StudentAttemptRow>(
        r#"
        SELECT a.quiz_id, q.title AS quiz_title, a.score, a.total_questions,
               a.time_taken_seconds, a.completed_at
        FROM quiz_attempts a
        JOIN quizzes q ON a.quiz_id = q.id
        WHERE a.student_id = ?
        ORDER BY a.completed_at DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(&pool)
    .await?;

    let facts: Vec<AttemptFacts> = rows
        .iter()
        .map(|r| facts_of(r.score, r.total_questions, r.time_taken_seconds, r.completed_at))
        .collect();
    let rollup = stats::aggregate(&facts, SELF_IMPROVEMENT_WINDOW);

    let attempts: Vec<AttemptHistoryEntry> = rows
        .into_iter()
        .map(|r| {
            let accuracy = if r.total_questions == 0 {
                0.0
            } else {
                r.score as f64 / r.total_questions as f64 * 100.0
            };
            AttemptHistoryEntry {
                quiz_id: r.quiz_id,
                quiz_title: r.quiz_title,
                score: r.score,
                total_questions: r.total_questions,
                accuracy,
                time_taken_seconds: r.time_taken_seconds,
                completed_at: r.completed_at,
            }
        })
        .collect();

    Ok(Json(serde_json::json!({
        "stats": rollup,
        "attempts": attempts,
    })))
}

/// One student's rollup within the class performance view.
#[derive(Debug, Serialize)]
struct StudentPerformanceEntry {
    student_id: i64,
    student_name: String,
    #[serde(flatten)]
    stats: StudentStats,
}

/// Faculty class view: per-student statistics (sorted by pooled accuracy,
/// best first) and the class rollup. Owner only.
pub async fn class_performance(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(classroom_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&pool, classroom_id, claims.user_id()?).await?;

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

    let total_attempts = rows.len();
    let groups = stats::group_by_student(rows.into_iter().map(|r| {
        (
            r.student_id,
            r.student_name,
            facts_of(r.score, r.total_questions, r.time_taken_seconds, r.completed_at),
        )
    }));

    let mut students: Vec<StudentPerformanceEntry> = groups
        .iter()
        .map(|g| StudentPerformanceEntry {
            student_id: g.student_id,
            student_name: g.student_name.clone(),
            stats: stats::aggregate(&g.attempts, CLASS_IMPROVEMENT_WINDOW),
        })
        .collect();

    students.sort_by(|a, b| {
        b.stats
            .average_accuracy
            .partial_cmp(&a.stats.average_accuracy)
            .unwrap_or(Ordering::Equal)
    });

    let stats_list: Vec<StudentStats> = students.iter().map(|s| s.stats.clone()).collect();
    let class = stats::class_rollup(&stats_list, total_attempts);

    Ok(Json(serde_json::json!({
        "class": class,
        "students": students,
    })))
}

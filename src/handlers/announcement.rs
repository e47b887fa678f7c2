// src/handlers/announcement.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::classroom::{ensure_access, ensure_owner},
    models::announcement::{AnnouncementResponse, CreateAnnouncementRequest},
    utils::{html::clean_html, jwt::Claims},
};

/// Posts an announcement to a classroom. Owner only.
/// The body is sanitized before storage.
pub async fn create_announcement(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(classroom_id): Path<i64>,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let faculty_id = claims.user_id()?;
    ensure_owner(&pool, classroom_id, faculty_id).await?;

    let content = clean_html(&payload.content);

    let result = sqlx::query(
        r#"
        INSERT INTO announcements (classroom_id, faculty_id, title, content, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(classroom_id)
    .bind(faculty_id)
    .bind(&payload.title)
    .bind(&content)
    .bind(chrono::Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create announcement: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": result.last_insert_rowid() })),
    ))
}

/// Lists a classroom's announcements, newest first, with author names.
pub async fn list_announcements(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(classroom_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_access(&pool, classroom_id, &claims).await?;

    let announcements = sqlx::query_as::<_, AnnouncementResponse>(
        r#"
        SELECT a.id, a.title, a.content, u.full_name AS author_name, a.created_at
        FROM announcements a
        JOIN users u ON a.faculty_id = u.id
        WHERE a.classroom_id = ?
        ORDER BY a.created_at DESC
        "#,
    )
    .bind(classroom_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(announcements))
}

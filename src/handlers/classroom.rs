// src/handlers/classroom.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::Rng;
use rand::distr::Alphanumeric;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::classroom::{
        Classroom, ClassroomResponse, CreateClassroomRequest, JoinClassroomRequest, MemberResponse,
    },
    utils::jwt::Claims,
};

/// Generates a short human-typed join code. Uppercased so enrollment input
/// can be matched case-insensitively by uppercasing at both ends.
fn generate_join_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Fetches a classroom or fails with 404.
pub(crate) async fn fetch_classroom(
    pool: &SqlitePool,
    classroom_id: i64,
) -> Result<Classroom, AppError> {
    sqlx::query_as::<_, Classroom>(
        r#"
        SELECT id, faculty_id, name, description, join_code, created_at
        FROM classrooms
        WHERE id = ?
        "#,
    )
    .bind(classroom_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Classroom not found".to_string()))
}

/// Fetches a classroom and requires the caller to be its owning faculty.
pub(crate) async fn ensure_owner(
    pool: &SqlitePool,
    classroom_id: i64,
    user_id: i64,
) -> Result<Classroom, AppError> {
    let classroom = fetch_classroom(pool, classroom_id).await?;
    if classroom.faculty_id != user_id {
        return Err(AppError::Forbidden(
            "You do not own this classroom".to_string(),
        ));
    }
    Ok(classroom)
}

/// Requires the caller to be an enrolled student of the classroom.
pub(crate) async fn ensure_member(
    pool: &SqlitePool,
    classroom_id: i64,
    student_id: i64,
) -> Result<(), AppError> {
    let member: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM classroom_members WHERE classroom_id = ? AND student_id = ?",
    )
    .bind(classroom_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    member
        .map(|_| ())
        .ok_or(AppError::Forbidden(
            "You are not enrolled in this classroom".to_string(),
        ))
}

/// Requires the caller to be either the owning faculty or an enrolled
/// student.
pub(crate) async fn ensure_access(
    pool: &SqlitePool,
    classroom_id: i64,
    claims: &Claims,
) -> Result<Classroom, AppError> {
    let classroom = fetch_classroom(pool, classroom_id).await?;
    let user_id = claims.user_id()?;

    if classroom.faculty_id == user_id {
        return Ok(classroom);
    }
    ensure_member(pool, classroom_id, user_id).await?;
    Ok(classroom)
}

/// Creates a classroom with a freshly generated join code. Faculty only.
pub async fn create_classroom(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateClassroomRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if claims.role != "faculty" {
        return Err(AppError::Forbidden(
            "Only faculty can create classrooms".to_string(),
        ));
    }

    let faculty_id = claims.user_id()?;
    let now = chrono::Utc::now();

    // Retry on the off chance a generated code collides with an existing one.
    let mut last_err = None;
    for _ in 0..5 {
        let join_code = generate_join_code();
        let result = sqlx::query(
            r#"
            INSERT INTO classrooms (faculty_id, name, description, join_code, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(faculty_id)
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(&join_code)
        .bind(now)
        .execute(&pool)
        .await;

        match result {
            Ok(done) => {
                let classroom = fetch_classroom(&pool, done.last_insert_rowid()).await?;
                return Ok((StatusCode::CREATED, Json(classroom)));
            }
            Err(e) if is_unique_violation(&e) => {
                last_err = Some(e);
                continue;
            }
            Err(e) => {
                tracing::error!("Failed to create classroom: {:?}", e);
                return Err(AppError::from(e));
            }
        }
    }

    Err(AppError::InternalServerError(format!(
        "could not allocate a unique join code: {:?}",
        last_err
    )))
}

/// Lists the caller's classrooms: owned ones for faculty, joined ones for
/// students.
pub async fn list_classrooms(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let classrooms = if claims.role == "faculty" {
        sqlx::query_as::<_, ClassroomResponse>(
            r#"
            SELECT c.id, c.faculty_id, c.name, c.description, c.join_code,
                   u.full_name AS faculty_name, c.created_at
            FROM classrooms c
            JOIN users u ON c.faculty_id = u.id
            WHERE c.faculty_id = ?
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, ClassroomResponse>(
            r#"
            SELECT c.id, c.faculty_id, c.name, c.description, c.join_code,
                   u.full_name AS faculty_name, c.created_at
            FROM classroom_members m
            JOIN classrooms c ON m.classroom_id = c.id
            JOIN users u ON c.faculty_id = u.id
            WHERE m.student_id = ?
            ORDER BY m.joined_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(classrooms))
}

/// Fetches one classroom with its instructor's name.
/// Accessible to the owner and enrolled students.
pub async fn get_classroom(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(classroom_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_access(&pool, classroom_id, &claims).await?;

    let classroom = sqlx::query_as::<_, ClassroomResponse>(
        r#"
        SELECT c.id, c.faculty_id, c.name, c.description, c.join_code,
               u.full_name AS faculty_name, c.created_at
        FROM classrooms c
        JOIN users u ON c.faculty_id = u.id
        WHERE c.id = ?
        "#,
    )
    .bind(classroom_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(classroom))
}

/// Enrolls the calling student via a join code.
///
/// The code is uppercased before lookup; a miss is a 404 and a repeat
/// enrollment surfaces the UNIQUE violation as a friendly 409.
pub async fn join_classroom(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<JoinClassroomRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if claims.role != "student" {
        return Err(AppError::Forbidden(
            "Only students can join classrooms".to_string(),
        ));
    }

    let student_id = claims.user_id()?;
    let code = payload.join_code.trim().to_uppercase();

    let classroom: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM classrooms WHERE join_code = ?")
            .bind(&code)
            .fetch_optional(&pool)
            .await?;

    let (classroom_id,) =
        classroom.ok_or(AppError::NotFound("Invalid join code".to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO classroom_members (classroom_id, student_id, joined_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(classroom_id)
    .bind(student_id)
    .bind(chrono::Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("You are already enrolled in this classroom".to_string())
        } else {
            tracing::error!("Failed to join classroom: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "classroom_id": classroom_id })),
    ))
}

/// Lists enrolled students. Owner only.
pub async fn list_members(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(classroom_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&pool, classroom_id, claims.user_id()?).await?;

    let members = sqlx::query_as::<_, MemberResponse>(
        r#"
        SELECT m.student_id, u.username, u.full_name, m.joined_at
        FROM classroom_members m
        JOIN users u ON m.student_id = u.id
        WHERE m.classroom_id = ?
        ORDER BY m.joined_at ASC
        "#,
    )
    .bind(classroom_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(members))
}

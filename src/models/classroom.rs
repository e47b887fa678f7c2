// src/models/classroom.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'classrooms' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Classroom {
    pub id: i64,
    pub faculty_id: i64,
    pub name: String,
    pub description: Option<String>,

    /// Short human-typed enrollment code, stored uppercased.
    pub join_code: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Classroom row joined with the owning instructor's name.
#[derive(Debug, Serialize, FromRow)]
pub struct ClassroomResponse {
    pub id: i64,
    pub faculty_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub join_code: String,
    pub faculty_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One enrolled student, joined from `classroom_members` and `users`.
#[derive(Debug, Serialize, FromRow)]
pub struct MemberResponse {
    pub student_id: i64,
    pub username: String,
    pub full_name: String,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a classroom.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassroomRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

/// DTO for joining a classroom by code.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinClassroomRequest {
    #[validate(length(min = 1, max = 16))]
    pub join_code: String,
}

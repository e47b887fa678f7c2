// src/models/announcement.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'announcements' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Announcement {
    pub id: i64,
    pub classroom_id: i64,
    pub faculty_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Announcement joined with the author's display name.
#[derive(Debug, Serialize, FromRow)]
pub struct AnnouncementResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for posting an announcement.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAnnouncementRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

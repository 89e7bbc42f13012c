use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024; // 5MB
pub const ALLOWED_PHOTO_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/jpg",
    "image/gif",
    "image/webp",
];

// ========== USER ==========
// Row of the `users` table, serialized with the table's column names
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    #[serde(rename = "nama")]
    #[sqlx(rename = "nama")]
    pub name: String,
    #[serde(rename = "foto")]
    #[sqlx(rename = "foto")]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ========== FORM ==========
/// Multipart body of `POST /users` and `PUT /users/{id}`
#[derive(Debug, Default, Clone)]
pub struct UserForm {
    pub name: Option<String>,
    pub photo: Option<PhotoUpload>,
}

/// File part of the form, kept in memory for the duration of the request
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// ========== RESPONSE ==========
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(message: Option<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            message,
            data,
            error: None,
        }
    }
}

impl ApiEnvelope<()> {
    pub fn failure(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthStatus {
    pub database: String,
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,           // assigned by the store
    pub email: String,      // unique, never changes
    pub code: String,       // unique access code, never changes
    pub name: String,
    pub last_name: String,
    pub image_url: String,  // empty until an image is uploaded
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields of a record about to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub code: String,
    pub now: OffsetDateTime,
}

/// Partial update applied to the record matching a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: String,
    pub last_name: String,
    /// `None` leaves the stored URL untouched.
    pub image_url: Option<String>,
    pub updated_at: OffsetDateTime,
}

/// Insert failure, split by the uniqueness constraint that fired.
#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error("email already exists")]
    DuplicateEmail,
    #[error("code already exists")]
    DuplicateCode,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

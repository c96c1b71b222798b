use serde::{Deserialize, Serialize};

use super::repo_types::User;

/// Request body for registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub code: String,
}

/// Response returned after registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    /// Only present while no email provider is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_note: Option<String>,
}

/// `{message, user}` wrapper used by login and profile update.
#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub message: String,
    pub user: User,
}

/// Text fields of the profile form. Absent fields are empty strings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProfileForm {
    pub name: String,
    pub last_name: String,
}

/// Image part of the profile form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub body: bytes::Bytes,
}

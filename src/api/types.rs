use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// User descriptor as the auth service reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: HashMap<String, Value>,
}

impl AuthUser {
    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata.get("full_name").and_then(Value::as_str)
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.user_metadata.get("avatar_url").and_then(Value::as_str)
    }
}

/// Credential bundle for the current signed-in user. The backend validates
/// it server-side; holders only use it for request headers and UI decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

fn default_token_type() -> String {
    "bearer".to_string()
}

fn default_expires_in() -> i64 {
    3600
}

/// Body of a successful token grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    pub user: AuthUser,
}

impl TokenResponse {
    pub fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
            user: self.user,
        }
    }
}

/// Auth-state change as broadcast by the client.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    Refreshed(Session),
    SignedOut,
}

/// Access level on a profile. Assigned at first creation; only
/// administrative action changes it afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Counselor,
    Admin,
}

/// Row in the `profiles` table, keyed by the auth user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// First-insert payload for a user the `profiles` table has never seen.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
}

impl NewProfile {
    pub fn from_user(user: &AuthUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            full_name: user.full_name().map(str::to_string),
            avatar_url: user.avatar_url().map(str::to_string),
            role: Role::User,
        }
    }
}

/// Reconciliation payload for an existing profile. Carries no role field,
/// so a synchronization pass cannot overwrite one.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileUpdate {
    pub fn from_user(user: &AuthUser) -> Self {
        Self {
            email: user.email.clone(),
            full_name: user.full_name().map(str::to_string),
            avatar_url: user.avatar_url().map(str::to_string),
            updated_at: Utc::now(),
        }
    }
}

/// Result of a profile lookup. "No row" is a normal branch, distinct from a
/// failed query.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    Found(Profile),
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub cover_url: Option<String>,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Audio {
    pub id: Uuid,
    pub title: String,
    pub speaker: Option<String>,
    pub audio_url: String,
    pub duration_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub youtube_url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Newsletter {
    pub id: Uuid,
    pub title: String,
    pub issue: Option<String>,
    pub pdf_url: String,
    pub published_on: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryImage {
    pub id: Uuid,
    pub title: Option<String>,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Counselor {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdmissionCenter {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: String,
    pub course: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEnrollment {
    pub user_id: String,
    pub course: String,
}

/// Error envelope shared by the auth service and the row API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    #[serde(default)]
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Code the row API returns when a single-object read matches zero rows.
pub const NO_ROWS_CODE: &str = "PGRST116";

impl ApiError {
    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            code: "REQUEST_FAILED".to_string(),
            details: None,
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            code: "DECODE_ERROR".to_string(),
            details: None,
        }
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            code: "UNKNOWN".to_string(),
            details: None,
        }
    }

    pub fn is_no_rows(&self) -> bool {
        self.code == NO_ROWS_CODE
    }

    /// Builds an error from whichever envelope the backend used. The row API
    /// sends `{message, code, details, hint}`; the auth service sends
    /// `{msg, code}` or `{error, error_description}`.
    pub fn from_envelope(status: u16, body: &Value) -> Self {
        let message = ["message", "msg", "error_description", "error"]
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));
        let code = body
            .get("code")
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| status.to_string());
        let details = body.get("details").filter(|v| !v.is_null()).cloned();
        Self {
            message,
            code,
            details,
        }
    }
}

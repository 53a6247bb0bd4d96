//! Wire DTOs for the task and auth endpoints.
//!
//! # Design
//! These mirror the server schema but are defined independently from the
//! mock-server crate; integration tests catch drift between the two. Server
//! records keep any fields this client does not model in `extra`, so a
//! round trip through the client never drops data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-assigned task identifier.
pub type TaskId = u64;

/// A single task as last seen on the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload for creating or replacing a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl TaskInput {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Profile of the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// First name when the user gave one, otherwise the username.
    pub fn display_name(&self) -> &str {
        if self.first_name.is_empty() {
            &self.username
        } else {
            &self.first_name
        }
    }
}

/// Body of `POST /token/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Response of `POST /token/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Body of `POST /token/refresh/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Response of `POST /token/refresh/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access: String,
}

/// Body of `POST /register/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Registration {
    pub fn passwords_match(&self) -> bool {
        self.password == self.password_confirm
    }

    /// Copy with username and email lowercased, as the server expects.
    pub(crate) fn normalized(&self) -> Self {
        Self {
            username: self.username.to_lowercase(),
            email: self.email.to_lowercase(),
            ..self.clone()
        }
    }
}

//! Application error types.
//!
//! These errors are serializable and carry a stable machine-readable code
//! so the HTTP layer can report every failure the same way.

use serde::Serialize;
use thiserror::Error;

/// Kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    PullRequest,
    Team,
    User,
    Reviewer,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PullRequest => write!(f, "pull request"),
            Self::Team => write!(f, "team"),
            Self::User => write!(f, "user"),
            Self::Reviewer => write!(f, "reviewer"),
        }
    }
}

fn missing_message(resource: &Resource) -> String {
    match resource {
        Resource::Reviewer => "no reviewer found".to_string(),
        other => format!("Not found: {}", other),
    }
}

/// Application-level errors returned by services and the HTTP layer.
///
/// All variants serialize to a structured JSON object.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Referenced entity does not exist (or no longer does).
    #[error("{}", missing_message(.resource))]
    NotFound {
        resource: Resource,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Identifier collision on creation.
    #[error("Already exists: {resource}")]
    AlreadyExists {
        resource: Resource,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Operation not legal in the record's current lifecycle state.
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// No eligible reviewer remains after exclusions.
    #[error("No candidate: {message}")]
    NoCandidate { message: String },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: Resource, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: Some(id.into()),
        }
    }

    /// Create an already exists error with ID.
    pub fn already_exists(resource: Resource, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource,
            id: Some(id.into()),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a no candidate error.
    pub fn no_candidate(message: impl Into<String>) -> Self {
        Self::NoCandidate {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists {
                resource: Resource::Team,
                ..
            } => "TEAM_EXISTS",
            Self::AlreadyExists { .. } => "PR_EXISTS",
            Self::InvalidState { .. } => "PR_MERGED",
            Self::NoCandidate { .. } => "NO_CANDIDATE",
            Self::InvalidInput { .. } => "BAD_REQUEST",
            Self::Database { .. } | Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Check if this error refers to a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::database(err.to_string())
    }
}

impl From<crate::services::reviewer_selector::SelectionError> for AppError {
    fn from(err: crate::services::reviewer_selector::SelectionError) -> Self {
        Self::no_candidate(err.to_string())
    }
}

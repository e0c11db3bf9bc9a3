//! Pull request model and lifecycle state.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Maximum number of reviewers assigned to a pull request.
pub const MAX_REVIEWERS: usize = 2;

/// Lifecycle state of a pull request. `Merged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }
}

impl FromStr for PullRequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "MERGED" => Ok(Self::Merged),
            other => Err(AppError::internal(format!(
                "Unknown pull request status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row shape of the `pull_requests` table.
#[derive(Debug, Clone, FromRow)]
pub struct PullRequestRow {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub status: String,
    pub created_at: i64,
    pub merged_at: Option<i64>,
}

/// A pull request together with its current reviewer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub id: String,
    pub title: String,

    /// Author user ID. Never a member of `reviewers`.
    pub author_id: String,

    pub status: PullRequestStatus,

    /// Assigned reviewer IDs, ordered by ID, at most `MAX_REVIEWERS`.
    pub reviewers: Vec<String>,

    /// Creation timestamp (Unix).
    pub created_at: i64,

    /// Merge timestamp (Unix), set once on transition to `Merged`.
    pub merged_at: Option<i64>,
}

impl PullRequest {
    /// Assemble a pull request from its row and reviewer set.
    pub fn from_row(row: PullRequestRow, reviewers: Vec<String>) -> Result<Self, AppError> {
        Ok(Self {
            status: row.status.parse()?,
            id: row.id,
            title: row.title,
            author_id: row.author_id,
            reviewers,
            created_at: row.created_at,
            merged_at: row.merged_at,
        })
    }

    /// Check if the pull request still accepts reviewer changes.
    pub fn is_open(&self) -> bool {
        self.status == PullRequestStatus::Open
    }

    /// Check if `user_id` is currently assigned as a reviewer.
    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.reviewers.iter().any(|r| r == user_id)
    }
}

/// Input for creating a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPullRequest {
    pub id: String,
    pub title: String,
    pub author_id: String,
}

/// Compact pull request view used in per-reviewer listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PullRequestShort {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub status: String,
}

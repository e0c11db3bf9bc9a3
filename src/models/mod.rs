//! Data models for the application.
//!
//! These models represent the entities stored in the SQLite database.
//! Row types derive FromRow for SQLx queries; domain types derive Serialize.

pub mod pull_request;
pub mod team;

// Re-exports for convenient access
pub use pull_request::{
    NewPullRequest, PullRequest, PullRequestRow, PullRequestShort, PullRequestStatus,
    MAX_REVIEWERS,
};
pub use team::{Team, TeamMember, User, UserWithTeam};

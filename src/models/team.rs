//! Team and user models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user as stored in the roster.
///
/// `team_id` is a lookup key into `teams`, never an owning reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub team_id: i64,
}

/// A user together with the name of the team it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct UserWithTeam {
    pub id: String,
    pub name: String,
    pub team_name: String,
    pub is_active: bool,
}

/// A member entry of a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

/// A team and its members, ordered by user ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub members: Vec<TeamMember>,
}

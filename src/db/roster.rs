//! Team roster queries.
//!
//! Source of truth for team membership and each member's active flag.
//! Lookups used inside a reassignment transaction take a connection so they
//! read through the same transaction; standalone operations take the pool.

use crate::db::now;
use crate::db::pool::DbPool;
use crate::error::{AppError, Resource};
use crate::models::{PullRequestShort, Team, TeamMember, User, UserWithTeam};
use crate::services::reviewer_selector::{self, RandomSource};
use sqlx::SqliteConnection;

/// Get a user by ID.
pub async fn get_user(conn: &mut SqliteConnection, user_id: &str) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT id, name, is_active, team_id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found_with_id(Resource::User, user_id))
}

/// IDs of the active members of a team, ordered by ID.
pub async fn active_member_ids(
    conn: &mut SqliteConnection,
    team_id: i64,
) -> Result<Vec<String>, AppError> {
    let ids: Vec<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE team_id = ? AND is_active = 1 ORDER BY id")
            .bind(team_id)
            .fetch_all(conn)
            .await?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
}

/// Draw one active member of a team uniformly, skipping `excluding`.
///
/// Fails with `NoCandidate` when every active member is excluded.
pub async fn pick_active_teammate(
    conn: &mut SqliteConnection,
    team_id: i64,
    excluding: &[&str],
    random: &dyn RandomSource,
) -> Result<String, AppError> {
    let candidates = active_member_ids(conn, team_id).await?;
    let picked = reviewer_selector::select(&candidates, excluding, 1, random)?;

    picked
        .into_iter()
        .next()
        .ok_or_else(|| AppError::no_candidate("no active candidates"))
}

/// Create a team and upsert its members in one transaction.
///
/// Members already on another team are moved into this one.
pub async fn add_team(pool: &DbPool, team: &Team) -> Result<Team, AppError> {
    let mut tx = pool.begin().await?;

    let team_id: Option<(i64,)> = sqlx::query_as(
        "INSERT INTO teams (name, created_at) VALUES (?, ?) ON CONFLICT(name) DO NOTHING RETURNING id",
    )
    .bind(&team.name)
    .bind(now())
    .fetch_optional(&mut *tx)
    .await?;

    let Some((team_id,)) = team_id else {
        return Err(AppError::already_exists(Resource::Team, &team.name));
    };

    for member in &team.members {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, is_active, team_id)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                is_active = excluded.is_active,
                team_id = excluded.team_id
            "#,
        )
        .bind(&member.user_id)
        .bind(&member.username)
        .bind(member.is_active)
        .bind(team_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    log::info!(
        "[roster] Added team {} with {} members",
        team.name,
        team.members.len()
    );

    get_team(pool, &team.name).await
}

/// Get a team with its members ordered by user ID.
pub async fn get_team(pool: &DbPool, team_name: &str) -> Result<Team, AppError> {
    let team_id: Option<(i64,)> = sqlx::query_as("SELECT id FROM teams WHERE name = ?")
        .bind(team_name)
        .fetch_optional(pool)
        .await?;

    let Some((team_id,)) = team_id else {
        return Err(AppError::not_found_with_id(Resource::Team, team_name));
    };

    let members = sqlx::query_as::<_, TeamMember>(
        "SELECT id AS user_id, name AS username, is_active FROM users WHERE team_id = ? ORDER BY id",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;

    Ok(Team {
        name: team_name.to_string(),
        members,
    })
}

/// Toggle a user's active flag.
pub async fn set_is_active(
    pool: &DbPool,
    user_id: &str,
    is_active: bool,
) -> Result<UserWithTeam, AppError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found_with_id(Resource::User, user_id));
    }

    let user = sqlx::query_as::<_, UserWithTeam>(
        r#"
        SELECT u.id, u.name, t.name AS team_name, u.is_active
        FROM users u
        JOIN teams t ON t.id = u.team_id
        WHERE u.id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    log::info!("[roster] User {} is_active={}", user_id, is_active);

    Ok(user)
}

/// Pull requests where the user is currently an assigned reviewer.
pub async fn review_assignments(
    pool: &DbPool,
    user_id: &str,
) -> Result<Vec<PullRequestShort>, AppError> {
    let prs = sqlx::query_as::<_, PullRequestShort>(
        r#"
        SELECT pr.id, pr.title, pr.author_id, pr.status
        FROM pull_requests pr
        JOIN pull_request_reviewers r ON r.pr_id = pr.id
        WHERE r.user_id = ?
        ORDER BY pr.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(prs)
}

//! REST API routes.
//!
//! Thin JSON wrappers over the roster and the assignment service. Required
//! fields are validated here, before any transaction starts, and every
//! service call runs under the configured operation deadline.

use crate::db::pool::DbPool;
use crate::db::roster;
use crate::error::AppError;
use crate::models::{
    NewPullRequest, PullRequest, PullRequestShort, Team, TeamMember, UserWithTeam,
};
use crate::services::assignment::{AssignmentService, ReassignOutcome};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub assignments: AssignmentService,
    pub operation_timeout: Duration,
}

impl ApiState {
    pub fn new(db: DbPool, operation_timeout: Duration) -> Self {
        Self {
            assignments: AssignmentService::new(db.clone()),
            db,
            operation_timeout,
        }
    }

    /// Run `fut` under the operation deadline.
    ///
    /// On expiry the future is dropped, which rolls back any open transaction
    /// and releases its record lock.
    async fn run<T, F>(&self, fut: F) -> Result<T, ApiErr>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result.map_err(ApiErr),
            Err(_) => {
                log::warn!(
                    "[api] Operation timed out after {:?}",
                    self.operation_timeout
                );
                Err(ApiErr(AppError::internal("operation timed out")))
            }
        }
    }
}

// ── Error handling ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(pub AppError);

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::AlreadyExists { .. }
            | AppError::InvalidState { .. }
            | AppError::NoCandidate { .. } => StatusCode::CONFLICT,
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::Database { .. } | AppError::Internal { .. } => {
                log::error!("[api] {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self.0 {
            // Infrastructure details stay in the log
            AppError::Database { .. } => "internal error".to_string(),
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody {
                    code: self.0.code().to_string(),
                    message,
                },
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::invalid_input(format!(
            "invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

fn require(value: &str, field: &str) -> Result<(), ApiErr> {
    if value.trim().is_empty() {
        return Err(ApiErr(AppError::invalid_input_field(
            format!("{} is required", field),
            field,
        )));
    }
    Ok(())
}

// ── Request / response types ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct TeamMemberBody {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    is_active: bool,
}

#[derive(Deserialize)]
struct TeamBody {
    #[serde(default)]
    team_name: String,
    #[serde(default)]
    members: Vec<TeamMemberBody>,
}

#[derive(Serialize)]
struct TeamMemberResponse {
    user_id: String,
    username: String,
    is_active: bool,
}

#[derive(Serialize)]
struct TeamResponse {
    team_name: String,
    members: Vec<TeamMemberResponse>,
}

impl From<Team> for TeamResponse {
    fn from(team: Team) -> Self {
        Self {
            team_name: team.name,
            members: team
                .members
                .into_iter()
                .map(|m| TeamMemberResponse {
                    user_id: m.user_id,
                    username: m.username,
                    is_active: m.is_active,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct TeamQuery {
    #[serde(default)]
    team_name: String,
}

#[derive(Deserialize)]
struct SetIsActiveBody {
    #[serde(default)]
    user_id: String,
    is_active: bool,
}

#[derive(Serialize)]
struct UserResponse {
    user_id: String,
    username: String,
    team_name: String,
    is_active: bool,
}

impl From<UserWithTeam> for UserResponse {
    fn from(user: UserWithTeam) -> Self {
        Self {
            user_id: user.id,
            username: user.name,
            team_name: user.team_name,
            is_active: user.is_active,
        }
    }
}

#[derive(Deserialize)]
struct UserQuery {
    #[serde(default)]
    user_id: String,
}

#[derive(Serialize)]
struct PullRequestShortResponse {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: String,
}

impl From<PullRequestShort> for PullRequestShortResponse {
    fn from(pr: PullRequestShort) -> Self {
        Self {
            pull_request_id: pr.id,
            pull_request_name: pr.title,
            author_id: pr.author_id,
            status: pr.status,
        }
    }
}

#[derive(Serialize)]
struct ReviewListResponse {
    user_id: String,
    pull_requests: Vec<PullRequestShortResponse>,
}

#[derive(Deserialize)]
struct CreatePullRequestBody {
    #[serde(default)]
    pull_request_id: String,
    #[serde(default)]
    pull_request_name: String,
    #[serde(default)]
    author_id: String,
}

#[derive(Deserialize)]
struct PullRequestIdBody {
    #[serde(default)]
    pull_request_id: String,
}

#[derive(Deserialize)]
struct PullRequestQuery {
    #[serde(default)]
    pull_request_id: String,
}

#[derive(Deserialize)]
struct ReassignBody {
    #[serde(default)]
    pull_request_id: String,
    #[serde(default)]
    old_reviewer_id: String,
}

/// Pull request as rendered in API responses.
#[derive(Serialize)]
struct PullRequestResponse {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: String,
    assigned_reviewers: Vec<String>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(rename = "mergedAt", skip_serializing_if = "Option::is_none")]
    merged_at: Option<DateTime<Utc>>,
}

impl From<PullRequest> for PullRequestResponse {
    fn from(pr: PullRequest) -> Self {
        Self {
            pull_request_id: pr.id,
            pull_request_name: pr.title,
            author_id: pr.author_id,
            status: pr.status.to_string(),
            assigned_reviewers: pr.reviewers,
            created_at: DateTime::from_timestamp(pr.created_at, 0),
            merged_at: pr.merged_at.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        }
    }
}

#[derive(Serialize)]
struct PullRequestEnvelope {
    pr: PullRequestResponse,
}

#[derive(Serialize)]
struct ReassignResponse {
    pr: PullRequestResponse,
    replaced_by: String,
}

impl From<ReassignOutcome> for ReassignResponse {
    fn from(outcome: ReassignOutcome) -> Self {
        Self {
            pr: outcome.pull_request.into(),
            replaced_by: outcome.replaced_by,
        }
    }
}

// ── Route builder ────────────────────────────────────────────────────────────

/// Build the API routes.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/team/add", post(add_team))
        .route("/team/get", get(get_team))
        .route("/users/setIsActive", post(set_is_active))
        .route("/users/getReview", get(get_review))
        .route("/pullRequest/create", post(create_pull_request))
        .route("/pullRequest/merge", post(merge_pull_request))
        .route("/pullRequest/reassign", post(reassign_reviewer))
        .route("/pullRequest/get", get(get_pull_request))
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /team/add: create a team and upsert its members.
async fn add_team(
    State(state): State<ApiState>,
    body: Result<Json<TeamBody>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiErr> {
    let Json(body) = body?;
    require(&body.team_name, "team_name")?;
    for member in &body.members {
        require(&member.user_id, "user_id")?;
    }

    let team = Team {
        name: body.team_name,
        members: body
            .members
            .into_iter()
            .map(|m| TeamMember {
                user_id: m.user_id,
                username: m.username,
                is_active: m.is_active,
            })
            .collect(),
    };

    let created = state.run(roster::add_team(&state.db, &team)).await?;
    let response = serde_json::json!({ "team": TeamResponse::from(created) });

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /team/get?team_name=X: team with its members.
async fn get_team(
    State(state): State<ApiState>,
    query: Result<Query<TeamQuery>, QueryRejection>,
) -> Result<Json<TeamResponse>, ApiErr> {
    let Query(query) = query?;
    require(&query.team_name, "team_name")?;

    let team = state.run(roster::get_team(&state.db, &query.team_name)).await?;
    Ok(Json(team.into()))
}

/// POST /users/setIsActive: toggle a user's active flag.
async fn set_is_active(
    State(state): State<ApiState>,
    body: Result<Json<SetIsActiveBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiErr> {
    let Json(body) = body?;
    require(&body.user_id, "user_id")?;

    let user = state
        .run(roster::set_is_active(&state.db, &body.user_id, body.is_active))
        .await?;

    Ok(Json(serde_json::json!({ "user": UserResponse::from(user) })))
}

/// GET /users/getReview?user_id=X: pull requests the user reviews.
async fn get_review(
    State(state): State<ApiState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ReviewListResponse>, ApiErr> {
    let Query(query) = query?;
    require(&query.user_id, "user_id")?;

    let prs = state
        .run(roster::review_assignments(&state.db, &query.user_id))
        .await?;

    Ok(Json(ReviewListResponse {
        user_id: query.user_id,
        pull_requests: prs.into_iter().map(Into::into).collect(),
    }))
}

/// POST /pullRequest/create: create a pull request and assign reviewers.
async fn create_pull_request(
    State(state): State<ApiState>,
    body: Result<Json<CreatePullRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<PullRequestEnvelope>), ApiErr> {
    let Json(body) = body?;
    require(&body.pull_request_id, "pull_request_id")?;
    require(&body.pull_request_name, "pull_request_name")?;
    require(&body.author_id, "author_id")?;

    let new_pr = NewPullRequest {
        id: body.pull_request_id,
        title: body.pull_request_name,
        author_id: body.author_id,
    };

    let created = state
        .run(state.assignments.create_pull_request(new_pr))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PullRequestEnvelope { pr: created.into() }),
    ))
}

/// POST /pullRequest/merge: mark a pull request as merged.
async fn merge_pull_request(
    State(state): State<ApiState>,
    body: Result<Json<PullRequestIdBody>, JsonRejection>,
) -> Result<Json<PullRequestEnvelope>, ApiErr> {
    let Json(body) = body?;
    require(&body.pull_request_id, "pull_request_id")?;

    let merged = state
        .run(state.assignments.merge_pull_request(&body.pull_request_id))
        .await?;

    Ok(Json(PullRequestEnvelope { pr: merged.into() }))
}

/// POST /pullRequest/reassign: swap one reviewer for another teammate.
async fn reassign_reviewer(
    State(state): State<ApiState>,
    body: Result<Json<ReassignBody>, JsonRejection>,
) -> Result<Json<ReassignResponse>, ApiErr> {
    let Json(body) = body?;
    require(&body.pull_request_id, "pull_request_id")?;
    require(&body.old_reviewer_id, "old_reviewer_id")?;

    let outcome = state
        .run(
            state
                .assignments
                .reassign_reviewer(&body.pull_request_id, &body.old_reviewer_id),
        )
        .await?;

    Ok(Json(outcome.into()))
}

/// GET /pullRequest/get?pull_request_id=X: read a pull request.
async fn get_pull_request(
    State(state): State<ApiState>,
    query: Result<Query<PullRequestQuery>, QueryRejection>,
) -> Result<Json<PullRequestEnvelope>, ApiErr> {
    let Query(query) = query?;
    require(&query.pull_request_id, "pull_request_id")?;

    let pr = state
        .run(state.assignments.get_pull_request(&query.pull_request_id))
        .await?;

    Ok(Json(PullRequestEnvelope { pr: pr.into() }))
}

//! Reviewer assignment workflow tests.
//!
//! These tests drive the assignment service end to end against a real SQLite
//! database: initial assignment on create, reassignment rules, merge, and the
//! failure paths that must leave the stored reviewer set untouched.

use pr_reviewer_lib::db::pool::DbPool;
use pr_reviewer_lib::db::roster;
use pr_reviewer_lib::error::{AppError, Resource};
use pr_reviewer_lib::models::{NewPullRequest, PullRequestStatus, Team, TeamMember};
use pr_reviewer_lib::services::{AssignmentService, SeededRandom};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

async fn setup() -> (TempDir, DbPool, AssignmentService) {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let pool = pr_reviewer_lib::db::initialize(&db_path).await.unwrap();
    let service = AssignmentService::with_random(pool.clone(), Arc::new(SeededRandom::new(7)));
    (dir, pool, service)
}

async fn add_team(pool: &DbPool, name: &str, members: &[(&str, bool)]) {
    let team = Team {
        name: name.to_string(),
        members: members
            .iter()
            .map(|(id, active)| TeamMember {
                user_id: id.to_string(),
                username: format!("User {}", id),
                is_active: *active,
            })
            .collect(),
    };
    roster::add_team(pool, &team).await.unwrap();
}

fn new_pr(id: &str, author: &str) -> NewPullRequest {
    NewPullRequest {
        id: id.to_string(),
        title: format!("Change {}", id),
        author_id: author.to_string(),
    }
}

#[tokio::test]
async fn test_create_assigns_every_teammate_when_two_or_fewer() {
    let (_dir, pool, service) = setup().await;
    add_team(&pool, "backend", &[("a", true), ("b", true), ("c", true)]).await;

    let pr = service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();

    assert_eq!(pr.status, PullRequestStatus::Open);
    assert_eq!(pr.reviewers, vec!["b", "c"]);
    assert!(pr.merged_at.is_none());
}

#[tokio::test]
async fn test_create_skips_inactive_members_and_author() {
    let (_dir, pool, service) = setup().await;
    add_team(
        &pool,
        "backend",
        &[("a", true), ("b", false), ("c", true), ("d", false)],
    )
    .await;

    let pr = service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();
    assert_eq!(pr.reviewers, vec!["c"]);
}

#[tokio::test]
async fn test_create_with_no_eligible_teammates_has_no_reviewers() {
    let (_dir, pool, service) = setup().await;
    add_team(&pool, "solo", &[("a", true)]).await;

    let pr = service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();
    assert!(pr.reviewers.is_empty());
}

#[tokio::test]
async fn test_create_draws_two_distinct_reviewers_from_large_team() {
    let (_dir, pool, service) = setup().await;
    add_team(
        &pool,
        "platform",
        &[("a", true), ("b", true), ("c", true), ("d", true), ("e", true)],
    )
    .await;

    for i in 0..20 {
        let pr = service
            .create_pull_request(new_pr(&format!("pr-{}", i), "a"))
            .await
            .unwrap();

        assert_eq!(pr.reviewers.len(), 2);
        assert_ne!(pr.reviewers[0], pr.reviewers[1]);
        assert!(!pr.has_reviewer("a"));
    }
}

#[tokio::test]
async fn test_create_with_unknown_author_fails() {
    let (_dir, _pool, service) = setup().await;

    let err = service
        .create_pull_request(new_pr("pr-1", "ghost"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::NotFound {
            resource: Resource::User,
            ..
        }
    ));
}

#[tokio::test]
async fn test_duplicate_create_is_rejected() {
    let (_dir, pool, service) = setup().await;
    add_team(&pool, "backend", &[("a", true), ("b", true), ("c", true)]).await;

    let first = service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();
    let err = service
        .create_pull_request(new_pr("pr-1", "b"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "PR_EXISTS");

    let stored = service.get_pull_request("pr-1").await.unwrap();
    assert_eq!(stored, first);
}

#[tokio::test]
async fn test_get_reads_back_what_create_returned() {
    let (_dir, pool, service) = setup().await;
    add_team(&pool, "backend", &[("a", true), ("b", true)]).await;

    let created = service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();
    let fetched = service.get_pull_request("pr-1").await.unwrap();

    assert_eq!(created, fetched);

    let err = service.get_pull_request("missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_reassign_replaces_with_active_teammate() {
    let (_dir, pool, service) = setup().await;
    add_team(
        &pool,
        "backend",
        &[("a", true), ("b", true), ("c", true), ("d", false)],
    )
    .await;
    let pr = service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();
    assert_eq!(pr.reviewers, vec!["b", "c"]);

    roster::set_is_active(&pool, "d", true).await.unwrap();

    let outcome = service.reassign_reviewer("pr-1", "b").await.unwrap();

    assert_eq!(outcome.replaced_by, "d");
    assert_eq!(outcome.pull_request.reviewers, vec!["c", "d"]);

    let stored = service.get_pull_request("pr-1").await.unwrap();
    assert_eq!(stored.reviewers, vec!["c", "d"]);
}

#[tokio::test]
async fn test_reassign_never_picks_author_or_current_reviewer() {
    let (_dir, pool, service) = setup().await;
    add_team(
        &pool,
        "platform",
        &[
            ("a", true),
            ("b", true),
            ("c", true),
            ("d", true),
            ("e", true),
            ("f", true),
        ],
    )
    .await;

    let mut pr = service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();

    for round in 0..30 {
        let old = pr.reviewers[round % pr.reviewers.len()].clone();
        let other: Vec<String> = pr.reviewers.iter().filter(|r| **r != old).cloned().collect();

        let outcome = service.reassign_reviewer("pr-1", &old).await.unwrap();

        assert_ne!(outcome.replaced_by, "a");
        assert_ne!(outcome.replaced_by, old);
        assert!(!other.contains(&outcome.replaced_by));
        assert_eq!(outcome.pull_request.reviewers.len(), 2);
        assert!(outcome.pull_request.has_reviewer(&outcome.replaced_by));
        assert!(!outcome.pull_request.has_reviewer(&old));

        pr = outcome.pull_request;
    }
}

#[tokio::test]
async fn test_reassign_draws_from_old_reviewers_current_team() {
    let (_dir, pool, service) = setup().await;
    add_team(&pool, "backend", &[("a", true), ("b", true)]).await;
    let pr = service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();
    assert_eq!(pr.reviewers, vec!["b"]);

    // Moving "b" to another team changes where its replacement comes from
    add_team(&pool, "frontend", &[("b", true), ("x", true)]).await;

    let outcome = service.reassign_reviewer("pr-1", "b").await.unwrap();
    assert_eq!(outcome.replaced_by, "x");
    assert_eq!(outcome.pull_request.reviewers, vec!["x"]);
}

#[tokio::test]
async fn test_reassign_inactive_reviewer_is_allowed() {
    let (_dir, pool, service) = setup().await;
    add_team(
        &pool,
        "backend",
        &[("a", true), ("b", true), ("c", true), ("d", false)],
    )
    .await;
    let pr = service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();
    assert_eq!(pr.reviewers, vec!["b", "c"]);

    roster::set_is_active(&pool, "b", false).await.unwrap();
    roster::set_is_active(&pool, "d", true).await.unwrap();

    let outcome = service.reassign_reviewer("pr-1", "b").await.unwrap();
    assert_eq!(outcome.replaced_by, "d");
}

#[tokio::test]
async fn test_reassign_on_merged_pull_request_fails_unchanged() {
    let (_dir, pool, service) = setup().await;
    add_team(
        &pool,
        "backend",
        &[("a", true), ("b", true), ("c", true), ("d", true)],
    )
    .await;
    service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();
    let merged = service.merge_pull_request("pr-1").await.unwrap();

    let old = merged.reviewers[0].clone();
    let err = service.reassign_reviewer("pr-1", &old).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidState { .. }));
    assert_eq!(err.code(), "PR_MERGED");

    let stored = service.get_pull_request("pr-1").await.unwrap();
    assert_eq!(stored, merged);
}

#[tokio::test]
async fn test_reassign_unassigned_reviewer_fails() {
    let (_dir, pool, service) = setup().await;
    add_team(&pool, "backend", &[("a", true), ("b", true), ("c", true)]).await;
    let before = service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();

    let err = service.reassign_reviewer("pr-1", "a").await.unwrap_err();
    assert!(matches!(
        err,
        AppError::NotFound {
            resource: Resource::Reviewer,
            ..
        }
    ));

    let stored = service.get_pull_request("pr-1").await.unwrap();
    assert_eq!(stored, before);
}

#[tokio::test]
async fn test_reassign_unknown_pull_request_fails() {
    let (_dir, _pool, service) = setup().await;

    let err = service.reassign_reviewer("missing", "b").await.unwrap_err();
    assert!(matches!(
        err,
        AppError::NotFound {
            resource: Resource::PullRequest,
            ..
        }
    ));
}

#[tokio::test]
async fn test_reassign_without_candidates_fails_unchanged() {
    let (_dir, pool, service) = setup().await;
    add_team(&pool, "backend", &[("a", true), ("b", true), ("c", true)]).await;
    let before = service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();

    let err = service.reassign_reviewer("pr-1", "b").await.unwrap_err();
    assert!(matches!(err, AppError::NoCandidate { .. }));
    assert_eq!(err.code(), "NO_CANDIDATE");

    let stored = service.get_pull_request("pr-1").await.unwrap();
    assert_eq!(stored, before);
}

#[tokio::test]
async fn test_merge_is_idempotent() {
    let (_dir, pool, service) = setup().await;
    add_team(&pool, "backend", &[("a", true), ("b", true)]).await;
    service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();

    let first = service.merge_pull_request("pr-1").await.unwrap();
    let second = service.merge_pull_request("pr-1").await.unwrap();

    assert_eq!(first.status, PullRequestStatus::Merged);
    assert!(first.merged_at.is_some());
    assert_eq!(first.merged_at, second.merged_at);

    let err = service.merge_pull_request("missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_review_assignments_follow_reassignment() {
    let (_dir, pool, service) = setup().await;
    add_team(&pool, "backend", &[("a", true), ("b", true), ("c", false)]).await;
    service.create_pull_request(new_pr("pr-1", "a")).await.unwrap();

    let before = roster::review_assignments(&pool, "b").await.unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].id, "pr-1");

    roster::set_is_active(&pool, "c", true).await.unwrap();
    service.reassign_reviewer("pr-1", "b").await.unwrap();

    assert!(roster::review_assignments(&pool, "b").await.unwrap().is_empty());
    assert_eq!(roster::review_assignments(&pool, "c").await.unwrap().len(), 1);
}

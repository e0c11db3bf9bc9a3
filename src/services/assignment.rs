//! Reviewer assignment service.
//!
//! Computes the initial reviewer set when a pull request is created, merges
//! pull requests, and swaps a reviewer as one atomic unit under the
//! per-record lock. Every failure aborts its transaction; no partial reviewer
//! set is ever committed.

use crate::db::pool::DbPool;
use crate::db::pull_requests::PullRequestStore;
use crate::db::roster;
use crate::error::{AppError, Resource};
use crate::models::{NewPullRequest, PullRequest, MAX_REVIEWERS};
use crate::services::reviewer_selector::{self, RandomSource, SelectionError, ThreadRandom};
use serde::Serialize;
use std::sync::Arc;

/// Result of a successful reassignment.
#[derive(Debug, Clone, Serialize)]
pub struct ReassignOutcome {
    pub pull_request: PullRequest,
    pub replaced_by: String,
}

/// Reviewer assignment and reassignment for pull requests.
#[derive(Clone)]
pub struct AssignmentService {
    store: PullRequestStore,
    random: Arc<dyn RandomSource>,
}

impl AssignmentService {
    /// Create a service drawing from the thread-local generator.
    pub fn new(pool: DbPool) -> Self {
        Self::with_random(pool, Arc::new(ThreadRandom))
    }

    /// Create a service with an explicit random source.
    pub fn with_random(pool: DbPool, random: Arc<dyn RandomSource>) -> Self {
        Self {
            store: PullRequestStore::new(pool),
            random,
        }
    }

    pub fn store(&self) -> &PullRequestStore {
        &self.store
    }

    /// Create a pull request with up to `MAX_REVIEWERS` reviewers drawn from
    /// the author's team.
    ///
    /// The reviewer set is computed once from the active roster, outside any
    /// lock, then persisted together with the record. An author with no
    /// eligible teammates gets an empty reviewer set.
    pub async fn create_pull_request(
        &self,
        new_pr: NewPullRequest,
    ) -> Result<PullRequest, AppError> {
        let candidates = {
            let mut conn = self.store.pool().acquire().await?;
            let author = roster::get_user(&mut conn, &new_pr.author_id).await?;
            roster::active_member_ids(&mut conn, author.team_id).await?
        };

        let reviewers = match reviewer_selector::select(
            &candidates,
            &[new_pr.author_id.as_str()],
            MAX_REVIEWERS,
            self.random.as_ref(),
        ) {
            Ok(reviewers) => reviewers,
            Err(SelectionError::NoActiveCandidates) => Vec::new(),
        };

        let created = self.store.create_with_reviewers(&new_pr, &reviewers).await?;

        log::info!(
            "[assignment] Created {} by {} with reviewers {:?}",
            created.id,
            created.author_id,
            created.reviewers
        );

        Ok(created)
    }

    /// Mark a pull request as merged.
    pub async fn merge_pull_request(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        let merged = self.store.merge(pr_id).await?;
        log::info!("[assignment] Merged {}", merged.id);
        Ok(merged)
    }

    /// Read a pull request and its current reviewer set.
    pub async fn get_pull_request(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        self.store.get(pr_id).await
    }

    /// Replace `old_reviewer_id` on a pull request with a random active
    /// member of the old reviewer's team.
    ///
    /// Requests on the same pull request run one after another; each sees
    /// the reviewer set committed by the previous one.
    ///
    /// # Errors
    /// - `NotFound` if the pull request does not exist, `old_reviewer_id` is
    ///   not assigned to it, or the old reviewer is unknown
    /// - `InvalidState` if the pull request is merged
    /// - `NoCandidate` if no active teammate remains outside the current
    ///   reviewers and the author
    pub async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<ReassignOutcome, AppError> {
        let mut locked = self.store.lock_for_update(pr_id).await?;

        if !locked.record.is_open() {
            return Err(AppError::invalid_state("pull request is merged"));
        }

        if !locked.record.has_reviewer(old_reviewer_id) {
            return Err(AppError::not_found_with_id(Resource::Reviewer, old_reviewer_id));
        }

        let author_id = locked.record.author_id.clone();
        let mut excluding: Vec<String> = locked.record.reviewers.clone();
        excluding.push(old_reviewer_id.to_string());
        excluding.push(author_id.clone());
        let excluding: Vec<&str> = excluding.iter().map(String::as_str).collect();

        let old_reviewer = roster::get_user(locked.connection(), old_reviewer_id).await?;
        let replacement = roster::pick_active_teammate(
            locked.connection(),
            old_reviewer.team_id,
            &excluding,
            self.random.as_ref(),
        )
        .await?;

        // Guard against roster changes between exclusion and draw
        if replacement == author_id {
            return Err(AppError::no_candidate("replacement would be the author"));
        }

        let replaced = locked.replace_reviewer(old_reviewer_id, &replacement).await?;
        if replaced == 0 {
            return Err(AppError::not_found_with_id(Resource::Reviewer, old_reviewer_id));
        }

        let reviewers = locked.list_reviewers().await?;
        let pull_request = locked.commit(reviewers).await?;

        log::info!(
            "[assignment] Reassigned reviewer on {}: {} -> {}",
            pull_request.id,
            old_reviewer_id,
            replacement
        );

        Ok(ReassignOutcome {
            pull_request,
            replaced_by: replacement,
        })
    }
}

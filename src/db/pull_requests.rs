//! Pull request store.
//!
//! Reads and writes pull request records and their reviewer rows. The
//! reviewer set is a join relation keyed by (pr_id, user_id), so replacing a
//! reviewer is a delete of the old pairing plus an insert of the new one and
//! a zero-row delete means the pairing was already gone.
//!
//! Every write transaction starts with a write statement so SQLite takes its
//! write lock up front instead of upgrading a read snapshot later.

use crate::db::now;
use crate::db::pool::DbPool;
use crate::db::record_lock::{RecordGuard, RecordLocks};
use crate::error::{AppError, Resource};
use crate::models::{NewPullRequest, PullRequest, PullRequestRow, PullRequestStatus};
use sqlx::{Sqlite, SqliteConnection, Transaction};

const PULL_REQUEST_COLUMNS: &str = "id, title, author_id, status, created_at, merged_at";

/// Store for pull requests and their reviewer sets.
#[derive(Clone)]
pub struct PullRequestStore {
    pool: DbPool,
    locks: RecordLocks,
}

/// A pull request held under its exclusive record lock inside an open
/// transaction.
///
/// Dropping it without [`LockedPullRequest::commit`] rolls the transaction
/// back and releases the lock. The rollback is only queued on drop and runs
/// when the connection goes back to the pool, so the next holder may briefly
/// wait on the database write lock through the busy timeout.
pub struct LockedPullRequest {
    // Dropped before the guard so the rollback is queued first
    tx: Transaction<'static, Sqlite>,
    _guard: RecordGuard,
    pub record: PullRequest,
}

/// List the reviewer IDs of a pull request, ordered by ID.
pub async fn list_reviewers(
    conn: &mut SqliteConnection,
    pr_id: &str,
) -> Result<Vec<String>, AppError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT user_id FROM pull_request_reviewers WHERE pr_id = ? ORDER BY user_id",
    )
    .bind(pr_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

impl PullRequestStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            locks: RecordLocks::new(),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Persist a new pull request and its reviewer rows as one unit.
    ///
    /// Fails with `AlreadyExists` when the ID is taken. Concurrent creations
    /// with the same ID are serialized by the primary key; the loser inserts
    /// nothing.
    pub async fn create_with_reviewers(
        &self,
        new_pr: &NewPullRequest,
        reviewer_ids: &[String],
    ) -> Result<PullRequest, AppError> {
        let mut tx = self.pool.begin().await?;
        let created_at = now();

        let row: Option<PullRequestRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO pull_requests (id, title, author_id, status, created_at, updated_at)
            VALUES (?, ?, ?, 'OPEN', ?, ?)
            ON CONFLICT(id) DO NOTHING
            RETURNING {}
            "#,
            PULL_REQUEST_COLUMNS
        ))
        .bind(&new_pr.id)
        .bind(&new_pr.title)
        .bind(&new_pr.author_id)
        .bind(created_at)
        .bind(created_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(AppError::already_exists(Resource::PullRequest, &new_pr.id));
        };

        for reviewer_id in reviewer_ids {
            sqlx::query(
                "INSERT INTO pull_request_reviewers (pr_id, user_id, assigned_at) VALUES (?, ?, ?)",
            )
            .bind(&new_pr.id)
            .bind(reviewer_id)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }

        let reviewers = list_reviewers(&mut tx, &new_pr.id).await?;
        let record = PullRequest::from_row(row, reviewers)?;

        tx.commit().await?;

        Ok(record)
    }

    /// Take the exclusive lock on one pull request and its reviewer rows.
    ///
    /// Waits for any other holder of the same record; other records are not
    /// affected. Fails with `NotFound` if the record does not exist.
    pub async fn lock_for_update(&self, pr_id: &str) -> Result<LockedPullRequest, AppError> {
        let guard = self.locks.acquire(pr_id).await;
        let mut tx = self.pool.begin().await?;

        // No-op write: takes the database write lock and reads the row in one step
        let row: Option<PullRequestRow> = sqlx::query_as(&format!(
            "UPDATE pull_requests SET updated_at = updated_at WHERE id = ? RETURNING {}",
            PULL_REQUEST_COLUMNS
        ))
        .bind(pr_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(AppError::not_found_with_id(Resource::PullRequest, pr_id));
        };

        let reviewers = list_reviewers(&mut tx, pr_id).await?;
        let record = PullRequest::from_row(row, reviewers)?;

        Ok(LockedPullRequest {
            tx,
            _guard: guard,
            record,
        })
    }

    /// Transition a pull request to `MERGED`.
    ///
    /// The merge timestamp is written only on the first transition; merging
    /// an already merged record returns it unchanged. Fails with `NotFound`.
    pub async fn merge(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        let _guard = self.locks.acquire(pr_id).await;
        let mut tx = self.pool.begin().await?;
        let merged_at = now();

        let row: Option<PullRequestRow> = sqlx::query_as(&format!(
            r#"
            UPDATE pull_requests
            SET status = ?,
                merged_at = COALESCE(merged_at, ?),
                updated_at = CASE WHEN status = ? THEN ? ELSE updated_at END
            WHERE id = ?
            RETURNING {}
            "#,
            PULL_REQUEST_COLUMNS
        ))
        .bind(PullRequestStatus::Merged.as_str())
        .bind(merged_at)
        .bind(PullRequestStatus::Open.as_str())
        .bind(merged_at)
        .bind(pr_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(AppError::not_found_with_id(Resource::PullRequest, pr_id));
        };

        let reviewers = list_reviewers(&mut tx, pr_id).await?;
        let record = PullRequest::from_row(row, reviewers)?;

        tx.commit().await?;

        Ok(record)
    }

    /// Read a pull request and its reviewer set.
    pub async fn get(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        let mut conn = self.pool.acquire().await?;

        let row: Option<PullRequestRow> = sqlx::query_as(&format!(
            "SELECT {} FROM pull_requests WHERE id = ?",
            PULL_REQUEST_COLUMNS
        ))
        .bind(pr_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Err(AppError::not_found_with_id(Resource::PullRequest, pr_id));
        };

        let reviewers = list_reviewers(&mut conn, pr_id).await?;
        PullRequest::from_row(row, reviewers)
    }

    /// Read-only reviewer listing outside any transaction.
    pub async fn list_reviewers(&self, pr_id: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self.pool.acquire().await?;
        list_reviewers(&mut conn, pr_id).await
    }
}

impl LockedPullRequest {
    /// Connection of the open transaction, for reads that must see its state.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Swap `old_id` for `new_id` in the reviewer set.
    ///
    /// Returns the number of old pairings removed; zero means `old_id` was no
    /// longer assigned and nothing was written.
    pub async fn replace_reviewer(&mut self, old_id: &str, new_id: &str) -> Result<u64, AppError> {
        let pr_id = self.record.id.as_str();
        let assigned_at = now();

        let deleted = sqlx::query("DELETE FROM pull_request_reviewers WHERE pr_id = ? AND user_id = ?")
            .bind(pr_id)
            .bind(old_id)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Ok(0);
        }

        sqlx::query(
            "INSERT INTO pull_request_reviewers (pr_id, user_id, assigned_at) VALUES (?, ?, ?)",
        )
        .bind(pr_id)
        .bind(new_id)
        .bind(assigned_at)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query("UPDATE pull_requests SET updated_at = ? WHERE id = ?")
            .bind(assigned_at)
            .bind(pr_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(deleted)
    }

    /// Reviewer set as seen by the open transaction.
    pub async fn list_reviewers(&mut self) -> Result<Vec<String>, AppError> {
        list_reviewers(&mut self.tx, &self.record.id).await
    }

    /// Commit with the given final reviewer set and release the lock.
    pub async fn commit(self, reviewers: Vec<String>) -> Result<PullRequest, AppError> {
        let LockedPullRequest {
            tx,
            _guard,
            mut record,
        } = self;

        tx.commit().await?;
        record.reviewers = reviewers;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::roster;
    use crate::models::{Team, TeamMember};
    use tempfile::TempDir;

    async fn setup_test_db() -> (TempDir, PullRequestStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("test.db"))
            .await
            .unwrap();

        let members = ["u1", "u2", "u3", "u4"]
            .iter()
            .map(|id| TeamMember {
                user_id: id.to_string(),
                username: id.to_uppercase(),
                is_active: true,
            })
            .collect();
        roster::add_team(
            &pool,
            &Team {
                name: "backend".to_string(),
                members,
            },
        )
        .await
        .unwrap();

        (dir, PullRequestStore::new(pool))
    }

    fn new_pr(id: &str) -> NewPullRequest {
        NewPullRequest {
            id: id.to_string(),
            title: "Add search".to_string(),
            author_id: "u1".to_string(),
        }
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let (_dir, store) = setup_test_db().await;

        let created = store
            .create_with_reviewers(&new_pr("pr-1"), &ids(&["u3", "u2"]))
            .await
            .unwrap();

        assert_eq!(created.status, PullRequestStatus::Open);
        assert_eq!(created.reviewers, ids(&["u2", "u3"]));
        assert!(created.merged_at.is_none());

        let fetched = store.get("pr-1").await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected_without_side_effects() {
        let (_dir, store) = setup_test_db().await;

        store
            .create_with_reviewers(&new_pr("pr-1"), &ids(&["u2"]))
            .await
            .unwrap();
        let err = store
            .create_with_reviewers(&new_pr("pr-1"), &ids(&["u3", "u4"]))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "PR_EXISTS");
        assert_eq!(store.list_reviewers("pr-1").await.unwrap(), ids(&["u2"]));
    }

    #[tokio::test]
    async fn test_lock_missing_record() {
        let (_dir, store) = setup_test_db().await;
        let err = store.lock_for_update("nope").await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_replace_reviewer_commit() {
        let (_dir, store) = setup_test_db().await;
        store
            .create_with_reviewers(&new_pr("pr-1"), &ids(&["u2", "u3"]))
            .await
            .unwrap();

        let mut locked = store.lock_for_update("pr-1").await.unwrap();
        assert_eq!(locked.record.reviewers, ids(&["u2", "u3"]));

        assert_eq!(locked.replace_reviewer("u2", "u4").await.unwrap(), 1);
        let reviewers = locked.list_reviewers().await.unwrap();
        let record = locked.commit(reviewers).await.unwrap();

        assert_eq!(record.reviewers, ids(&["u3", "u4"]));
        assert_eq!(store.get("pr-1").await.unwrap().reviewers, ids(&["u3", "u4"]));
    }

    #[tokio::test]
    async fn test_replace_absent_pairing_reports_zero() {
        let (_dir, store) = setup_test_db().await;
        store
            .create_with_reviewers(&new_pr("pr-1"), &ids(&["u2"]))
            .await
            .unwrap();

        let mut locked = store.lock_for_update("pr-1").await.unwrap();
        assert_eq!(locked.replace_reviewer("u3", "u4").await.unwrap(), 0);
        assert_eq!(locked.list_reviewers().await.unwrap(), ids(&["u2"]));
    }

    #[tokio::test]
    async fn test_dropping_lock_rolls_back() {
        let (_dir, store) = setup_test_db().await;
        store
            .create_with_reviewers(&new_pr("pr-1"), &ids(&["u2", "u3"]))
            .await
            .unwrap();

        {
            let mut locked = store.lock_for_update("pr-1").await.unwrap();
            locked.replace_reviewer("u2", "u4").await.unwrap();
        }

        assert_eq!(store.get("pr-1").await.unwrap().reviewers, ids(&["u2", "u3"]));
    }

    #[tokio::test]
    async fn test_merge_sets_timestamp_once() {
        let (_dir, store) = setup_test_db().await;
        store
            .create_with_reviewers(&new_pr("pr-1"), &ids(&["u2"]))
            .await
            .unwrap();

        let merged = store.merge("pr-1").await.unwrap();
        assert_eq!(merged.status, PullRequestStatus::Merged);
        assert_eq!(merged.reviewers, ids(&["u2"]));
        let first_merge = merged.merged_at.expect("merged_at set");

        let again = store.merge("pr-1").await.unwrap();
        assert_eq!(again.status, PullRequestStatus::Merged);
        assert_eq!(again.merged_at, Some(first_merge));

        let err = store.merge("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }
}

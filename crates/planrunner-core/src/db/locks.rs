use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable};
use serde::{Deserialize, Serialize};

use crate::collab::Locker;
use crate::error::{PlanError, Result};
use crate::types::{Project, PullRequest, User};

use super::LOCKS;

// ---------------------------------------------------------------------------
// ProjectLock
// ---------------------------------------------------------------------------

/// A held lock on one project + workspace, owned by a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLock {
    pub project: Project,
    pub workspace: String,
    pub pull: PullRequest,
    pub user: User,
    pub time: DateTime<Utc>,
}

impl ProjectLock {
    pub fn key(&self) -> String {
        lock_key(&self.project, &self.workspace)
    }

    fn held_by(&self, repo_full_name: &str, pull_num: u64) -> bool {
        self.pull.base_repo.full_name == repo_full_name && self.pull.num == pull_num
    }
}

/// `<repo full name>/<dir>/<workspace>`.
pub fn lock_key(project: &Project, workspace: &str) -> String {
    format!("{}/{}/{}", project.repo_full_name, project.path, workspace)
}

fn store_err(e: impl std::fmt::Display) -> PlanError {
    PlanError::LockStore(e.to_string())
}

// ---------------------------------------------------------------------------
// LockDb
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct LockDb {
    db: Arc<Database>,
}

impl LockDb {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(super::open_database(path)?))
    }

    /// Try to take the lock described by `lock`.
    ///
    /// Returns `(acquired, holder)`. A lock already held by the same pull is
    /// reentrant and reported as acquired with the existing holder.
    pub fn try_lock(&self, lock: ProjectLock) -> Result<(bool, ProjectLock)> {
        let key = lock.key();
        let wt = self.db.begin_write().map_err(store_err)?;
        let outcome = {
            let mut table = wt.open_table(LOCKS).map_err(store_err)?;
            let existing: Option<ProjectLock> = match table.get(key.as_str()).map_err(store_err)? {
                Some(guard) => Some(serde_json::from_slice(guard.value())?),
                None => None,
            };
            match existing {
                Some(holder) => {
                    let reentrant =
                        holder.held_by(&lock.pull.base_repo.full_name, lock.pull.num);
                    (reentrant, holder)
                }
                None => {
                    let value = serde_json::to_vec(&lock)?;
                    table
                        .insert(key.as_str(), value.as_slice())
                        .map_err(store_err)?;
                    (true, lock)
                }
            }
        };
        wt.commit().map_err(store_err)?;
        Ok(outcome)
    }

    /// Remove the lock at `key`, returning it if it existed.
    pub fn unlock(&self, key: &str) -> Result<Option<ProjectLock>> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let removed: Option<ProjectLock> = {
            let mut table = wt.open_table(LOCKS).map_err(store_err)?;
            let removed = table.remove(key).map_err(store_err)?;
            match removed {
                Some(guard) => Some(serde_json::from_slice(guard.value())?),
                None => None,
            }
        };
        wt.commit().map_err(store_err)?;
        Ok(removed)
    }

    /// Every held lock, sorted by key.
    pub fn list(&self) -> Result<Vec<ProjectLock>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(LOCKS).map_err(store_err)?;
        let mut locks = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            locks.push(serde_json::from_slice(v.value())?);
        }
        Ok(locks)
    }

    /// Remove every lock held by the pull. Idempotent.
    pub fn remove_pull_locks(
        &self,
        repo_full_name: &str,
        pull_num: u64,
    ) -> Result<Vec<ProjectLock>> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let removed: Vec<ProjectLock> = {
            let mut table = wt.open_table(LOCKS).map_err(store_err)?;
            let mut owned: Vec<(String, ProjectLock)> = Vec::new();
            for entry in table.iter().map_err(store_err)? {
                let (k, v) = entry.map_err(store_err)?;
                let lock: ProjectLock = serde_json::from_slice(v.value())?;
                if lock.held_by(repo_full_name, pull_num) {
                    owned.push((k.value().to_string(), lock));
                }
            }
            for (key, _) in &owned {
                table.remove(key.as_str()).map_err(store_err)?;
            }
            owned.into_iter().map(|(_, lock)| lock).collect()
        };
        wt.commit().map_err(store_err)?;
        Ok(removed)
    }
}

#[async_trait]
impl Locker for LockDb {
    async fn unlock_by_pull(&self, repo_full_name: &str, pull_num: u64) -> Result<usize> {
        let db = self.clone();
        let repo = repo_full_name.to_string();
        let removed = tokio::task::spawn_blocking(move || db.remove_pull_locks(&repo, pull_num))
            .await
            .map_err(|e| PlanError::LockStore(format!("task join error: {e}")))??;
        Ok(removed.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable};

use crate::collab::PullStatusStore;
use crate::command::ProjectResult;
use crate::error::{PlanError, Result};
use crate::types::{ProjectStatus, PullRequest, PullStatus};

use super::PULLS;

fn pull_key(repo_full_name: &str, pull_num: u64) -> String {
    format!("{repo_full_name}::{pull_num}")
}

fn store_err(e: impl std::fmt::Display) -> PlanError {
    PlanError::StatusStore(e.to_string())
}

/// Persistent store for per-pull project statuses.
#[derive(Clone)]
pub struct PullStatusDb {
    db: Arc<Database>,
}

impl PullStatusDb {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(super::open_database(path)?))
    }

    pub fn get(&self, repo_full_name: &str, pull_num: u64) -> Result<Option<PullStatus>> {
        let key = pull_key(repo_full_name, pull_num);
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(PULLS).map_err(store_err)?;
        let status = match table.get(key.as_str()).map_err(store_err)? {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        };
        Ok(status)
    }

    /// Merge `results` into the stored status and return the new record.
    ///
    /// A record computed against a different head commit is stale and is
    /// replaced rather than merged. Within the same commit, projects are
    /// matched by (dir, workspace, project name).
    pub fn record_results(&self, pull: &PullRequest, results: &[ProjectResult]) -> Result<PullStatus> {
        let key = pull_key(&pull.base_repo.full_name, pull.num);
        let wt = self.db.begin_write().map_err(store_err)?;
        let status = {
            let mut table = wt.open_table(PULLS).map_err(store_err)?;
            let stored: Option<PullStatus> = match table.get(key.as_str()).map_err(store_err)? {
                Some(guard) => Some(serde_json::from_slice(guard.value())?),
                None => None,
            };

            let mut status = match stored {
                Some(s) if s.pull.head_commit == pull.head_commit => s,
                _ => PullStatus {
                    pull: pull.clone(),
                    projects: Vec::new(),
                },
            };
            status.pull = pull.clone();

            for result in results {
                let existing = status.projects.iter_mut().find(|p| {
                    p.same_project(
                        &result.repo_rel_dir,
                        &result.workspace,
                        result.project_name.as_deref(),
                    )
                });
                match existing {
                    Some(project) => project.status = result.plan_status(),
                    None => status.projects.push(ProjectStatus {
                        repo_rel_dir: result.repo_rel_dir.clone(),
                        workspace: result.workspace.clone(),
                        project_name: result.project_name.clone(),
                        status: result.plan_status(),
                    }),
                }
            }

            let value = serde_json::to_vec(&status)?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(store_err)?;
            status
        };
        wt.commit().map_err(store_err)?;
        Ok(status)
    }

    /// Forget the pull entirely, e.g. once it is merged or closed.
    pub fn delete(&self, repo_full_name: &str, pull_num: u64) -> Result<bool> {
        let key = pull_key(repo_full_name, pull_num);
        let wt = self.db.begin_write().map_err(store_err)?;
        let existed = {
            let mut table = wt.open_table(PULLS).map_err(store_err)?;
            let removed = table.remove(key.as_str()).map_err(store_err)?;
            removed.is_some()
        };
        wt.commit().map_err(store_err)?;
        Ok(existed)
    }
}

#[async_trait]
impl PullStatusStore for PullStatusDb {
    async fn get_pull_status(&self, pull: &PullRequest) -> Result<Option<PullStatus>> {
        let db = self.clone();
        let repo = pull.base_repo.full_name.clone();
        let num = pull.num;
        tokio::task::spawn_blocking(move || db.get(&repo, num))
            .await
            .map_err(|e| PlanError::StatusStore(format!("task join error: {e}")))?
    }

    async fn update_pull_with_results(
        &self,
        pull: &PullRequest,
        results: &[ProjectResult],
    ) -> Result<PullStatus> {
        let db = self.clone();
        let pull = pull.clone();
        let results = results.to_vec();
        tokio::task::spawn_blocking(move || db.record_results(&pull, &results))
            .await
            .map_err(|e| PlanError::StatusStore(format!("task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::collab::{ProjectLocker, TryLockResponse};
use crate::command::ProjectCommand;
use crate::db::{lock_key, LockDb, ProjectLock};
use crate::error::{PlanError, Result};

/// [`ProjectLocker`] backed by the redb lock table.
pub struct DefaultProjectLocker {
    db: Arc<LockDb>,
}

impl DefaultProjectLocker {
    pub fn new(db: Arc<LockDb>) -> Self {
        Self { db }
    }
}

fn held_elsewhere(pull_num: u64) -> String {
    format!(
        "This project is currently locked by an unapplied plan from pull #{pull_num}. \
         To continue, delete the lock from #{pull_num} or apply that plan and merge the pull request."
    )
}

#[async_trait]
impl ProjectLocker for DefaultProjectLocker {
    async fn try_lock(&self, cmd: &ProjectCommand) -> Result<TryLockResponse> {
        let project = cmd.project();
        let key = lock_key(&project, &cmd.workspace);

        if !cmd.repo_locking {
            return Ok(TryLockResponse {
                acquired: true,
                failure_reason: None,
                lock_key: key,
            });
        }

        let lock = ProjectLock {
            project,
            workspace: cmd.workspace.clone(),
            pull: cmd.pull.clone(),
            user: cmd.user.clone(),
            time: Utc::now(),
        };
        let db = Arc::clone(&self.db);
        let (acquired, holder) = tokio::task::spawn_blocking(move || db.try_lock(lock))
            .await
            .map_err(|e| PlanError::LockStore(format!("task join error: {e}")))??;

        Ok(TryLockResponse {
            acquired,
            failure_reason: (!acquired).then(|| held_elsewhere(holder.pull.num)),
            lock_key: key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommandName, PullRequest, Repo, User};
    use tempfile::TempDir;

    fn cmd(pull_num: u64, dir: &str) -> ProjectCommand {
        let pull = PullRequest {
            num: pull_num,
            head_commit: "abc".into(),
            author: "dev".into(),
            base_repo: Repo::new("acme/infra"),
        };
        ProjectCommand::new(CommandName::Plan, pull, User::default(), dir, "default")
    }

    fn locker() -> (TempDir, Arc<LockDb>, DefaultProjectLocker) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(LockDb::open(&dir.path().join("locks.db")).unwrap());
        let locker = DefaultProjectLocker::new(db.clone());
        (dir, db, locker)
    }

    #[tokio::test]
    async fn conflict_names_holding_pull() {
        let (_dir, _db, locker) = locker();
        assert!(locker.try_lock(&cmd(1, "vpc")).await.unwrap().acquired);

        let resp = locker.try_lock(&cmd(2, "vpc")).await.unwrap();
        assert!(!resp.acquired);
        assert_eq!(resp.lock_key, "acme/infra/vpc/default");
        let reason = resp.failure_reason.unwrap();
        assert!(reason.contains("pull #1"), "{reason}");
    }

    #[tokio::test]
    async fn repo_locking_disabled_skips_store() {
        let (_dir, db, locker) = locker();
        let mut c = cmd(1, "vpc");
        c.repo_locking = false;

        let resp = locker.try_lock(&c).await.unwrap();
        assert!(resp.acquired);
        assert!(db.list().unwrap().is_empty());
    }
}

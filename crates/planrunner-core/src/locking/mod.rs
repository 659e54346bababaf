//! Per-project lock acquisition for a pass.
//!
//! [`LockCoordinator::acquire_all`] tries every command, even after a
//! failure, so a single response lists every blocking project. The whole
//! loop runs under one async mutex per coordinator; two passes therefore
//! never interleave partial acquisitions against the shared lock table.

mod project_locker;

pub use project_locker::DefaultProjectLocker;

use crate::collab::{Locker, ProjectLocker};
use crate::command::{ProjectCommand, ProjectOutcome, ProjectResult};
use crate::error::ProjectError;
use crate::types::CommandName;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    /// Another pull holds the lock.
    Failed { reason: String },
    /// The lock store could not be reached.
    Errored { message: String },
}

/// Result of attempting to lock one command's project.
#[derive(Debug, Clone)]
pub struct LockAttempt {
    pub command: ProjectCommand,
    pub outcome: LockOutcome,
}

impl LockAttempt {
    pub fn is_acquired(&self) -> bool {
        matches!(self.outcome, LockOutcome::Acquired)
    }

    /// The user-facing project result for a failed attempt; `None` when the
    /// lock was acquired. Always a Plan result: a lock failure aborts the
    /// plan pass, whichever command tried the lock.
    pub fn to_project_result(&self) -> Option<ProjectResult> {
        let outcome = match &self.outcome {
            LockOutcome::Acquired => return None,
            LockOutcome::Failed { reason } => ProjectOutcome::Failure {
                reason: reason.clone(),
            },
            LockOutcome::Errored { message } => ProjectOutcome::Error {
                error: ProjectError::Lock(message.clone()),
            },
        };
        let mut result = self.command.result(outcome);
        result.command = CommandName::Plan;
        Some(result)
    }
}

pub struct LockCoordinator {
    project_locker: Option<Arc<dyn ProjectLocker>>,
    locker: Arc<dyn Locker>,
    guard: Mutex<()>,
}

impl LockCoordinator {
    /// With `project_locker` unset, locking is skipped entirely and every
    /// pass proceeds to execution.
    pub fn new(project_locker: Option<Arc<dyn ProjectLocker>>, locker: Arc<dyn Locker>) -> Self {
        Self {
            project_locker,
            locker,
            guard: Mutex::new(()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.project_locker.is_some()
    }

    /// Attempt a lock for every command, in order. Returns one attempt per
    /// command, or none at all when locking is disabled.
    pub async fn acquire_all(&self, cmds: &[ProjectCommand]) -> Vec<LockAttempt> {
        let Some(locker) = &self.project_locker else {
            return Vec::new();
        };

        let _held = self.guard.lock().await;
        let mut attempts = Vec::with_capacity(cmds.len());
        for cmd in cmds {
            let outcome = match locker.try_lock(cmd).await {
                Ok(resp) if resp.acquired => {
                    debug!(key = %resp.lock_key, "acquired lock");
                    LockOutcome::Acquired
                }
                Ok(resp) => {
                    let reason = resp
                        .failure_reason
                        .unwrap_or_else(|| format!("lock {} is held elsewhere", resp.lock_key));
                    info!(
                        dir = %cmd.repo_rel_dir,
                        workspace = %cmd.workspace,
                        reason = %reason,
                        "project is locked"
                    );
                    LockOutcome::Failed { reason }
                }
                Err(e) => {
                    error!(
                        dir = %cmd.repo_rel_dir,
                        workspace = %cmd.workspace,
                        error = %e,
                        "locking project"
                    );
                    LockOutcome::Errored {
                        message: e.to_string(),
                    }
                }
            };
            attempts.push(LockAttempt {
                command: cmd.clone(),
                outcome,
            });
        }
        attempts
    }

    /// Best-effort release of every lock the pull holds. Errors are logged.
    pub async fn release_pull(&self, repo_full_name: &str, pull_num: u64) {
        match self.locker.unlock_by_pull(repo_full_name, pull_num).await {
            Ok(n) => debug!(released = n, "released pull locks"),
            Err(e) => error!(error = %e, "deleting locks"),
        }
    }
}

//! Combined commit statuses derived from persisted pull state.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::collab::CommitStatusUpdater;
use crate::types::{CommandName, CommitStatus, ProjectPlanStatus, PullRequest, PullStatus};

/// One combined status update: state plus `num_success / num_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CombinedStatus {
    pub status: CommitStatus,
    pub num_success: usize,
    pub num_total: usize,
}

/// Compute the combined status for `command` from the persisted pull state.
///
/// Returns `None` when nothing should be emitted: Apply while some plans
/// remain unapplied, and any command kind other than Plan or Apply.
pub fn combined_status(pull_status: &PullStatus, command: CommandName) -> Option<CombinedStatus> {
    let total = pull_status.projects.len();
    match command {
        CommandName::Plan => {
            let errored = pull_status.status_count(ProjectPlanStatus::ErroredPlan);
            let status = if errored > 0 {
                CommitStatus::Failed
            } else {
                CommitStatus::Success
            };
            Some(CombinedStatus {
                status,
                num_success: total - errored,
                num_total: total,
            })
        }
        CommandName::Apply => {
            let success = pull_status.status_count(ProjectPlanStatus::Applied)
                + pull_status.status_count(ProjectPlanStatus::PlannedNoChanges);
            let status = if pull_status.status_count(ProjectPlanStatus::ErroredApply) > 0 {
                CommitStatus::Failed
            } else if success < total {
                return None;
            } else {
                CommitStatus::Success
            };
            Some(CombinedStatus {
                status,
                num_success: success,
                num_total: total,
            })
        }
        _ => None,
    }
}

/// Emits combined statuses to the code-review host. Sink failures are
/// logged and never propagate.
pub struct StatusReporter {
    sink: Arc<dyn CommitStatusUpdater>,
}

impl StatusReporter {
    pub fn new(sink: Arc<dyn CommitStatusUpdater>) -> Self {
        Self { sink }
    }

    pub async fn set(&self, pull: &PullRequest, status: CommitStatus, command: CommandName) {
        if let Err(e) = self
            .sink
            .update_combined(&pull.base_repo, pull, status, command)
            .await
        {
            warn!(command = %command, status = %status, error = %e, "unable to update commit status");
        }
    }

    pub async fn set_count(
        &self,
        pull: &PullRequest,
        status: CommitStatus,
        command: CommandName,
        num_success: usize,
        num_total: usize,
    ) {
        if let Err(e) = self
            .sink
            .update_combined_count(&pull.base_repo, pull, status, command, num_success, num_total)
            .await
        {
            warn!(
                command = %command,
                status = %status,
                num_success,
                num_total,
                error = %e,
                "unable to update commit status"
            );
        }
    }

    /// Report `0/0` success for every listed command.
    pub async fn report_empty(&self, pull: &PullRequest, commands: &[CommandName]) {
        for &command in commands {
            self.set_count(pull, CommitStatus::Success, command, 0, 0)
                .await;
        }
    }

    pub async fn report_from_pull_status(
        &self,
        pull: &PullRequest,
        pull_status: &PullStatus,
        command: CommandName,
    ) {
        if let Some(c) = combined_status(pull_status, command) {
            self.set_count(pull, c.status, command, c.num_success, c.num_total)
                .await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Collaborator contracts.
//!
//! The orchestrator decides whether, in what order, under which locks and
//! how many at once these run. It never implements them itself, apart from
//! the redb and filesystem backends in [`crate::db`] and [`crate::plans`].

use crate::aggregate::CommandResult;
use crate::command::{CommandContext, CommentCommand, ProjectCommand, ProjectResult, PullCommand};
use crate::error::Result;
use crate::types::{CommitStatus, CommandName, PullReqStatus, PullRequest, PullStatus, Repo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Commands ──

#[async_trait]
pub trait ProjectCommandBuilder: Send + Sync {
    /// Commands for every project touched by the pull's latest changes.
    async fn build_autoplan_commands(&self, ctx: &CommandContext) -> Result<Vec<ProjectCommand>>;

    /// Commands for a user-issued plan, possibly narrowed to one project.
    async fn build_plan_commands(
        &self,
        ctx: &CommandContext,
        cmd: &CommentCommand,
    ) -> Result<Vec<ProjectCommand>>;
}

#[async_trait]
pub trait ProjectPlanRunner: Send + Sync {
    /// Plan one project. Expected failures come back inside the result,
    /// never as a panic.
    async fn plan(&self, cmd: &ProjectCommand) -> ProjectResult;
}

#[async_trait]
pub trait PolicyCheckRunner: Send + Sync {
    async fn run(&self, ctx: &CommandContext, cmds: &[ProjectCommand]);
}

// ── Locking ──

/// Outcome of a single lock request that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryLockResponse {
    pub acquired: bool,
    /// Human-readable reason shown to the user when `acquired` is false.
    #[serde(default)]
    pub failure_reason: Option<String>,
    pub lock_key: String,
}

#[async_trait]
pub trait ProjectLocker: Send + Sync {
    async fn try_lock(&self, cmd: &ProjectCommand) -> Result<TryLockResponse>;
}

#[async_trait]
pub trait Locker: Send + Sync {
    /// Release every lock held by the pull. Returns how many were removed;
    /// releasing nothing is not an error.
    async fn unlock_by_pull(&self, repo_full_name: &str, pull_num: u64) -> Result<usize>;
}

// ── Persistence ──

#[async_trait]
pub trait PullStatusStore: Send + Sync {
    async fn get_pull_status(&self, pull: &PullRequest) -> Result<Option<PullStatus>>;

    /// Record `results` against the pull and return the canonical status.
    async fn update_pull_with_results(
        &self,
        pull: &PullRequest,
        results: &[ProjectResult],
    ) -> Result<PullStatus>;
}

// ── Pull-request host ──

#[async_trait]
pub trait CommitStatusUpdater: Send + Sync {
    async fn update_combined(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        status: CommitStatus,
        command: CommandName,
    ) -> Result<()>;

    async fn update_combined_count(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        status: CommitStatus,
        command: CommandName,
        num_success: usize,
        num_total: usize,
    ) -> Result<()>;
}

#[async_trait]
pub trait PullUpdater: Send + Sync {
    /// Post the result of a pass as a pull-request comment.
    async fn update_pull(
        &self,
        ctx: &CommandContext,
        command: PullCommand<'_>,
        result: &CommandResult,
    ) -> Result<()>;
}

#[async_trait]
pub trait PullRequestVcs: Send + Sync {
    async fn fetch_pull_status(&self, pull: &PullRequest) -> Result<PullReqStatus>;
    async fn discard_reviews(&self, repo: &Repo, pull: &PullRequest) -> Result<()>;
}

// ── Plan artifacts ──

pub trait WorkingDir: Send + Sync {
    fn pull_dir(&self, repo: &Repo, pull: &PullRequest) -> Result<PathBuf>;
}

pub trait PendingPlanFinder: Send + Sync {
    /// Delete every pending plan under `pull_dir`. A missing directory is
    /// not an error.
    fn delete_plans(&self, pull_dir: &Path) -> Result<()>;
}

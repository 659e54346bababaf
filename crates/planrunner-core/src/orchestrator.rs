//! The plan control loop.
//!
//! One call to [`PlanOrchestrator::run`] is a *pass*. An automatic pass
//! plans every project touched by the pull; a comment pass plans what the
//! user asked for, possibly a single project. Both follow the same shape:
//!
//! ```text
//! build → partition → clear stale → lock → execute → automerge check
//!       → post → persist → report Plan/Apply → policy checks
//! ```
//!
//! Only the command builder can abort a pass. Every other collaborator
//! failure is logged and the pass continues, except that a failed
//! persistence write skips status reporting and policy checks.

use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::aggregate::{AutoMerger, CommandResult};
use crate::collab::{
    CommitStatusUpdater, Locker, PendingPlanFinder, PolicyCheckRunner, ProjectCommandBuilder,
    ProjectLocker, ProjectPlanRunner, PullRequestVcs, PullStatusStore, PullUpdater, WorkingDir,
};
use crate::command::{CommandContext, CommentCommand, ProjectCommand, PullCommand, Trigger};
use crate::config::OrchestratorConfig;
use crate::locking::LockCoordinator;
use crate::pool::ExecutionPool;
use crate::status::StatusReporter;
use crate::types::{CommandName, CommitStatus, PullRequest, PullReqStatus};

const EMPTY_PASS_COMMANDS: [CommandName; 3] =
    [CommandName::Plan, CommandName::PolicyCheck, CommandName::Apply];

/// Everything the orchestrator drives but does not implement.
#[derive(Clone)]
pub struct Collaborators {
    pub command_builder: Arc<dyn ProjectCommandBuilder>,
    pub plan_runner: Arc<dyn ProjectPlanRunner>,
    pub policy_check_runner: Arc<dyn PolicyCheckRunner>,
    /// `None` disables locking entirely.
    pub project_locker: Option<Arc<dyn ProjectLocker>>,
    pub locker: Arc<dyn Locker>,
    pub pull_status_store: Arc<dyn PullStatusStore>,
    pub commit_status: Arc<dyn CommitStatusUpdater>,
    pub pull_updater: Arc<dyn PullUpdater>,
    pub vcs: Arc<dyn PullRequestVcs>,
    pub working_dir: Arc<dyn WorkingDir>,
    pub pending_plans: Arc<dyn PendingPlanFinder>,
}

/// Split built commands into plan and policy-check commands. Anything else
/// is a builder defect: logged and dropped.
pub fn partition_project_cmds(
    cmds: Vec<ProjectCommand>,
) -> (Vec<ProjectCommand>, Vec<ProjectCommand>) {
    let mut plan_cmds = Vec::new();
    let mut policy_cmds = Vec::new();
    for cmd in cmds {
        match cmd.command_name {
            CommandName::Plan => plan_cmds.push(cmd),
            CommandName::PolicyCheck => policy_cmds.push(cmd),
            other => error!(
                command = %other,
                dir = %cmd.repo_rel_dir,
                workspace = %cmd.workspace,
                "command is not supported in a plan pass"
            ),
        }
    }
    (plan_cmds, policy_cmds)
}

pub struct PlanOrchestrator {
    config: OrchestratorConfig,
    builder: Arc<dyn ProjectCommandBuilder>,
    policy_checks: Arc<dyn PolicyCheckRunner>,
    pull_status_store: Arc<dyn PullStatusStore>,
    pull_updater: Arc<dyn PullUpdater>,
    vcs: Arc<dyn PullRequestVcs>,
    working_dir: Arc<dyn WorkingDir>,
    pending_plans: Arc<dyn PendingPlanFinder>,
    locks: LockCoordinator,
    pool: ExecutionPool,
    status: StatusReporter,
    auto_merger: AutoMerger,
}

impl PlanOrchestrator {
    pub fn new(config: OrchestratorConfig, collab: Collaborators) -> Self {
        Self {
            locks: LockCoordinator::new(collab.project_locker, collab.locker),
            pool: ExecutionPool::new(collab.plan_runner, config.parallel_pool_size),
            status: StatusReporter::new(collab.commit_status),
            auto_merger: AutoMerger::new(config.automerge),
            builder: collab.command_builder,
            policy_checks: collab.policy_check_runner,
            pull_status_store: collab.pull_status_store,
            pull_updater: collab.pull_updater,
            vcs: collab.vcs,
            working_dir: collab.working_dir,
            pending_plans: collab.pending_plans,
            config,
        }
    }

    /// Run one pass. `cmd` is ignored for automatic triggers. Outcomes are
    /// observable only through collaborators; nothing is returned.
    pub async fn run(&self, ctx: &mut CommandContext, cmd: &CommentCommand) {
        let span = info_span!(
            "plan_pass",
            pass_id = %Uuid::new_v4(),
            repo = %ctx.pull.base_repo.full_name,
            pull = ctx.pull.num,
            trigger = %ctx.trigger,
        );
        match ctx.trigger {
            Trigger::Automatic => self.run_autoplan(ctx).instrument(span).await,
            Trigger::Comment => self.run_comment(ctx, cmd).instrument(span).await,
        }
    }

    async fn run_autoplan(&self, ctx: &mut CommandContext) {
        let pull = ctx.pull.clone();

        let cmds = match self.builder.build_autoplan_commands(ctx).await {
            Ok(cmds) => cmds,
            Err(e) => {
                warn!(error = %e, "building autoplan commands");
                self.status
                    .set(&pull, CommitStatus::Failed, CommandName::Plan)
                    .await;
                self.post(ctx, PullCommand::Autoplan, &CommandResult::from_error(e))
                    .await;
                return;
            }
        };

        let (plan_cmds, policy_cmds) = partition_project_cmds(cmds);
        if plan_cmds.is_empty() {
            info!("determined there was no project to run plan in");
            if !(self.config.silence_vcs_status_no_plans
                || self.config.silence_vcs_status_no_projects)
            {
                debug!("setting commit status to success with no projects found");
                self.status.report_empty(&pull, &EMPTY_PASS_COMMANDS).await;
            }
            return;
        }

        self.status
            .set(&pull, CommitStatus::Pending, CommandName::Plan)
            .await;
        self.clear_stale(&pull).await;

        self.plan_and_report(ctx, PullCommand::Autoplan, &plan_cmds, &policy_cmds)
            .await;
    }

    async fn run_comment(&self, ctx: &mut CommandContext, cmd: &CommentCommand) {
        let pull = ctx.pull.clone();

        ctx.pull_request_status = match self.vcs.fetch_pull_status(&pull).await {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    error = %e,
                    "unable to get pull request status, continuing with mergeable and approved assumed false"
                );
                PullReqStatus::default()
            }
        };

        if self.config.discard_approval_on_plan {
            if let Err(e) = self.vcs.discard_reviews(&pull.base_repo, &pull).await {
                error!(error = %e, "failed to remove approvals");
            }
        }

        self.status
            .set(&pull, CommitStatus::Pending, CommandName::Plan)
            .await;

        let cmds = match self.builder.build_plan_commands(ctx, cmd).await {
            Ok(cmds) => cmds,
            Err(e) => {
                warn!(error = %e, command = %cmd, "building plan commands");
                self.status
                    .set(&pull, CommitStatus::Failed, CommandName::Plan)
                    .await;
                self.post(ctx, PullCommand::Comment(cmd), &CommandResult::from_error(e))
                    .await;
                return;
            }
        };

        let targeted = cmd.is_for_specific_project();

        if cmds.is_empty() && self.config.silence_no_projects {
            info!("determined there was no project to run plan in");
            if !self.config.silence_vcs_status_no_projects {
                self.reset_empty_status(&pull, targeted).await;
            }
            return;
        }

        let (plan_cmds, policy_cmds) = partition_project_cmds(cmds);
        if !targeted {
            self.clear_stale(&pull).await;
        }

        let dispatched = self
            .plan_and_report(ctx, PullCommand::Comment(cmd), &plan_cmds, &policy_cmds)
            .await;

        if dispatched == Some(false) && plan_cmds.is_empty() && !targeted {
            debug!("setting policy check status to success with no projects found");
            self.status
                .report_empty(&pull, &[CommandName::PolicyCheck])
                .await;
        }
    }

    /// Zero projects on a silenced comment pass: make sure the Plan status
    /// is not left pending.
    async fn reset_empty_status(&self, pull: &PullRequest, targeted: bool) {
        if !targeted {
            debug!("setting commit status to success with no projects found");
            self.status.report_empty(pull, &EMPTY_PASS_COMMANDS).await;
            return;
        }

        match self.pull_status_store.get_pull_status(pull).await {
            Ok(Some(pull_status)) => {
                debug!("resetting commit status from stored pull status");
                self.status
                    .report_from_pull_status(pull, &pull_status, CommandName::Plan)
                    .await;
            }
            Ok(None) => {
                debug!("no stored pull status, setting plan status to 0/0 success");
                self.status.report_empty(pull, &[CommandName::Plan]).await;
            }
            Err(e) => warn!(error = %e, "unable to fetch pull status"),
        }
    }

    /// Lock, execute, post, persist and report. Returns whether policy
    /// checks were dispatched, or `None` when persistence failed and the
    /// pass stopped early.
    async fn plan_and_report(
        &self,
        ctx: &mut CommandContext,
        command: PullCommand<'_>,
        plan_cmds: &[ProjectCommand],
        policy_cmds: &[ProjectCommand],
    ) -> Option<bool> {
        let pull = ctx.pull.clone();

        if !self.locks.is_enabled() {
            debug!("project locking is disabled, skipping lock acquisition");
        }
        let lockable: Vec<ProjectCommand> = plan_cmds.iter().chain(policy_cmds).cloned().collect();
        let attempts = self.locks.acquire_all(&lockable).await;
        let lock_failures: Vec<_> = attempts
            .iter()
            .filter_map(|a| a.to_project_result())
            .collect();

        let mut result = if lock_failures.is_empty() {
            if ExecutionPool::is_parallel_enabled(plan_cmds) {
                info!(count = plan_cmds.len(), "running plans in parallel");
            }
            self.pool.run(plan_cmds).await
        } else {
            info!(failed = lock_failures.len(), "lock acquisition failed, skipping plans");
            self.locks
                .release_pull(&pull.base_repo.full_name, pull.num)
                .await;
            CommandResult::from_project_results(lock_failures)
        };

        if self.auto_merger.automerge_enabled(plan_cmds) && result.has_errors() {
            info!("deleting plans and locks because there were errors and automerge requires all plans succeed");
            self.delete_plans(&pull);
            self.locks
                .release_pull(&pull.base_repo.full_name, pull.num)
                .await;
            result.plans_deleted = true;
        }

        self.post(ctx, command, &result).await;

        let pull_status = match self
            .pull_status_store
            .update_pull_with_results(&pull, &result.persistable_results())
            .await
        {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "writing results");
                return None;
            }
        };

        self.status
            .report_from_pull_status(&pull, &pull_status, CommandName::Plan)
            .await;
        self.status
            .report_from_pull_status(&pull, &pull_status, CommandName::Apply)
            .await;

        if policy_cmds.is_empty() || result.has_errors() || result.plans_deleted {
            return Some(false);
        }

        info!(count = policy_cmds.len(), "running policy checks for all plans");
        ctx.pull_status = Some(pull_status);
        self.policy_checks.run(ctx, policy_cmds).await;
        Some(true)
    }

    /// Drop plans and locks left over from earlier passes on this pull.
    async fn clear_stale(&self, pull: &PullRequest) {
        debug!("deleting previous plans and locks");
        self.delete_plans(pull);
        self.locks
            .release_pull(&pull.base_repo.full_name, pull.num)
            .await;
    }

    fn delete_plans(&self, pull: &PullRequest) {
        let pull_dir = match self.working_dir.pull_dir(&pull.base_repo, pull) {
            Ok(dir) => dir,
            Err(e) => {
                error!(error = %e, "getting pull dir");
                return;
            }
        };
        if let Err(e) = self.pending_plans.delete_plans(&pull_dir) {
            error!(error = %e, dir = %pull_dir.display(), "deleting pending plans");
        }
    }

    async fn post(&self, ctx: &CommandContext, command: PullCommand<'_>, result: &CommandResult) {
        if let Err(e) = self.pull_updater.update_pull(ctx, command, result).await {
            error!(error = %e, "posting results to pull request");
        }
    }
}

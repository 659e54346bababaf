//! Commands flowing through one orchestration pass.
//!
//! A [`CommandContext`] describes the pass (trigger, pull, user, cached pull
//! state). The external command builder expands it into [`ProjectCommand`]s,
//! and every executed or rejected command yields a [`ProjectResult`].

use crate::error::ProjectError;
use crate::types::{
    clean_rel_dir, CommandName, Project, ProjectPlanStatus, PullReqStatus, PullRequest,
    PullStatus, User,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// New commits on the pull request.
    Automatic,
    /// A user comment such as `plan -d modules/vpc`.
    Comment,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Automatic => f.write_str("automatic"),
            Trigger::Comment => f.write_str("comment"),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandContext
// ---------------------------------------------------------------------------

/// Per-pass request state. The orchestrator refreshes `pull_status` and
/// `pull_request_status` while the pass runs.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub trigger: Trigger,
    pub pull: PullRequest,
    pub user: User,
    pub pull_status: Option<PullStatus>,
    pub pull_request_status: PullReqStatus,
}

impl CommandContext {
    pub fn new(trigger: Trigger, pull: PullRequest, user: User) -> Self {
        Self {
            trigger,
            pull,
            user,
            pull_status: None,
            pull_request_status: PullReqStatus::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// CommentCommand / PullCommand
// ---------------------------------------------------------------------------

/// A parsed user comment. Any of `repo_rel_dir`, `workspace` or
/// `project_name` narrows the run to one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCommand {
    #[serde(default)]
    pub repo_rel_dir: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub verbose: bool,
}

impl CommentCommand {
    /// A whole-pull `plan`.
    pub fn plan() -> Self {
        Self::default()
    }

    pub fn for_dir(dir: impl Into<String>) -> Self {
        Self {
            repo_rel_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn for_project(name: impl Into<String>) -> Self {
        Self {
            project_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn is_for_specific_project(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        set(&self.repo_rel_dir) || set(&self.workspace) || set(&self.project_name)
    }
}

impl fmt::Display for CommentCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("plan")?;
        if let Some(dir) = &self.repo_rel_dir {
            write!(f, " -d {dir}")?;
        }
        if let Some(ws) = &self.workspace {
            write!(f, " -w {ws}")?;
        }
        if let Some(name) = &self.project_name {
            write!(f, " -p {name}")?;
        }
        if self.verbose {
            f.write_str(" --verbose")?;
        }
        if !self.flags.is_empty() {
            write!(f, " -- {}", self.flags.join(" "))?;
        }
        Ok(())
    }
}

/// The command a result is posted in reply to.
#[derive(Debug, Clone, Copy)]
pub enum PullCommand<'a> {
    Autoplan,
    Comment(&'a CommentCommand),
}

impl PullCommand<'_> {
    pub fn is_autoplan(&self) -> bool {
        matches!(self, PullCommand::Autoplan)
    }
}

// ---------------------------------------------------------------------------
// ProjectCommand
// ---------------------------------------------------------------------------

/// One planned unit of work produced by the command builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCommand {
    pub command_name: CommandName,
    pub repo_rel_dir: String,
    pub workspace: String,
    #[serde(default)]
    pub project_name: Option<String>,
    /// Run this batch through the bounded worker pool. Uniform per batch.
    #[serde(default)]
    pub parallel_plan_enabled: bool,
    #[serde(default)]
    pub automerge_enabled: bool,
    /// When false the lock backend is bypassed for this project.
    #[serde(default = "default_repo_locking")]
    pub repo_locking: bool,
    /// Parallel mode runs groups in ascending order.
    #[serde(default)]
    pub execution_order_group: i32,
    pub pull: PullRequest,
    pub user: User,
}

fn default_repo_locking() -> bool {
    true
}

impl ProjectCommand {
    pub fn new(
        command_name: CommandName,
        pull: PullRequest,
        user: User,
        repo_rel_dir: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            command_name,
            repo_rel_dir: clean_rel_dir(&repo_rel_dir.into()),
            workspace: workspace.into(),
            project_name: None,
            parallel_plan_enabled: false,
            automerge_enabled: false,
            repo_locking: default_repo_locking(),
            execution_order_group: 0,
            pull,
            user,
        }
    }

    pub fn project(&self) -> Project {
        Project::new(
            self.pull.base_repo.full_name.clone(),
            self.repo_rel_dir.clone(),
            self.project_name.clone(),
        )
    }

    /// An empty result for this command, to be filled with an outcome.
    pub fn result(&self, outcome: ProjectOutcome) -> ProjectResult {
        ProjectResult {
            command: self.command_name,
            repo_rel_dir: self.repo_rel_dir.clone(),
            workspace: self.workspace.clone(),
            project_name: self.project_name.clone(),
            outcome,
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSuccess {
    /// Rendered planning-tool output.
    pub output: String,
    /// The plan contains no changes; counts as applied for the Apply status.
    #[serde(default)]
    pub no_changes: bool,
    #[serde(default)]
    pub lock_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectOutcome {
    Planned(PlanSuccess),
    PolicyChecked { output: String },
    Applied { output: String },
    /// An expected, user-facing failure such as a lock conflict.
    Failure { reason: String },
    Error { error: ProjectError },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectResult {
    pub command: CommandName,
    pub repo_rel_dir: String,
    pub workspace: String,
    #[serde(default)]
    pub project_name: Option<String>,
    pub outcome: ProjectOutcome,
}

impl ProjectResult {
    pub fn is_successful(&self) -> bool {
        !matches!(
            self.outcome,
            ProjectOutcome::Failure { .. } | ProjectOutcome::Error { .. }
        )
    }

    pub fn error(&self) -> Option<&ProjectError> {
        match &self.outcome {
            ProjectOutcome::Error { error } => Some(error),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.outcome {
            ProjectOutcome::Failure { reason } => Some(reason),
            _ => None,
        }
    }

    /// Status persisted for this project once the result is recorded.
    pub fn plan_status(&self) -> ProjectPlanStatus {
        match &self.outcome {
            ProjectOutcome::Planned(success) if success.no_changes => {
                ProjectPlanStatus::PlannedNoChanges
            }
            ProjectOutcome::Planned(_) => ProjectPlanStatus::Planned,
            ProjectOutcome::PolicyChecked { .. } => ProjectPlanStatus::PassedPolicyCheck,
            ProjectOutcome::Applied { .. } => ProjectPlanStatus::Applied,
            ProjectOutcome::Failure { .. } | ProjectOutcome::Error { .. } => match self.command {
                CommandName::Apply => ProjectPlanStatus::ErroredApply,
                CommandName::PolicyCheck | CommandName::ApprovePolicies => {
                    ProjectPlanStatus::ErroredPolicyCheck
                }
                _ => ProjectPlanStatus::ErroredPlan,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

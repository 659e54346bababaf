//! Batch results for one pass.

use crate::command::{ProjectCommand, ProjectResult};
use crate::error::ProjectError;
use serde::{Deserialize, Serialize};

/// Aggregate of every [`ProjectResult`] produced in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Command-level error, e.g. the command builder failed.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub failure: Option<String>,
    #[serde(default)]
    pub project_results: Vec<ProjectResult>,
    /// Plan artifacts for the pull were deleted because the batch failed
    /// while automerge required every project to succeed.
    #[serde(default)]
    pub plans_deleted: bool,
}

impl CommandResult {
    pub fn from_error(err: impl std::fmt::Display) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::default()
        }
    }

    pub fn from_project_results(project_results: Vec<ProjectResult>) -> Self {
        Self {
            project_results,
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error.is_some()
            || self.failure.is_some()
            || self.project_results.iter().any(|r| !r.is_successful())
    }

    /// Results worth persisting. Projects whose directory vanished can never
    /// be applied, so recording them would pin the pull in failure.
    pub fn persistable_results(&self) -> Vec<ProjectResult> {
        self.project_results
            .iter()
            .filter(|r| !matches!(r.error(), Some(ProjectError::DirNotExist(_))))
            .cloned()
            .collect()
    }
}

/// Decides whether a batch must fully succeed for its plans to be kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoMerger {
    global_automerge: bool,
}

impl AutoMerger {
    pub fn new(global_automerge: bool) -> Self {
        Self { global_automerge }
    }

    /// Enabled globally, or by the batch's first command (the flag is
    /// uniform per batch).
    pub fn automerge_enabled(&self, cmds: &[ProjectCommand]) -> bool {
        self.global_automerge || cmds.first().is_some_and(|c| c.automerge_enabled)
    }
}

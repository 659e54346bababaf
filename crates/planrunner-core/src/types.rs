use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Repo / PullRequest / User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repo {
    /// `owner/name`, e.g. `acme/infra`.
    pub full_name: String,
    pub owner: String,
    pub name: String,
}

impl Repo {
    /// Build a repo from its full name. Everything before the last `/` is the
    /// owner, so nested groups (`group/sub/repo`) keep their full path.
    pub fn new(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let (owner, name) = match full_name.rsplit_once('/') {
            Some((owner, name)) => (owner.to_string(), name.to_string()),
            None => (String::new(), full_name.clone()),
        };
        Self {
            full_name,
            owner,
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub num: u64,
    pub head_commit: String,
    pub author: String,
    pub base_repo: Repo,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

/// A project in a repo: the unit that is locked and planned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    pub repo_full_name: String,
    /// Directory relative to the repo root. `.` is the root itself.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Project {
    pub fn new(
        repo_full_name: impl Into<String>,
        path: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self {
            repo_full_name: repo_full_name.into(),
            path: clean_rel_dir(&path.into()),
            name,
        }
    }
}

/// Normalise a repo-relative directory: strip `./` prefixes and trailing
/// slashes; an empty path becomes `.`.
pub fn clean_rel_dir(dir: &str) -> String {
    let mut d = dir.trim();
    while let Some(rest) = d.strip_prefix("./") {
        d = rest;
    }
    let d = d.trim_end_matches('/');
    if d.is_empty() {
        ".".to_string()
    } else {
        d.to_string()
    }
}

// ---------------------------------------------------------------------------
// CommandName
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    Plan,
    PolicyCheck,
    Apply,
    ApprovePolicies,
    Unlock,
    Version,
}

impl CommandName {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::Plan => "plan",
            CommandName::PolicyCheck => "policy_check",
            CommandName::Apply => "apply",
            CommandName::ApprovePolicies => "approve_policies",
            CommandName::Unlock => "unlock",
            CommandName::Version => "version",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CommitStatus
// ---------------------------------------------------------------------------

/// State of a combined status check on the pull request's head commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommitStatus::Pending => "pending",
            CommitStatus::Success => "success",
            CommitStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ProjectPlanStatus / PullStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPlanStatus {
    ErroredPlan,
    Planned,
    PlannedNoChanges,
    ErroredApply,
    Applied,
    ErroredPolicyCheck,
    PassedPolicyCheck,
}

impl ProjectPlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectPlanStatus::ErroredPlan => "plan_errored",
            ProjectPlanStatus::Planned => "planned",
            ProjectPlanStatus::PlannedNoChanges => "planned_no_changes",
            ProjectPlanStatus::ErroredApply => "apply_errored",
            ProjectPlanStatus::Applied => "applied",
            ProjectPlanStatus::ErroredPolicyCheck => "policy_check_errored",
            ProjectPlanStatus::PassedPolicyCheck => "policy_check_passed",
        }
    }
}

impl fmt::Display for ProjectPlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub repo_rel_dir: String,
    pub workspace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub status: ProjectPlanStatus,
}

impl ProjectStatus {
    pub fn same_project(&self, repo_rel_dir: &str, workspace: &str, name: Option<&str>) -> bool {
        self.repo_rel_dir == repo_rel_dir
            && self.workspace == workspace
            && self.project_name.as_deref() == name
    }
}

/// Durable record of the latest outcome of every project in a pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullStatus {
    pub pull: PullRequest,
    #[serde(default)]
    pub projects: Vec<ProjectStatus>,
}

impl PullStatus {
    pub fn status_count(&self, status: ProjectPlanStatus) -> usize {
        self.projects.iter().filter(|p| p.status == status).count()
    }
}

// ---------------------------------------------------------------------------
// PullReqStatus
// ---------------------------------------------------------------------------

/// Mergeability and approval state fetched from the code-review host.
/// Both default to `false` when the fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PullReqStatus {
    pub approved: bool,
    pub mergeable: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_splits_owner_and_name() {
        let repo = Repo::new("acme/infra");
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "infra");

        let nested = Repo::new("group/sub/infra");
        assert_eq!(nested.owner, "group/sub");
        assert_eq!(nested.name, "infra");
    }

    #[test]
    fn clean_rel_dir_normalises() {
        assert_eq!(clean_rel_dir(""), ".");
        assert_eq!(clean_rel_dir("./"), ".");
        assert_eq!(clean_rel_dir("./modules/vpc/"), "modules/vpc");
        assert_eq!(clean_rel_dir("env/prod"), "env/prod");
    }

    #[test]
    fn status_count_counts_matching_projects() {
        let status = PullStatus {
            pull: PullRequest {
                num: 1,
                head_commit: "abc".into(),
                author: "dev".into(),
                base_repo: Repo::new("acme/infra"),
            },
            projects: vec![
                ProjectStatus {
                    repo_rel_dir: "a".into(),
                    workspace: "default".into(),
                    project_name: None,
                    status: ProjectPlanStatus::Planned,
                },
                ProjectStatus {
                    repo_rel_dir: "b".into(),
                    workspace: "default".into(),
                    project_name: None,
                    status: ProjectPlanStatus::ErroredPlan,
                },
                ProjectStatus {
                    repo_rel_dir: "c".into(),
                    workspace: "default".into(),
                    project_name: None,
                    status: ProjectPlanStatus::Planned,
                },
            ],
        };
        assert_eq!(status.status_count(ProjectPlanStatus::Planned), 2);
        assert_eq!(status.status_count(ProjectPlanStatus::ErroredPlan), 1);
        assert_eq!(status.status_count(ProjectPlanStatus::Applied), 0);
    }
}

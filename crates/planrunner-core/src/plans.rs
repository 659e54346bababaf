//! Filesystem working directories and pending plan artifacts.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::collab::{PendingPlanFinder, WorkingDir};
use crate::error::{PlanError, Result};
use crate::paths;
use crate::types::{PullRequest, Repo};

/// Resolves pull checkouts under `<data_dir>/repos`.
pub struct FsWorkingDir {
    data_dir: PathBuf,
}

impl FsWorkingDir {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

impl WorkingDir for FsWorkingDir {
    fn pull_dir(&self, repo: &Repo, pull: &PullRequest) -> Result<PathBuf> {
        let dir = paths::pull_dir(&self.data_dir, &repo.full_name, pull.num);
        if !dir.is_dir() {
            return Err(PlanError::WorkingDir(format!(
                "{} does not exist",
                dir.display()
            )));
        }
        Ok(dir)
    }
}

/// A plan file waiting to be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingPlan {
    /// Absolute path of the plan file.
    pub path: PathBuf,
    /// Directory of the plan relative to the pull checkout; `.` for the root.
    pub repo_rel_dir: String,
}

#[derive(Debug, Default)]
pub struct FsPendingPlanFinder;

impl FsPendingPlanFinder {
    /// Every `*.tfplan` under `pull_dir`, sorted by path. A missing
    /// directory yields nothing.
    pub fn find(&self, pull_dir: &Path) -> Result<Vec<PendingPlan>> {
        let mut plans = Vec::new();
        if pull_dir.is_dir() {
            collect_plans(pull_dir, pull_dir, &mut plans)?;
        }
        plans.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(plans)
    }
}

fn collect_plans(root: &Path, dir: &Path, out: &mut Vec<PendingPlan>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            // VCS metadata never holds plans.
            if entry.file_name() == ".git" {
                continue;
            }
            collect_plans(root, &path, out)?;
        } else if file_type.is_file()
            && path.extension().is_some_and(|e| e == paths::PLAN_EXTENSION)
        {
            let rel = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push(PendingPlan {
                repo_rel_dir: crate::types::clean_rel_dir(&rel),
                path,
            });
        }
    }
    Ok(())
}

impl PendingPlanFinder for FsPendingPlanFinder {
    fn delete_plans(&self, pull_dir: &Path) -> Result<()> {
        for plan in self.find(pull_dir)? {
            match std::fs::remove_file(&plan.path) {
                Ok(()) => debug!(path = %plan.path.display(), "deleted plan"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(PlanError::PlanArtifacts(format!(
                        "deleting {}: {e}",
                        plan.path.display()
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pull(num: u64) -> PullRequest {
        PullRequest {
            num,
            head_commit: "abc".into(),
            author: "dev".into(),
            base_repo: Repo::new("acme/infra"),
        }
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"plan").unwrap();
    }

    #[test]
    fn working_dir_requires_existing_checkout() {
        let dir = TempDir::new().unwrap();
        let wd = FsWorkingDir::new(dir.path());
        let repo = Repo::new("acme/infra");

        let err = wd.pull_dir(&repo, &pull(3)).unwrap_err();
        assert!(matches!(err, PlanError::WorkingDir(_)));

        std::fs::create_dir_all(dir.path().join("repos/acme/infra/3")).unwrap();
        let found = wd.pull_dir(&repo, &pull(3)).unwrap();
        assert!(found.ends_with("repos/acme/infra/3"));
    }

    #[test]
    fn finds_nested_plans_only() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("default.tfplan"));
        touch(&root.join("modules/vpc/staging.tfplan"));
        touch(&root.join("modules/vpc/main.tf"));
        touch(&root.join(".git/objects/x.tfplan"));

        let plans = FsPendingPlanFinder.find(root).unwrap();
        let dirs: Vec<&str> = plans.iter().map(|p| p.repo_rel_dir.as_str()).collect();
        assert_eq!(dirs, [".", "modules/vpc"]);
    }

    #[test]
    fn delete_plans_keeps_other_files_and_tolerates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("vpc/default.tfplan"));
        touch(&root.join("vpc/main.tf"));

        FsPendingPlanFinder.delete_plans(root).unwrap();
        assert!(FsPendingPlanFinder.find(root).unwrap().is_empty());
        assert!(root.join("vpc/main.tf").exists());

        FsPendingPlanFinder
            .delete_plans(&root.join("missing"))
            .unwrap();
    }
}

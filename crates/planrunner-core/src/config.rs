use crate::error::{PlanError, Result};
use crate::{io, paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

/// Toggles for the plan orchestrator. Fixed at construction; the orchestrator
/// never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Do not respond to comment-triggered plans that find no projects.
    #[serde(default)]
    pub silence_no_projects: bool,
    /// Do not set commit statuses when an automatic plan finds nothing to plan.
    #[serde(default)]
    pub silence_vcs_status_no_plans: bool,
    /// Do not set commit statuses when any plan finds no projects.
    #[serde(default)]
    pub silence_vcs_status_no_projects: bool,
    /// Dismiss existing approvals before running a comment-triggered plan.
    #[serde(default)]
    pub discard_approval_on_plan: bool,
    /// Require every project to plan successfully; plans are discarded otherwise.
    #[serde(default)]
    pub automerge: bool,
    /// Maximum number of plans running at once in parallel mode.
    #[serde(default = "default_parallel_pool_size")]
    pub parallel_pool_size: usize,
}

fn default_parallel_pool_size() -> usize {
    15
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            silence_no_projects: false,
            silence_vcs_status_no_plans: false,
            silence_vcs_status_no_projects: false,
            discard_approval_on_plan: false,
            automerge: false,
            parallel_pool_size: default_parallel_pool_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where pull checkouts and the lock/status database live. Relative
    /// paths resolve against the project root.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DATA_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(PlanError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&paths::config_path(root), data.as_bytes())
    }

    /// Absolute data directory for this config under `root`.
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        paths::resolve_data_dir(root, &self.data_dir)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let orch = &self.orchestrator;

        if orch.parallel_pool_size == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "orchestrator.parallel_pool_size must be at least 1".to_string(),
            });
        } else if orch.parallel_pool_size > 100 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "orchestrator.parallel_pool_size={} (>100 is unusual)",
                    orch.parallel_pool_size
                ),
            });
        }

        // Comment passes only consult silence_vcs_status_no_projects when
        // silence_no_projects is also on.
        if orch.silence_vcs_status_no_projects && !orch.silence_no_projects {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "silence_vcs_status_no_projects has no effect on comment-triggered \
                          plans unless silence_no_projects is also set"
                    .to_string(),
            });
        }

        warnings
    }

    /// Fail with [`PlanError::InvalidConfig`] when [`Config::validate`]
    /// reports any error-level finding. Warnings are tolerated.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PlanError::InvalidConfig(errors.join("; ")))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

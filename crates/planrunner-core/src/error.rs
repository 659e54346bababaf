use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("not initialized: run 'planrunner init'")]
    NotInitialized,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("lock store error: {0}")]
    LockStore(String),

    #[error("pull status store error: {0}")]
    StatusStore(String),

    #[error("updating commit status: {0}")]
    CommitStatus(String),

    #[error("vcs error: {0}")]
    Vcs(String),

    #[error("working dir error: {0}")]
    WorkingDir(String),

    #[error("plan artifact error: {0}")]
    PlanArtifacts(String),

    #[error("building project commands: {0}")]
    CommandBuild(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlanError>;

/// Error carried inside a [`crate::command::ProjectResult`].
///
/// Unlike [`PlanError`] this is cloneable and serializable, since project
/// results are posted to the pull request and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ProjectError {
    /// The project's directory is missing from the checkout. Results with
    /// this error are never persisted.
    #[error("dir {0:?} does not exist")]
    DirNotExist(String),

    #[error("acquiring lock: {0}")]
    Lock(String),

    #[error("{0}")]
    Run(String),
}

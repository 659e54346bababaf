pub mod config;
pub mod init;
pub mod locks;
pub mod plans;
pub mod status;

use anyhow::Context;
use planrunner_core::config::Config;
use planrunner_core::db::{open_database, LockDb, PullStatusDb};
use planrunner_core::paths;
use std::path::{Path, PathBuf};

/// Load the config and resolve its data directory.
pub(crate) fn load(root: &Path) -> anyhow::Result<(Config, PathBuf)> {
    let config = Config::load(root).context("failed to load config")?;
    config.ensure_valid()?;
    let data_dir = config.data_dir(root);
    Ok((config, data_dir))
}

pub(crate) fn open_stores(data_dir: &Path) -> anyhow::Result<(LockDb, PullStatusDb)> {
    let path = paths::db_path(data_dir);
    let db = open_database(&path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok((LockDb::new(db.clone()), PullStatusDb::new(db)))
}

//! redb-backed lock table and pull-status store.
//!
//! # Table design
//!
//! Both tables live in one database file and store JSON values:
//! ```text
//! locks : "<owner>/<repo>/<dir>/<workspace>"  → ProjectLock
//! pulls : "<owner>/<repo>::<pull num>"        → PullStatus
//! ```
//!
//! Every mutation runs inside a single write transaction, so a
//! read-modify-write such as `try_lock` is atomic with respect to other
//! writers on the same database.

mod locks;
mod pulls;

pub use locks::{lock_key, LockDb, ProjectLock};
pub use pulls::PullStatusDb;

use std::path::Path;
use std::sync::Arc;

use redb::{Database, TableDefinition};

use crate::error::{PlanError, Result};

pub(crate) const LOCKS: TableDefinition<&str, &[u8]> = TableDefinition::new("locks");
pub(crate) const PULLS: TableDefinition<&str, &[u8]> = TableDefinition::new("pulls");

/// Open or create the database at `path`, creating both tables so later
/// read transactions never see a missing table.
pub fn open_database(path: &Path) -> Result<Arc<Database>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::create(path).map_err(|e| PlanError::LockStore(e.to_string()))?;
    let wt = db
        .begin_write()
        .map_err(|e| PlanError::LockStore(e.to_string()))?;
    wt.open_table(LOCKS)
        .map_err(|e| PlanError::LockStore(e.to_string()))?;
    wt.open_table(PULLS)
        .map_err(|e| PlanError::StatusStore(e.to_string()))?;
    wt.commit()
        .map_err(|e| PlanError::LockStore(e.to_string()))?;
    Ok(Arc::new(db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_parent_dirs_and_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/planrunner.db");
        {
            let _db = open_database(&path).unwrap();
        }
        assert!(path.exists());
        let _again = open_database(&path).unwrap();
    }
}

use std::path::{Path, PathBuf};

pub const PLANRUNNER_DIR: &str = ".planrunner";
pub const CONFIG_FILE: &str = ".planrunner/config.yaml";
pub const DEFAULT_DATA_DIR: &str = ".planrunner/data";

pub const DB_FILE: &str = "planrunner.db";
pub const REPOS_DIR: &str = "repos";

/// Extension of plan artifacts written by the planning tool.
pub const PLAN_EXTENSION: &str = "tfplan";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve `data_dir` against `root` unless it is already absolute.
pub fn resolve_data_dir(root: &Path, data_dir: &Path) -> PathBuf {
    if data_dir.is_absolute() {
        data_dir.to_path_buf()
    } else {
        root.join(data_dir)
    }
}

pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_FILE)
}

/// Checkout root of one pull: `<data_dir>/repos/<owner>/<repo>/<num>`.
/// Empty, `.` and `..` segments of the repo name are skipped so the result
/// always stays under `<data_dir>/repos`.
pub fn pull_dir(data_dir: &Path, repo_full_name: &str, pull_num: u64) -> PathBuf {
    let mut dir = data_dir.join(REPOS_DIR);
    for segment in repo_full_name
        .split(['/', '\\'])
        .filter(|s| !matches!(*s, "" | "." | ".."))
    {
        dir.push(segment);
    }
    dir.join(pull_num.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_dir_nests_owner_and_repo() {
        let dir = pull_dir(Path::new("/data"), "acme/infra", 42);
        assert_eq!(dir, PathBuf::from("/data/repos/acme/infra/42"));
    }

    #[test]
    fn pull_dir_stays_under_repos() {
        let dir = pull_dir(Path::new("/data"), "../../etc/./passwd", 7);
        assert_eq!(dir, PathBuf::from("/data/repos/etc/passwd/7"));
        assert!(dir.starts_with("/data/repos"));
    }

    #[test]
    fn relative_data_dir_resolves_against_root() {
        let dir = resolve_data_dir(Path::new("/srv/root"), Path::new(DEFAULT_DATA_DIR));
        assert_eq!(dir, PathBuf::from("/srv/root/.planrunner/data"));
        let abs = resolve_data_dir(Path::new("/srv/root"), Path::new("/var/lib/pr"));
        assert_eq!(abs, PathBuf::from("/var/lib/pr"));
    }
}

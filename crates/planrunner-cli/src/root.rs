use std::path::{Path, PathBuf};

/// Resolve the planrunner root directory.
///
/// Priority:
/// 1. `--root` flag / `PLANRUNNER_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.planrunner/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, planrunner_core::paths::PLANRUNNER_DIR)
        .or_else(|| find_upward(&cwd, ".git"))
        .unwrap_or(cwd)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_marker_in_ancestor() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".planrunner")).unwrap();
        let deep = dir.path().join("modules/vpc");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(
            find_upward(&deep, ".planrunner").as_deref(),
            Some(dir.path())
        );
        assert!(find_upward(&deep, ".no-such-marker").is_none());
    }
}

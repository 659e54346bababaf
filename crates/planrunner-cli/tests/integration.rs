#![allow(deprecated)]
use assert_cmd::Command;
use chrono::Utc;
use planrunner_core::command::{PlanSuccess, ProjectCommand, ProjectOutcome};
use planrunner_core::db::{open_database, LockDb, ProjectLock, PullStatusDb};
use planrunner_core::types::{CommandName, Project, PullRequest, Repo, User};
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn planrunner(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("planrunner").unwrap();
    cmd.current_dir(dir.path())
        .env("PLANRUNNER_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn init_project(dir: &TempDir) {
    planrunner(dir).arg("init").assert().success();
}

fn data_dir(dir: &TempDir) -> PathBuf {
    dir.path().join(".planrunner/data")
}

fn pull(num: u64) -> PullRequest {
    PullRequest {
        num,
        head_commit: "c1".into(),
        author: "dev".into(),
        base_repo: Repo::new("acme/infra"),
    }
}

/// Seed one lock per `(pull, dir)` and close the database again.
fn seed_locks(dir: &TempDir, locks: &[(u64, &str)]) {
    let db = open_database(&data_dir(dir).join("planrunner.db")).unwrap();
    let lock_db = LockDb::new(db);
    for &(num, path) in locks {
        lock_db
            .try_lock(ProjectLock {
                project: Project::new("acme/infra", path, None),
                workspace: "default".into(),
                pull: pull(num),
                user: User {
                    username: "alice".into(),
                },
                time: Utc::now(),
            })
            .unwrap();
    }
}

fn seed_status(dir: &TempDir) {
    let db = open_database(&data_dir(dir).join("planrunner.db")).unwrap();
    let pulls = PullStatusDb::new(db);
    let planned = ProjectCommand::new(CommandName::Plan, pull(7), User::default(), "vpc", "default")
        .result(ProjectOutcome::Planned(PlanSuccess {
            output: String::new(),
            no_changes: false,
            lock_url: None,
        }));
    pulls.record_results(&pull(7), &[planned]).unwrap();
}

// ---------------------------------------------------------------------------
// planrunner init / config
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_and_data_dir() {
    let dir = TempDir::new().unwrap();
    planrunner(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .planrunner/config.yaml"));

    assert!(dir.path().join(".planrunner/config.yaml").exists());
    assert!(data_dir(&dir).is_dir());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    planrunner(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));
}

#[test]
fn commands_before_init_fail() {
    let dir = TempDir::new().unwrap();
    planrunner(&dir)
        .args(["locks", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn config_show_json_has_defaults() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let out = planrunner(&dir)
        .args(["config", "show", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["orchestrator"]["parallel_pool_size"], 15);
    assert_eq!(value["orchestrator"]["automerge"], false);
}

#[test]
fn config_validate_rejects_zero_pool() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    planrunner(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));

    std::fs::write(
        dir.path().join(".planrunner/config.yaml"),
        "orchestrator:\n  parallel_pool_size: 0\n",
    )
    .unwrap();
    planrunner(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn invalid_config_blocks_store_commands() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(
        dir.path().join(".planrunner/config.yaml"),
        "orchestrator:\n  parallel_pool_size: 0\n",
    )
    .unwrap();

    planrunner(&dir)
        .args(["locks", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"))
        .stderr(predicate::str::contains("parallel_pool_size"));
}

// ---------------------------------------------------------------------------
// planrunner locks
// ---------------------------------------------------------------------------

#[test]
fn locks_list_and_unlock() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    planrunner(&dir)
        .args(["locks", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No locks held."));

    seed_locks(&dir, &[(3, "vpc"), (3, "dns"), (4, "iam")]);

    planrunner(&dir)
        .args(["locks", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/infra/vpc/default"))
        .stdout(predicate::str::contains("#4"));

    planrunner(&dir)
        .args(["locks", "list", "--repo", "other/repo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No locks held."));

    planrunner(&dir)
        .args(["locks", "unlock", "--repo", "acme/infra", "--pull", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Released 2 lock(s)"));

    let out = planrunner(&dir)
        .args(["locks", "list", "--json"])
        .output()
        .unwrap();
    let held: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let held = held.as_array().unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0]["pull"]["num"], 4);
}

#[test]
fn locks_delete_removes_single_lock() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    seed_locks(&dir, &[(3, "vpc"), (3, "dns")]);

    planrunner(&dir)
        .args(["locks", "delete", "acme/infra/vpc/default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted lock acme/infra/vpc/default held by #3"));

    planrunner(&dir)
        .args(["locks", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/infra/dns/default"))
        .stdout(predicate::str::contains("acme/infra/vpc/default").not());

    planrunner(&dir)
        .args(["locks", "delete", "acme/infra/vpc/default"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no lock with key"));
}

// ---------------------------------------------------------------------------
// planrunner status
// ---------------------------------------------------------------------------

#[test]
fn status_show_without_record() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    planrunner(&dir)
        .args(["status", "show", "--repo", "acme/infra", "--pull", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No status recorded for acme/infra#7"));
}

#[test]
fn status_show_derives_combined_statuses() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    seed_status(&dir);

    planrunner(&dir)
        .args(["status", "show", "--repo", "acme/infra", "--pull", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("planned"))
        .stdout(predicate::str::contains("plan:  success 1/1"))
        .stdout(predicate::str::contains("apply: not reported"));

    let out = planrunner(&dir)
        .args(["status", "show", "--repo", "acme/infra", "--pull", "7", "--json"])
        .output()
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["plan"]["num_success"], 1);
    assert!(value["apply"].is_null());
}

#[test]
fn status_clear_forgets_pull() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    seed_status(&dir);

    planrunner(&dir)
        .args(["status", "clear", "--repo", "acme/infra", "--pull", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared status for acme/infra#7."));

    planrunner(&dir)
        .args(["status", "show", "--repo", "acme/infra", "--pull", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No status recorded for acme/infra#7"));
}

// ---------------------------------------------------------------------------
// planrunner plans
// ---------------------------------------------------------------------------

#[test]
fn plans_list_and_clean() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let pull_dir = data_dir(&dir).join("repos/acme/infra/7");
    std::fs::create_dir_all(pull_dir.join("vpc")).unwrap();
    std::fs::write(pull_dir.join("vpc/default.tfplan"), b"plan").unwrap();
    std::fs::write(pull_dir.join("vpc/main.tf"), b"resource").unwrap();

    planrunner(&dir)
        .args(["plans", "list", "--repo", "acme/infra", "--pull", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default.tfplan"));

    planrunner(&dir)
        .args(["plans", "clean", "--repo", "acme/infra", "--pull", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 plan(s)"));

    assert!(!pull_dir.join("vpc/default.tfplan").exists());
    assert!(pull_dir.join("vpc/main.tf").exists());

    planrunner(&dir)
        .args(["plans", "list", "--repo", "acme/infra", "--pull", "8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending plans"));
}

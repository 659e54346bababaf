//! Fan-out/fan-in of per-project plan operations.
//!
//! Sequential mode preserves input order. Parallel mode runs commands in
//! ascending `execution_order_group`, each group through a semaphore-bounded
//! set of spawned tasks; result order within a group is completion-agnostic.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::aggregate::CommandResult;
use crate::collab::ProjectPlanRunner;
use crate::command::{ProjectCommand, ProjectOutcome, ProjectResult};
use crate::error::ProjectError;

pub struct ExecutionPool {
    runner: Arc<dyn ProjectPlanRunner>,
    pool_size: usize,
}

impl ExecutionPool {
    pub fn new(runner: Arc<dyn ProjectPlanRunner>, pool_size: usize) -> Self {
        Self { runner, pool_size }
    }

    /// The parallel flag is uniform per batch, so the first command decides.
    pub fn is_parallel_enabled(cmds: &[ProjectCommand]) -> bool {
        cmds.first().is_some_and(|c| c.parallel_plan_enabled)
    }

    pub async fn run(&self, cmds: &[ProjectCommand]) -> CommandResult {
        let results = if Self::is_parallel_enabled(cmds) {
            self.run_parallel(cmds).await
        } else {
            self.run_sequential(cmds).await
        };
        CommandResult::from_project_results(results)
    }

    pub async fn run_sequential(&self, cmds: &[ProjectCommand]) -> Vec<ProjectResult> {
        let mut results = Vec::with_capacity(cmds.len());
        for cmd in cmds {
            results.push(self.runner.plan(cmd).await);
        }
        results
    }

    pub async fn run_parallel(&self, cmds: &[ProjectCommand]) -> Vec<ProjectResult> {
        let mut groups: BTreeMap<i32, Vec<&ProjectCommand>> = BTreeMap::new();
        for cmd in cmds {
            groups.entry(cmd.execution_order_group).or_default().push(cmd);
        }

        let mut results = Vec::with_capacity(cmds.len());
        for (group, members) in groups {
            debug!(group, size = members.len(), pool = self.pool_size, "running plan group");
            results.extend(self.run_group(members).await);
        }
        results
    }

    async fn run_group(&self, cmds: Vec<&ProjectCommand>) -> Vec<ProjectResult> {
        let semaphore = Arc::new(Semaphore::new(self.pool_size.max(1)));
        let mut handles = Vec::with_capacity(cmds.len());

        for cmd in cmds {
            let sem = semaphore.clone();
            let runner = self.runner.clone();
            let owned = cmd.clone();
            let handle = tokio::spawn(async move {
                let _permit = match sem.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => {
                        return owned.result(ProjectOutcome::Error {
                            error: ProjectError::Run("worker pool closed".into()),
                        })
                    }
                };
                runner.plan(&owned).await
            });
            handles.push((cmd, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (cmd, handle) in handles {
            match handle.await {
                Ok(r) => results.push(r),
                Err(e) => {
                    error!(dir = %cmd.repo_rel_dir, workspace = %cmd.workspace, error = %e, "plan task failed");
                    results.push(cmd.result(ProjectOutcome::Error {
                        error: ProjectError::Run(format!("task join error: {e}")),
                    }));
                }
            }
        }
        results
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::PlanSuccess;
    use crate::types::{CommandName, PullRequest, Repo, User};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Plans succeed after a short sleep, except `bad` which fails and
    /// `panic` which panics. Tracks peak concurrency and start order.
    struct SlowRunner {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<String>>,
    }

    impl SlowRunner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ProjectPlanRunner for SlowRunner {
        async fn plan(&self, cmd: &ProjectCommand) -> ProjectResult {
            self.started.lock().unwrap().push(cmd.repo_rel_dir.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match cmd.repo_rel_dir.as_str() {
                "bad" => cmd.result(ProjectOutcome::Failure {
                    reason: "syntax error".into(),
                }),
                "panic" => panic!("runner blew up"),
                _ => cmd.result(ProjectOutcome::Planned(PlanSuccess {
                    output: format!("planned {}", cmd.repo_rel_dir),
                    no_changes: false,
                    lock_url: None,
                })),
            }
        }
    }

    fn cmd(dir: &str, parallel: bool) -> ProjectCommand {
        let pull = PullRequest {
            num: 1,
            head_commit: "abc".into(),
            author: "dev".into(),
            base_repo: Repo::new("acme/infra"),
        };
        let mut c = ProjectCommand::new(CommandName::Plan, pull, User::default(), dir, "default");
        c.parallel_plan_enabled = parallel;
        c
    }

    fn dirs(results: &[ProjectResult]) -> Vec<String> {
        let mut d: Vec<String> = results.iter().map(|r| r.repo_rel_dir.clone()).collect();
        d.sort();
        d
    }

    #[tokio::test]
    async fn sequential_preserves_order_and_isolates_failures() {
        let runner = SlowRunner::new();
        let pool = ExecutionPool::new(runner.clone(), 4);
        let cmds = vec![cmd("a", false), cmd("bad", false), cmd("c", false)];

        let result = pool.run(&cmds).await;
        let order: Vec<&str> = result
            .project_results
            .iter()
            .map(|r| r.repo_rel_dir.as_str())
            .collect();
        assert_eq!(order, ["a", "bad", "c"]);
        assert!(result.has_errors());
        assert_eq!(runner.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn parallel_respects_pool_ceiling() {
        let runner = SlowRunner::new();
        let pool = ExecutionPool::new(runner.clone(), 2);
        let cmds: Vec<_> = (0..6).map(|i| cmd(&format!("p{i}"), true)).collect();

        let result = pool.run(&cmds).await;
        assert_eq!(result.project_results.len(), 6);
        assert!(runner.peak.load(Ordering::SeqCst) <= 2);
        assert!(!result.has_errors());
    }

    #[tokio::test]
    async fn parallel_and_sequential_yield_same_set() {
        let names = ["a", "bad", "c", "d"];
        let seq = ExecutionPool::new(SlowRunner::new(), 3)
            .run(&names.map(|n| cmd(n, false)))
            .await;
        let par = ExecutionPool::new(SlowRunner::new(), 3)
            .run(&names.map(|n| cmd(n, true)))
            .await;

        assert_eq!(dirs(&seq.project_results), dirs(&par.project_results));
        let mut seq_set = seq.project_results.clone();
        let mut par_set = par.project_results.clone();
        seq_set.sort_by(|a, b| a.repo_rel_dir.cmp(&b.repo_rel_dir));
        par_set.sort_by(|a, b| a.repo_rel_dir.cmp(&b.repo_rel_dir));
        assert_eq!(seq_set, par_set);
    }

    #[tokio::test]
    async fn panicking_task_yields_error_with_identity() {
        let pool = ExecutionPool::new(SlowRunner::new(), 2);
        let result = pool.run(&[cmd("a", true), cmd("panic", true)]).await;

        let failed = result
            .project_results
            .iter()
            .find(|r| r.repo_rel_dir == "panic")
            .unwrap();
        assert!(matches!(failed.error(), Some(ProjectError::Run(_))));
        assert_eq!(result.project_results.len(), 2);
    }

    #[tokio::test]
    async fn groups_run_in_ascending_order() {
        let runner = SlowRunner::new();
        let pool = ExecutionPool::new(runner.clone(), 8);
        let mut late = cmd("late", true);
        late.execution_order_group = 2;
        let mut early = cmd("early", true);
        early.execution_order_group = -1;
        let mid = cmd("mid", true);

        pool.run(&[late, mid, early]).await;
        let started = runner.started.lock().unwrap().clone();
        assert_eq!(started, ["early", "mid", "late"]);
    }

    #[test]
    fn first_command_decides_mode() {
        assert!(!ExecutionPool::is_parallel_enabled(&[]));
        assert!(ExecutionPool::is_parallel_enabled(&[cmd("a", true), cmd("b", false)]));
        assert!(!ExecutionPool::is_parallel_enabled(&[cmd("a", false), cmd("b", true)]));
    }
}

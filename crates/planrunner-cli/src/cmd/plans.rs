use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use planrunner_core::collab::PendingPlanFinder;
use planrunner_core::paths;
use planrunner_core::plans::FsPendingPlanFinder;
use std::path::Path;

use super::load;

#[derive(Subcommand)]
pub enum PlansSubcommand {
    /// List pending plan files
    List {
        /// Repository full name (owner/name)
        #[arg(long)]
        repo: String,
        /// Pull request number
        #[arg(long)]
        pull: u64,
    },

    /// Delete pending plan files
    Clean {
        /// Repository full name (owner/name)
        #[arg(long)]
        repo: String,
        /// Pull request number
        #[arg(long)]
        pull: u64,
    },
}

pub fn run(root: &Path, subcmd: PlansSubcommand, json: bool) -> anyhow::Result<()> {
    let (_, data_dir) = load(root)?;
    let finder = FsPendingPlanFinder;

    match subcmd {
        PlansSubcommand::List { repo, pull } => {
            let pull_dir = paths::pull_dir(&data_dir, &repo, pull);
            let plans = finder.find(&pull_dir)?;
            if json {
                return print_json(&plans);
            }
            if plans.is_empty() {
                println!("No pending plans for {repo}#{pull}.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = plans
                .iter()
                .map(|p| vec![p.repo_rel_dir.clone(), p.path.display().to_string()])
                .collect();
            print_table(&["DIR", "PLAN"], &rows);
        }
        PlansSubcommand::Clean { repo, pull } => {
            let pull_dir = paths::pull_dir(&data_dir, &repo, pull);
            let count = finder.find(&pull_dir)?.len();
            finder
                .delete_plans(&pull_dir)
                .with_context(|| format!("failed to clean plans in {}", pull_dir.display()))?;
            if json {
                return print_json(&serde_json::json!({ "deleted": count }));
            }
            println!("Deleted {count} plan(s) for {repo}#{pull}");
        }
    }
    Ok(())
}

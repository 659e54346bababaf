use crate::output::{print_json, print_table};
use clap::Subcommand;
use planrunner_core::status::{combined_status, CombinedStatus};
use planrunner_core::types::CommandName;
use std::path::Path;

use super::{load, open_stores};

#[derive(Subcommand)]
pub enum StatusSubcommand {
    /// Show per-project statuses and the derived combined statuses
    Show {
        /// Repository full name (owner/name)
        #[arg(long)]
        repo: String,
        /// Pull request number
        #[arg(long)]
        pull: u64,
    },

    /// Forget the recorded statuses of a pull request
    Clear {
        /// Repository full name (owner/name)
        #[arg(long)]
        repo: String,
        /// Pull request number
        #[arg(long)]
        pull: u64,
    },
}

pub fn run(root: &Path, subcmd: StatusSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        StatusSubcommand::Show { repo, pull } => show(root, &repo, pull, json),
        StatusSubcommand::Clear { repo, pull } => clear(root, &repo, pull, json),
    }
}

fn clear(root: &Path, repo: &str, pull: u64, json: bool) -> anyhow::Result<()> {
    let (_, data_dir) = load(root)?;
    let (_, pulls) = open_stores(&data_dir)?;
    let existed = pulls.delete(repo, pull)?;

    if json {
        return print_json(&serde_json::json!({
            "repo": repo,
            "pull": pull,
            "cleared": existed,
        }));
    }
    if existed {
        println!("Cleared status for {repo}#{pull}.");
    } else {
        println!("No status recorded for {repo}#{pull}.");
    }
    Ok(())
}

fn describe(c: Option<CombinedStatus>) -> String {
    match c {
        Some(c) => format!("{} {}/{}", c.status, c.num_success, c.num_total),
        None => "not reported".to_string(),
    }
}

fn show(root: &Path, repo: &str, pull: u64, json: bool) -> anyhow::Result<()> {
    let (_, data_dir) = load(root)?;
    let (_, pulls) = open_stores(&data_dir)?;

    let Some(status) = pulls.get(repo, pull)? else {
        if json {
            return print_json(&serde_json::Value::Null);
        }
        println!("No status recorded for {repo}#{pull}.");
        return Ok(());
    };

    let plan = combined_status(&status, CommandName::Plan);
    let apply = combined_status(&status, CommandName::Apply);

    if json {
        return print_json(&serde_json::json!({
            "pull_status": status,
            "plan": plan,
            "apply": apply,
        }));
    }

    println!("{repo}#{pull} @ {}", status.pull.head_commit);
    let rows: Vec<Vec<String>> = status
        .projects
        .iter()
        .map(|p| {
            vec![
                p.repo_rel_dir.clone(),
                p.workspace.clone(),
                p.project_name.clone().unwrap_or_default(),
                p.status.to_string(),
            ]
        })
        .collect();
    print_table(&["DIR", "WORKSPACE", "PROJECT", "STATUS"], &rows);
    println!();
    println!("plan:  {}", describe(plan));
    println!("apply: {}", describe(apply));
    Ok(())
}

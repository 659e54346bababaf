use crate::output::{print_json, print_table};
use clap::Subcommand;
use std::path::Path;

use super::{load, open_stores};

#[derive(Subcommand)]
pub enum LocksSubcommand {
    /// List held project locks
    List {
        /// Only show locks in this repo (owner/name)
        #[arg(long)]
        repo: Option<String>,
    },

    /// Release every lock held by a pull request
    Unlock {
        /// Repository full name (owner/name)
        #[arg(long)]
        repo: String,
        /// Pull request number
        #[arg(long)]
        pull: u64,
    },

    /// Delete a single lock by key (owner/name/dir/workspace)
    Delete {
        /// Lock key as shown by `locks list`
        key: String,
    },
}

pub fn run(root: &Path, subcmd: LocksSubcommand, json: bool) -> anyhow::Result<()> {
    let (_, data_dir) = load(root)?;
    let (locks, _) = open_stores(&data_dir)?;

    match subcmd {
        LocksSubcommand::List { repo } => {
            let held: Vec<_> = locks
                .list()?
                .into_iter()
                .filter(|l| repo.as_deref().map_or(true, |r| l.project.repo_full_name == r))
                .collect();

            if json {
                return print_json(&held);
            }
            if held.is_empty() {
                println!("No locks held.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = held
                .iter()
                .map(|l| {
                    vec![
                        l.key(),
                        format!("#{}", l.pull.num),
                        l.user.username.clone(),
                        l.time.format("%Y-%m-%d %H:%M:%S").to_string(),
                    ]
                })
                .collect();
            print_table(&["LOCK", "PULL", "USER", "LOCKED AT"], &rows);
        }
        LocksSubcommand::Unlock { repo, pull } => {
            let removed = locks.remove_pull_locks(&repo, pull)?;
            if json {
                return print_json(&serde_json::json!({
                    "repo": repo,
                    "pull": pull,
                    "released": removed,
                }));
            }
            println!("Released {} lock(s) held by {repo}#{pull}", removed.len());
            for lock in &removed {
                println!("  {}", lock.key());
            }
        }
        LocksSubcommand::Delete { key } => {
            let removed = locks.unlock(&key)?;
            if json {
                return print_json(&serde_json::json!({
                    "key": key,
                    "deleted": removed,
                }));
            }
            match removed {
                Some(lock) => println!("Deleted lock {key} held by #{}", lock.pull.num),
                None => anyhow::bail!("no lock with key {key}"),
            }
        }
    }
    Ok(())
}

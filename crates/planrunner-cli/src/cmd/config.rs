use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use planrunner_core::config::{Config, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective config
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if json {
        return print_json(&config);
    }

    let o = &config.orchestrator;
    println!("data_dir:                       {}", config.data_dir(root).display());
    println!("parallel_pool_size:             {}", o.parallel_pool_size);
    println!("automerge:                      {}", o.automerge);
    println!("discard_approval_on_plan:       {}", o.discard_approval_on_plan);
    println!("silence_no_projects:            {}", o.silence_no_projects);
    println!("silence_vcs_status_no_plans:    {}", o.silence_vcs_status_no_plans);
    println!("silence_vcs_status_no_projects: {}", o.silence_vcs_status_no_projects);
    Ok(())
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

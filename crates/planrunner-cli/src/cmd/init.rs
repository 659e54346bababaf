use crate::output::print_json;
use anyhow::Context;
use planrunner_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config_path = paths::config_path(root);
    let created = !config_path.exists();

    let config = if created {
        let cfg = Config::default();
        cfg.save(root).context("failed to write config.yaml")?;
        cfg
    } else {
        Config::load(root).context("failed to load existing config")?
    };

    let data_dir = config.data_dir(root);
    io::ensure_dir(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    if json {
        return print_json(&serde_json::json!({
            "root": root,
            "config": config_path,
            "config_created": created,
            "data_dir": data_dir,
        }));
    }

    println!("Initializing planrunner in: {}", root.display());
    if created {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }
    println!("  data:    {}", data_dir.display());
    Ok(())
}

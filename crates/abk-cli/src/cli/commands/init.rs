//! `abk init` – write a fresh default config file.

use anyhow::Result;
use abk_core::config;

pub fn run_init(force: bool) -> Result<()> {
    let path = config::config_path()?;
    if path.exists() && !force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    config::write_default(&path)?;
    println!(
        "Wrote default config to {}; edit host_url and the credentials before running.",
        path.display()
    );
    Ok(())
}

//! `qbwatch config` – show the config location and effective values.

use anyhow::Result;
use qbwatch_core::config::{self, WatchConfig};

pub fn run_config(cfg: &WatchConfig) -> Result<()> {
    let path = config::config_path()?;
    println!("config file: {}", path.display());
    println!();

    // Never print the credential.
    let mut shown = cfg.clone();
    if !shown.server.password.is_empty() {
        shown.server.password = "********".to_string();
    }
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

//! `qbwatch add <url>` – fetch a .torrent file and add it to the remote instance.

use anyhow::{Context, Result};
use qbwatch_core::config::WatchConfig;

use super::connect;

pub async fn run_add(cfg: &WatchConfig, url: &str) -> Result<()> {
    let (client, token) = connect(cfg).await?;
    client
        .add_torrent_from_url(&token, url)
        .await
        .with_context(|| format!("could not add torrent from {url}"))?;
    println!("Added torrent from {url}");
    Ok(())
}

//! `qbwatch force-start <hash>` – bypass queueing for a torrent.

use anyhow::Result;
use qbwatch_core::config::WatchConfig;

use super::connect;

pub async fn run_force_start(cfg: &WatchConfig, hash: &str) -> Result<()> {
    let (client, token) = connect(cfg).await?;
    client.force_start(&token, &[hash.to_string()]).await?;
    println!("Force-started {hash}");
    Ok(())
}

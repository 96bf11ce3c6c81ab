//! `qbwatch pause <hash>` – pause a torrent on the remote instance.

use anyhow::Result;
use qbwatch_core::config::WatchConfig;

use super::connect;

pub async fn run_pause(cfg: &WatchConfig, hash: &str) -> Result<()> {
    let (client, token) = connect(cfg).await?;
    client.pause(&token, &[hash.to_string()]).await?;
    println!("Paused {hash}");
    Ok(())
}

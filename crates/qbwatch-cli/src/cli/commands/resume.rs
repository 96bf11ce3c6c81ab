//! `qbwatch resume <hash>` – resume a paused torrent.

use anyhow::Result;
use qbwatch_core::config::WatchConfig;

use super::connect;

pub async fn run_resume(cfg: &WatchConfig, hash: &str) -> Result<()> {
    let (client, token) = connect(cfg).await?;
    client.resume(&token, &[hash.to_string()]).await?;
    println!("Resumed {hash}");
    Ok(())
}

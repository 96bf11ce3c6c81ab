//! `qbwatch delete <hash>` – remove a torrent (and optionally its data).

use anyhow::Result;
use qbwatch_core::config::WatchConfig;

use super::connect;

pub async fn run_delete(cfg: &WatchConfig, hash: &str, delete_files: bool) -> Result<()> {
    let (client, token) = connect(cfg).await?;
    client
        .delete(&token, &[hash.to_string()], delete_files)
        .await?;
    if delete_files {
        println!("Deleted {hash} and its files");
    } else {
        println!("Deleted {hash}");
    }
    Ok(())
}

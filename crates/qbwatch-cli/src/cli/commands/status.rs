//! `qbwatch status` – show the torrent list and a transfer summary.

use anyhow::Result;
use qbwatch_core::config::WatchConfig;
use qbwatch_core::stats::{format_size, TransferSummary};

use super::connect;

pub async fn run_status(cfg: &WatchConfig) -> Result<()> {
    let (client, token) = connect(cfg).await?;
    let torrents = client.torrents(&token).await?;

    if torrents.is_empty() {
        println!("No torrents.");
        return Ok(());
    }

    println!(
        "{:<10} {:<12} {:>8} {:>10}  {}",
        "HASH", "STATE", "PROGRESS", "SIZE", "NAME"
    );
    for t in &torrents {
        let short_hash = t.hash.get(..8).unwrap_or(&t.hash);
        println!(
            "{:<10} {:<12} {:>7.1}% {:>10}  {}",
            short_hash,
            format!("{:?}", t.state).to_lowercase(),
            t.progress * 100.0,
            format_size(t.size),
            t.name
        );
    }
    println!();
    println!("{}", TransferSummary::from_snapshot(&torrents));
    Ok(())
}

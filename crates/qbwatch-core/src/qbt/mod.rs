//! qBittorrent Web API v2 client.
//!
//! Thin transport layer: form-encoded commands, JSON snapshots, and the
//! opaque `SID` session cookie. Interpretation of login responses and
//! reconnection policy live in [`crate::session`].

mod client;
mod model;

pub use client::{ApiError, LoginReply, QbtClient, SessionToken};
pub use model::{Torrent, TorrentProperties, TorrentState};

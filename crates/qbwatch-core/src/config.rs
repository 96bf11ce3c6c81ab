use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Connection details for the watched qBittorrent instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the Web UI, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Web UI username.
    pub username: String,
    /// Web UI password. Can be overridden by `QBWATCH_PASSWORD`.
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            username: "admin".to_string(),
            password: String::new(),
        }
    }
}

/// Cadences (in seconds) for the periodic engine tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    /// Snapshot poll + completion/threshold reconciliation.
    pub reconcile_secs: u64,
    /// Concurrency-limit enforcement pass.
    pub limiter_secs: u64,
    /// Session liveness probe.
    pub session_secs: u64,
    /// History TTL sweep.
    pub sweep_secs: u64,
    /// Transfer summary emission.
    pub summary_secs: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            reconcile_secs: 30,
            limiter_secs: 60,
            session_secs: 300,
            sweep_secs: 3600,
            summary_secs: 300,
        }
    }
}

/// Global configuration loaded from `~/.config/qbwatch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Remote qBittorrent instance to watch.
    #[serde(default)]
    pub server: ServerConfig,
    /// Maximum number of torrents allowed to download simultaneously.
    pub max_concurrent: usize,
    /// Progress percentages (1–99) that fire a notification when first crossed.
    pub thresholds: Vec<u32>,
    /// Minimum torrent size in bytes for threshold notifications.
    pub min_notify_size: u64,
    /// Samples kept per history series.
    pub history_capacity: usize,
    /// Seconds of inactivity after which a torrent's history is dropped.
    pub history_ttl_secs: u64,
    /// Maximum login attempts before `ensure_valid` gives up.
    pub login_retry_limit: u32,
    /// Base delay in seconds for the login backoff (delay = base × attempt).
    pub login_retry_base_secs: u64,
    /// Task cadences; if missing, built-in defaults are used.
    #[serde(default)]
    pub cadences: CadenceConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            max_concurrent: 3,
            thresholds: vec![25, 50, 75, 90],
            min_notify_size: 100 * 1024 * 1024,
            history_capacity: 20,
            history_ttl_secs: 24 * 3600,
            login_retry_limit: 5,
            login_retry_base_secs: 5,
            cadences: CadenceConfig::default(),
        }
    }
}

impl WatchConfig {
    /// Structural validation, run once at startup before the scheduler starts.
    pub fn validate(&self) -> Result<()> {
        if self.server.base_url.trim().is_empty() {
            anyhow::bail!("server.base_url must not be empty");
        }
        url::Url::parse(&self.server.base_url)
            .map_err(|e| anyhow::anyhow!("server.base_url is not a valid URL: {}", e))?;
        if self.max_concurrent == 0 {
            anyhow::bail!("max_concurrent must be at least 1");
        }
        if self.thresholds.iter().any(|t| *t == 0 || *t >= 100) {
            anyhow::bail!("thresholds must be between 1 and 99");
        }
        if self.history_capacity == 0 {
            anyhow::bail!("history_capacity must be at least 1");
        }
        if self.history_ttl_secs == 0 {
            anyhow::bail!("history_ttl_secs must be at least 1");
        }
        if self.login_retry_limit == 0 {
            anyhow::bail!("login_retry_limit must be at least 1");
        }
        let c = &self.cadences;
        for (name, secs) in [
            ("reconcile_secs", c.reconcile_secs),
            ("limiter_secs", c.limiter_secs),
            ("session_secs", c.session_secs),
            ("sweep_secs", c.sweep_secs),
            ("summary_secs", c.summary_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("cadences.{} must be at least 1", name);
            }
        }
        Ok(())
    }

    pub fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.history_ttl_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("qbwatch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
/// Credentials can be overridden by `QBWATCH_USERNAME` / `QBWATCH_PASSWORD`.
pub fn load_or_init() -> Result<WatchConfig> {
    let path = config_path()?;
    let mut cfg = if path.exists() {
        let data = fs::read_to_string(&path)?;
        toml::from_str(&data)?
    } else {
        let default_cfg = WatchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        default_cfg
    };

    if let Ok(user) = std::env::var("QBWATCH_USERNAME") {
        cfg.server.username = user;
    }
    if let Ok(pass) = std::env::var("QBWATCH_PASSWORD") {
        cfg.server.password = pass;
    }

    cfg.validate()?;
    Ok(cfg)
}

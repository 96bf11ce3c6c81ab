pub mod config;
pub mod logging;

pub mod engine;
pub mod history;
pub mod limiter;
pub mod qbt;
pub mod reconcile;
pub mod scheduler;
pub mod session;
pub mod stats;

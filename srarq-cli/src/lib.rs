//! Shared functionality for the srarq command-line tools.

pub mod config;
pub mod stats;

pub use config::{Config, ConfigError, SenderConfig, SenderSettings};
pub use stats::{display_transfer_stats, format_bandwidth, format_bytes, format_elapsed};

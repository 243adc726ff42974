//! Sender configuration
//!
//! Settings come from the command line, an optional TOML file, or both (the
//! command line wins). The merged settings are validated into a
//! [`SenderConfig`] before anything touches the network.

use serde::{Deserialize, Serialize};
use srarq::SenderOptions;
use srarq_io::RetransmitPolicy;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::num::NonZeroU16;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Possibly incomplete sender settings, as found in a file or on the CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderSettings {
    /// File to transfer
    pub source: Option<PathBuf>,
    /// Receiver address
    pub receiver: Option<SocketAddr>,
    /// Local bind address
    pub bind: Option<SocketAddr>,
    /// Maximum segments in flight
    pub window_size: Option<u32>,
    /// Retransmission interval in milliseconds
    pub retransmission_timeout_ms: Option<u64>,
    /// Enables exponential backoff up to this interval
    pub max_backoff_ms: Option<u64>,
    /// Kernel socket buffer size in bytes, both directions
    pub socket_buffer_bytes: Option<usize>,
}

impl SenderSettings {
    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merge(self, other: SenderSettings) -> SenderSettings {
        SenderSettings {
            source: other.source.or(self.source),
            receiver: other.receiver.or(self.receiver),
            bind: other.bind.or(self.bind),
            window_size: other.window_size.or(self.window_size),
            retransmission_timeout_ms: other
                .retransmission_timeout_ms
                .or(self.retransmission_timeout_ms),
            max_backoff_ms: other.max_backoff_ms.or(self.max_backoff_ms),
            socket_buffer_bytes: other.socket_buffer_bytes.or(self.socket_buffer_bytes),
        }
    }

    /// Check every field and produce a complete configuration
    pub fn build(self) -> Result<SenderConfig, ConfigError> {
        let source = self.source.ok_or(ConfigError::Missing("source path"))?;
        let receiver = self.receiver.ok_or(ConfigError::Missing("receiver port"))?;
        let window_size = self.window_size.ok_or(ConfigError::Missing("window size"))?;
        let timeout_ms = self
            .retransmission_timeout_ms
            .ok_or(ConfigError::Missing("retransmission timeout"))?;

        let window_size = u16::try_from(window_size)
            .ok()
            .and_then(NonZeroU16::new)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "window size must be between 1 and {}, got {}",
                    u16::MAX,
                    window_size
                ))
            })?;

        if timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "retransmission timeout must be positive".to_string(),
            ));
        }

        if let Some(max) = self.max_backoff_ms {
            if max < timeout_ms {
                return Err(ConfigError::Invalid(format!(
                    "max backoff ({} ms) is below the retransmission timeout ({} ms)",
                    max, timeout_ms
                )));
            }
        }

        if self.socket_buffer_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "socket buffer size must be positive".to_string(),
            ));
        }

        Ok(SenderConfig {
            source,
            receiver,
            bind: self.bind.unwrap_or_else(|| default_bind(receiver)),
            window_size,
            retransmission_timeout: Duration::from_millis(timeout_ms),
            max_backoff: self.max_backoff_ms.map(Duration::from_millis),
            socket_buffer: self.socket_buffer_bytes,
        })
    }
}

/// Local address matching the receiver's address family and scope
fn default_bind(receiver: SocketAddr) -> SocketAddr {
    let ip = match receiver.ip() {
        IpAddr::V4(ip) if ip.is_loopback() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(ip) if ip.is_loopback() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(ip, 0)
}

/// Validated sender configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderConfig {
    pub source: PathBuf,
    pub receiver: SocketAddr,
    pub bind: SocketAddr,
    pub window_size: NonZeroU16,
    pub retransmission_timeout: Duration,
    pub max_backoff: Option<Duration>,
    /// Left at the OS default when `None`
    pub socket_buffer: Option<usize>,
}

impl SenderConfig {
    pub fn retransmit_policy(&self) -> RetransmitPolicy {
        match self.max_backoff {
            Some(max) => RetransmitPolicy::Backoff {
                initial: self.retransmission_timeout,
                max,
            },
            None => RetransmitPolicy::Fixed(self.retransmission_timeout),
        }
    }

    pub fn sender_options(&self) -> SenderOptions {
        SenderOptions {
            window_size: self.window_size,
            policy: self.retransmit_policy(),
        }
    }
}

/// Configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// `[sender]` table
    pub sender: Option<SenderSettings>,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Render as TOML, in the layout [`Config::from_file`] reads
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Example configuration sending to a local receiver
    pub fn example() -> Self {
        Config {
            sender: Some(SenderSettings {
                source: Some(PathBuf::from("image.png")),
                receiver: Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000)),
                bind: None,
                window_size: Some(20),
                retransmission_timeout_ms: Some(30),
                max_backoff_ms: None,
                socket_buffer_bytes: None,
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

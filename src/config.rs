//! Relay configuration parsed from environment variables.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `PORT` | 3001 | Listen port |
//! | `SKETCHROOM_BIND` | `0.0.0.0` | Listen address |
//! | `SKETCHROOM_CHANNEL_CAPACITY` | 256 | Outbound queue depth per connection |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub port: u16,
    pub bind: IpAddr,
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl RelayConfig {
    /// Build config from the process environment, after loading `.env` if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "config: failed to load .env");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unset or blank keys take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value is unparseable or a capacity is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            port: parse_var(&lookup, "PORT", DEFAULT_PORT)?,
            bind: parse_var(&lookup, "SKETCHROOM_BIND", DEFAULT_BIND)?,
            channel_capacity: parse_var(&lookup, "SKETCHROOM_CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY)?,
        };
        if config.channel_capacity == 0 {
            return Err(ConfigError::Zero { key: "SKETCHROOM_CHANNEL_CAPACITY" });
        }
        Ok(config)
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

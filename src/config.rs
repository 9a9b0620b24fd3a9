//! Feed configuration
//!
//! Defaults listen on `127.0.0.1:38201` with a 1024 byte datagram limit.
//! Each setting can be overridden from the environment:
//! - `ORDERBOOK_FEED_ADDR` - listen IP address
//! - `ORDERBOOK_FEED_PORT` - listen port
//! - `ORDERBOOK_FEED_MAX_DATAGRAM` - largest accepted datagram in bytes
//! - `ORDERBOOK_FEED_POLL_MS` - how often a blocked receive checks for stop

use crate::decoder::Decoder;
use crate::error::{FeedError, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_LISTEN_PORT: u16 = 38201;
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1024;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Largest UDP payload over IPv4
pub const MAX_UDP_PAYLOAD: usize = 65_507;

pub const ENV_ADDR: &str = "ORDERBOOK_FEED_ADDR";
pub const ENV_PORT: &str = "ORDERBOOK_FEED_PORT";
pub const ENV_MAX_DATAGRAM: &str = "ORDERBOOK_FEED_MAX_DATAGRAM";
pub const ENV_POLL_MS: &str = "ORDERBOOK_FEED_POLL_MS";

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub listen_addr: IpAddr,
    pub listen_port: u16,
    /// Datagrams longer than this are rejected as oversized
    pub max_datagram_size: usize,
    /// Socket read timeout; bounds how long a stop request can go unnoticed
    pub poll_interval: Duration,
    /// End the loop on the first receive error instead of only on fatal ones
    pub stop_on_receive_error: bool,
    /// Watch per-pair update ids for gaps
    pub track_sequence: bool,
    /// Require the optional schema file identifier in every datagram
    pub verify_identifier: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            listen_addr: DEFAULT_LISTEN_ADDR,
            listen_port: DEFAULT_LISTEN_PORT,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_on_receive_error: false,
            track_sequence: true,
            verify_identifier: false,
        }
    }
}

impl FeedConfig {
    /// Defaults overridden by any non-empty `ORDERBOOK_FEED_*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Config`] if a variable is set but does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = FeedConfig::default();

        if let Some(v) = var(ENV_ADDR) {
            config.listen_addr = parse(ENV_ADDR, &v)?;
        }
        if let Some(v) = var(ENV_PORT) {
            config.listen_port = parse(ENV_PORT, &v)?;
        }
        if let Some(v) = var(ENV_MAX_DATAGRAM) {
            config.max_datagram_size = parse(ENV_MAX_DATAGRAM, &v)?;
        }
        if let Some(v) = var(ENV_POLL_MS) {
            config.poll_interval = Duration::from_millis(parse(ENV_POLL_MS, &v)?);
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.listen_port)
    }

    /// Decoder matching the configured identifier policy
    pub fn decoder(&self) -> Decoder {
        if self.verify_identifier {
            Decoder::with_identifier_check()
        } else {
            Decoder::new()
        }
    }

    /// # Errors
    ///
    /// Returns [`FeedError::Config`] when the datagram limit cannot hold the
    /// header the decoder requires or exceeds a UDP payload, or the poll
    /// interval is zero.
    pub fn validate(&self) -> Result<()> {
        let header = self.decoder().min_size();
        if self.max_datagram_size < header {
            return Err(FeedError::Config(format!(
                "max_datagram_size {} is smaller than the {} byte header",
                self.max_datagram_size, header
            )));
        }
        if self.max_datagram_size > MAX_UDP_PAYLOAD {
            return Err(FeedError::Config(format!(
                "max_datagram_size {} exceeds the UDP payload limit of {}",
                self.max_datagram_size, MAX_UDP_PAYLOAD
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(FeedError::Config("poll_interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| FeedError::Config(format!("{name}={value:?}: {e}")))
}

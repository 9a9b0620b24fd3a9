//! Fatal feed errors
//!
//! Anything here stops the feed: startup failures before the loop is
//! entered, or a transport that can no longer deliver datagrams. Per-message
//! problems never surface as a [`FeedError`]; they are reported as
//! [`Fault`](crate::dispatch::Fault)s and the loop carries on.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("socket setup failed: {0}")]
    Socket(#[source] io::Error),

    #[error("transport failed: {0}")]
    Transport(#[source] io::Error),

    #[error("failed to spawn feed thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("feed thread panicked")]
    Panicked,
}

pub type Result<T> = std::result::Result<T, FeedError>;

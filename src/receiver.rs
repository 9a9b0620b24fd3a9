//! UDP datagram receiver
//!
//! Owns the bound socket and a reusable receive buffer one byte larger than
//! the configured datagram limit. A datagram that fills that extra byte did
//! not fit and is reported as [`ReceiveError::Oversized`] instead of being
//! handed on partially.

use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use thiserror::Error;
use tracing::info;

/// One received datagram, valid until the next `receive` call
#[derive(Debug, Clone, Copy)]
pub struct RawDatagram<'a> {
    pub bytes: &'a [u8],
    pub from: SocketAddr,
}

impl RawDatagram<'_> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum ReceiveError {
    /// The read timeout elapsed (or the call was interrupted) with no data
    #[error("no datagram within the poll interval")]
    Idle,

    #[error("datagram from {from} exceeds {limit} bytes")]
    Oversized { from: SocketAddr, limit: usize },

    #[error("receive failed: {0}")]
    Io(#[from] io::Error),
}

impl ReceiveError {
    /// Whether the socket can no longer deliver datagrams
    pub fn is_fatal(&self) -> bool {
        match self {
            ReceiveError::Io(e) => is_fatal(e),
            _ => false,
        }
    }
}

/// Socket errors after which no further datagram can arrive
pub fn is_fatal(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::Unsupported
    )
}

#[derive(Debug)]
pub struct DatagramReceiver {
    socket: UdpSocket,
    buffer: Vec<u8>,
    max_datagram_size: usize,
}

impl DatagramReceiver {
    /// Bind the configured address.
    ///
    /// # Errors
    ///
    /// [`FeedError::Config`] for an invalid config, [`FeedError::Bind`] if the
    /// address is taken or not permitted, [`FeedError::Socket`] if the read
    /// timeout cannot be set.
    pub fn bind(config: &FeedConfig) -> Result<Self> {
        config.validate()?;

        let addr = config.socket_addr();
        let socket = UdpSocket::bind(addr).map_err(|source| FeedError::Bind { addr, source })?;
        socket
            .set_read_timeout(Some(config.poll_interval))
            .map_err(FeedError::Socket)?;

        let receiver = DatagramReceiver {
            socket,
            buffer: vec![0u8; config.max_datagram_size + 1],
            max_datagram_size: config.max_datagram_size,
        };
        info!(
            addr = %receiver.local_addr().unwrap_or(addr),
            max_datagram_size = config.max_datagram_size,
            "datagram receiver bound"
        );
        Ok(receiver)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn max_datagram_size(&self) -> usize {
        self.max_datagram_size
    }

    /// Block until a datagram arrives or the poll interval elapses.
    pub fn receive(&mut self) -> std::result::Result<RawDatagram<'_>, ReceiveError> {
        match self.socket.recv_from(&mut self.buffer) {
            Ok((len, from)) if len > self.max_datagram_size => Err(ReceiveError::Oversized {
                from,
                limit: self.max_datagram_size,
            }),
            Ok((len, from)) => Ok(RawDatagram {
                bytes: &self.buffer[..len],
                from,
            }),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Err(ReceiveError::Idle)
            }
            Err(e) => Err(ReceiveError::Io(e)),
        }
    }
}

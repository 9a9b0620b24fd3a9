//! Receive loop
//!
//! [`Feed`] owns the socket and the dispatcher. `run` receives, decodes and
//! dispatches one datagram at a time, so handlers see messages in arrival
//! order. The socket is released whenever `run` returns, whether through a
//! stop request or a fatal transport error.

use crate::config::FeedConfig;
use crate::dispatch::{Dispatcher, Fault, Handler};
use crate::error::{FeedError, Result};
use crate::receiver::{is_fatal, DatagramReceiver, ReceiveError};
use crate::stats::FeedStats;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Cloneable stop signal.
///
/// A blocked receive notices the request within one poll interval.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

pub struct Feed<H> {
    receiver: DatagramReceiver,
    dispatcher: Dispatcher<H>,
    stop: StopHandle,
    stop_on_receive_error: bool,
}

impl<H: Handler> Feed<H> {
    /// Bind the socket and register the handler.
    ///
    /// # Errors
    ///
    /// Fails before any datagram is read if the config is invalid or the
    /// address cannot be bound.
    pub fn bind(config: &FeedConfig, handler: H) -> Result<Self> {
        let receiver = DatagramReceiver::bind(config)?;

        let mut dispatcher = Dispatcher::new(config.decoder(), handler);
        dispatcher.track_sequence(config.track_sequence);

        Ok(Feed {
            receiver,
            dispatcher,
            stop: StopHandle::new(),
            stop_on_receive_error: config.stop_on_receive_error,
        })
    }

    /// Observe every recoverable fault
    pub fn on_fault<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&Fault<'_>) + Send + 'static,
    {
        self.dispatcher.set_fault_observer(Box::new(observer));
        self
    }

    /// Share an existing stop signal instead of the feed's own
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// # Errors
    ///
    /// [`FeedError::Socket`] if the OS cannot report the bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.receiver.local_addr().map_err(FeedError::Socket)
    }

    pub fn stats(&self) -> &FeedStats {
        self.dispatcher.stats()
    }

    /// Run until stopped, consuming the feed.
    ///
    /// Returns the final statistics on a clean stop.
    ///
    /// # Errors
    ///
    /// [`FeedError::Transport`] when the socket becomes unusable, or on any
    /// receive error if `stop_on_receive_error` was configured.
    pub fn run(mut self) -> Result<FeedStats> {
        info!(addr = ?self.receiver.local_addr().ok(), "feed started");

        while !self.stop.is_stopped() {
            match self.receiver.receive() {
                Ok(datagram) => {
                    self.dispatcher.process(&datagram);
                }
                Err(ReceiveError::Idle) => {}
                Err(ReceiveError::Oversized { from, limit }) => {
                    self.dispatcher.oversized(from, limit);
                }
                Err(ReceiveError::Io(io_err)) => {
                    if let Some(fatal) = self.on_receive_error(io_err) {
                        return Err(fatal);
                    }
                }
            }
        }

        let stats = self.dispatcher.into_stats();
        info!(
            datagrams = stats.datagrams(),
            dispatched = stats.dispatched(),
            "feed stopped"
        );
        Ok(stats)
    }

    /// Count and report a receive error; `Some` if the loop must end.
    fn on_receive_error(&mut self, io_err: io::Error) -> Option<FeedError> {
        self.dispatcher.receive_error(&io_err);
        if is_fatal(&io_err) || self.stop_on_receive_error {
            error!(error = %io_err, "feed stopped by transport failure");
            return Some(FeedError::Transport(io_err));
        }
        None
    }
}

impl<H: Handler + Send + 'static> Feed<H> {
    /// Run the loop on a dedicated thread.
    ///
    /// # Errors
    ///
    /// [`FeedError::Socket`] if the bound address cannot be read,
    /// [`FeedError::Spawn`] if the thread cannot be created.
    pub fn spawn(self) -> Result<FeedHandle> {
        let stop = self.stop_handle();
        let local_addr = self.local_addr()?;
        let thread = thread::Builder::new()
            .name("orderbook-feed".to_string())
            .spawn(move || self.run())
            .map_err(FeedError::Spawn)?;

        Ok(FeedHandle {
            stop,
            local_addr,
            thread: Some(thread),
        })
    }
}

/// Handle on a feed running in its own thread.
///
/// Dropping the handle without joining raises the stop flag; the thread then
/// exits and releases the socket within one poll interval.
#[derive(Debug)]
pub struct FeedHandle {
    stop: StopHandle,
    local_addr: SocketAddr,
    thread: Option<JoinHandle<Result<FeedStats>>>,
}

impl FeedHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the loop to exit. Does not request a stop by itself.
    ///
    /// # Errors
    ///
    /// Whatever `run` returned, or [`FeedError::Panicked`].
    pub fn join(mut self) -> Result<FeedStats> {
        let thread = self.thread.take().ok_or(FeedError::Panicked)?;
        thread.join().map_err(|_| FeedError::Panicked)?
    }

    /// Request a stop and wait for the loop to exit
    pub fn shutdown(self) -> Result<FeedStats> {
        self.stop();
        self.join()
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop.stop();
        }
    }
}

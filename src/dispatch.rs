//! Per-datagram decode and dispatch
//!
//! [`Dispatcher::process`] turns one datagram into at most one handler call.
//! Whatever goes wrong along the way (decode failure, handler error, handler
//! panic) is logged, counted and passed to the fault observer, and never
//! escapes to the receive loop.

use crate::decoder::{DecodeError, Decoder, OrderBookMessage};
use crate::receiver::RawDatagram;
use crate::sequence::{Gap, SequenceTracker};
use crate::stats::FeedStats;
use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{trace, warn};

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer of decoded messages.
///
/// The message borrows the receive buffer and is only valid for the duration
/// of the call; use [`OrderBookMessage::to_snapshot`] to keep it.
pub trait Handler {
    fn on_message(&mut self, msg: &OrderBookMessage<'_>) -> Result<(), HandlerError>;
}

impl<F> Handler for F
where
    F: FnMut(&OrderBookMessage<'_>) -> Result<(), HandlerError>,
{
    fn on_message(&mut self, msg: &OrderBookMessage<'_>) -> Result<(), HandlerError> {
        self(msg)
    }
}

/// Pin a closure to the handler signature so its argument and error types
/// are inferred.
pub fn handler_fn<F>(f: F) -> F
where
    F: FnMut(&OrderBookMessage<'_>) -> Result<(), HandlerError>,
{
    f
}

/// A recoverable per-message failure
#[derive(Debug)]
pub enum Fault<'a> {
    Decode {
        from: SocketAddr,
        len: usize,
        error: DecodeError,
    },
    Oversized {
        from: SocketAddr,
        limit: usize,
    },
    Handler {
        from: SocketAddr,
        id: i32,
        error: &'a HandlerError,
    },
    HandlerPanic {
        from: SocketAddr,
        id: i32,
        message: &'a str,
    },
    Receive {
        error: &'a io::Error,
    },
    SequenceGap {
        pair: &'a str,
        gap: Gap,
    },
}

impl Fault<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::Decode { error, .. } => error.kind(),
            Fault::Oversized { .. } => "oversized",
            Fault::Handler { .. } => "handler",
            Fault::HandlerPanic { .. } => "handler_panic",
            Fault::Receive { .. } => "receive",
            Fault::SequenceGap { .. } => "sequence_gap",
        }
    }
}

pub type FaultObserver = Box<dyn FnMut(&Fault<'_>) + Send>;

pub struct Dispatcher<H> {
    decoder: Decoder,
    handler: H,
    sequences: Option<SequenceTracker>,
    on_fault: Option<FaultObserver>,
    stats: FeedStats,
}

impl<H: Handler> Dispatcher<H> {
    pub fn new(decoder: Decoder, handler: H) -> Self {
        Dispatcher {
            decoder,
            handler,
            sequences: Some(SequenceTracker::new()),
            on_fault: None,
            stats: FeedStats::new(),
        }
    }

    pub fn track_sequence(&mut self, enabled: bool) {
        self.sequences = enabled.then(SequenceTracker::new);
    }

    pub fn set_fault_observer(&mut self, observer: FaultObserver) {
        self.on_fault = Some(observer);
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    pub fn into_stats(self) -> FeedStats {
        self.stats
    }

    /// Decode one datagram and hand it to the handler.
    ///
    /// Returns `true` if the handler was invoked and succeeded.
    pub fn process(&mut self, datagram: &RawDatagram<'_>) -> bool {
        self.stats.record_datagram(datagram.len());

        let started = Instant::now();
        let decoded = self.decoder.decode(datagram.bytes);
        self.stats
            .record_decode_latency(started.elapsed().as_nanos() as u64);

        let msg = match decoded {
            Ok(msg) => msg,
            Err(error) => {
                warn!(from = %datagram.from, len = datagram.len(), %error, "dropping undecodable datagram");
                self.stats.record_decode_failure(&error);
                self.report(&Fault::Decode {
                    from: datagram.from,
                    len: datagram.len(),
                    error,
                });
                return false;
            }
        };

        if let Some(gap) = self
            .sequences
            .as_mut()
            .and_then(|s| s.observe(msg.pair(), msg.id()))
        {
            warn!(
                pair = msg.pair(),
                first_missing = gap.first_missing,
                last_missing = gap.last_missing,
                "update id gap"
            );
            self.stats.record_gap(gap.size());
            self.report(&Fault::SequenceGap {
                pair: msg.pair(),
                gap,
            });
        }

        trace!(from = %datagram.from, id = msg.id(), pair = msg.pair(), "dispatching");
        let handler = &mut self.handler;
        match panic::catch_unwind(AssertUnwindSafe(|| handler.on_message(&msg))) {
            Ok(Ok(())) => {
                self.stats.record_dispatch();
                true
            }
            Ok(Err(error)) => {
                warn!(
                    from = %datagram.from,
                    len = datagram.len(),
                    id = msg.id(),
                    %error,
                    "handler failed"
                );
                self.stats.record_dispatch();
                self.stats.record_handler_failure();
                self.report(&Fault::Handler {
                    from: datagram.from,
                    id: msg.id(),
                    error: &error,
                });
                false
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(
                    from = %datagram.from,
                    len = datagram.len(),
                    id = msg.id(),
                    panic = message,
                    "handler panicked"
                );
                self.stats.record_dispatch();
                self.stats.record_handler_failure();
                self.report(&Fault::HandlerPanic {
                    from: datagram.from,
                    id: msg.id(),
                    message,
                });
                false
            }
        }
    }

    pub fn oversized(&mut self, from: SocketAddr, limit: usize) {
        warn!(%from, limit, "dropping oversized datagram");
        self.stats.record_oversized();
        self.report(&Fault::Oversized { from, limit });
    }

    pub fn receive_error(&mut self, error: &io::Error) {
        warn!(%error, "receive failed");
        self.stats.record_receive_error();
        self.report(&Fault::Receive { error });
    }

    fn report(&mut self, fault: &Fault<'_>) {
        if let Some(observer) = self.on_fault.as_mut() {
            observer(fault);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

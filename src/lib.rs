//! Orderbook Feed - UDP order book ingestion
//!
//! Receives order book updates encoded with an offset-table (flatbuffer
//! style) schema over UDP and hands typed, zero-copy views to a handler.
//! Features include:
//! - Bounds-checked wire accessors behind a swappable accessor trait
//! - Zero-copy decoding of strings and price level vectors
//! - Oversized datagram detection
//! - Per-message fault isolation with a structured fault observer
//! - Per-pair update id gap detection
//! - Cancellable receive loop with guaranteed socket release

pub mod config;
pub mod decoder;
pub mod dispatch;
#[doc(hidden)]
pub mod encoder;
pub mod error;
pub mod feed;
pub mod receiver;
pub mod schema;
pub mod sequence;
pub mod snapshot;
pub mod stats;
pub mod wire;

pub use config::FeedConfig;
pub use decoder::{decode, DecodeError, Decoder, OrderBookMessage};
pub use dispatch::{handler_fn, Fault, Handler, HandlerError};
#[doc(hidden)]
pub use encoder::BookEncoder;
pub use error::FeedError;
pub use feed::{Feed, FeedHandle, StopHandle};
pub use receiver::{DatagramReceiver, RawDatagram, ReceiveError};
pub use schema::{Levels, OrderbookAccessor, OrderbookTable, PriceLevel};
pub use sequence::{Gap, GapDetector, SequenceTracker};
pub use snapshot::{BookDepth, OrderBookSnapshot};
pub use stats::{DecodeFailures, FeedStats, LatencyStats};

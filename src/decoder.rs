//! Zero-copy orderbook decoder
//!
//! [`Decoder::decode`] validates a datagram against the `Orderbook` schema and
//! returns an [`OrderBookMessage`] whose string and level vectors point
//! directly into the original buffer. Every offset is checked before the view
//! is handed out, so the accessors on the message never fail.

use crate::schema::{
    Levels, OrderbookAccessor, OrderbookTable, FILE_IDENTIFIER, HEADER_SIZE, ROOT_OFFSET_SIZE,
};
use crate::snapshot::OrderBookSnapshot;
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated buffer: need at least {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("out of bounds: {len} bytes at offset {offset} exceed the buffer")]
    OutOfBounds { offset: usize, len: usize },

    #[error("schema mismatch: expected identifier {expected:?}, found {found:?}")]
    SchemaMismatch { expected: [u8; 4], found: [u8; 4] },

    #[error("invalid utf-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },
}

impl DecodeError {
    /// Short label used in logs and statistics
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::Truncated { .. } => "truncated",
            DecodeError::OutOfBounds { .. } => "out_of_bounds",
            DecodeError::SchemaMismatch { .. } => "schema_mismatch",
            DecodeError::InvalidUtf8 { .. } => "invalid_utf8",
        }
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Decoded orderbook update, borrowing the datagram it came from.
///
/// Copy it out with [`OrderBookMessage::to_snapshot`] to keep it past the
/// current receive iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderBookMessage<'a> {
    id: i32,
    pair: &'a str,
    bid: f32,
    ask: f32,
    bids: Levels<'a>,
    asks: Levels<'a>,
    low: f32,
    high: f32,
    last_price: f32,
    volume: f32,
}

impl<'a> OrderBookMessage<'a> {
    /// Update identifier, incremented by one per update of a pair
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn pair(&self) -> &'a str {
        self.pair
    }

    /// Best bid price
    pub fn bid(&self) -> f32 {
        self.bid
    }

    /// Best ask price
    pub fn ask(&self) -> f32 {
        self.ask
    }

    /// Bid levels in wire order
    pub fn bids(&self) -> Levels<'a> {
        self.bids
    }

    /// Ask levels in wire order
    pub fn asks(&self) -> Levels<'a> {
        self.asks
    }

    pub fn low(&self) -> f32 {
        self.low
    }

    pub fn high(&self) -> f32 {
        self.high
    }

    pub fn last_price(&self) -> f32 {
        self.last_price
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn to_snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot {
            id: self.id,
            pair: self.pair.to_owned(),
            bid: self.bid,
            ask: self.ask,
            bids: self.bids.to_vec(),
            asks: self.asks.to_vec(),
            low: self.low,
            high: self.high,
            last_price: self.last_price,
            volume: self.volume,
        }
    }
}

/// Orderbook decoder.
///
/// Stateless apart from whether the file identifier is enforced; decoding is
/// a single pure pass over the buffer.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    verify_identifier: bool,
}

impl Decoder {
    /// Decoder for plain buffers, as producers finish them
    pub const fn new() -> Self {
        Decoder {
            verify_identifier: false,
        }
    }

    /// Also require [`FILE_IDENTIFIER`] at bytes 4..8
    pub const fn with_identifier_check() -> Self {
        Decoder {
            verify_identifier: true,
        }
    }

    pub fn verifies_identifier(&self) -> bool {
        self.verify_identifier
    }

    /// Smallest buffer that can hold the header
    pub fn min_size(&self) -> usize {
        if self.verify_identifier {
            HEADER_SIZE
        } else {
            ROOT_OFFSET_SIZE
        }
    }

    /// Decode with the built-in accessor
    pub fn decode<'a>(&self, buffer: &'a [u8]) -> DecodeResult<OrderBookMessage<'a>> {
        self.decode_with::<OrderbookTable<'a>>(buffer)
    }

    /// Decode through any accessor backend
    pub fn decode_with<'a, A>(&self, buffer: &'a [u8]) -> DecodeResult<OrderBookMessage<'a>>
    where
        A: OrderbookAccessor<'a>,
    {
        let need = self.min_size();
        if buffer.len() < need {
            return Err(DecodeError::Truncated {
                need,
                have: buffer.len(),
            });
        }

        if self.verify_identifier {
            let mut found = [0u8; 4];
            found.copy_from_slice(&buffer[ROOT_OFFSET_SIZE..HEADER_SIZE]);
            if found != FILE_IDENTIFIER {
                return Err(DecodeError::SchemaMismatch {
                    expected: FILE_IDENTIFIER,
                    found,
                });
            }
        }

        let root = LittleEndian::read_u32(&buffer[..ROOT_OFFSET_SIZE]) as usize;
        let table = A::at(buffer, root)?;

        Ok(OrderBookMessage {
            id: table.id()?,
            pair: table.pair()?,
            bid: table.bid()?,
            ask: table.ask()?,
            bids: table.bids()?,
            asks: table.asks()?,
            low: table.low()?,
            high: table.high()?,
            last_price: table.last_price()?,
            volume: table.volume()?,
        })
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode with the default decoder
pub fn decode(buffer: &[u8]) -> DecodeResult<OrderBookMessage<'_>> {
    Decoder::new().decode(buffer)
}

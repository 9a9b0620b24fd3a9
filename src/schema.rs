//! Orderbook wire schema
//!
//! ```text
//! struct Level { price: float; qty: float; }
//!
//! table Orderbook {
//!     id: int;            // slot 0
//!     pair: string;       // slot 1
//!     bids: [Level];      // slot 2
//!     asks: [Level];      // slot 3
//!     low: float;         // slot 4
//!     high: float;        // slot 5
//!     last_price: float;  // slot 6
//!     volume: float;      // slot 7
//!     bid: float;         // slot 8
//!     ask: float;         // slot 9
//! }
//!
//! root_type Orderbook;
//! ```
//!
//! Producers finish buffers without a file identifier. [`FILE_IDENTIFIER`]
//! is only written and checked when both sides opt in.
//!
//! Slot numbers and the `Level` layout are a versioned contract with the
//! producer. Reordering or retyping a field is a breaking change.

use crate::decoder::DecodeResult;
use crate::wire::{Inline, Table, Vector};
use byteorder::{ByteOrder, LittleEndian};
use std::mem;

/// Optional file identifier at bytes 4..8
pub const FILE_IDENTIFIER: [u8; 4] = *b"OBK1";

/// Root offset (4) + file identifier (4)
pub const HEADER_SIZE: usize = 8;

/// Root offset only; the header of a buffer finished without an identifier
pub const ROOT_OFFSET_SIZE: usize = 4;

pub const SLOT_ID: u16 = 0;
pub const SLOT_PAIR: u16 = 1;
pub const SLOT_BIDS: u16 = 2;
pub const SLOT_ASKS: u16 = 3;
pub const SLOT_LOW: u16 = 4;
pub const SLOT_HIGH: u16 = 5;
pub const SLOT_LAST_PRICE: u16 = 6;
pub const SLOT_VOLUME: u16 = 7;
pub const SLOT_BID: u16 = 8;
pub const SLOT_ASK: u16 = 9;
pub const SLOT_COUNT: u16 = 10;

/// Levels per side in a full-depth book
pub const MAX_DEPTH: usize = 6;

/// Price used by producers to pad unused levels (negated on the bid side)
pub const PLACEHOLDER_PRICE: f32 = 9_999_999.999_9;

/// A resting (price, size) pair.
///
/// Wire layout: `price: f32` then `qty: f32`, 8 bytes, little-endian.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriceLevel {
    pub price: f32,
    pub qty: f32,
}

impl PriceLevel {
    pub const fn new(price: f32, qty: f32) -> Self {
        PriceLevel { price, qty }
    }

    /// Padding level emitted for an unfilled slot of a fixed-depth book
    pub fn is_placeholder(&self) -> bool {
        self.qty == 0.0 && self.price.abs() >= PLACEHOLDER_PRICE
    }

    pub fn bid_placeholder() -> Self {
        PriceLevel::new(-PLACEHOLDER_PRICE, 0.0)
    }

    pub fn ask_placeholder() -> Self {
        PriceLevel::new(PLACEHOLDER_PRICE, 0.0)
    }
}

impl Inline for PriceLevel {
    const SIZE: usize = 8;

    fn read(bytes: &[u8]) -> Self {
        PriceLevel {
            price: LittleEndian::read_f32(&bytes[0..4]),
            qty: LittleEndian::read_f32(&bytes[4..8]),
        }
    }
}

// Wire size must match the in-memory struct
const _: () = assert!(mem::size_of::<PriceLevel>() == <PriceLevel as Inline>::SIZE);

/// Zero-copy view of one side of the book
pub type Levels<'a> = Vector<'a, PriceLevel>;

/// Typed access to an `Orderbook` root table.
///
/// The decoder only talks to this trait, so a schema-compiler generated
/// backend can replace [`OrderbookTable`] without touching it. Every getter
/// must be pure and bounds-checked.
pub trait OrderbookAccessor<'a>: Sized {
    /// Locate the root table at `root` inside `buf`.
    fn at(buf: &'a [u8], root: usize) -> DecodeResult<Self>;

    fn id(&self) -> DecodeResult<i32>;
    fn pair(&self) -> DecodeResult<&'a str>;
    fn bids(&self) -> DecodeResult<Levels<'a>>;
    fn asks(&self) -> DecodeResult<Levels<'a>>;
    fn low(&self) -> DecodeResult<f32>;
    fn high(&self) -> DecodeResult<f32>;
    fn last_price(&self) -> DecodeResult<f32>;
    fn volume(&self) -> DecodeResult<f32>;
    fn bid(&self) -> DecodeResult<f32>;
    fn ask(&self) -> DecodeResult<f32>;
}

/// Hand-written accessor backed by [`Table`].
#[derive(Debug, Clone, Copy)]
pub struct OrderbookTable<'a> {
    table: Table<'a>,
}

impl<'a> OrderbookAccessor<'a> for OrderbookTable<'a> {
    fn at(buf: &'a [u8], root: usize) -> DecodeResult<Self> {
        Table::at(buf, root).map(|table| OrderbookTable { table })
    }

    fn id(&self) -> DecodeResult<i32> {
        self.table.scalar(SLOT_ID, 0)
    }

    fn pair(&self) -> DecodeResult<&'a str> {
        Ok(self.table.string(SLOT_PAIR)?.unwrap_or(""))
    }

    fn bids(&self) -> DecodeResult<Levels<'a>> {
        Ok(self.table.vector(SLOT_BIDS)?.unwrap_or_else(Vector::empty))
    }

    fn asks(&self) -> DecodeResult<Levels<'a>> {
        Ok(self.table.vector(SLOT_ASKS)?.unwrap_or_else(Vector::empty))
    }

    fn low(&self) -> DecodeResult<f32> {
        self.table.scalar(SLOT_LOW, 0.0)
    }

    fn high(&self) -> DecodeResult<f32> {
        self.table.scalar(SLOT_HIGH, 0.0)
    }

    fn last_price(&self) -> DecodeResult<f32> {
        self.table.scalar(SLOT_LAST_PRICE, 0.0)
    }

    fn volume(&self) -> DecodeResult<f32> {
        self.table.scalar(SLOT_VOLUME, 0.0)
    }

    fn bid(&self) -> DecodeResult<f32> {
        self.table.scalar(SLOT_BID, 0.0)
    }

    fn ask(&self) -> DecodeResult<f32> {
        self.table.scalar(SLOT_ASK, 0.0)
    }
}

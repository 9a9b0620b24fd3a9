//! Schema-conformant buffer builder
//!
//! Used by the tests, the decode benchmark and the synthetic feed generator.
//! Buffers are finished without a file identifier unless asked for one.
//! Lays a buffer out front to back as: header, vtable, root table, pair
//! string, bid vector, ask vector. Each field occupies four bytes in the
//! table; absent fields keep their space but get a zero vtable entry.

use crate::schema::{
    PriceLevel, FILE_IDENTIFIER, HEADER_SIZE, SLOT_ASK, SLOT_ASKS, SLOT_BID, SLOT_BIDS,
    SLOT_COUNT, SLOT_HIGH, SLOT_ID, SLOT_LAST_PRICE, SLOT_LOW, SLOT_PAIR, SLOT_VOLUME,
};
use crate::wire::{SOFFSET_SIZE, UOFFSET_SIZE, VOFFSET_SIZE, VTABLE_HEADER_SIZE};
use byteorder::{ByteOrder, LittleEndian};

const FIELD_SIZE: usize = 4;

pub const VTABLE_POS: usize = HEADER_SIZE;
pub const VTABLE_LEN: usize = VTABLE_HEADER_SIZE + SLOT_COUNT as usize * VOFFSET_SIZE;
pub const TABLE_POS: usize = VTABLE_POS + VTABLE_LEN;
pub const TABLE_LEN: usize = SOFFSET_SIZE + SLOT_COUNT as usize * FIELD_SIZE;

/// Absolute position of a field inside buffers built by [`BookEncoder`]
pub const fn field_position(slot: u16) -> usize {
    TABLE_POS + SOFFSET_SIZE + slot as usize * FIELD_SIZE
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

#[derive(Debug, Clone, Default)]
pub struct BookEncoder {
    id: Option<i32>,
    pair: Option<String>,
    bids: Option<Vec<PriceLevel>>,
    asks: Option<Vec<PriceLevel>>,
    low: Option<f32>,
    high: Option<f32>,
    last_price: Option<f32>,
    volume: Option<f32>,
    bid: Option<f32>,
    ask: Option<f32>,
    identifier: bool,
}

impl BookEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn pair(mut self, pair: impl Into<String>) -> Self {
        self.pair = Some(pair.into());
        self
    }

    pub fn bids(mut self, levels: &[PriceLevel]) -> Self {
        self.bids = Some(levels.to_vec());
        self
    }

    pub fn asks(mut self, levels: &[PriceLevel]) -> Self {
        self.asks = Some(levels.to_vec());
        self
    }

    pub fn bid(mut self, price: f32) -> Self {
        self.bid = Some(price);
        self
    }

    pub fn ask(mut self, price: f32) -> Self {
        self.ask = Some(price);
        self
    }

    pub fn ticker(mut self, low: f32, high: f32, last_price: f32, volume: f32) -> Self {
        self.low = Some(low);
        self.high = Some(high);
        self.last_price = Some(last_price);
        self.volume = Some(volume);
        self
    }

    /// Write [`FILE_IDENTIFIER`] into bytes 4..8, which are otherwise zero
    pub fn with_identifier(mut self) -> Self {
        self.identifier = true;
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        let pair_pos = TABLE_POS + TABLE_LEN;
        let pair_len = self.pair.as_ref().map_or(0, |p| p.len());
        let bids_pos = match self.pair {
            Some(_) => align4(pair_pos + UOFFSET_SIZE + pair_len + 1),
            None => pair_pos,
        };
        let bids_len = self.bids.as_ref().map_or(0, |v| vector_size(v));
        let asks_pos = bids_pos + bids_len;
        let asks_len = self.asks.as_ref().map_or(0, |v| vector_size(v));

        let mut buf = vec![0u8; asks_pos + asks_len];

        LittleEndian::write_u32(&mut buf[0..4], TABLE_POS as u32);
        if self.identifier {
            buf[4..8].copy_from_slice(&FILE_IDENTIFIER);
        }

        LittleEndian::write_u16(&mut buf[VTABLE_POS..], VTABLE_LEN as u16);
        LittleEndian::write_u16(&mut buf[VTABLE_POS + 2..], TABLE_LEN as u16);
        LittleEndian::write_i32(&mut buf[TABLE_POS..], (TABLE_POS - VTABLE_POS) as i32);

        if let Some(id) = self.id {
            let pos = present(&mut buf, SLOT_ID);
            LittleEndian::write_i32(&mut buf[pos..], id);
        }

        for (slot, value) in [
            (SLOT_LOW, self.low),
            (SLOT_HIGH, self.high),
            (SLOT_LAST_PRICE, self.last_price),
            (SLOT_VOLUME, self.volume),
            (SLOT_BID, self.bid),
            (SLOT_ASK, self.ask),
        ] {
            if let Some(value) = value {
                let pos = present(&mut buf, slot);
                LittleEndian::write_f32(&mut buf[pos..], value);
            }
        }

        if let Some(pair) = &self.pair {
            let pos = present(&mut buf, SLOT_PAIR);
            LittleEndian::write_u32(&mut buf[pos..], (pair_pos - pos) as u32);
            LittleEndian::write_u32(&mut buf[pair_pos..], pair.len() as u32);
            let start = pair_pos + UOFFSET_SIZE;
            buf[start..start + pair.len()].copy_from_slice(pair.as_bytes());
        }

        for (slot, levels, at) in [
            (SLOT_BIDS, &self.bids, bids_pos),
            (SLOT_ASKS, &self.asks, asks_pos),
        ] {
            if let Some(levels) = levels {
                let pos = present(&mut buf, slot);
                LittleEndian::write_u32(&mut buf[pos..], (at - pos) as u32);
                write_levels(&mut buf[at..], levels);
            }
        }

        buf
    }
}

/// Fill in the vtable entry for `slot` and return where its value goes
fn present(buf: &mut [u8], slot: u16) -> usize {
    let entry = VTABLE_POS + VTABLE_HEADER_SIZE + slot as usize * VOFFSET_SIZE;
    let pos = field_position(slot);
    LittleEndian::write_u16(&mut buf[entry..], (pos - TABLE_POS) as u16);
    pos
}

fn vector_size(levels: &[PriceLevel]) -> usize {
    UOFFSET_SIZE + levels.len() * 8
}

fn write_levels(out: &mut [u8], levels: &[PriceLevel]) {
    LittleEndian::write_u32(out, levels.len() as u32);
    for (i, level) in levels.iter().enumerate() {
        let at = UOFFSET_SIZE + i * 8;
        LittleEndian::write_f32(&mut out[at..], level.price);
        LittleEndian::write_f32(&mut out[at + 4..], level.qty);
    }
}

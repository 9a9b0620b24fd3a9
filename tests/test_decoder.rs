//! Wire format conformance and decoder tests

use byteorder::{ByteOrder, LittleEndian};
use orderbook_feed::encoder::{field_position, TABLE_POS};
use orderbook_feed::schema::{
    Levels, OrderbookAccessor, SLOT_ASKS, SLOT_BIDS, SLOT_ID, SLOT_PAIR,
};
use orderbook_feed::wire::Table;
use orderbook_feed::{
    decode, BookEncoder, DecodeError, Decoder, OrderBookSnapshot, PriceLevel,
};

fn reference_book() -> OrderBookSnapshot {
    OrderBookSnapshot {
        id: 42,
        pair: "BTC/USD".to_string(),
        bid: 10000.5,
        ask: 10001.0,
        bids: vec![PriceLevel::new(10000.5, 2.0)],
        asks: vec![PriceLevel::new(10001.0, 1.5)],
        ..Default::default()
    }
}

fn encode(book: &OrderBookSnapshot) -> Vec<u8> {
    BookEncoder::new()
        .id(book.id)
        .pair(book.pair.as_str())
        .bid(book.bid)
        .ask(book.ask)
        .ticker(book.low, book.high, book.last_price, book.volume)
        .bids(&book.bids)
        .asks(&book.asks)
        .finish()
}

#[test]
fn test_round_trip_reference_book() {
    let book = reference_book();
    let buf = encode(&book);
    let msg = decode(&buf).unwrap();

    assert_eq!(msg.id(), 42);
    assert_eq!(msg.pair(), "BTC/USD");
    assert_eq!(msg.bid(), 10000.5);
    assert_eq!(msg.ask(), 10001.0);
    assert_eq!(msg.bids().to_vec(), vec![PriceLevel::new(10000.5, 2.0)]);
    assert_eq!(msg.asks().to_vec(), vec![PriceLevel::new(10001.0, 1.5)]);
    assert_eq!(msg.to_snapshot(), book);
}

#[test]
fn test_round_trip_full_depth_with_placeholders() {
    let mut bids: Vec<PriceLevel> = (0..4)
        .map(|i| PriceLevel::new(6556.25 - i as f32, 0.25 * (i + 1) as f32))
        .collect();
    bids.extend([PriceLevel::bid_placeholder(), PriceLevel::bid_placeholder()]);
    let mut asks: Vec<PriceLevel> = (0..5)
        .map(|i| PriceLevel::new(6557.0 + i as f32, 0.5))
        .collect();
    asks.push(PriceLevel::ask_placeholder());

    let book = OrderBookSnapshot {
        id: -7,
        pair: "ETH:BTC".to_string(),
        bid: 6556.25,
        ask: 6557.0,
        bids,
        asks,
        low: 6400.0,
        high: 6600.5,
        last_price: 6556.75,
        volume: 812.125,
    };
    let buf = encode(&book);
    let msg = decode(&buf).unwrap();

    assert_eq!(msg.to_snapshot(), book);
    // placeholders are preserved on the wire view
    assert!(msg.bids().get(5).unwrap().is_placeholder());
    assert_eq!(msg.to_snapshot().bid_levels(), 4);
}

#[test]
fn test_decode_is_deterministic() {
    let buf = encode(&reference_book());
    let first = decode(&buf).unwrap();
    let second = decode(&buf).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.bids(), second.bids());
    assert_eq!(first.pair(), second.pair());
}

#[test]
fn test_every_short_buffer_is_truncated() {
    let buf = encode(&reference_book());
    for len in 0..4 {
        assert_eq!(
            decode(&buf[..len]),
            Err(DecodeError::Truncated { need: 4, have: len }),
            "length {}",
            len
        );
    }

    let checked = Decoder::with_identifier_check();
    for len in 0..8 {
        assert_eq!(
            checked.decode(&buf[..len]),
            Err(DecodeError::Truncated { need: 8, have: len }),
            "length {}",
            len
        );
    }
}

#[test]
fn test_every_prefix_fails_cleanly() {
    let buf = encode(&reference_book());
    for len in 0..buf.len() {
        assert!(decode(&buf[..len]).is_err(), "prefix of {} bytes decoded", len);
    }
    assert!(decode(&buf).is_ok());
}

#[test]
fn test_bid_vector_offset_past_end() {
    let mut buf = encode(&reference_book());
    let pos = field_position(SLOT_BIDS);
    let len = buf.len() as u32;
    LittleEndian::write_u32(&mut buf[pos..pos + 4], len);
    assert!(matches!(decode(&buf), Err(DecodeError::OutOfBounds { .. })));
}

#[test]
fn test_ask_vector_length_past_end() {
    let mut buf = encode(&reference_book());
    let pos = field_position(SLOT_ASKS);
    let target = pos + LittleEndian::read_u32(&buf[pos..pos + 4]) as usize;
    LittleEndian::write_u32(&mut buf[target..target + 4], 1_000);
    assert!(matches!(decode(&buf), Err(DecodeError::OutOfBounds { .. })));
}

#[test]
fn test_vector_length_overflow() {
    let mut buf = encode(&reference_book());
    let pos = field_position(SLOT_BIDS);
    let target = pos + LittleEndian::read_u32(&buf[pos..pos + 4]) as usize;
    LittleEndian::write_u32(&mut buf[target..target + 4], u32::MAX);
    assert!(matches!(decode(&buf), Err(DecodeError::OutOfBounds { .. })));
}

#[test]
fn test_string_length_past_end() {
    let mut buf = encode(&reference_book());
    let pos = field_position(SLOT_PAIR);
    let target = pos + LittleEndian::read_u32(&buf[pos..pos + 4]) as usize;
    LittleEndian::write_u32(&mut buf[target..target + 4], 4096);
    assert!(matches!(decode(&buf), Err(DecodeError::OutOfBounds { .. })));
}

#[test]
fn test_invalid_utf8_pair() {
    let mut buf = encode(&reference_book());
    let pos = field_position(SLOT_PAIR);
    let target = pos + LittleEndian::read_u32(&buf[pos..pos + 4]) as usize;
    buf[target + 4] = 0xFF;
    assert!(matches!(decode(&buf), Err(DecodeError::InvalidUtf8 { .. })));
}

#[test]
fn test_schema_identifier_mismatch() {
    let mut buf = BookEncoder::new().id(9).pair("BTC:USD").with_identifier().finish();
    let decoder = Decoder::with_identifier_check();
    assert_eq!(decoder.decode(&buf).unwrap().id(), 9);

    buf[4..8].copy_from_slice(b"OBK2");
    assert_eq!(
        decoder.decode(&buf),
        Err(DecodeError::SchemaMismatch {
            expected: *b"OBK1",
            found: *b"OBK2",
        })
    );
}

/// Book laid out as a flatbuffer builder finishes it without an identifier:
/// the vtable starts right after the root offset.
///
/// ```text
///  0  root offset -> 28
///  4  vtable: len 24, table len 28, slots id/pair/bids/asks/bid/ask
/// 28  table: soffset 24, id, pair, bids, asks, bid, ask
/// 56  "BTC/USD\0"
/// 68  bids [(10000.5, 2.0)]
/// 80  asks [(10001.0, 1.5)]
/// ```
fn producer_book() -> Vec<u8> {
    let mut buf = vec![0u8; 92];
    LittleEndian::write_u32(&mut buf[0..4], 28);

    LittleEndian::write_u16(&mut buf[4..6], 24);
    LittleEndian::write_u16(&mut buf[6..8], 28);
    for (slot, voffset) in [(0, 4), (1, 8), (2, 12), (3, 16), (8, 20), (9, 24)] {
        let entry = 8 + slot * 2;
        LittleEndian::write_u16(&mut buf[entry..entry + 2], voffset);
    }

    LittleEndian::write_i32(&mut buf[28..32], 24);
    LittleEndian::write_i32(&mut buf[32..36], 42);
    LittleEndian::write_u32(&mut buf[36..40], 56 - 36);
    LittleEndian::write_u32(&mut buf[40..44], 68 - 40);
    LittleEndian::write_u32(&mut buf[44..48], 80 - 44);
    LittleEndian::write_f32(&mut buf[48..52], 10000.5);
    LittleEndian::write_f32(&mut buf[52..56], 10001.0);

    LittleEndian::write_u32(&mut buf[56..60], 7);
    buf[60..67].copy_from_slice(b"BTC/USD");

    LittleEndian::write_u32(&mut buf[68..72], 1);
    LittleEndian::write_f32(&mut buf[72..76], 10000.5);
    LittleEndian::write_f32(&mut buf[76..80], 2.0);

    LittleEndian::write_u32(&mut buf[80..84], 1);
    LittleEndian::write_f32(&mut buf[84..88], 10001.0);
    LittleEndian::write_f32(&mut buf[88..92], 1.5);
    buf
}

#[test]
fn test_decode_producer_buffer_without_identifier() {
    let buf = producer_book();
    let msg = decode(&buf).unwrap();
    let expected = OrderBookSnapshot {
        id: 42,
        pair: "BTC/USD".to_string(),
        bid: 10000.5,
        ask: 10001.0,
        bids: vec![PriceLevel::new(10000.5, 2.0)],
        asks: vec![PriceLevel::new(10001.0, 1.5)],
        ..Default::default()
    };
    assert_eq!(msg.to_snapshot(), expected);
    assert_eq!(msg.low(), 0.0);

    // bytes 4..8 hold the vtable header, not an identifier
    assert!(matches!(
        Decoder::with_identifier_check().decode(&buf),
        Err(DecodeError::SchemaMismatch { found: [24, 0, 28, 0], .. })
    ));
}

#[test]
fn test_short_vtable_uses_defaults() {
    // Shrinking the vtable to cover only the id slot simulates an older
    // producer; every other field falls back to its default.
    let mut buf = encode(&reference_book());
    LittleEndian::write_u16(&mut buf[8..10], 6);
    let msg = decode(&buf).unwrap();
    assert_eq!(msg.id(), 42);
    assert_eq!(msg.pair(), "");
    assert!(msg.bids().is_empty());
}

#[test]
fn test_table_accessor_directly() {
    let buf = encode(&reference_book());
    let table = Table::at(&buf, TABLE_POS).unwrap();
    assert_eq!(table.scalar::<i32>(SLOT_ID, 0).unwrap(), 42);
    assert_eq!(table.string(SLOT_PAIR).unwrap(), Some("BTC/USD"));
}

/// Accessor backend that ignores the buffer; proves the decoder is driven
/// purely through the trait.
struct FixedBook;

impl<'a> OrderbookAccessor<'a> for FixedBook {
    fn at(_buf: &'a [u8], _root: usize) -> Result<Self, DecodeError> {
        Ok(FixedBook)
    }
    fn id(&self) -> Result<i32, DecodeError> {
        Ok(1)
    }
    fn pair(&self) -> Result<&'a str, DecodeError> {
        Ok("FIX/ED")
    }
    fn bids(&self) -> Result<Levels<'a>, DecodeError> {
        Ok(Levels::empty())
    }
    fn asks(&self) -> Result<Levels<'a>, DecodeError> {
        Ok(Levels::empty())
    }
    fn low(&self) -> Result<f32, DecodeError> {
        Ok(0.0)
    }
    fn high(&self) -> Result<f32, DecodeError> {
        Ok(0.0)
    }
    fn last_price(&self) -> Result<f32, DecodeError> {
        Ok(0.0)
    }
    fn volume(&self) -> Result<f32, DecodeError> {
        Ok(0.0)
    }
    fn bid(&self) -> Result<f32, DecodeError> {
        Ok(1.0)
    }
    fn ask(&self) -> Result<f32, DecodeError> {
        Err(DecodeError::OutOfBounds { offset: 0, len: 4 })
    }
}

#[test]
fn test_custom_accessor_backend() {
    let buf = encode(&reference_book());
    let result = Decoder::new().decode_with::<FixedBook>(&buf);
    assert_eq!(result, Err(DecodeError::OutOfBounds { offset: 0, len: 4 }));

    // header checks still run before the backend is consulted
    assert!(matches!(
        Decoder::new().decode_with::<FixedBook>(&buf[..3]),
        Err(DecodeError::Truncated { .. })
    ));
}

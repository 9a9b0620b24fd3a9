//! Owned order book snapshot
//!
//! A decoded message borrows the receive buffer, which is reused on the next
//! datagram. Handlers that need the book afterwards copy it into an
//! [`OrderBookSnapshot`]. Placeholder levels padding a fixed-depth book are
//! kept verbatim but skipped by the query helpers.

use crate::schema::PriceLevel;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderBookSnapshot {
    pub id: i32,
    pub pair: String,
    pub bid: f32,
    pub ask: f32,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub low: f32,
    pub high: f32,
    pub last_price: f32,
    pub volume: f32,
}

impl OrderBookSnapshot {
    /// Highest priced live bid level
    pub fn best_bid_level(&self) -> Option<PriceLevel> {
        live(&self.bids).max_by(by_price)
    }

    /// Lowest priced live ask level
    pub fn best_ask_level(&self) -> Option<PriceLevel> {
        live(&self.asks).min_by(by_price)
    }

    /// Get spread (best ask - best bid); `None` if a side is empty or crossed
    pub fn spread(&self) -> Option<f32> {
        match (self.best_bid_level(), self.best_ask_level()) {
            (Some(bid), Some(ask)) if bid.price < ask.price => Some(ask.price - bid.price),
            _ => None,
        }
    }

    pub fn mid_price(&self) -> Option<f32> {
        match (self.best_bid_level(), self.best_ask_level()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / 2.0),
            _ => None,
        }
    }

    /// Get market depth: top n live levels on each side, best first
    pub fn depth(&self, n: usize) -> BookDepth {
        let mut bids: Vec<PriceLevel> = live(&self.bids).collect();
        bids.sort_by(|a, b| by_price(b, a));
        bids.truncate(n);

        let mut asks: Vec<PriceLevel> = live(&self.asks).collect();
        asks.sort_by(by_price);
        asks.truncate(n);

        BookDepth { bids, asks }
    }

    pub fn bid_levels(&self) -> usize {
        live(&self.bids).count()
    }

    pub fn ask_levels(&self) -> usize {
        live(&self.asks).count()
    }
}

fn live(levels: &[PriceLevel]) -> impl Iterator<Item = PriceLevel> + '_ {
    levels.iter().copied().filter(|l| !l.is_placeholder())
}

fn by_price(a: &PriceLevel, b: &PriceLevel) -> Ordering {
    a.price.total_cmp(&b.price)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookDepth {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

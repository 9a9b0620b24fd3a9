//! Synthetic orderbook feed generator
//!
//! Sends random-walk, fixed-depth books for a few pairs as UDP datagrams.
//! Useful for exercising `orderbook-listen` locally.
//!
//! Usage: feed_generator [target] [count] [interval_ms]

use orderbook_feed::schema::MAX_DEPTH;
use orderbook_feed::{BookEncoder, PriceLevel};
use rand::Rng;
use std::env;
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

struct PairState {
    pair: &'static str,
    id: i32,
    mid: f32,
}

fn side(rng: &mut impl Rng, start: f32, step: f32, filled: usize, bids: bool) -> Vec<PriceLevel> {
    (0..MAX_DEPTH)
        .map(|i| {
            if i >= filled {
                // unfilled depth is padded the same way producers do
                if bids {
                    PriceLevel::bid_placeholder()
                } else {
                    PriceLevel::ask_placeholder()
                }
            } else {
                let price = start + step * i as f32;
                PriceLevel::new(price, rng.gen_range(0.01f32..5.0))
            }
        })
        .collect()
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();

    let target = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "127.0.0.1:38201".to_string());
    let message_count: usize = args.get(2).and_then(|a| a.parse().ok()).unwrap_or(10000);
    let interval = Duration::from_millis(args.get(3).and_then(|a| a.parse().ok()).unwrap_or(1));

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    let mut rng = rand::thread_rng();
    let mut pairs = [
        PairState { pair: "BTC:USD", id: 1, mid: 10_000.0 },
        PairState { pair: "ETH:USD", id: 1, mid: 300.0 },
        PairState { pair: "ETH:BTC", id: 1, mid: 0.03 },
    ];

    println!("Sending {} books to {}", message_count, target);

    for i in 0..message_count {
        let pick = rng.gen_range(0..pairs.len());
        let state = &mut pairs[pick];
        let tick = state.mid * 0.0001;
        state.mid += tick * rng.gen_range(-5.0f32..5.0);

        let best_bid = state.mid - tick;
        let best_ask = state.mid + tick;
        let bid_depth = rng.gen_range(1..=MAX_DEPTH);
        let ask_depth = rng.gen_range(1..=MAX_DEPTH);
        let bids = side(&mut rng, best_bid, -tick, bid_depth, true);
        let asks = side(&mut rng, best_ask, tick, ask_depth, false);

        let buf = BookEncoder::new()
            .id(state.id)
            .pair(state.pair)
            .bid(best_bid)
            .ask(best_ask)
            .ticker(state.mid * 0.95, state.mid * 1.05, state.mid, rng.gen_range(100.0f32..5000.0))
            .bids(&bids)
            .asks(&asks)
            .finish();
        state.id = state.id.wrapping_add(1);

        socket.send_to(&buf, &target)?;

        if i % 1000 == 0 && i > 0 {
            println!("Sent {} books", i);
        }
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }

    println!("Feed generation complete: {} books", message_count);

    Ok(())
}

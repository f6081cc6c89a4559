//! Scripted market data source for integration testing.
//!
//! Returns queued readings in order, then repeats the last one. All
//! state is in-memory with no external dependencies.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use velvet::market::{MarketDataSource, RawMarketData};

pub const PRICE: f64 = 3000.0;

#[derive(Clone)]
pub struct ScriptedMarket {
    queue: Arc<Mutex<VecDeque<RawMarketData>>>,
    last: Arc<Mutex<RawMarketData>>,
}

impl ScriptedMarket {
    /// One reading per 24h change, constant price and neutral sentiment.
    pub fn with_changes(changes: &[f64]) -> Self {
        let readings: Vec<RawMarketData> = changes.iter().map(|&c| reading(PRICE, c, 50)).collect();
        Self::new(readings)
    }

    pub fn new(readings: Vec<RawMarketData>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(readings.into_iter().collect())),
            last: Arc::new(Mutex::new(reading(PRICE, 0.0, 50))),
        }
    }
}

pub fn reading(price: f64, change_24h: f64, sentiment_score: u8) -> RawMarketData {
    RawMarketData {
        price,
        change_24h,
        gas_price_gwei: 20.0,
        sentiment_score,
    }
}

#[async_trait]
impl MarketDataSource for ScriptedMarket {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self) -> RawMarketData {
        let next = self.queue.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(data) = next {
            *last = data;
        }
        *last
    }
}

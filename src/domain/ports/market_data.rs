use crate::domain::error::ReviewError;
use crate::domain::values::strategy::CoinUniverse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub last_price: f64,
    pub price_change_pct_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    /// 24h traded value in the quote currency.
    pub quote_volume_24h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookDepth {
    /// Total quote value resting on the bid side within the fetched depth.
    pub bid_value: f64,
    pub ask_value: f64,
    pub best_bid: f64,
    pub best_ask: f64,
}

impl OrderBookDepth {
    /// Bid share of resting value, 0.5 when the book is empty.
    pub fn imbalance(&self) -> f64 {
        let total = self.bid_value + self.ask_value;
        if total <= 0.0 {
            0.5
        } else {
            self.bid_value / total
        }
    }

    pub fn spread_pct(&self) -> Option<f64> {
        if self.best_bid <= 0.0 || self.best_ask <= 0.0 {
            return None;
        }
        let mid = (self.best_bid + self.best_ask) / 2.0;
        Some((self.best_ask - self.best_bid) / mid * 100.0)
    }
}

/// Market-wide context not tied to a single symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    pub btc_dominance_pct: f64,
    pub volume_change_pct_24h: f64,
    pub news_rate_per_hour: f64,
    pub significant_news: Vec<String>,
}

/// Rate-limited market data source. Network and rate-limit failures
/// surface as [`ReviewError::Transient`].
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Symbols making up a coin universe, highest ranked first.
    async fn universe(&self, universe: CoinUniverse) -> Result<Vec<String>, ReviewError>;

    async fn ticker(&self, symbol: &str) -> Result<Ticker, ReviewError>;

    /// Most recent `limit` candles, oldest first.
    async fn candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, ReviewError>;

    async fn order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookDepth, ReviewError>;

    async fn global_metrics(&self) -> Result<GlobalMetrics, ReviewError>;
}

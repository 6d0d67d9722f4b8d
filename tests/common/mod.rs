//! Shared test helpers: scripted market data, a scripted AI judge and a
//! recommendation store that refuses to write.

#![allow(dead_code)]

use async_trait::async_trait;
use cryptoadvisor::application::retry::RetryPolicy;
use cryptoadvisor::config::AdvisorConfig;
use cryptoadvisor::domain::entities::discovery_recommendation::DiscoveryRecommendation;
use cryptoadvisor::domain::entities::portfolio_recommendation::PortfolioRecommendation;
use cryptoadvisor::domain::error::{DomainError, ReviewError};
use cryptoadvisor::domain::ports::ai_provider::{AiCandidate, AiJudgment, AiProvider, CandidateKind};
use cryptoadvisor::domain::ports::market_data::*;
use cryptoadvisor::domain::ports::recommendation_store::*;
use cryptoadvisor::domain::values::strategy::CoinUniverse;
use cryptoadvisor::{Collaborators, ReviewEngine};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 48 hourly candles in a choppy uptrend with rising volume. Scores well
/// above the pre-AI floor with low volatility.
pub fn strong_candles() -> Vec<Candle> {
    let mut close = 100.0;
    (0..48)
        .map(|i| {
            let open = close;
            close += if i % 2 == 0 { 1.0 } else { -0.6 };
            Candle {
                open_time_ms: i as i64 * 3_600_000,
                open,
                high: open.max(close) + 0.2,
                low: open.min(close) - 0.2,
                close,
                volume: if i >= 42 { 200.0 } else { 100.0 },
            }
        })
        .collect()
}

/// 48 hourly candles in a steady decline. Scores far below the floor.
pub fn weak_candles() -> Vec<Candle> {
    (0..48)
        .map(|i| {
            let close = 100.0 - 0.3 * i as f64;
            Candle {
                open_time_ms: i as i64 * 3_600_000,
                open: close + 0.3,
                high: close + 0.4,
                low: close - 0.1,
                close,
                volume: 100.0,
            }
        })
        .collect()
}

pub fn ticker(symbol: &str, price: f64, change_pct: f64, high: f64, quote_volume: f64) -> Ticker {
    Ticker {
        symbol: symbol.to_string(),
        last_price: price,
        price_change_pct_24h: change_pct,
        high_24h: high,
        low_24h: price * 0.9,
        quote_volume_24h: quote_volume,
    }
}

#[derive(Default)]
pub struct FakeMarket {
    universe: Vec<String>,
    tickers: HashMap<String, Ticker>,
    candles: HashMap<String, Vec<Candle>>,
    /// Delay applied to every universe fetch.
    delay: Option<Duration>,
    fail_universe: bool,
    pub universe_calls: AtomicUsize,
}

impl FakeMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol to the universe, optionally with ticker and candles.
    pub fn coin(mut self, symbol: &str, ticker: Option<Ticker>, candles: Option<Vec<Candle>>) -> Self {
        self.universe.push(symbol.to_string());
        if let Some(t) = ticker {
            self.tickers.insert(symbol.to_string(), t);
        }
        if let Some(c) = candles {
            self.candles.insert(symbol.to_string(), c);
        }
        self
    }

    /// A ticker for a symbol outside the universe (e.g. a held position).
    pub fn quote(mut self, t: Ticker) -> Self {
        self.tickers.insert(t.symbol.clone(), t);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_universe(mut self) -> Self {
        self.fail_universe = true;
        self
    }
}

#[async_trait]
impl MarketDataProvider for FakeMarket {
    fn name(&self) -> &str {
        "fake"
    }

    async fn universe(&self, universe: CoinUniverse) -> Result<Vec<String>, ReviewError> {
        self.universe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_universe {
            return Err(ReviewError::Transient("exchange unavailable".into()));
        }
        Ok(self.universe.iter().take(universe.size()).cloned().collect())
    }

    async fn ticker(&self, symbol: &str) -> Result<Ticker, ReviewError> {
        self.tickers
            .get(symbol)
            .cloned()
            .ok_or_else(|| ReviewError::Validation(format!("unknown symbol {symbol}")))
    }

    async fn candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, ReviewError> {
        let candles = self
            .candles
            .get(symbol)
            .ok_or_else(|| ReviewError::Validation(format!("no candles for {symbol}")))?;
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }

    async fn order_book(&self, _symbol: &str, _depth: usize) -> Result<OrderBookDepth, ReviewError> {
        Ok(OrderBookDepth {
            bid_value: 70_000.0,
            ask_value: 30_000.0,
            best_bid: 99.95,
            best_ask: 100.05,
        })
    }

    async fn global_metrics(&self) -> Result<GlobalMetrics, ReviewError> {
        Ok(GlobalMetrics {
            btc_dominance_pct: 52.0,
            ..GlobalMetrics::default()
        })
    }
}

/// Accepts everything with a fixed confidence unless told otherwise.
pub struct ScriptedJudge {
    confidence: f64,
    rejected_buys: Vec<String>,
    rejected_sells: Vec<String>,
    pub calls: AtomicUsize,
}

impl ScriptedJudge {
    pub fn accepting(confidence: f64) -> Self {
        Self {
            confidence,
            rejected_buys: Vec::new(),
            rejected_sells: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn reject_buy(mut self, symbol: &str) -> Self {
        self.rejected_buys.push(symbol.to_string());
        self
    }

    pub fn reject_sell(mut self, symbol: &str) -> Self {
        self.rejected_sells.push(symbol.to_string());
        self
    }
}

#[async_trait]
impl AiProvider for ScriptedJudge {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn judge(&self, candidate: &AiCandidate) -> Result<AiJudgment, ReviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rejected = match candidate.kind {
            CandidateKind::Buy => &self.rejected_buys,
            CandidateKind::Sell => &self.rejected_sells,
        };
        let accept = !rejected.contains(&candidate.symbol);
        Ok(AiJudgment {
            accept,
            confidence: self.confidence,
            reasoning: format!("scripted verdict for {}", candidate.symbol),
        })
    }
}

/// Reads go to the inner store; batch writes always fail.
pub struct FailingStore {
    pub inner: Arc<dyn RecommendationStore>,
    pub attempts: Mutex<usize>,
}

impl RecommendationStore for FailingStore {
    fn insert_discovery(&self, rec: &DiscoveryRecommendation) -> Result<(), DomainError> {
        self.inner.insert_discovery(rec)
    }

    fn insert_portfolio(&self, rec: &PortfolioRecommendation) -> Result<(), DomainError> {
        self.inner.insert_portfolio(rec)
    }

    fn insert_batch(&self, _batch: &RecommendationBatch) -> Result<(), DomainError> {
        *self.attempts.lock().unwrap() += 1;
        Err(DomainError::Database("disk I/O error".into()))
    }

    fn query_discovery(&self, filter: &RecommendationFilter) -> Result<Vec<DiscoveryRecommendation>, DomainError> {
        self.inner.query_discovery(filter)
    }

    fn query_portfolio(&self, filter: &RecommendationFilter) -> Result<Vec<PortfolioRecommendation>, DomainError> {
        self.inner.query_portfolio(filter)
    }
}

pub fn test_config() -> AdvisorConfig {
    let mut config = AdvisorConfig::default();
    config.retry = RetryPolicy {
        max_attempts: 2,
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        call_timeout: Duration::from_secs(2),
    };
    config.scheduler.max_run_duration = Duration::from_secs(10);
    config
}

pub fn setup(market: FakeMarket, judge: ScriptedJudge) -> ReviewEngine {
    setup_with(market, judge, test_config())
}

pub fn setup_with(market: FakeMarket, judge: ScriptedJudge, config: AdvisorConfig) -> ReviewEngine {
    ReviewEngine::with_providers(":memory:", config, Arc::new(market), Arc::new(judge)).unwrap()
}

/// Five-coin universe exercising every discovery outcome:
/// BTC accepted, ETH rejected by the judge, SOL below the pre-AI floor,
/// SHIB illiquid, DOGE without a ticker.
pub fn mixed_market() -> FakeMarket {
    FakeMarket::new()
        .coin("BTCUSDT", Some(ticker("BTCUSDT", 61_000.0, 2.0, 62_500.0, 5e9)), Some(strong_candles()))
        .coin("ETHUSDT", Some(ticker("ETHUSDT", 3_050.0, 1.0, 3_500.0, 2e9)), Some(strong_candles()))
        .coin("SOLUSDT", Some(ticker("SOLUSDT", 140.0, -3.0, 150.0, 8e8)), Some(weak_candles()))
        .coin("SHIBUSDT", Some(ticker("SHIBUSDT", 0.00002, 0.5, 0.000021, 1e3)), Some(strong_candles()))
        .coin("DOGEUSDT", None, None)
}

pub fn collaborators_with_failing_store(market: FakeMarket, judge: ScriptedJudge) -> (Collaborators, Arc<FailingStore>) {
    let mut c = Collaborators::sqlite(":memory:", Arc::new(market), Arc::new(judge)).unwrap();
    let failing = Arc::new(FailingStore {
        inner: c.recommendations.clone(),
        attempts: Mutex::new(0),
    });
    c.recommendations = failing.clone();
    (c, failing)
}

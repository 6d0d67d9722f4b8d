//! Discovery recommendation generator: scans a coin universe and emits
//! global buy candidates.
//!
//! Each candidate is scored locally from candles and order-book depth first.
//! Candidates below the pre-AI confidence floor are skipped without calling
//! the AI provider; the rest are judged, then checked against the strategy's
//! confidence and risk limits.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::debug;

use crate::application::retry::{with_retry, RetryPolicy};
use crate::domain::entities::discovery_recommendation::DiscoveryRecommendation;
use crate::domain::error::ReviewError;
use crate::domain::ports::ai_provider::{AiCandidate, AiProvider, CandidateKind};
use crate::domain::ports::market_data::{Candle, MarketDataProvider, OrderBookDepth, Ticker};
use crate::domain::values::confidence::Confidence;
use crate::domain::values::risk_level::RiskLevel;
use crate::domain::values::strategy::{CoinUniverse, Strategy};

const MIN_CANDLES: usize = 15;
const RSI_PERIOD: usize = 14;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Hourly candles fetched per candidate.
    pub candle_limit: usize,
    pub order_book_depth: usize,
    /// Candidates scoring below this are skipped before any AI call.
    pub min_pre_ai_confidence: f64,
    pub max_concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            candle_limit: 48,
            order_book_depth: 20,
            min_pre_ai_confidence: 0.55,
            max_concurrency: 4,
        }
    }
}

/// A symbol that survived filtering, with the ticker fetched during discovery.
#[derive(Debug, Clone)]
pub struct CoinCandidate {
    pub symbol: String,
    pub ticker: Ticker,
}

#[derive(Debug, Clone)]
pub struct DiscoveryBatch {
    pub strategy: Strategy,
    pub universe: CoinUniverse,
    pub candidates: Vec<CoinCandidate>,
}

#[derive(Debug, Default, Serialize)]
pub struct DiscoveryOutcome {
    pub accepted: Vec<DiscoveryRecommendation>,
    pub skipped: u32,
    pub ai_rejected: u32,
}

/// Local technical + order-book score of a candidate.
#[derive(Debug, Clone, Serialize)]
pub struct TechnicalScore {
    pub momentum_pct: f64,
    pub rsi: f64,
    pub volume_trend: f64,
    pub book_imbalance: f64,
    /// Standard deviation of close-to-close returns, in percent.
    pub volatility_pct: f64,
    /// Weighted blend in `[0, 1]`.
    pub composite: f64,
}

impl TechnicalScore {
    pub fn compute(candles: &[Candle], book: &OrderBookDepth) -> Result<Self, ReviewError> {
        if candles.len() < MIN_CANDLES {
            return Err(ReviewError::Validation(format!(
                "need at least {MIN_CANDLES} candles, got {}",
                candles.len()
            )));
        }
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        if closes.iter().any(|c| !c.is_finite() || *c <= 0.0) {
            return Err(ReviewError::Validation("non-positive close price".into()));
        }

        let first = closes[0];
        let last = closes[closes.len() - 1];
        let momentum_pct = (last / first - 1.0) * 100.0;
        let rsi = relative_strength_index(&closes, RSI_PERIOD);
        let volume_trend = volume_trend(candles);
        let book_imbalance = book.imbalance();
        let volatility_pct = return_stddev_pct(&closes);

        let momentum_score = ((momentum_pct / 10.0).clamp(-1.0, 1.0) + 1.0) / 2.0;
        let rsi_score = 1.0 - ((rsi - 55.0).abs() / 45.0).min(1.0);
        let volume_score = ((volume_trend - 1.0).clamp(-1.0, 1.0) + 1.0) / 2.0;

        let composite = (0.35 * momentum_score
            + 0.25 * rsi_score
            + 0.20 * volume_score
            + 0.20 * book_imbalance)
            .clamp(0.0, 1.0);

        Ok(Self {
            momentum_pct,
            rsi,
            volume_trend,
            book_imbalance,
            volatility_pct,
            composite,
        })
    }
}

fn relative_strength_index(closes: &[f64], period: usize) -> f64 {
    let start = closes.len().saturating_sub(period + 1);
    let window = &closes[start..];
    let (mut gains, mut losses) = (0.0, 0.0);
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    if losses == 0.0 {
        return if gains == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = gains / losses;
    100.0 - 100.0 / (1.0 + rs)
}

/// Recent average volume over the earlier average. 1.0 means flat.
fn volume_trend(candles: &[Candle]) -> f64 {
    let split = candles.len().saturating_sub(6);
    let (earlier, recent) = candles.split_at(split);
    let avg = |cs: &[Candle]| {
        if cs.is_empty() {
            0.0
        } else {
            cs.iter().map(|c| c.volume).sum::<f64>() / cs.len() as f64
        }
    };
    let before = avg(earlier);
    if before <= 0.0 {
        1.0
    } else {
        avg(recent) / before
    }
}

fn return_stddev_pct(closes: &[f64]) -> f64 {
    let returns: Vec<f64> = closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    if returns.is_empty() {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    var.sqrt() * 100.0
}

enum Verdict {
    Accepted(Box<DiscoveryRecommendation>),
    Skipped,
    AiRejected,
}

pub struct DiscoveryRecommendationGenerator {
    market: Arc<dyn MarketDataProvider>,
    ai: Arc<dyn AiProvider>,
    config: DiscoveryConfig,
    retry: RetryPolicy,
}

impl DiscoveryRecommendationGenerator {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        ai: Arc<dyn AiProvider>,
        config: DiscoveryConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            market,
            ai,
            config,
            retry,
        }
    }

    pub async fn generate(&self, batch: &DiscoveryBatch) -> DiscoveryOutcome {
        let now = Utc::now();
        let jobs: Vec<_> = batch
            .candidates
            .iter()
            .map(|c| self.evaluate(c, batch.strategy, batch.universe, now))
            .collect();
        let verdicts: Vec<Verdict> = stream::iter(jobs)
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut outcome = DiscoveryOutcome::default();
        for verdict in verdicts {
            match verdict {
                Verdict::Accepted(rec) => outcome.accepted.push(*rec),
                Verdict::Skipped => outcome.skipped += 1,
                Verdict::AiRejected => outcome.ai_rejected += 1,
            }
        }
        outcome.accepted.sort_by(|a, b| {
            b.discovery_score
                .partial_cmp(&a.discovery_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        outcome
    }

    async fn evaluate(
        &self,
        candidate: &CoinCandidate,
        strategy: Strategy,
        universe: CoinUniverse,
        now: DateTime<Utc>,
    ) -> Verdict {
        let symbol = candidate.symbol.as_str();

        let candles = match with_retry(&self.retry, "candles", || {
            self.market.candles(symbol, self.config.candle_limit)
        })
        .await
        {
            Ok(c) => c,
            Err(e) => {
                debug!(symbol, "Skipping candidate, candles unavailable: {e}");
                return Verdict::Skipped;
            }
        };
        let book = match with_retry(&self.retry, "order_book", || {
            self.market.order_book(symbol, self.config.order_book_depth)
        })
        .await
        {
            Ok(b) => b,
            Err(e) => {
                debug!(symbol, "Skipping candidate, order book unavailable: {e}");
                return Verdict::Skipped;
            }
        };

        let score = match TechnicalScore::compute(&candles, &book) {
            Ok(s) => s,
            Err(e) => {
                debug!(symbol, "Skipping candidate: {e}");
                return Verdict::Skipped;
            }
        };
        if score.composite < self.config.min_pre_ai_confidence {
            debug!(symbol, score = score.composite, "Below pre-AI confidence floor");
            return Verdict::Skipped;
        }

        let ai_candidate = AiCandidate {
            kind: CandidateKind::Buy,
            symbol: symbol.to_string(),
            score: score.composite,
            summary: format!(
                "{symbol} {strategy} buy: {:+.2}% momentum, RSI {:.1}, volume x{:.2}, bid share {:.0}%",
                score.momentum_pct,
                score.rsi,
                score.volume_trend,
                score.book_imbalance * 100.0
            ),
            features: BTreeMap::from([
                ("momentum_pct".to_string(), score.momentum_pct),
                ("rsi".to_string(), score.rsi),
                ("volume_trend".to_string(), score.volume_trend),
                ("book_imbalance".to_string(), score.book_imbalance),
                ("volatility_pct".to_string(), score.volatility_pct),
                ("change_24h_pct".to_string(), candidate.ticker.price_change_pct_24h),
            ]),
        };
        let judgment = match with_retry(&self.retry, "ai_judge", || self.ai.judge(&ai_candidate))
            .await
            .and_then(|j| j.validate().map(|_| j))
        {
            Ok(j) => j,
            Err(e) => {
                debug!(symbol, "Skipping candidate, AI judgment unavailable: {e}");
                return Verdict::Skipped;
            }
        };
        if !judgment.accept {
            return Verdict::AiRejected;
        }

        let risk_level = RiskLevel::from_return_stddev(score.volatility_pct);
        if judgment.confidence < strategy.min_confidence() || risk_level > strategy.max_risk() {
            debug!(
                symbol,
                confidence = judgment.confidence,
                risk = %risk_level,
                "Accepted by AI but outside {strategy} limits"
            );
            return Verdict::AiRejected;
        }

        let rec = build_recommendation(
            candidate,
            strategy,
            universe,
            &score,
            risk_level,
            judgment.confidence,
            judgment.reasoning,
            self.ai.name(),
            now,
        );
        if !rec.is_well_formed() {
            debug!(symbol, "Discarding malformed recommendation");
            return Verdict::Skipped;
        }
        Verdict::Accepted(Box::new(rec))
    }
}

#[allow(clippy::too_many_arguments)]
fn build_recommendation(
    candidate: &CoinCandidate,
    strategy: Strategy,
    universe: CoinUniverse,
    score: &TechnicalScore,
    risk_level: RiskLevel,
    confidence: f64,
    reasoning: String,
    ai_name: &str,
    now: DateTime<Utc>,
) -> DiscoveryRecommendation {
    let entry = candidate.ticker.last_price;
    let stop_fraction = strategy.stop_loss_fraction();
    let position_size_pct = (strategy.max_position_pct() * confidence * 100.0).round() / 100.0;

    DiscoveryRecommendation {
        id: uuid::Uuid::new_v4().to_string(),
        symbol: candidate.symbol.clone(),
        strategy,
        coin_universe: universe,
        confidence: Confidence::clamped(confidence),
        entry_price: entry,
        stop_loss: entry * (1.0 - stop_fraction),
        take_profit_levels: [
            entry * (1.0 + stop_fraction * 1.5),
            entry * (1.0 + stop_fraction * 3.0),
        ],
        position_size_pct,
        risk_level,
        reasoning,
        sources: vec![
            "candles".to_string(),
            "order_book".to_string(),
            format!("ai:{ai_name}"),
        ],
        discovery_score: (score.composite * 1000.0).round() / 10.0,
        created_at: now,
        expires_at: now + Duration::hours(strategy.ttl_hours()),
    }
}

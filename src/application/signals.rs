//! Builds raw market signals from universe tickers and provider metrics.

use crate::domain::ports::market_data::{GlobalMetrics, Ticker};
use crate::domain::values::market_conditions::{MarketSignals, TopMover};

const TOP_MOVERS: usize = 5;

pub fn collect_signals(tickers: &[Ticker], metrics: &GlobalMetrics) -> MarketSignals {
    let changes: Vec<f64> = tickers
        .iter()
        .map(|t| t.price_change_pct_24h)
        .filter(|c| c.is_finite())
        .collect();

    let (drift, abs_move) = if changes.is_empty() {
        (0.0, 0.0)
    } else {
        let n = changes.len() as f64;
        (
            changes.iter().sum::<f64>() / n,
            changes.iter().map(|c| c.abs()).sum::<f64>() / n,
        )
    };

    let mut movers: Vec<TopMover> = tickers
        .iter()
        .filter(|t| t.price_change_pct_24h.is_finite())
        .map(|t| TopMover {
            symbol: t.symbol.clone(),
            change_pct: t.price_change_pct_24h,
        })
        .collect();
    movers.sort_by(|a, b| {
        b.change_pct
            .abs()
            .partial_cmp(&a.change_pct.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    movers.truncate(TOP_MOVERS);

    MarketSignals {
        price_movement_pct: drift,
        abs_price_movement_pct: abs_move,
        volume_change_pct: metrics.volume_change_pct_24h,
        news_rate_per_hour: metrics.news_rate_per_hour,
        btc_dominance_pct: metrics.btc_dominance_pct,
        top_movers: movers,
        significant_news: metrics.significant_news.clone(),
    }
}

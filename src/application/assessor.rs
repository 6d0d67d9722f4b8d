//! Market condition assessment.
//!
//! Turns raw [`MarketSignals`] into a [`MarketConditions`] snapshot: a
//! volatility level, a market regime and the interval until the next review.
//! All thresholds live in an [`AssessorTable`] so they can be tuned without
//! touching the orchestration code. The assessment is pure and
//! deterministic.

use serde::Serialize;

use crate::domain::values::market_conditions::{
    MarketConditions, MarketRegime, MarketSignals, VolatilityLevel,
};

/// A row of the volatility table. A level applies when either bound is met.
#[derive(Debug, Clone, Serialize)]
pub struct VolatilityThreshold {
    pub level: VolatilityLevel,
    pub min_abs_movement_pct: f64,
    pub min_volume_change_pct: f64,
}

/// Base review interval per volatility level, in minutes.
#[derive(Debug, Clone, Serialize)]
pub struct IntervalTable {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub extreme: f64,
}

impl IntervalTable {
    pub fn base_minutes(&self, level: VolatilityLevel) -> f64 {
        match level {
            VolatilityLevel::Low => self.low,
            VolatilityLevel::Medium => self.medium,
            VolatilityLevel::High => self.high,
            VolatilityLevel::Extreme => self.extreme,
        }
    }
}

/// Interval multiplier per regime.
#[derive(Debug, Clone, Serialize)]
pub struct RegimeMultipliers {
    pub bull: f64,
    pub bear: f64,
    pub sideways: f64,
    pub volatile: f64,
}

impl RegimeMultipliers {
    pub fn factor(&self, regime: MarketRegime) -> f64 {
        match regime {
            MarketRegime::Bull => self.bull,
            MarketRegime::Bear => self.bear,
            MarketRegime::Sideways => self.sideways,
            MarketRegime::Volatile => self.volatile,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessorTable {
    /// Checked top-down, most severe level first. No match means `Low`.
    pub volatility: Vec<VolatilityThreshold>,
    /// Mean signed 24h move beyond which the market is trending.
    pub trend_threshold_pct: f64,
    pub intervals: IntervalTable,
    pub regimes: RegimeMultipliers,
    pub high_news_rate_per_hour: f64,
    pub news_multiplier: f64,
    pub min_interval_minutes: u32,
    pub max_interval_minutes: u32,
}

impl Default for AssessorTable {
    fn default() -> Self {
        Self {
            volatility: vec![
                VolatilityThreshold {
                    level: VolatilityLevel::Extreme,
                    min_abs_movement_pct: 8.0,
                    min_volume_change_pct: 150.0,
                },
                VolatilityThreshold {
                    level: VolatilityLevel::High,
                    min_abs_movement_pct: 5.0,
                    min_volume_change_pct: 75.0,
                },
                VolatilityThreshold {
                    level: VolatilityLevel::Medium,
                    min_abs_movement_pct: 2.0,
                    min_volume_change_pct: 30.0,
                },
            ],
            trend_threshold_pct: 2.0,
            intervals: IntervalTable {
                low: 240.0,
                medium: 120.0,
                high: 45.0,
                extreme: 10.0,
            },
            regimes: RegimeMultipliers {
                bull: 0.8,
                bear: 0.7,
                sideways: 1.0,
                volatile: 0.5,
            },
            high_news_rate_per_hour: 10.0,
            news_multiplier: 0.75,
            min_interval_minutes: 5,
            max_interval_minutes: 240,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketConditionAssessor {
    table: AssessorTable,
}

impl MarketConditionAssessor {
    pub fn new(table: AssessorTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AssessorTable {
        &self.table
    }

    pub fn assess(&self, signals: &MarketSignals) -> MarketConditions {
        let volatility = self.classify_volatility(signals);
        let regime = self.classify_regime(volatility, signals);
        let news_rate = finite_or_zero(signals.news_rate_per_hour);

        MarketConditions {
            volatility_level: volatility,
            volume_change_pct: finite_or_zero(signals.volume_change_pct),
            price_movement_pct: finite_or_zero(signals.price_movement_pct),
            news_rate_per_hour: news_rate,
            btc_dominance_pct: finite_or_zero(signals.btc_dominance_pct),
            market_regime: regime,
            review_interval_minutes: self.interval_minutes(volatility, regime, news_rate),
            top_movers: signals.top_movers.clone(),
            significant_news: signals.significant_news.clone(),
        }
    }

    pub fn classify_volatility(&self, signals: &MarketSignals) -> VolatilityLevel {
        let movement = finite_or_zero(signals.abs_price_movement_pct).abs();
        let volume = finite_or_zero(signals.volume_change_pct).abs();
        self.table
            .volatility
            .iter()
            .find(|row| movement >= row.min_abs_movement_pct || volume >= row.min_volume_change_pct)
            .map(|row| row.level)
            .unwrap_or(VolatilityLevel::Low)
    }

    pub fn classify_regime(&self, volatility: VolatilityLevel, signals: &MarketSignals) -> MarketRegime {
        let drift = finite_or_zero(signals.price_movement_pct);
        if volatility == VolatilityLevel::Extreme {
            MarketRegime::Volatile
        } else if drift >= self.table.trend_threshold_pct {
            MarketRegime::Bull
        } else if drift <= -self.table.trend_threshold_pct {
            MarketRegime::Bear
        } else if volatility == VolatilityLevel::High {
            MarketRegime::Volatile
        } else {
            MarketRegime::Sideways
        }
    }

    /// Review interval for a classified market, clamped to the configured bounds.
    pub fn interval_minutes(&self, volatility: VolatilityLevel, regime: MarketRegime, news_rate: f64) -> u32 {
        let mut minutes =
            self.table.intervals.base_minutes(volatility) * self.table.regimes.factor(regime);
        if news_rate >= self.table.high_news_rate_per_hour {
            minutes *= self.table.news_multiplier;
        }
        self.clamp_interval(minutes)
    }

    fn clamp_interval(&self, minutes: f64) -> u32 {
        let lo = self.table.min_interval_minutes.min(self.table.max_interval_minutes);
        let hi = self.table.min_interval_minutes.max(self.table.max_interval_minutes);
        if !minutes.is_finite() || minutes <= lo as f64 {
            return lo;
        }
        if minutes >= hi as f64 {
            return hi;
        }
        (minutes.round() as u32).max(lo).min(hi)
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

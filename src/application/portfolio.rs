//! Portfolio recommendation generator: per-user sell advice on open
//! positions.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::debug;

use crate::application::retry::{with_retry, RetryPolicy};
use crate::application::tier_gate::{RequestedWork, TierDecision, TierGate};
use crate::domain::entities::portfolio_recommendation::{position_pnl, PortfolioRecommendation};
use crate::domain::entities::position::Position;
use crate::domain::error::DomainError;
use crate::domain::ports::ai_provider::{AiCandidate, AiProvider, CandidateKind};
use crate::domain::ports::market_data::MarketDataProvider;
use crate::domain::values::confidence::Confidence;
use crate::domain::values::risk_level::RiskLevel;
use crate::domain::values::sell_reason::SellReason;
use crate::domain::values::tier::UserTierInfo;

#[derive(Debug, Clone)]
pub struct SellRuleConfig {
    /// Price within this percent above the stop counts as at the stop.
    pub stop_proximity_pct: f64,
    /// Stop distance used when a position has no explicit stop.
    pub default_stop_fraction: f64,
    pub profit_target_pct: f64,
    /// 24h drop that signals fading momentum on a winning position.
    pub momentum_drop_pct: f64,
    /// Price within this percent of the 24h high counts as at resistance.
    pub resistance_proximity_pct: f64,
    pub ttl_hours: i64,
    pub max_concurrency: usize,
}

impl Default for SellRuleConfig {
    fn default() -> Self {
        Self {
            stop_proximity_pct: 2.0,
            default_stop_fraction: 0.10,
            profit_target_pct: 20.0,
            momentum_drop_pct: 5.0,
            resistance_proximity_pct: 1.0,
            ttl_hours: 24,
            max_concurrency: 4,
        }
    }
}

/// A position marked to the current market.
#[derive(Debug, Clone)]
pub struct PositionSnapshot<'a> {
    pub position: &'a Position,
    pub current_price: f64,
    pub change_24h_pct: f64,
    pub high_24h: f64,
    pub unrealized_pnl: f64,
    pub percent_gain: f64,
}

impl<'a> PositionSnapshot<'a> {
    pub fn new(position: &'a Position, current_price: f64, change_24h_pct: f64, high_24h: f64) -> Self {
        let (unrealized_pnl, percent_gain) =
            position_pnl(position.entry_price, current_price, position.quantity);
        Self {
            position,
            current_price,
            change_24h_pct,
            high_24h,
            unrealized_pnl,
            percent_gain,
        }
    }
}

pub type SellRule = fn(&PositionSnapshot<'_>, &SellRuleConfig) -> bool;

/// Sell rules in priority order. The first matching rule decides the reason.
pub const SELL_RULES: [(SellReason, SellRule); 4] = [
    (SellReason::RiskManagement, near_stop_loss),
    (SellReason::ProfitTarget, hit_profit_target),
    (SellReason::MomentumLoss, losing_momentum),
    (SellReason::Resistance, near_resistance),
];

fn near_stop_loss(s: &PositionSnapshot<'_>, cfg: &SellRuleConfig) -> bool {
    let stop = s.position.effective_stop(cfg.default_stop_fraction);
    s.current_price <= stop * (1.0 + cfg.stop_proximity_pct / 100.0)
}

fn hit_profit_target(s: &PositionSnapshot<'_>, cfg: &SellRuleConfig) -> bool {
    s.percent_gain >= cfg.profit_target_pct
}

fn losing_momentum(s: &PositionSnapshot<'_>, cfg: &SellRuleConfig) -> bool {
    s.percent_gain > 0.0 && s.change_24h_pct <= -cfg.momentum_drop_pct
}

fn near_resistance(s: &PositionSnapshot<'_>, cfg: &SellRuleConfig) -> bool {
    s.percent_gain > 0.0
        && s.high_24h > 0.0
        && s.current_price >= s.high_24h * (1.0 - cfg.resistance_proximity_pct / 100.0)
}

pub fn match_sell_reason(snapshot: &PositionSnapshot<'_>, cfg: &SellRuleConfig) -> Option<SellReason> {
    SELL_RULES
        .iter()
        .find(|(_, rule)| rule(snapshot, cfg))
        .map(|(reason, _)| *reason)
}

fn reason_strength(reason: SellReason) -> (f64, RiskLevel) {
    match reason {
        SellReason::RiskManagement => (0.9, RiskLevel::High),
        SellReason::ProfitTarget => (0.8, RiskLevel::Low),
        SellReason::MomentumLoss => (0.7, RiskLevel::Medium),
        SellReason::Resistance => (0.65, RiskLevel::Low),
    }
}

/// One user's open positions together with their tier.
#[derive(Debug, Clone)]
pub struct UserPortfolio {
    pub user_id: String,
    pub tier_info: UserTierInfo,
    pub positions: Vec<Position>,
}

/// Users admitted by the tier gate, and what the denials cost.
#[derive(Debug, Default)]
pub struct Admission {
    pub admitted: Vec<UserPortfolio>,
    pub denied_users: u32,
    pub denied_positions: u32,
}

#[derive(Debug, Default, Serialize)]
pub struct PortfolioOutcome {
    pub accepted: Vec<PortfolioRecommendation>,
    pub skipped: u32,
    pub ai_rejected: u32,
}

enum Verdict {
    Accepted(Box<PortfolioRecommendation>),
    Skipped,
    AiRejected,
}

pub struct PortfolioRecommendationGenerator {
    market: Arc<dyn MarketDataProvider>,
    ai: Arc<dyn AiProvider>,
    tier_gate: Arc<TierGate>,
    config: SellRuleConfig,
    retry: RetryPolicy,
}

impl PortfolioRecommendationGenerator {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        ai: Arc<dyn AiProvider>,
        tier_gate: Arc<TierGate>,
        config: SellRuleConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            market,
            ai,
            tier_gate,
            config,
            retry,
        }
    }

    pub fn config(&self) -> &SellRuleConfig {
        &self.config
    }

    /// Run every user through the tier gate. Denials are silent; a ledger
    /// failure aborts admission.
    pub fn admit(
        &self,
        users: Vec<UserPortfolio>,
        work: RequestedWork,
        now: DateTime<Utc>,
    ) -> Result<Admission, DomainError> {
        let mut admission = Admission::default();
        for user in users {
            match self.tier_gate.authorize(&user.user_id, &user.tier_info, work, now)? {
                TierDecision::Allow => admission.admitted.push(user),
                TierDecision::Deny(reason) => {
                    debug!(user_id = %user.user_id, "Portfolio scan denied: {reason}");
                    admission.denied_users += 1;
                    admission.denied_positions += user.positions.len() as u32;
                }
            }
        }
        Ok(admission)
    }

    pub async fn generate(&self, users: &[UserPortfolio]) -> PortfolioOutcome {
        let now = Utc::now();
        let jobs: Vec<_> = users
            .iter()
            .flat_map(|u| u.positions.iter())
            .map(|p| self.evaluate(p, now))
            .collect();

        let verdicts: Vec<Verdict> = stream::iter(jobs)
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut outcome = PortfolioOutcome::default();
        for verdict in verdicts {
            match verdict {
                Verdict::Accepted(rec) => outcome.accepted.push(*rec),
                Verdict::Skipped => outcome.skipped += 1,
                Verdict::AiRejected => outcome.ai_rejected += 1,
            }
        }
        outcome
            .accepted
            .sort_by(|a, b| a.user_id.cmp(&b.user_id).then_with(|| a.symbol.cmp(&b.symbol)));
        outcome
    }

    async fn evaluate(&self, position: &Position, now: DateTime<Utc>) -> Verdict {
        let symbol = position.symbol.as_str();
        let ticker = match with_retry(&self.retry, "ticker", || self.market.ticker(symbol)).await {
            Ok(t) => t,
            Err(e) => {
                debug!(symbol, "Skipping position, ticker unavailable: {e}");
                return Verdict::Skipped;
            }
        };
        if !(ticker.last_price.is_finite() && ticker.last_price > 0.0) {
            return Verdict::Skipped;
        }

        let snapshot =
            PositionSnapshot::new(position, ticker.last_price, ticker.price_change_pct_24h, ticker.high_24h);
        let Some(reason) = match_sell_reason(&snapshot, &self.config) else {
            return Verdict::Skipped;
        };

        let (strength, risk_level) = reason_strength(reason);
        let candidate = AiCandidate {
            kind: CandidateKind::Sell,
            symbol: symbol.to_string(),
            score: strength,
            summary: format!(
                "{symbol} sell ({reason}): entry {:.4}, now {:.4}, {:+.2}% gain, 24h {:+.2}%",
                position.entry_price, snapshot.current_price, snapshot.percent_gain, snapshot.change_24h_pct
            ),
            features: BTreeMap::from([
                ("percent_gain".to_string(), snapshot.percent_gain),
                ("unrealized_pnl".to_string(), snapshot.unrealized_pnl),
                ("change_24h_pct".to_string(), snapshot.change_24h_pct),
                ("high_24h".to_string(), snapshot.high_24h),
            ]),
        };
        let judgment = match with_retry(&self.retry, "ai_judge", || self.ai.judge(&candidate))
            .await
            .and_then(|j| j.validate().map(|_| j))
        {
            Ok(j) => j,
            Err(e) => {
                debug!(symbol, "Skipping position, AI judgment unavailable: {e}");
                return Verdict::Skipped;
            }
        };
        if !judgment.accept {
            return Verdict::AiRejected;
        }

        Verdict::Accepted(Box::new(PortfolioRecommendation {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: position.user_id.clone(),
            symbol: position.symbol.clone(),
            confidence: Confidence::clamped(judgment.confidence),
            current_price: snapshot.current_price,
            entry_price: position.entry_price,
            quantity: position.quantity,
            unrealized_pnl: snapshot.unrealized_pnl,
            percent_gain: snapshot.percent_gain,
            sell_reason: reason,
            risk_level,
            reasoning: judgment.reasoning,
            created_at: now,
            expires_at: now + Duration::hours(self.config.ttl_hours),
        }))
    }
}

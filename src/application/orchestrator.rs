//! Review orchestrator: the phase state machine of one review run.
//!
//! A run moves `discovery → filtering → ai_analysis → storing → completed`
//! and may fail out of any phase. Exactly one audit row is inserted when the
//! run starts; every transition patches that row with the cumulative counts.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::application::assessor::MarketConditionAssessor;
use crate::application::discovery::{CoinCandidate, DiscoveryBatch, DiscoveryRecommendationGenerator};
use crate::application::portfolio::{PortfolioRecommendationGenerator, UserPortfolio};
use crate::application::retry::{with_retry, RetryPolicy};
use crate::application::signals::collect_signals;
use crate::application::tier_gate::RequestedWork;
use crate::domain::entities::review_run::{ReviewRun, RunCounts};
use crate::domain::error::ReviewError;
use crate::domain::ports::audit_log::{AuditLog, AuditPatch};
use crate::domain::ports::market_data::{GlobalMetrics, MarketDataProvider, Ticker};
use crate::domain::ports::position_repository::PositionRepository;
use crate::domain::ports::recommendation_store::{
    RecommendationBatch, RecommendationFilter, RecommendationStore,
};
use crate::domain::ports::user_tier::UserTierProvider;
use crate::domain::values::market_conditions::MarketConditions;
use crate::domain::values::review::{ReviewPhase, ReviewType, RunStatus};
use crate::domain::values::run_metadata::RunMetadata;
use crate::domain::values::strategy::{CoinUniverse, Strategy};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Strategy / universe pairs scanned for discovery recommendations.
    pub discovery_targets: Vec<(Strategy, CoinUniverse)>,
    /// Symbols trading less than this 24h quote volume are filtered out.
    pub min_quote_volume: f64,
    pub max_concurrency: usize,
    /// Skip candidates that already have an unexpired recommendation.
    pub skip_active_recommendations: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            discovery_targets: vec![(Strategy::Moderate, CoinUniverse::Top25)],
            min_quote_volume: 1_000_000.0,
            max_concurrency: 4,
            skip_active_recommendations: true,
        }
    }
}

/// Why a run was started and on whose behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRequest {
    pub review_type: ReviewType,
    pub requested_by: Option<String>,
    /// Restricts portfolio work to one user and bills it as on-demand.
    pub user_id: Option<String>,
    pub trigger_reason: Option<String>,
}

impl ReviewRequest {
    pub fn scheduled() -> Self {
        Self {
            review_type: ReviewType::Scheduled,
            requested_by: None,
            user_id: None,
            trigger_reason: None,
        }
    }

    pub fn manual(requested_by: impl Into<String>) -> Self {
        Self {
            review_type: ReviewType::Manual,
            requested_by: Some(requested_by.into()),
            user_id: None,
            trigger_reason: None,
        }
    }

    pub fn triggered(reason: impl Into<String>) -> Self {
        Self {
            review_type: ReviewType::Triggered,
            requested_by: None,
            user_id: None,
            trigger_reason: Some(reason.into()),
        }
    }

    pub fn on_behalf_of(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn work(&self) -> RequestedWork {
        if self.user_id.is_some() {
            RequestedWork::OnDemand
        } else {
            RequestedWork::ScheduledMonitoring
        }
    }
}

/// Final (or current) state of a run, as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub review_type: ReviewType,
    pub status: RunStatus,
    pub phase: ReviewPhase,
    pub counts: RunCounts,
    pub market_conditions: Option<MarketConditions>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug)]
struct ProgressState {
    run_id: Option<String>,
    review_type: ReviewType,
    status: RunStatus,
    phase: ReviewPhase,
    counts: RunCounts,
    metadata: RunMetadata,
    error_message: Option<String>,
    started: Instant,
    duration_ms: u64,
}

impl ProgressState {
    fn sync_metadata(&mut self) {
        let c = self.counts;
        let m = &mut self.metadata;
        m.buy_candidates = Some(c.buy_candidates);
        m.sell_candidates = Some(c.sell_candidates);
        m.skipped_buy = Some(c.skipped_buy);
        m.skipped_sell = Some(c.skipped_sell);
        m.ai_rejected_buy = Some(c.ai_rejected_buy);
        m.ai_rejected_sell = Some(c.ai_rejected_sell);
        m.tier_denied = Some(c.tier_denied);
    }

    fn patch(&mut self) -> AuditPatch {
        self.sync_metadata();
        AuditPatch {
            phase: Some(self.phase),
            coins_analyzed: Some(self.counts.coins_analyzed),
            buy_count: Some(self.counts.buy_count),
            sell_count: Some(self.counts.sell_count),
            skipped_count: Some(self.counts.skipped_count()),
            metadata: Some(self.metadata.clone()),
            ..AuditPatch::default()
        }
    }
}

/// Shared view of the in-flight run.
///
/// The scheduler keeps a handle so it can force-fail a run whose future it
/// dropped on timeout, and so it can read the interval computed by the run.
#[derive(Debug)]
pub struct RunProgress {
    state: Mutex<ProgressState>,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl RunProgress {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProgressState {
                run_id: None,
                review_type: ReviewType::Scheduled,
                status: RunStatus::Started,
                phase: ReviewPhase::Discovery,
                counts: RunCounts::default(),
                metadata: RunMetadata::default(),
                error_message: None,
                started: Instant::now(),
                duration_ms: 0,
            }),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut ProgressState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn run_id(&self) -> Option<String> {
        self.with(|s| s.run_id.clone())
    }

    pub fn phase(&self) -> ReviewPhase {
        self.with(|s| s.phase)
    }

    pub fn status(&self) -> RunStatus {
        self.with(|s| s.status)
    }

    pub fn counts(&self) -> RunCounts {
        self.with(|s| s.counts)
    }

    pub fn conditions(&self) -> Option<MarketConditions> {
        self.with(|s| s.metadata.market_conditions.clone())
    }

    pub fn report(&self) -> RunReport {
        self.with(|s| RunReport {
            run_id: s.run_id.clone().unwrap_or_default(),
            review_type: s.review_type,
            status: s.status,
            phase: s.phase,
            counts: s.counts,
            market_conditions: s.metadata.market_conditions.clone(),
            error_message: s.error_message.clone(),
            duration_ms: s.duration_ms,
        })
    }

    fn begin(&self, run_id: &str, review_type: ReviewType, metadata: RunMetadata) {
        self.with(|s| {
            s.run_id = Some(run_id.to_string());
            s.review_type = review_type;
            s.status = RunStatus::Started;
            s.phase = ReviewPhase::Discovery;
            s.counts = RunCounts::default();
            s.metadata = metadata;
            s.error_message = None;
            s.started = Instant::now();
            s.duration_ms = 0;
        })
    }

    /// Move to `phase` and return the patch recording it.
    fn advance(&self, phase: ReviewPhase) -> AuditPatch {
        self.with(|s| {
            s.phase = phase;
            s.patch()
        })
    }

    /// Move the run to a terminal status. Returns `None` when the run already
    /// ended, so a late timeout cannot overwrite a finished run.
    fn finish(&self, status: RunStatus, error: Option<String>, timed_out: bool) -> Option<AuditPatch> {
        self.with(|s| {
            if s.run_id.is_none() || s.status != RunStatus::Started {
                return None;
            }
            s.status = status;
            if status == RunStatus::Completed {
                s.phase = ReviewPhase::Completed;
            }
            s.error_message = error.clone();
            s.metadata.timed_out |= timed_out;
            s.duration_ms = s.started.elapsed().as_millis() as u64;
            let mut patch = s.patch();
            patch.status = Some(status);
            patch.error_message = Some(error);
            patch.duration_ms = Some(s.duration_ms);
            Some(patch)
        })
    }
}

/// Universe symbols and their tickers, fetched once per run.
struct MarketSnapshot {
    universes: HashMap<CoinUniverse, Vec<String>>,
    tickers: HashMap<String, Ticker>,
    conditions: MarketConditions,
}

pub struct ReviewOrchestrator {
    assessor: MarketConditionAssessor,
    market: Arc<dyn MarketDataProvider>,
    discovery: DiscoveryRecommendationGenerator,
    portfolio: PortfolioRecommendationGenerator,
    users: Arc<dyn UserTierProvider>,
    positions: Arc<dyn PositionRepository>,
    recommendations: Arc<dyn RecommendationStore>,
    audit: Arc<dyn AuditLog>,
    config: PipelineConfig,
    retry: RetryPolicy,
}

impl ReviewOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        assessor: MarketConditionAssessor,
        market: Arc<dyn MarketDataProvider>,
        discovery: DiscoveryRecommendationGenerator,
        portfolio: PortfolioRecommendationGenerator,
        users: Arc<dyn UserTierProvider>,
        positions: Arc<dyn PositionRepository>,
        recommendations: Arc<dyn RecommendationStore>,
        audit: Arc<dyn AuditLog>,
        config: PipelineConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            assessor,
            market,
            discovery,
            portfolio,
            users,
            positions,
            recommendations,
            audit,
            config,
            retry,
        }
    }

    /// Execute one run to completion or failure.
    ///
    /// Only a failure to create the audit row is returned as an error; every
    /// later failure is recorded on the row and reported in the [`RunReport`].
    pub async fn execute(
        &self,
        request: &ReviewRequest,
        progress: &RunProgress,
    ) -> Result<RunReport, ReviewError> {
        let mut metadata = RunMetadata {
            requested_by: request.requested_by.clone(),
            trigger_reason: request.trigger_reason.clone(),
            strategies: self
                .config
                .discovery_targets
                .iter()
                .map(|(s, u)| format!("{s}/{u}"))
                .collect(),
            ..RunMetadata::default()
        };
        if let Some(user_id) = &request.user_id {
            metadata.extra.insert("user_id".to_string(), user_id.clone());
        }

        let run = ReviewRun::start(request.review_type, metadata.clone());
        let run_id = self.audit.insert(&run)?;
        progress.begin(&run_id, request.review_type, metadata);
        info!(run_id = %run_id, review_type = %request.review_type, "Review run started");

        match self.run_phases(&run_id, request, progress).await {
            Ok(()) => {
                if let Some(patch) = progress.finish(RunStatus::Completed, None, false) {
                    self.record(&run_id, &patch);
                }
                let counts = progress.counts();
                if !counts.is_balanced() {
                    warn!(run_id = %run_id, ?counts, "Run counters do not add up");
                }
                info!(
                    run_id = %run_id,
                    buy = counts.buy_count,
                    sell = counts.sell_count,
                    skipped = counts.skipped_count(),
                    "Review run completed"
                );
            }
            Err(e) => {
                let phase = progress.phase();
                if let Some(patch) = progress.finish(RunStatus::Failed, Some(e.to_string()), false) {
                    self.record(&run_id, &patch);
                }
                warn!(run_id = %run_id, %phase, "Review run failed: {e}");
            }
        }
        Ok(progress.report())
    }

    /// Force-fail the in-flight run, used when the scheduler gives up on it.
    /// A run that already finished is left untouched.
    pub fn abort(&self, progress: &RunProgress, error: &ReviewError) {
        let Some(run_id) = progress.run_id() else {
            return;
        };
        let timed_out = matches!(error, ReviewError::Timeout(_));
        if let Some(patch) = progress.finish(RunStatus::Failed, Some(error.to_string()), timed_out) {
            self.record(&run_id, &patch);
            warn!(run_id = %run_id, phase = %progress.phase(), "Review run aborted: {error}");
        }
    }

    /// Current market conditions, without starting a run.
    pub async fn assess_market(&self) -> Result<MarketConditions, ReviewError> {
        Ok(self.gather_market().await?.conditions)
    }

    fn record(&self, run_id: &str, patch: &AuditPatch) {
        if let Err(e) = self.audit.update(run_id, patch) {
            warn!(run_id, "Failed to update audit row: {e}");
        }
    }

    fn checkpoint(&self, run_id: &str, progress: &RunProgress, phase: ReviewPhase) {
        let patch = progress.advance(phase);
        debug!(run_id, %phase, "Phase transition");
        self.record(run_id, &patch);
    }

    async fn run_phases(
        &self,
        run_id: &str,
        request: &ReviewRequest,
        progress: &RunProgress,
    ) -> Result<(), ReviewError> {
        // discovery
        let market = self.gather_market().await?;
        let portfolios = self.load_portfolios(request)?;
        let buy_candidates: usize = self
            .config
            .discovery_targets
            .iter()
            .map(|(_, u)| market.universes.get(u).map_or(0, Vec::len))
            .sum();
        let sell_candidates: usize = portfolios.iter().map(|p| p.positions.len()).sum();
        let coins: HashSet<&String> = market.universes.values().flatten().collect();
        progress.with(|s| {
            s.counts.coins_analyzed = coins.len() as u32;
            s.counts.buy_candidates = buy_candidates as u32;
            s.counts.sell_candidates = sell_candidates as u32;
            s.metadata.market_conditions = Some(market.conditions.clone());
        });
        self.checkpoint(run_id, progress, ReviewPhase::Filtering);

        // filtering
        let (batches, skipped_buy) = self.filter_discovery(&market)?;
        let admission = self.portfolio.admit(portfolios, request.work(), Utc::now())?;
        let respect_active = self.config.skip_active_recommendations && request.user_id.is_none();
        let (scan, skipped_sell) = self.filter_portfolios(admission.admitted, respect_active)?;
        progress.with(|s| {
            s.counts.skipped_buy += skipped_buy;
            s.counts.skipped_sell += skipped_sell + admission.denied_positions;
            s.counts.tier_denied += admission.denied_users;
        });
        self.checkpoint(run_id, progress, ReviewPhase::AiAnalysis);

        // ai_analysis
        let mut batch = RecommendationBatch::default();
        for target in &batches {
            let outcome = self.discovery.generate(target).await;
            progress.with(|s| {
                s.counts.buy_count += outcome.accepted.len() as u32;
                s.counts.skipped_buy += outcome.skipped;
                s.counts.ai_rejected_buy += outcome.ai_rejected;
            });
            batch.discovery.extend(outcome.accepted);
        }
        let outcome = self.portfolio.generate(&scan).await;
        progress.with(|s| {
            s.counts.sell_count += outcome.accepted.len() as u32;
            s.counts.skipped_sell += outcome.skipped;
            s.counts.ai_rejected_sell += outcome.ai_rejected;
        });
        batch.portfolio = outcome.accepted;
        self.checkpoint(run_id, progress, ReviewPhase::Storing);

        // storing
        if !batch.is_empty() {
            self.recommendations
                .insert_batch(&batch)
                .map_err(|e| ReviewError::Fatal(format!("storing recommendations: {e}")))?;
            debug!(run_id, stored = batch.len(), "Recommendations stored");
        }
        Ok(())
    }

    async fn gather_market(&self) -> Result<MarketSnapshot, ReviewError> {
        let mut universes = HashMap::new();
        for (_, universe) in &self.config.discovery_targets {
            if universes.contains_key(universe) {
                continue;
            }
            let symbols = with_retry(&self.retry, "universe", || self.market.universe(*universe))
                .await
                .map_err(|e| ReviewError::Fatal(format!("coin universe {universe} unavailable: {e}")))?;
            universes.insert(*universe, symbols);
        }

        let symbols: Vec<String> = universes
            .values()
            .flatten()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let jobs: Vec<_> = symbols
            .into_iter()
            .map(|symbol| {
                let market = Arc::clone(&self.market);
                let retry = self.retry.clone();
                async move {
                    let result = with_retry(&retry, "ticker", || market.ticker(&symbol)).await;
                    (symbol, result)
                }
            })
            .collect();
        let fetched: Vec<(String, Result<Ticker, ReviewError>)> = stream::iter(jobs)
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut tickers = HashMap::new();
        for (symbol, result) in fetched {
            match result {
                Ok(t) => {
                    tickers.insert(symbol, t);
                }
                Err(e) => debug!(symbol = %symbol, "Ticker unavailable: {e}"),
            }
        }

        let metrics = match with_retry(&self.retry, "global_metrics", || self.market.global_metrics()).await {
            Ok(m) => m,
            Err(e) => {
                warn!("Global market metrics unavailable, using neutral defaults: {e}");
                GlobalMetrics::default()
            }
        };

        let mut sorted: Vec<Ticker> = tickers.values().cloned().collect();
        sorted.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        let conditions = self.assessor.assess(&collect_signals(&sorted, &metrics));
        info!(
            volatility = %conditions.volatility_level,
            regime = %conditions.market_regime,
            interval_minutes = conditions.review_interval_minutes,
            "Market assessed"
        );

        Ok(MarketSnapshot {
            universes,
            tickers,
            conditions,
        })
    }

    fn load_portfolios(&self, request: &ReviewRequest) -> Result<Vec<UserPortfolio>, ReviewError> {
        let accounts = match &request.user_id {
            Some(user_id) => {
                let tier_info = self
                    .users
                    .tier_info(user_id)?
                    .ok_or_else(|| ReviewError::Validation(format!("unknown user {user_id}")))?;
                vec![(user_id.clone(), tier_info)]
            }
            None => self
                .users
                .list_users()?
                .into_iter()
                .map(|a| (a.id, a.tier_info))
                .collect(),
        };

        let mut portfolios = Vec::with_capacity(accounts.len());
        for (user_id, tier_info) in accounts {
            let positions = self.positions.open_positions(&user_id)?;
            if positions.is_empty() {
                continue;
            }
            portfolios.push(UserPortfolio {
                user_id,
                tier_info,
                positions,
            });
        }
        Ok(portfolios)
    }

    fn filter_discovery(&self, market: &MarketSnapshot) -> Result<(Vec<DiscoveryBatch>, u32), ReviewError> {
        let mut batches = Vec::new();
        let mut skipped = 0u32;

        for (strategy, universe) in &self.config.discovery_targets {
            let active: HashSet<String> = if self.config.skip_active_recommendations {
                self.recommendations
                    .query_discovery(&RecommendationFilter {
                        strategy: Some(*strategy),
                        universe: Some(*universe),
                        ..RecommendationFilter::default()
                    })?
                    .into_iter()
                    .map(|r| r.symbol)
                    .collect()
            } else {
                HashSet::new()
            };

            let mut candidates = Vec::new();
            for symbol in market.universes.get(universe).into_iter().flatten() {
                let Some(ticker) = market.tickers.get(symbol) else {
                    skipped += 1;
                    continue;
                };
                if ticker.quote_volume_24h < self.config.min_quote_volume {
                    debug!(symbol = %symbol, volume = ticker.quote_volume_24h, "Filtered: illiquid");
                    skipped += 1;
                    continue;
                }
                if active.contains(symbol) {
                    debug!(symbol = %symbol, %strategy, "Filtered: active recommendation exists");
                    skipped += 1;
                    continue;
                }
                candidates.push(CoinCandidate {
                    symbol: symbol.clone(),
                    ticker: ticker.clone(),
                });
            }
            batches.push(DiscoveryBatch {
                strategy: *strategy,
                universe: *universe,
                candidates,
            });
        }
        Ok((batches, skipped))
    }

    fn filter_portfolios(
        &self,
        users: Vec<UserPortfolio>,
        respect_active: bool,
    ) -> Result<(Vec<UserPortfolio>, u32), ReviewError> {
        let mut skipped = 0u32;
        let mut scan = Vec::with_capacity(users.len());

        for mut user in users {
            let active: HashSet<String> = if respect_active {
                self.recommendations
                    .query_portfolio(&RecommendationFilter {
                        user_id: Some(user.user_id.clone()),
                        ..RecommendationFilter::default()
                    })?
                    .into_iter()
                    .map(|r| r.symbol)
                    .collect()
            } else {
                HashSet::new()
            };

            let before = user.positions.len();
            user.positions.retain(|p| match p.validate() {
                Err(e) => {
                    debug!(position_id = %p.id, "Filtered: {e}");
                    false
                }
                Ok(()) => !active.contains(&p.symbol),
            });
            skipped += (before - user.positions.len()) as u32;
            if !user.positions.is_empty() {
                scan.push(user);
            }
        }
        Ok((scan, skipped))
    }
}


pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

use crate::application::accounts::AccountsUseCase;
use crate::application::assessor::MarketConditionAssessor;
use crate::application::audit::AuditUseCase;
use crate::application::discovery::DiscoveryRecommendationGenerator;
use crate::application::orchestrator::{ReviewOrchestrator, ReviewRequest, RunReport};
use crate::application::portfolio::PortfolioRecommendationGenerator;
use crate::application::recommendations::RecommendationsUseCase;
use crate::application::scheduler::{ReviewIntervalController, RunHandle, SchedulerState, TickOutcome};
use crate::application::tier_gate::TierGate;
use crate::config::{AdvisorConfig, AiProviderKind};
use crate::domain::entities::discovery_recommendation::DiscoveryRecommendation;
use crate::domain::entities::portfolio_recommendation::PortfolioRecommendation;
use crate::domain::entities::position::Position;
use crate::domain::entities::review_run::ReviewRun;
use crate::domain::entities::user_account::UserAccount;
use crate::domain::error::{DomainError, ReviewError};
use crate::domain::ports::ai_provider::AiProvider;
use crate::domain::ports::audit_log::{AuditLog, AuditStats};
use crate::domain::ports::market_data::MarketDataProvider;
use crate::domain::ports::position_repository::PositionRepository;
use crate::domain::ports::recommendation_store::RecommendationStore;
use crate::domain::ports::usage_ledger::UsageLedger;
use crate::domain::ports::user_tier::UserTierProvider;
use crate::domain::values::market_conditions::MarketConditions;
use crate::domain::values::review::{ReviewType, RunStatus};
use crate::domain::values::strategy::{CoinUniverse, Strategy};
use crate::domain::values::tier::UserTier;
use crate::infrastructure::ai::heuristic::HeuristicJudge;
use crate::infrastructure::ai::openai::OpenAiJudge;
use crate::infrastructure::market::binance::BinanceMarketData;
use crate::infrastructure::sqlite::account_repo::SqliteAccountRepo;
use crate::infrastructure::sqlite::audit_repo::SqliteAuditLog;
use crate::infrastructure::sqlite::open_connection;
use crate::infrastructure::sqlite::recommendation_repo::SqliteRecommendationStore;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;

/// Everything the engine talks to outside its own process.
#[derive(Clone)]
pub struct Collaborators {
    pub market: Arc<dyn MarketDataProvider>,
    pub ai: Arc<dyn AiProvider>,
    pub audit: Arc<dyn AuditLog>,
    pub recommendations: Arc<dyn RecommendationStore>,
    pub users: Arc<dyn UserTierProvider>,
    pub positions: Arc<dyn PositionRepository>,
    pub usage: Arc<dyn UsageLedger>,
}

impl Collaborators {
    /// SQLite-backed stores at `db_path` around the given providers.
    pub fn sqlite(
        db_path: &str,
        market: Arc<dyn MarketDataProvider>,
        ai: Arc<dyn AiProvider>,
    ) -> Result<Self, DomainError> {
        let accounts = Arc::new(SqliteAccountRepo::new(open_connection(db_path)?));
        Ok(Self {
            market,
            ai,
            audit: Arc::new(SqliteAuditLog::new(open_connection(db_path)?)),
            recommendations: Arc::new(SqliteRecommendationStore::new(open_connection(db_path)?)),
            users: accounts.clone(),
            positions: accounts.clone(),
            usage: accounts,
        })
    }
}

pub struct ReviewEngine {
    orchestrator: Arc<ReviewOrchestrator>,
    controller: ReviewIntervalController,
    tier_gate: Arc<TierGate>,
    users: Arc<dyn UserTierProvider>,
    audit_uc: AuditUseCase,
    accounts_uc: AccountsUseCase,
    recommendations_uc: RecommendationsUseCase,
}

impl ReviewEngine {
    pub fn new(config: AdvisorConfig) -> Result<Self, DomainError> {
        let market: Arc<dyn MarketDataProvider> = Arc::new(BinanceMarketData::new(
            config.market_base_url.clone(),
            config.global_metrics_url.clone(),
        ));
        let ai: Arc<dyn AiProvider> = match config.ai_provider {
            AiProviderKind::Heuristic => Arc::new(HeuristicJudge::default()),
            AiProviderKind::OpenAi => {
                if config.openai_api_key.is_empty() {
                    return Err(DomainError::InvalidInput(
                        "OpenAI provider selected but no API key set (CRYPTOADVISOR_OPENAI_API_KEY)".into(),
                    ));
                }
                Arc::new(OpenAiJudge::new(
                    config.openai_api_key.clone(),
                    config.openai_model.clone(),
                    config.openai_base_url.clone(),
                ))
            }
        };
        let db_path = config.db_path.clone();
        Self::with_providers(&db_path, config, market, ai)
    }

    pub fn with_providers(
        db_path: &str,
        config: AdvisorConfig,
        market: Arc<dyn MarketDataProvider>,
        ai: Arc<dyn AiProvider>,
    ) -> Result<Self, DomainError> {
        Ok(Self::from_collaborators(config, Collaborators::sqlite(db_path, market, ai)?))
    }

    pub fn from_collaborators(config: AdvisorConfig, c: Collaborators) -> Self {
        let tier_gate = Arc::new(TierGate::new(
            chrono::Duration::hours(config.on_demand_window_hours),
            c.usage.clone(),
        ));
        let discovery = DiscoveryRecommendationGenerator::new(
            c.market.clone(),
            c.ai.clone(),
            config.discovery.clone(),
            config.retry.clone(),
        );
        let portfolio = PortfolioRecommendationGenerator::new(
            c.market.clone(),
            c.ai.clone(),
            tier_gate.clone(),
            config.sell_rules.clone(),
            config.retry.clone(),
        );
        let orchestrator = Arc::new(ReviewOrchestrator::new(
            MarketConditionAssessor::new(config.assessor.clone()),
            c.market.clone(),
            discovery,
            portfolio,
            c.users.clone(),
            c.positions.clone(),
            c.recommendations.clone(),
            c.audit.clone(),
            config.pipeline.clone(),
            config.retry.clone(),
        ));

        Self {
            controller: ReviewIntervalController::new(orchestrator.clone(), config.scheduler.clone()),
            orchestrator,
            tier_gate,
            users: c.users.clone(),
            audit_uc: AuditUseCase::new(c.audit, config.scheduler.max_run_duration),
            accounts_uc: AccountsUseCase::new(c.users, c.positions),
            recommendations_uc: RecommendationsUseCase::new(c.recommendations),
        }
    }

    // Review runs

    /// Start a run now and wait for it. Fails with `LockBusy` if one is in flight.
    pub async fn run_now(&self, request: ReviewRequest) -> Result<RunReport, ReviewError> {
        self.controller.trigger(request)?.wait().await
    }

    pub fn trigger(&self, request: ReviewRequest) -> Result<RunHandle, ReviewError> {
        self.controller.trigger(request)
    }

    pub fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        self.controller.tick(now)
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.controller.state()
    }

    /// Recover runs interrupted by a previous process, then drive the
    /// scheduler until ctrl-c.
    pub async fn run_scheduler(&self) -> Result<(), DomainError> {
        self.audit_uc.recover_interrupted()?;
        self.controller.run_forever().await;
        Ok(())
    }

    pub async fn run_scheduler_until<F>(&self, shutdown: F) -> Result<(), DomainError>
    where
        F: Future<Output = ()>,
    {
        self.audit_uc.recover_interrupted()?;
        self.controller.run_until(shutdown).await;
        Ok(())
    }

    pub async fn assess_market(&self) -> Result<MarketConditions, ReviewError> {
        self.orchestrator.assess_market().await
    }

    // Audit log

    pub fn audit_list(
        &self,
        review_type: Option<ReviewType>,
        status: Option<RunStatus>,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<ReviewRun>, DomainError> {
        self.audit_uc.list(review_type, status, since, limit)
    }

    pub fn audit_get(&self, id: &str) -> Result<ReviewRun, DomainError> {
        self.audit_uc.get(id)
    }

    pub fn audit_stats(&self) -> Result<AuditStats, DomainError> {
        self.audit_uc.stats()
    }

    pub fn audit_prune(&self, keep_last: usize) -> Result<usize, DomainError> {
        self.audit_uc.prune(keep_last)
    }

    pub fn recover_interrupted(&self) -> Result<usize, DomainError> {
        self.audit_uc.recover_interrupted()
    }

    // Recommendations

    pub fn discovery_recommendations(
        &self,
        strategy: Option<Strategy>,
        universe: Option<CoinUniverse>,
        include_expired: bool,
        limit: Option<usize>,
    ) -> Result<Vec<DiscoveryRecommendation>, DomainError> {
        self.recommendations_uc.discovery(strategy, universe, include_expired, limit)
    }

    pub fn portfolio_recommendations(
        &self,
        user_id: Option<String>,
        include_expired: bool,
        limit: Option<usize>,
    ) -> Result<Vec<PortfolioRecommendation>, DomainError> {
        self.recommendations_uc.portfolio(user_id, include_expired, limit)
    }

    // Accounts

    pub fn add_user(
        &self,
        id: &str,
        tier: UserTier,
        on_demand_limit: Option<u32>,
    ) -> Result<UserAccount, DomainError> {
        self.accounts_uc.add_user(id, tier, on_demand_limit)
    }

    pub fn users(&self) -> Result<Vec<UserAccount>, DomainError> {
        self.accounts_uc.users()
    }

    pub fn open_position(
        &self,
        user_id: &str,
        symbol: &str,
        quantity: f64,
        entry_price: f64,
        stop_loss: Option<f64>,
    ) -> Result<Position, DomainError> {
        self.accounts_uc
            .open_position(user_id, symbol, quantity, entry_price, stop_loss)
    }

    pub fn close_position(&self, id: &str) -> Result<(), DomainError> {
        self.accounts_uc.close_position(id)
    }

    pub fn positions(&self, user_id: &str) -> Result<Vec<Position>, DomainError> {
        self.accounts_uc.positions(user_id)
    }

    /// On-demand reviews left for `user_id` in the current window; `None` is unlimited.
    pub fn on_demand_remaining(&self, user_id: &str) -> Result<Option<u32>, DomainError> {
        let info = self
            .users
            .tier_info(user_id)?
            .ok_or_else(|| DomainError::NotFound(format!("User not found: {user_id}")))?;
        self.tier_gate.remaining(user_id, &info, Utc::now())
    }
}

use crate::application::assessor::AssessorTable;
use crate::application::discovery::DiscoveryConfig;
use crate::application::orchestrator::PipelineConfig;
use crate::application::portfolio::SellRuleConfig;
use crate::application::retry::RetryPolicy;
use crate::application::scheduler::SchedulerConfig;
use crate::domain::error::DomainError;
use crate::domain::values::strategy::{CoinUniverse, Strategy};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "cryptoadvisor.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProviderKind {
    Heuristic,
    OpenAi,
}

impl FromStr for AiProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "heuristic" | "local" => Ok(AiProviderKind::Heuristic),
            "openai" => Ok(AiProviderKind::OpenAi),
            _ => Err(format!("Unknown AI provider: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub db_path: String,
    /// Log filter used when RUST_LOG is unset (CRYPTOADVISOR_LOG)
    pub log_level: String,
    pub ai_provider: AiProviderKind,
    pub openai_api_key: String,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    /// Market data REST base URL (CRYPTOADVISOR_MARKET_URL)
    pub market_base_url: Option<String>,
    /// Global metrics endpoint (CRYPTOADVISOR_GLOBAL_URL)
    pub global_metrics_url: Option<String>,
    /// Rolling window for free-tier on-demand quotas, in hours
    pub on_demand_window_hours: i64,
    pub assessor: AssessorTable,
    pub scheduler: SchedulerConfig,
    pub pipeline: PipelineConfig,
    pub discovery: DiscoveryConfig,
    pub sell_rules: SellRuleConfig,
    pub retry: RetryPolicy,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            log_level: "info".to_string(),
            ai_provider: AiProviderKind::Heuristic,
            openai_api_key: String::new(),
            openai_model: None,
            openai_base_url: None,
            market_base_url: None,
            global_metrics_url: None,
            on_demand_window_hours: 24,
            assessor: AssessorTable::default(),
            scheduler: SchedulerConfig::default(),
            pipeline: PipelineConfig::default(),
            discovery: DiscoveryConfig::default(),
            sell_rules: SellRuleConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Parse a `strategy:universe` list such as `moderate:top25,aggressive:top50`.
pub fn parse_targets(s: &str) -> Result<Vec<(Strategy, CoinUniverse)>, DomainError> {
    let targets = s
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            let (strategy, universe) = t
                .split_once(':')
                .ok_or_else(|| DomainError::InvalidInput(format!("Expected strategy:universe, got '{t}'")))?;
            Ok((
                strategy.parse().map_err(DomainError::InvalidInput)?,
                universe.parse().map_err(DomainError::InvalidInput)?,
            ))
        })
        .collect::<Result<Vec<_>, DomainError>>()?;
    if targets.is_empty() {
        return Err(DomainError::InvalidInput("No discovery targets configured".into()));
    }
    Ok(targets)
}

impl AdvisorConfig {
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or unparseable numeric
    /// values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(&format!("CRYPTOADVISOR_{key}")).filter(|v| !v.trim().is_empty());
        let num = |key: &str, default: f64| var(key).and_then(|v| v.parse::<f64>().ok()).unwrap_or(default);
        let int = |key: &str, default: u64| var(key).and_then(|v| v.parse::<u64>().ok()).unwrap_or(default);

        let mut cfg = Self::default();

        cfg.db_path = var("DB").unwrap_or(cfg.db_path);
        cfg.log_level = var("LOG").unwrap_or(cfg.log_level);
        if let Some(provider) = var("AI_PROVIDER") {
            cfg.ai_provider = provider.parse().map_err(DomainError::InvalidInput)?;
        }
        cfg.openai_api_key = var("OPENAI_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY"))
            .unwrap_or_default();
        cfg.openai_model = var("OPENAI_MODEL");
        cfg.openai_base_url = var("OPENAI_BASE_URL");
        cfg.market_base_url = var("MARKET_URL");
        cfg.global_metrics_url = var("GLOBAL_URL");
        cfg.on_demand_window_hours = int("ON_DEMAND_WINDOW_HOURS", 24) as i64;

        cfg.assessor.min_interval_minutes = int("MIN_INTERVAL_MINUTES", 5) as u32;
        cfg.assessor.max_interval_minutes = int("MAX_INTERVAL_MINUTES", 240) as u32;

        cfg.scheduler.fallback_interval_minutes = int("FALLBACK_INTERVAL_MINUTES", 60) as u32;
        cfg.scheduler.max_run_duration = Duration::from_secs(int("MAX_RUN_SECS", 900));
        cfg.scheduler.tick_every = Duration::from_secs(int("TICK_SECS", 30).max(1));

        let concurrency = int("MAX_CONCURRENCY", 4).max(1) as usize;
        cfg.pipeline.max_concurrency = concurrency;
        cfg.discovery.max_concurrency = concurrency;
        cfg.sell_rules.max_concurrency = concurrency;
        cfg.pipeline.min_quote_volume = num("MIN_QUOTE_VOLUME", cfg.pipeline.min_quote_volume);
        if let Some(targets) = var("DISCOVERY_TARGETS") {
            cfg.pipeline.discovery_targets = parse_targets(&targets)?;
        }

        cfg.discovery.min_pre_ai_confidence = num("MIN_PRE_AI_CONFIDENCE", cfg.discovery.min_pre_ai_confidence);

        cfg.retry.call_timeout = Duration::from_millis(int("CALL_TIMEOUT_MS", 10_000));
        cfg.retry.max_attempts = int("RETRY_ATTEMPTS", 3).max(1) as u32;
        cfg.retry.base_backoff = Duration::from_millis(int("RETRY_BASE_MS", 250));

        cfg.sell_rules.profit_target_pct = num("PROFIT_TARGET_PCT", cfg.sell_rules.profit_target_pct);
        cfg.sell_rules.stop_proximity_pct = num("STOP_PROXIMITY_PCT", cfg.sell_rules.stop_proximity_pct);
        cfg.sell_rules.default_stop_fraction = num("DEFAULT_STOP_FRACTION", cfg.sell_rules.default_stop_fraction);
        cfg.sell_rules.momentum_drop_pct = num("MOMENTUM_DROP_PCT", cfg.sell_rules.momentum_drop_pct);
        cfg.sell_rules.resistance_proximity_pct =
            num("RESISTANCE_PROXIMITY_PCT", cfg.sell_rules.resistance_proximity_pct);

        Ok(cfg)
    }
}

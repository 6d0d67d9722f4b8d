use crate::domain::entities::discovery_recommendation::DiscoveryRecommendation;
use crate::domain::entities::portfolio_recommendation::PortfolioRecommendation;
use crate::domain::error::DomainError;
use crate::domain::values::strategy::{CoinUniverse, Strategy};

#[derive(Debug, Clone, Default)]
pub struct RecommendationFilter {
    pub strategy: Option<Strategy>,
    pub universe: Option<CoinUniverse>,
    pub user_id: Option<String>,
    pub symbol: Option<String>,
    pub include_expired: bool,
    pub limit: Option<usize>,
}

/// Everything one run produced, written together.
#[derive(Debug, Clone, Default)]
pub struct RecommendationBatch {
    pub discovery: Vec<DiscoveryRecommendation>,
    pub portfolio: Vec<PortfolioRecommendation>,
}

impl RecommendationBatch {
    pub fn is_empty(&self) -> bool {
        self.discovery.is_empty() && self.portfolio.is_empty()
    }

    pub fn len(&self) -> usize {
        self.discovery.len() + self.portfolio.len()
    }
}

pub trait RecommendationStore: Send + Sync {
    fn insert_discovery(&self, rec: &DiscoveryRecommendation) -> Result<(), DomainError>;
    /// Inserting supersedes any active recommendation for the same
    /// (user, symbol).
    fn insert_portfolio(&self, rec: &PortfolioRecommendation) -> Result<(), DomainError>;
    /// All-or-nothing write of a whole batch.
    fn insert_batch(&self, batch: &RecommendationBatch) -> Result<(), DomainError>;
    fn query_discovery(
        &self,
        filter: &RecommendationFilter,
    ) -> Result<Vec<DiscoveryRecommendation>, DomainError>;
    fn query_portfolio(
        &self,
        filter: &RecommendationFilter,
    ) -> Result<Vec<PortfolioRecommendation>, DomainError>;
}

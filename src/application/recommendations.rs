use crate::domain::entities::discovery_recommendation::DiscoveryRecommendation;
use crate::domain::entities::portfolio_recommendation::PortfolioRecommendation;
use crate::domain::error::DomainError;
use crate::domain::ports::recommendation_store::{RecommendationFilter, RecommendationStore};
use crate::domain::values::strategy::{CoinUniverse, Strategy};
use std::sync::Arc;

pub struct RecommendationsUseCase {
    store: Arc<dyn RecommendationStore>,
}

impl RecommendationsUseCase {
    pub fn new(store: Arc<dyn RecommendationStore>) -> Self {
        Self { store }
    }

    pub fn discovery(
        &self,
        strategy: Option<Strategy>,
        universe: Option<CoinUniverse>,
        include_expired: bool,
        limit: Option<usize>,
    ) -> Result<Vec<DiscoveryRecommendation>, DomainError> {
        self.store.query_discovery(&RecommendationFilter {
            strategy,
            universe,
            include_expired,
            limit,
            ..RecommendationFilter::default()
        })
    }

    pub fn portfolio(
        &self,
        user_id: Option<String>,
        include_expired: bool,
        limit: Option<usize>,
    ) -> Result<Vec<PortfolioRecommendation>, DomainError> {
        self.store.query_portfolio(&RecommendationFilter {
            user_id,
            include_expired,
            limit,
            ..RecommendationFilter::default()
        })
    }
}

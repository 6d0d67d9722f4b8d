use crate::domain::entities::position::Position;
use crate::domain::entities::user_account::UserAccount;
use crate::domain::error::DomainError;
use crate::domain::ports::position_repository::PositionRepository;
use crate::domain::ports::user_tier::UserTierProvider;
use crate::domain::values::tier::{UserTier, UserTierInfo};
use std::sync::Arc;

/// Seeding of users and positions. The billing subsystem owns tiers in
/// production; this covers local operation and tests.
pub struct AccountsUseCase {
    users: Arc<dyn UserTierProvider>,
    positions: Arc<dyn PositionRepository>,
}

impl AccountsUseCase {
    pub fn new(users: Arc<dyn UserTierProvider>, positions: Arc<dyn PositionRepository>) -> Self {
        Self { users, positions }
    }

    pub fn add_user(
        &self,
        id: &str,
        tier: UserTier,
        on_demand_limit: Option<u32>,
    ) -> Result<UserAccount, DomainError> {
        if id.trim().is_empty() {
            return Err("User id must not be empty".into());
        }
        let mut tier_info = UserTierInfo::for_tier(tier);
        if let Some(limit) = on_demand_limit {
            tier_info.on_demand_limit = limit;
        }
        let account = UserAccount::new(id.trim().to_string(), tier_info);
        self.users.add_user(&account)?;
        Ok(account)
    }

    pub fn users(&self) -> Result<Vec<UserAccount>, DomainError> {
        self.users.list_users()
    }

    pub fn open_position(
        &self,
        user_id: &str,
        symbol: &str,
        quantity: f64,
        entry_price: f64,
        stop_loss: Option<f64>,
    ) -> Result<Position, DomainError> {
        if self.users.tier_info(user_id)?.is_none() {
            return Err(DomainError::NotFound(format!("User not found: {user_id}")));
        }
        let position = Position::new(user_id.to_string(), symbol.to_string(), quantity, entry_price, stop_loss);
        position
            .validate()
            .map_err(|e| DomainError::InvalidInput(e.to_string()))?;
        if let Some(stop) = stop_loss {
            if !(stop.is_finite() && stop > 0.0) {
                return Err(DomainError::InvalidInput(format!("Invalid stop loss: {stop}")));
            }
        }
        self.positions.add_position(&position)?;
        Ok(position)
    }

    pub fn close_position(&self, id: &str) -> Result<(), DomainError> {
        self.positions.close_position(id)
    }

    pub fn positions(&self, user_id: &str) -> Result<Vec<Position>, DomainError> {
        self.positions.open_positions(user_id)
    }
}

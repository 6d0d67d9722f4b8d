use crate::domain::entities::user_account::UserAccount;
use crate::domain::error::DomainError;
use crate::domain::values::tier::UserTierInfo;

/// Resolves subscription capabilities. Account lifecycle lives elsewhere;
/// `add_user` exists for seeding and tests.
pub trait UserTierProvider: Send + Sync {
    fn list_users(&self) -> Result<Vec<UserAccount>, DomainError>;
    fn tier_info(&self, user_id: &str) -> Result<Option<UserTierInfo>, DomainError>;
    fn add_user(&self, account: &UserAccount) -> Result<(), DomainError>;
}

use crate::domain::values::tier::UserTierInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub tier_info: UserTierInfo,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(id: String, tier_info: UserTierInfo) -> Self {
        Self {
            id,
            tier_info,
            created_at: Utc::now(),
        }
    }
}

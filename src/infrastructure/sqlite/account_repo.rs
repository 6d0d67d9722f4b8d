use super::{db_err, parse_col, parse_ts, ts};
use crate::domain::entities::position::Position;
use crate::domain::entities::user_account::UserAccount;
use crate::domain::error::DomainError;
use crate::domain::ports::position_repository::PositionRepository;
use crate::domain::ports::usage_ledger::UsageLedger;
use crate::domain::ports::user_tier::UserTierProvider;
use crate::domain::values::tier::UserTierInfo;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::sync::Mutex;

/// Users, their positions and on-demand usage. Backs the tier, position
/// and usage ports.
pub struct SqliteAccountRepo {
    conn: Mutex<Connection>,
}

impl SqliteAccountRepo {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn row_to_tier_info(row: &rusqlite::Row, offset: usize) -> Result<UserTierInfo, rusqlite::Error> {
        let tier: String = row.get(offset)?;
        let limit: i64 = row.get(offset + 2)?;
        Ok(UserTierInfo {
            tier: parse_col(offset, &tier)?,
            portfolio_monitoring: row.get(offset + 1)?,
            on_demand_limit: u32::try_from(limit.max(0)).unwrap_or(u32::MAX),
            custom_alerts: row.get(offset + 3)?,
        })
    }

    fn row_to_account(row: &rusqlite::Row) -> Result<UserAccount, rusqlite::Error> {
        let created: String = row.get(5)?;
        Ok(UserAccount {
            id: row.get(0)?,
            tier_info: Self::row_to_tier_info(row, 1)?,
            created_at: parse_ts(5, &created)?,
        })
    }

    fn row_to_position(row: &rusqlite::Row) -> Result<Position, rusqlite::Error> {
        let opened: String = row.get(6)?;
        let closed: Option<String> = row.get(7)?;
        Ok(Position {
            id: row.get(0)?,
            user_id: row.get(1)?,
            symbol: row.get(2)?,
            quantity: row.get(3)?,
            entry_price: row.get(4)?,
            stop_loss: row.get(5)?,
            opened_at: parse_ts(6, &opened)?,
            closed_at: closed.as_deref().map(|s| parse_ts(7, s)).transpose()?,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, DomainError> {
        self.conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}

impl UserTierProvider for SqliteAccountRepo {
    fn list_users(&self) -> Result<Vec<UserAccount>, DomainError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, tier, portfolio_monitoring, on_demand_limit, custom_alerts, created_at
                 FROM users ORDER BY id",
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let users = stmt
            .query_map([], Self::row_to_account)
            .map_err(|e| DomainError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to read users"))?;
        Ok(users)
    }

    fn tier_info(&self, user_id: &str) -> Result<Option<UserTierInfo>, DomainError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT tier, portfolio_monitoring, on_demand_limit, custom_alerts FROM users WHERE id = ?1",
            params![user_id],
            |row| Self::row_to_tier_info(row, 0),
        )
        .optional()
        .map_err(db_err("Failed to load user tier"))
    }

    fn add_user(&self, account: &UserAccount) -> Result<(), DomainError> {
        let conn = self.lock()?;
        let info = &account.tier_info;
        conn.execute(
            "INSERT INTO users (id, tier, portfolio_monitoring, on_demand_limit, custom_alerts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                tier = excluded.tier,
                portfolio_monitoring = excluded.portfolio_monitoring,
                on_demand_limit = excluded.on_demand_limit,
                custom_alerts = excluded.custom_alerts",
            params![
                account.id,
                info.tier.to_string(),
                info.portfolio_monitoring,
                i64::from(info.on_demand_limit),
                info.custom_alerts,
                ts(&account.created_at),
            ],
        )
        .map_err(db_err("Failed to add user"))?;
        Ok(())
    }
}

impl PositionRepository for SqliteAccountRepo {
    fn add_position(&self, position: &Position) -> Result<(), DomainError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO positions (id, user_id, symbol, quantity, entry_price, stop_loss, opened_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                position.id,
                position.user_id,
                position.symbol,
                position.quantity,
                position.entry_price,
                position.stop_loss,
                ts(&position.opened_at),
                position.closed_at.as_ref().map(ts),
            ],
        )
        .map_err(db_err("Failed to add position"))?;
        Ok(())
    }

    fn close_position(&self, id: &str) -> Result<(), DomainError> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "UPDATE positions SET closed_at = ?1 WHERE id = ?2 AND closed_at IS NULL",
                params![ts(&Utc::now()), id],
            )
            .map_err(db_err("Failed to close position"))?;
        if rows == 0 {
            return Err(DomainError::NotFound(format!("Open position not found: {id}")));
        }
        Ok(())
    }

    fn open_positions(&self, user_id: &str) -> Result<Vec<Position>, DomainError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, symbol, quantity, entry_price, stop_loss, opened_at, closed_at
                 FROM positions WHERE user_id = ?1 AND closed_at IS NULL ORDER BY opened_at",
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let positions = stmt
            .query_map(params![user_id], Self::row_to_position)
            .map_err(|e| DomainError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to read positions"))?;
        Ok(positions)
    }
}

impl UsageLedger for SqliteAccountRepo {
    fn try_consume(
        &self,
        user_id: &str,
        limit: u32,
        since: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front so two processes cannot
        // both count below the limit and then insert.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err("Failed to begin usage transaction"))?;
        let used: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM on_demand_usage WHERE user_id = ?1 AND used_at > ?2",
                params![user_id, ts(&since)],
                |row| row.get(0),
            )
            .map_err(db_err("Failed to count usage"))?;
        if used >= i64::from(limit) {
            return Ok(false);
        }
        tx.execute(
            "INSERT INTO on_demand_usage (user_id, used_at) VALUES (?1, ?2)",
            params![user_id, ts(&at)],
        )
        .map_err(db_err("Failed to record usage"))?;
        tx.commit().map_err(db_err("Failed to commit usage"))?;
        Ok(true)
    }

    fn used_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<u32, DomainError> {
        let conn = self.lock()?;
        let used: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM on_demand_usage WHERE user_id = ?1 AND used_at > ?2",
                params![user_id, ts(&since)],
                |row| row.get(0),
            )
            .map_err(db_err("Failed to count usage"))?;
        Ok(u32::try_from(used).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::values::tier::UserTier;
    use crate::infrastructure::sqlite::open_connection;

    #[test]
    fn test_user_roundtrip_keeps_unlimited_quota() {
        let repo = SqliteAccountRepo::new(open_connection(":memory:").unwrap());
        repo.add_user(&UserAccount::new("alice".into(), UserTierInfo::for_tier(UserTier::Premium)))
            .unwrap();
        let info = repo.tier_info("alice").unwrap().unwrap();
        assert_eq!(info.tier, UserTier::Premium);
        assert_eq!(info.on_demand_limit, u32::MAX);
        assert!(repo.tier_info("bob").unwrap().is_none());
    }

    #[test]
    fn test_closed_positions_are_not_open() {
        let repo = SqliteAccountRepo::new(open_connection(":memory:").unwrap());
        let p = Position::new("alice".into(), "solusdt".into(), 10.0, 20.0, None);
        repo.add_position(&p).unwrap();
        assert_eq!(repo.open_positions("alice").unwrap().len(), 1);

        repo.close_position(&p.id).unwrap();
        assert!(repo.open_positions("alice").unwrap().is_empty());
        assert!(matches!(repo.close_position(&p.id), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn test_usage_counts_only_inside_window() {
        let repo = SqliteAccountRepo::new(open_connection(":memory:").unwrap());
        let now = Utc::now();
        let old = now - chrono::Duration::hours(30);
        assert!(repo.try_consume("alice", 2, old - chrono::Duration::hours(24), old).unwrap());

        let since = now - chrono::Duration::hours(24);
        assert_eq!(repo.used_since("alice", since).unwrap(), 0);
        assert!(repo.try_consume("alice", 2, since, now).unwrap());
        assert!(repo.try_consume("alice", 2, since, now).unwrap());
        assert!(!repo.try_consume("alice", 2, since, now).unwrap());
        assert_eq!(repo.used_since("alice", since).unwrap(), 2);
        assert_eq!(repo.used_since("bob", since).unwrap(), 0);
    }
}

use super::{db_err, parse_col, parse_ts, ts};
use crate::domain::entities::discovery_recommendation::DiscoveryRecommendation;
use crate::domain::entities::portfolio_recommendation::PortfolioRecommendation;
use crate::domain::error::DomainError;
use crate::domain::ports::recommendation_store::*;
use crate::domain::values::confidence::Confidence;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::Mutex;

const DISCOVERY_COLUMNS: &str = "id, symbol, strategy, coin_universe, confidence, entry_price, stop_loss, \
     take_profit_low, take_profit_high, position_size_pct, risk_level, reasoning, sources, \
     discovery_score, created_at, expires_at";

const PORTFOLIO_COLUMNS: &str = "id, user_id, symbol, confidence, current_price, entry_price, quantity, \
     unrealized_pnl, percent_gain, sell_reason, risk_level, reasoning, created_at, expires_at";

pub struct SqliteRecommendationStore {
    conn: Mutex<Connection>,
}

impl SqliteRecommendationStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn row_to_discovery(row: &rusqlite::Row) -> Result<DiscoveryRecommendation, rusqlite::Error> {
        let strategy: String = row.get(2)?;
        let universe: String = row.get(3)?;
        let risk: String = row.get(10)?;
        let sources: String = row.get(12)?;
        let created: String = row.get(14)?;
        let expires: String = row.get(15)?;

        Ok(DiscoveryRecommendation {
            id: row.get(0)?,
            symbol: row.get(1)?,
            strategy: parse_col(2, &strategy)?,
            coin_universe: parse_col(3, &universe)?,
            confidence: Confidence::clamped(row.get(4)?),
            entry_price: row.get(5)?,
            stop_loss: row.get(6)?,
            take_profit_levels: [row.get(7)?, row.get(8)?],
            position_size_pct: row.get(9)?,
            risk_level: parse_col(10, &risk)?,
            reasoning: row.get(11)?,
            sources: serde_json::from_str(&sources).unwrap_or_default(),
            discovery_score: row.get(13)?,
            created_at: parse_ts(14, &created)?,
            expires_at: parse_ts(15, &expires)?,
        })
    }

    fn row_to_portfolio(row: &rusqlite::Row) -> Result<PortfolioRecommendation, rusqlite::Error> {
        let reason: String = row.get(9)?;
        let risk: String = row.get(10)?;
        let created: String = row.get(12)?;
        let expires: String = row.get(13)?;

        Ok(PortfolioRecommendation {
            id: row.get(0)?,
            user_id: row.get(1)?,
            symbol: row.get(2)?,
            confidence: Confidence::clamped(row.get(3)?),
            current_price: row.get(4)?,
            entry_price: row.get(5)?,
            quantity: row.get(6)?,
            unrealized_pnl: row.get(7)?,
            percent_gain: row.get(8)?,
            sell_reason: parse_col(9, &reason)?,
            risk_level: parse_col(10, &risk)?,
            reasoning: row.get(11)?,
            created_at: parse_ts(12, &created)?,
            expires_at: parse_ts(13, &expires)?,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, DomainError> {
        self.conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}

fn check_discovery(rec: &DiscoveryRecommendation) -> Result<(), DomainError> {
    if !rec.is_well_formed() {
        return Err(DomainError::InvalidInput(format!(
            "Malformed discovery recommendation for {}: stop {}, entry {}, targets {:?}",
            rec.symbol, rec.stop_loss, rec.entry_price, rec.take_profit_levels
        )));
    }
    Ok(())
}

fn write_discovery(conn: &Connection, rec: &DiscoveryRecommendation) -> Result<(), DomainError> {
    let sources = serde_json::to_string(&rec.sources).unwrap_or_else(|_| "[]".into());
    conn.execute(
        &format!(
            "INSERT INTO discovery_recommendations ({DISCOVERY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            rec.id,
            rec.symbol,
            rec.strategy.to_string(),
            rec.coin_universe.to_string(),
            rec.confidence.value(),
            rec.entry_price,
            rec.stop_loss,
            rec.take_profit_levels[0],
            rec.take_profit_levels[1],
            rec.position_size_pct,
            rec.risk_level.to_string(),
            rec.reasoning,
            sources,
            rec.discovery_score,
            ts(&rec.created_at),
            ts(&rec.expires_at),
        ],
    )
    .map_err(db_err("Failed to insert discovery recommendation"))?;
    Ok(())
}

/// Expire every active recommendation for the same (user, symbol), then insert.
fn write_portfolio(conn: &Connection, rec: &PortfolioRecommendation) -> Result<(), DomainError> {
    let now = ts(&Utc::now());
    conn.execute(
        "UPDATE portfolio_recommendations
         SET superseded_by = ?1, expires_at = MIN(expires_at, ?2)
         WHERE user_id = ?3 AND symbol = ?4 AND superseded_by IS NULL",
        params![rec.id, now, rec.user_id, rec.symbol],
    )
    .map_err(db_err("Failed to supersede portfolio recommendations"))?;
    conn.execute(
        &format!(
            "INSERT INTO portfolio_recommendations ({PORTFOLIO_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            rec.id,
            rec.user_id,
            rec.symbol,
            rec.confidence.value(),
            rec.current_price,
            rec.entry_price,
            rec.quantity,
            rec.unrealized_pnl,
            rec.percent_gain,
            rec.sell_reason.to_string(),
            rec.risk_level.to_string(),
            rec.reasoning,
            ts(&rec.created_at),
            ts(&rec.expires_at),
        ],
    )
    .map_err(db_err("Failed to insert portfolio recommendation"))?;
    Ok(())
}

impl RecommendationStore for SqliteRecommendationStore {
    fn insert_discovery(&self, rec: &DiscoveryRecommendation) -> Result<(), DomainError> {
        check_discovery(rec)?;
        let conn = self.lock()?;
        write_discovery(&conn, rec)
    }

    fn insert_portfolio(&self, rec: &PortfolioRecommendation) -> Result<(), DomainError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err("Failed to begin transaction"))?;
        write_portfolio(&tx, rec)?;
        tx.commit().map_err(db_err("Failed to commit portfolio recommendation"))
    }

    fn insert_batch(&self, batch: &RecommendationBatch) -> Result<(), DomainError> {
        for rec in &batch.discovery {
            check_discovery(rec)?;
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err("Failed to begin transaction"))?;
        for rec in &batch.discovery {
            write_discovery(&tx, rec)?;
        }
        for rec in &batch.portfolio {
            write_portfolio(&tx, rec)?;
        }
        tx.commit().map_err(db_err("Failed to commit recommendation batch"))
    }

    fn query_discovery(
        &self,
        filter: &RecommendationFilter,
    ) -> Result<Vec<DiscoveryRecommendation>, DomainError> {
        let mut sql = format!("SELECT {DISCOVERY_COLUMNS} FROM discovery_recommendations WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(strategy) = filter.strategy {
            sql.push_str(&format!(" AND strategy = ?{}", param_values.len() + 1));
            param_values.push(Box::new(strategy.to_string()));
        }
        if let Some(universe) = filter.universe {
            sql.push_str(&format!(" AND coin_universe = ?{}", param_values.len() + 1));
            param_values.push(Box::new(universe.to_string()));
        }
        if let Some(symbol) = &filter.symbol {
            sql.push_str(&format!(" AND symbol = ?{}", param_values.len() + 1));
            param_values.push(Box::new(symbol.to_uppercase()));
        }
        if !filter.include_expired {
            sql.push_str(&format!(" AND expires_at > ?{}", param_values.len() + 1));
            param_values.push(Box::new(ts(&Utc::now())));
        }
        sql.push_str(" ORDER BY created_at DESC, discovery_score DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let recs = stmt
            .query_map(params_refs.as_slice(), Self::row_to_discovery)
            .map_err(|e| DomainError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to read discovery recommendations"))?;
        Ok(recs)
    }

    fn query_portfolio(
        &self,
        filter: &RecommendationFilter,
    ) -> Result<Vec<PortfolioRecommendation>, DomainError> {
        let mut sql = format!("SELECT {PORTFOLIO_COLUMNS} FROM portfolio_recommendations WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(user_id) = &filter.user_id {
            sql.push_str(&format!(" AND user_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(user_id.clone()));
        }
        if let Some(symbol) = &filter.symbol {
            sql.push_str(&format!(" AND symbol = ?{}", param_values.len() + 1));
            param_values.push(Box::new(symbol.to_uppercase()));
        }
        if !filter.include_expired {
            sql.push_str(&format!(
                " AND superseded_by IS NULL AND expires_at > ?{}",
                param_values.len() + 1
            ));
            param_values.push(Box::new(ts(&Utc::now())));
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let recs = stmt
            .query_map(params_refs.as_slice(), Self::row_to_portfolio)
            .map_err(|e| DomainError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to read portfolio recommendations"))?;
        Ok(recs)
    }
}

use super::{db_err, parse_col, parse_ts, ts};
use crate::domain::entities::review_run::ReviewRun;
use crate::domain::error::DomainError;
use crate::domain::ports::audit_log::*;
use crate::domain::values::run_metadata::RunMetadata;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

const COLUMNS: &str = "id, review_type, status, phase, coins_analyzed, buy_count, sell_count, \
                       skipped_count, error_message, metadata, duration_ms, timestamp";

pub struct SqliteAuditLog {
    conn: Mutex<Connection>,
}

impl SqliteAuditLog {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn row_to_run(row: &rusqlite::Row) -> Result<ReviewRun, rusqlite::Error> {
        let review_type: String = row.get(1)?;
        let status: String = row.get(2)?;
        let phase: String = row.get(3)?;
        let metadata_str: String = row.get(9)?;
        let duration_ms: i64 = row.get(10)?;
        let timestamp: String = row.get(11)?;

        Ok(ReviewRun {
            id: row.get(0)?,
            review_type: parse_col(1, &review_type)?,
            status: parse_col(2, &status)?,
            phase: parse_col(3, &phase)?,
            coins_analyzed: row.get(4)?,
            buy_count: row.get(5)?,
            sell_count: row.get(6)?,
            skipped_count: row.get(7)?,
            error_message: row.get(8)?,
            metadata: serde_json::from_str::<RunMetadata>(&metadata_str).unwrap_or_default(),
            duration_ms: duration_ms.max(0) as u64,
            timestamp: parse_ts(11, &timestamp)?,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, DomainError> {
        self.conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}

fn metadata_json(metadata: &RunMetadata) -> Result<String, DomainError> {
    serde_json::to_string(metadata).map_err(|e| DomainError::Parse(format!("metadata: {e}")))
}

impl AuditLog for SqliteAuditLog {
    fn insert(&self, run: &ReviewRun) -> Result<String, DomainError> {
        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO review_runs ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
            params![
                run.id,
                run.review_type.to_string(),
                run.status.to_string(),
                run.phase.to_string(),
                run.coins_analyzed,
                run.buy_count,
                run.sell_count,
                run.skipped_count,
                run.error_message,
                metadata_json(&run.metadata)?,
                run.duration_ms as i64,
                ts(&run.timestamp),
            ],
        )
        .map_err(db_err("Failed to insert review run"))?;
        Ok(run.id.clone())
    }

    fn update(&self, id: &str, patch: &AuditPatch) -> Result<(), DomainError> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut set = |column: &str, value: Box<dyn rusqlite::types::ToSql>| {
            values.push(value);
            sets.push(format!("{column} = ?{}", values.len()));
        };

        if let Some(status) = patch.status {
            set("status", Box::new(status.to_string()));
        }
        if let Some(phase) = patch.phase {
            set("phase", Box::new(phase.to_string()));
        }
        if let Some(n) = patch.coins_analyzed {
            set("coins_analyzed", Box::new(n));
        }
        if let Some(n) = patch.buy_count {
            set("buy_count", Box::new(n));
        }
        if let Some(n) = patch.sell_count {
            set("sell_count", Box::new(n));
        }
        if let Some(n) = patch.skipped_count {
            set("skipped_count", Box::new(n));
        }
        if let Some(msg) = &patch.error_message {
            set("error_message", Box::new(msg.clone()));
        }
        if let Some(metadata) = &patch.metadata {
            set("metadata", Box::new(metadata_json(metadata)?));
        }
        if let Some(ms) = patch.duration_ms {
            set("duration_ms", Box::new(ms as i64));
        }

        values.push(Box::new(id.to_string()));
        let sql = format!(
            "UPDATE review_runs SET {} WHERE id = ?{}",
            sets.join(", "),
            values.len()
        );
        let params_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|p| p.as_ref()).collect();

        let conn = self.lock()?;
        let rows = conn
            .execute(&sql, params_refs.as_slice())
            .map_err(db_err("Failed to update review run"))?;
        if rows == 0 {
            return Err(DomainError::NotFound(format!("Review run not found: {id}")));
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ReviewRun>, DomainError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM review_runs WHERE id = ?1"),
            params![id],
            Self::row_to_run,
        )
        .optional()
        .map_err(db_err("Failed to load review run"))
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<ReviewRun>, DomainError> {
        let mut sql = format!("SELECT {COLUMNS} FROM review_runs WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(review_type) = filter.review_type {
            sql.push_str(&format!(" AND review_type = ?{}", param_values.len() + 1));
            param_values.push(Box::new(review_type.to_string()));
        }
        if let Some(status) = filter.status {
            sql.push_str(&format!(" AND status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.to_string()));
        }
        if let Some(since) = &filter.since {
            sql.push_str(&format!(" AND timestamp >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(ts(since)));
        }
        if let Some(before) = &filter.before {
            sql.push_str(&format!(" AND timestamp < ?{}", param_values.len() + 1));
            param_values.push(Box::new(ts(before)));
        }
        sql.push_str(" ORDER BY timestamp DESC");
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
        let runs = stmt
            .query_map(params_refs.as_slice(), Self::row_to_run)
            .map_err(|e| DomainError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to read review runs"))?;
        Ok(runs)
    }

    fn aggregate(&self) -> Result<AuditStats, DomainError> {
        let conn = self.lock()?;
        let mut stats = conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'completed'), 0),
                        COALESCE(SUM(status = 'failed'), 0),
                        COALESCE(SUM(status = 'started'), 0),
                        AVG(CASE WHEN status != 'started' THEN duration_ms END),
                        COALESCE(SUM(buy_count), 0),
                        COALESCE(SUM(sell_count), 0),
                        MAX(timestamp)
                 FROM review_runs",
                [],
                |row| {
                    let last: Option<String> = row.get(7)?;
                    Ok(AuditStats {
                        total_runs: row.get::<_, i64>(0)? as usize,
                        completed: row.get::<_, i64>(1)? as usize,
                        failed: row.get::<_, i64>(2)? as usize,
                        in_progress: row.get::<_, i64>(3)? as usize,
                        avg_duration_ms: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                        total_buy_recommendations: row.get::<_, i64>(5)? as u64,
                        total_sell_recommendations: row.get::<_, i64>(6)? as u64,
                        failures_by_phase: Vec::new(),
                        last_run_at: last.as_deref().map(|s| parse_ts(7, s)).transpose()?,
                    })
                },
            )
            .map_err(db_err("Failed to aggregate review runs"))?;

        let mut stmt = conn
            .prepare(
                "SELECT phase, COUNT(*) FROM review_runs WHERE status = 'failed'
                 GROUP BY phase ORDER BY COUNT(*) DESC, phase",
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        stats.failures_by_phase = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)))
            .map_err(|e| DomainError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(stats)
    }

    fn prune(&self, keep_last: usize) -> Result<usize, DomainError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM review_runs
             WHERE status != 'started'
               AND id NOT IN (SELECT id FROM review_runs ORDER BY timestamp DESC LIMIT ?1)",
            params![keep_last as i64],
        )
        .map_err(db_err("Failed to prune review runs"))
    }
}

pub mod account_repo;
pub mod audit_repo;
pub mod migrations;
pub mod recommendation_repo;

use crate::domain::error::DomainError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::str::FromStr;

/// Open a connection with WAL enabled and the schema migrated. `:memory:`
/// yields a private in-memory database.
pub fn open_connection(path: &str) -> Result<Connection, DomainError> {
    let conn = if path == ":memory:" {
        Connection::open_in_memory()
    } else {
        Connection::open(path)
    }
    .map_err(|e| DomainError::Database(format!("DB error: {e}")))?;

    if path != ":memory:" {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
    }
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

/// Fixed-width UTC timestamps so text comparison orders chronologically.
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(idx: usize, s: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{s}': {e}")))
}

pub(crate) fn parse_col<T>(idx: usize, s: &str) -> Result<T, rusqlite::Error>
where
    T: FromStr<Err = String>,
{
    s.parse().map_err(|e: String| conversion_error(idx, e))
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(DomainError::Parse(msg)),
    )
}

pub(crate) fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> DomainError + '_ {
    move |e| DomainError::Database(format!("{context}: {e}"))
}

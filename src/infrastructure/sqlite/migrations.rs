use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS review_runs (
            id TEXT PRIMARY KEY,
            review_type TEXT NOT NULL,
            status TEXT NOT NULL,
            phase TEXT NOT NULL,
            coins_analyzed INTEGER NOT NULL DEFAULT 0,
            buy_count INTEGER NOT NULL DEFAULT 0,
            sell_count INTEGER NOT NULL DEFAULT 0,
            skipped_count INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            duration_ms INTEGER NOT NULL DEFAULT 0,
            timestamp TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS discovery_recommendations (
            id TEXT PRIMARY KEY,
            symbol TEXT NOT NULL,
            strategy TEXT NOT NULL,
            coin_universe TEXT NOT NULL,
            confidence REAL NOT NULL,
            entry_price REAL NOT NULL,
            stop_loss REAL NOT NULL,
            take_profit_low REAL NOT NULL,
            take_profit_high REAL NOT NULL,
            position_size_pct REAL NOT NULL,
            risk_level TEXT NOT NULL,
            reasoning TEXT NOT NULL,
            sources TEXT NOT NULL DEFAULT '[]',
            discovery_score REAL NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS portfolio_recommendations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            symbol TEXT NOT NULL,
            confidence REAL NOT NULL,
            current_price REAL NOT NULL,
            entry_price REAL NOT NULL,
            quantity REAL NOT NULL,
            unrealized_pnl REAL NOT NULL,
            percent_gain REAL NOT NULL,
            sell_reason TEXT NOT NULL,
            risk_level TEXT NOT NULL,
            reasoning TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            superseded_by TEXT
        );

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            tier TEXT NOT NULL,
            portfolio_monitoring INTEGER NOT NULL DEFAULT 0,
            on_demand_limit INTEGER NOT NULL DEFAULT 3,
            custom_alerts INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS positions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            symbol TEXT NOT NULL,
            quantity REAL NOT NULL,
            entry_price REAL NOT NULL,
            stop_loss REAL,
            opened_at TEXT NOT NULL,
            closed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS on_demand_usage (
            user_id TEXT NOT NULL,
            used_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_runs_timestamp ON review_runs(timestamp);
        CREATE INDEX IF NOT EXISTS idx_runs_status ON review_runs(status);
        CREATE INDEX IF NOT EXISTS idx_discovery_symbol ON discovery_recommendations(strategy, coin_universe, symbol);
        CREATE INDEX IF NOT EXISTS idx_discovery_expires ON discovery_recommendations(expires_at);
        CREATE INDEX IF NOT EXISTS idx_portfolio_user_symbol ON portfolio_recommendations(user_id, symbol);
        CREATE INDEX IF NOT EXISTS idx_positions_user ON positions(user_id, closed_at);
        CREATE INDEX IF NOT EXISTS idx_usage_user ON on_demand_usage(user_id, used_at);
        "
    ).map_err(|e| format!("Migration failed: {e}"))
}

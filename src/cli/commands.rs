use clap::{Parser, Subcommand};

use crate::application::orchestrator::ReviewRequest;

#[derive(Parser)]
#[command(name = "cryptoadvisor", about = "Adaptive crypto market review pipeline")]
pub struct Cli {
    /// SQLite database path (overrides CRYPTOADVISOR_DB)
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one review now and print its report
    Run {
        /// Who asked for the run
        #[arg(long, default_value = "cli")]
        requested_by: String,
        /// Review only this user's portfolio, billed as on-demand
        #[arg(long)]
        user: Option<String>,
        /// Record the run as event-triggered with this reason
        #[arg(long)]
        reason: Option<String>,
    },
    /// Run the scheduler loop until ctrl-c
    Daemon,
    /// Print current market conditions and the review interval they imply
    Assess,
    /// List review runs from the audit log
    Audit {
        /// Review type (scheduled, manual, triggered)
        #[arg(long = "type")]
        review_type: Option<String>,
        /// Status (started, completed, failed)
        #[arg(long)]
        status: Option<String>,
        /// Only runs since this date (YYYY-MM-DD or RFC3339)
        #[arg(long)]
        since: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Show a single run by id
        #[arg(long, conflicts_with_all = ["review_type", "status", "since"])]
        id: Option<String>,
    },
    /// Aggregate statistics over the audit log
    AuditStats,
    /// Delete old audit rows, keeping the newest N
    Prune {
        #[arg(long)]
        keep: usize,
    },
    /// List active recommendations
    Recs {
        /// Show portfolio (sell) recommendations instead of discovery (buy)
        #[arg(long)]
        portfolio: bool,
        /// Strategy filter for discovery (conservative, moderate, aggressive)
        #[arg(long)]
        strategy: Option<String>,
        /// Universe filter for discovery (top10, top25, top50, top100)
        #[arg(long)]
        universe: Option<String>,
        /// User filter for portfolio recommendations
        #[arg(long)]
        user: Option<String>,
        /// Include expired and superseded recommendations
        #[arg(long)]
        all: bool,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Add or update a user
    UserAdd {
        id: String,
        /// Tier (free, premium)
        #[arg(long, default_value = "free")]
        tier: String,
        /// Override the on-demand review limit
        #[arg(long)]
        on_demand_limit: Option<u32>,
    },
    /// List users
    Users,
    /// Record an open position
    PositionAdd {
        user: String,
        symbol: String,
        quantity: f64,
        entry_price: f64,
        #[arg(long)]
        stop_loss: Option<f64>,
    },
    /// Close a position by id
    PositionClose { id: String },
    /// List a user's open positions
    Positions {
        user: String,
    },
}

/// Request for `run`: triggered when a reason is given, manual otherwise,
/// scoped to `user` in either case.
pub fn run_request(requested_by: String, user: Option<String>, reason: Option<String>) -> ReviewRequest {
    let request = match reason {
        Some(reason) => ReviewRequest::triggered(reason),
        None => ReviewRequest::manual(requested_by),
    };
    match user {
        Some(user) => request.on_behalf_of(user),
        None => request,
    }
}

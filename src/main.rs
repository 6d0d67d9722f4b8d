use clap::Parser;
use cryptoadvisor::cli::commands::{run_request, Cli, Commands};
use cryptoadvisor::config::AdvisorConfig;
use cryptoadvisor::domain::values::review::{ReviewType, RunStatus};
use cryptoadvisor::domain::values::strategy::{CoinUniverse, Strategy};
use cryptoadvisor::domain::values::tier::UserTier;
use cryptoadvisor::ReviewEngine;
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mut config = match AdvisorConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(db) = cli.db.clone() {
        config.db_path = db;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let engine = match ReviewEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error initializing cryptoadvisor: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(engine, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_command(engine: ReviewEngine, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Run {
            requested_by,
            user,
            reason,
        } => {
            let report = engine.run_now(run_request(requested_by, user, reason)).await?;
            print_json(&report)?;
            if report.status == RunStatus::Failed {
                return Err(format!(
                    "run {} failed at {}: {}",
                    report.run_id,
                    report.phase,
                    report.error_message.unwrap_or_default()
                )
                .into());
            }
        }
        Commands::Daemon => {
            engine.run_scheduler().await?;
        }
        Commands::Assess => {
            let conditions = engine.assess_market().await?;
            print_json(&conditions)?;
        }
        Commands::Audit {
            review_type,
            status,
            since,
            limit,
            id,
        } => {
            if let Some(id) = id {
                print_json(&engine.audit_get(&id)?)?;
                return Ok(());
            }
            let review_type: Option<ReviewType> = review_type
                .map(|t| t.parse())
                .transpose()
                .map_err(|e: String| e)?;
            let status: Option<RunStatus> = status.map(|s| s.parse()).transpose().map_err(|e: String| e)?;
            let since = parse_date(&since)?;
            let runs = engine.audit_list(review_type, status, since, Some(limit))?;
            print_json(&runs)?;
        }
        Commands::AuditStats => {
            print_json(&engine.audit_stats()?)?;
        }
        Commands::Prune { keep } => {
            let removed = engine.audit_prune(keep)?;
            println!("Removed {removed} audit rows, kept the newest {keep}");
        }
        Commands::Recs {
            portfolio,
            strategy,
            universe,
            user,
            all,
            limit,
        } => {
            if portfolio {
                print_json(&engine.portfolio_recommendations(user, all, Some(limit))?)?;
            } else {
                let strategy: Option<Strategy> = strategy.map(|s| s.parse()).transpose().map_err(|e: String| e)?;
                let universe: Option<CoinUniverse> =
                    universe.map(|u| u.parse()).transpose().map_err(|e: String| e)?;
                print_json(&engine.discovery_recommendations(strategy, universe, all, Some(limit))?)?;
            }
        }
        Commands::UserAdd {
            id,
            tier,
            on_demand_limit,
        } => {
            let tier: UserTier = tier.parse().map_err(|e: String| e)?;
            print_json(&engine.add_user(&id, tier, on_demand_limit)?)?;
        }
        Commands::Users => {
            print_json(&engine.users()?)?;
        }
        Commands::PositionAdd {
            user,
            symbol,
            quantity,
            entry_price,
            stop_loss,
        } => {
            print_json(&engine.open_position(&user, &symbol, quantity, entry_price, stop_loss)?)?;
        }
        Commands::PositionClose { id } => {
            engine.close_position(&id)?;
            println!("Position {id} closed");
        }
        Commands::Positions { user } => {
            print_json(&engine.positions(&user)?)?;
        }
    }
    Ok(())
}

fn parse_date(s: &Option<String>) -> Result<Option<chrono::DateTime<chrono::Utc>>, String> {
    match s {
        None => Ok(None),
        Some(s) => {
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
                return Ok(Some(dt.with_timezone(&chrono::Utc)));
            }
            if let Some(dt) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
            {
                return Ok(Some(chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc)));
            }
            Err(format!("Invalid date format: {s}. Use YYYY-MM-DD or RFC3339"))
        }
    }
}

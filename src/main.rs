//! expense-ledger operator entry point.
//!
//! Runs one ledger operation against PostgreSQL and prints the result as
//! JSON.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use expense_ledger::app_state::AppState;
use expense_ledger::config::{LedgerConfig, LogFormat};
use expense_ledger::domain::UserId;
use expense_ledger::persistence::PostgresStore;

#[derive(Debug, Parser)]
#[command(
    name = "expense-ledger",
    version,
    about = "Balance and recurring-expense operations for the expense ledger"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Net confirmed shared-expense splits for a user
    Balances {
        /// User id
        #[arg(long)]
        user: Uuid,
    },

    /// Generate the user's recurring expenses for a month
    Materialize(PeriodArgs),

    /// Monthly dashboard (materializes the month and the next one)
    Dashboard(PeriodArgs),

    /// List the user's incomes of a month
    Incomes(PeriodArgs),

    /// List group invites waiting for the user
    Invites {
        /// User id
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Debug, Args)]
struct PeriodArgs {
    /// User id
    #[arg(long)]
    user: Uuid,

    /// Month (1-12)
    #[arg(long)]
    month: u32,

    /// Year
    #[arg(long)]
    year: i32,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = LedgerConfig::from_env();
    init_tracing(config.log_format);

    let store = PostgresStore::connect(&config).await?;
    let state = AppState::new(Arc::new(store), &config);

    match cli.command {
        Command::Balances { user } => {
            let summary = state.balances.compute_balances(UserId::from(user)).await?;
            print_json(&summary)?;
        }
        Command::Materialize(args) => {
            let report = state
                .recurring
                .ensure_materialized(UserId::from(args.user), args.month, args.year)
                .await?;
            tracing::info!(
                created = report.created,
                skipped = report.skipped,
                failed = report.failed,
                "materialization finished"
            );
            print_json(&report)?;
        }
        Command::Dashboard(args) => {
            let dashboard = state
                .reports
                .dashboard(UserId::from(args.user), args.month, args.year)
                .await?;
            print_json(&dashboard)?;
        }
        Command::Incomes(args) => {
            let incomes = state
                .incomes
                .list(UserId::from(args.user), Some(args.month), Some(args.year))
                .await?;
            print_json(&incomes)?;
        }
        Command::Invites { user } => {
            let pending = state.invites.pending_for(UserId::from(user)).await?;
            print_json(&pending)?;
        }
    }

    Ok(())
}

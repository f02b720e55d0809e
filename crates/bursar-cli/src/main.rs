//! Bursar CLI - membership treasury administration
//!
//! Usage:
//!   bursar init                          Initialize database
//!   bursar accounts add "Treasury"       Create a bank account
//!   bursar members add "A. Example" ...  Register a member
//!   bursar members plan 1 --fee 6000 ... Create a payment plan
//!   bursar installments pay 1 ...        Settle an installment
//!   bursar members dues 1                What a member owes

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt),
        Commands::Accounts { action } => {
            commands::cmd_accounts(&cli.db, action, cli.no_encrypt)
        }
        Commands::Categories { action } => {
            commands::cmd_categories(&cli.db, action, cli.no_encrypt)
        }
        Commands::Records { action } => commands::cmd_records(&cli.db, action, cli.no_encrypt),
        Commands::Members { action } => commands::cmd_members(&cli.db, action, cli.no_encrypt),
        Commands::Subscriptions { action } => {
            commands::cmd_subscriptions(&cli.db, action, cli.no_encrypt)
        }
        Commands::Installments { action } => {
            commands::cmd_installments(&cli.db, action, cli.no_encrypt)
        }
        Commands::Loans { action } => commands::cmd_loans(&cli.db, action, cli.no_encrypt),
        Commands::RankFees { action } => {
            commands::cmd_rank_fees(&cli.db, action, cli.no_encrypt)
        }
    }
}

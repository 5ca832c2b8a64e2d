//! Command-line interface
//!
//! Argument parsing and dispatch to the services layer.

pub mod menu;

use crate::error::Result;
use crate::services::{FundamentalService, IndexingService};
use crate::state::AppState;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ohlcv-indexer", version, about = "Daily OHLCV indicator indexer")]
pub struct Cli {
    /// Use the in-memory store; nothing is persisted
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Without a subcommand an interactive menu is shown.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Backfill every ticker from the configured start date
    Full,
    /// Refresh the trailing window of every ticker
    Incremental {
        /// Trading day to index (defaults to the market clock)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Reindex one ticker over an explicit date range
    Targeted {
        #[arg(long)]
        ticker: String,
        /// First date, YYYY-MM-DD
        #[arg(long)]
        start: NaiveDate,
        /// Last date (inclusive), YYYY-MM-DD
        #[arg(long)]
        end: NaiveDate,
    },
    /// Sync fundamentals for one ticker or the whole universe
    Fundamentals {
        #[arg(long)]
        ticker: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a command against the application state
pub async fn dispatch(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Full => print_json(&IndexingService::full_index(state).await?),
        Command::Incremental { date: None } => {
            print_json(&IndexingService::incremental_index(state).await?)
        }
        Command::Incremental { date: Some(date) } => {
            print_json(&IndexingService::incremental_index_at(state, date).await?)
        }
        Command::Targeted { ticker, start, end } => {
            print_json(&IndexingService::targeted_index(state, &ticker, start, end).await?)
        }
        Command::Fundamentals { ticker: Some(ticker) } => {
            print_json(&FundamentalService::sync_ticker(state, &ticker).await?)
        }
        Command::Fundamentals { ticker: None } => {
            print_json(&FundamentalService::sync_all(state).await?)
        }
    }
}

//! Services Layer
//!
//! Run-level logic called by the CLI commands.
//!
//! # Services
//!
//! - `IndexingService` - Full, incremental and targeted price indexing
//! - `FundamentalService` - Fundamentals sync with quarterly history merge

pub mod fundamental_service;
pub mod indexing_service;

pub use fundamental_service::{FundamentalService, SyncSummary};
pub use indexing_service::{IndexingService, RunSummary, SkippedTicker};

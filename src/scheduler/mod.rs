//! Scheduling helpers
//!
//! Runs are triggered externally (cron or the CLI); this module only decides
//! which trading day a run covers.

mod market_clock;

pub use market_clock::MarketClock;

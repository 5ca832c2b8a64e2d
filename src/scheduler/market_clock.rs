//! Exchange clock for incremental runs
//!
//! NSE closes at 15:30 IST. Before the close today's bar is still forming, so
//! an incremental run indexes the previous day.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Asia::Kolkata;
use tracing::info;

/// Market close in exchange-local time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketClock {
    close: NaiveTime,
}

impl Default for MarketClock {
    fn default() -> Self {
        Self::nse()
    }
}

impl MarketClock {
    /// NSE cash market, closing 15:30 IST
    pub fn nse() -> Self {
        Self {
            close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    pub fn with_close(close: NaiveTime) -> Self {
        Self { close }
    }

    /// Date an incremental run should index at `now`
    pub fn date_to_index(&self, now: DateTime<Utc>) -> NaiveDate {
        let now_ist = now.with_timezone(&Kolkata);
        let today = now_ist.date_naive();

        if now_ist.time() >= self.close {
            today
        } else {
            today - Duration::days(1)
        }
    }

    /// [`Self::date_to_index`] for the current instant
    pub fn current_date_to_index(&self) -> NaiveDate {
        let now = Utc::now();
        let date = self.date_to_index(now);
        let now_ist = now.with_timezone(&Kolkata);
        info!(
            "Market clock at {:02}:{:02} IST, indexing {}",
            now_ist.hour(),
            now_ist.minute(),
            date
        );
        date
    }
}

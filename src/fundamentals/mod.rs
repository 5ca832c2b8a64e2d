//! Company fundamentals: statement conversion and quarterly history merge

pub mod convert;
pub mod merge;
pub mod source;
pub mod types;

pub use merge::merge_quarterly;
pub use source::{FundamentalsSource, JsonFileSource, StatementVariant};
pub use types::{FundamentalData, FundamentalDocument, QuarterlyEntry};

//! Storage backends
//!
//! - `duckdb`: per-(ticker, date) price documents
//! - `sqlite`: per-ticker fundamentals documents
//! - `memory`: in-process store for dry runs

pub mod duckdb;
pub mod memory;
pub mod sqlite;

use crate::documents::{FieldType, Fields, IndexSchema, WriteAction};
use crate::error::Result;
use crate::fundamentals::FundamentalDocument;
use serde::Serialize;
use serde_json::Value;

/// Per-document failure inside a bulk write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteError {
    pub id: String,
    pub reason: String,
}

/// Outcome of a bulk write that reached the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkResponse {
    pub success: usize,
    pub failures: Vec<WriteError>,
}

impl BulkResponse {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Document store holding the price index.
///
/// `bulk_write` returns `Err` only when the batch as a whole could not be
/// processed; rejected documents are reported in [`BulkResponse::failures`].
pub trait DocumentStore: Send + Sync {
    fn exists(&self, index: &str) -> Result<bool>;

    fn create(&self, index: &str, schema: &IndexSchema) -> Result<()>;

    fn bulk_write(&self, actions: &[WriteAction]) -> Result<BulkResponse>;

    /// Fetch a stored document without its id
    fn get(&self, index: &str, id: &str) -> Result<Option<Fields>>;
}

/// Store of per-ticker fundamentals documents
pub trait FundamentalsStore: Send + Sync {
    fn get_fundamentals(&self, ticker: &str) -> Result<Option<FundamentalDocument>>;

    fn put_fundamentals(&self, document: &FundamentalDocument) -> Result<()>;
}

/// Index names double as table names
pub(crate) fn validate_index_name(index: &str) -> Result<()> {
    let mut chars = index.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_tail = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_head && valid_tail {
        Ok(())
    } else {
        Err(crate::error::AppError::Validation(format!(
            "Invalid index name '{}'",
            index
        )))
    }
}

/// Check a field value against its mapped type
pub(crate) fn check_field(
    schema: &IndexSchema,
    name: &str,
    value: &Value,
) -> std::result::Result<FieldType, String> {
    let Some(field_type) = schema.field_type(name) else {
        return Err(format!("unknown field '{}'", name));
    };

    let ok = match field_type {
        FieldType::Date => value
            .as_str()
            .is_some_and(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
        FieldType::Keyword => value.is_string(),
        FieldType::Float => value.is_number(),
        FieldType::Long => value.is_i64() || value.is_u64(),
    };

    if ok {
        Ok(field_type)
    } else {
        Err(format!("field '{}' is not a valid {:?}: {}", name, field_type, value))
    }
}

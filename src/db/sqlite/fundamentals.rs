//! Fundamentals documents, stored as JSON per ticker

use crate::error::Result;
use crate::fundamentals::FundamentalDocument;
use rusqlite::{Connection, OptionalExtension};

/// Get the stored document for a ticker
pub fn get_fundamentals(conn: &Connection, ticker: &str) -> Result<Option<FundamentalDocument>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT document FROM fundamentals WHERE ticker = ?1",
            [ticker],
            |row| row.get(0),
        )
        .optional()?;

    match json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Insert or replace the document for its ticker
pub fn upsert_fundamentals(conn: &Connection, document: &FundamentalDocument) -> Result<()> {
    let json = serde_json::to_string(document)?;
    conn.execute(
        "INSERT INTO fundamentals (ticker, document, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(ticker) DO UPDATE SET
           document = excluded.document,
           updated_at = excluded.updated_at",
        rusqlite::params![document.ticker, json],
    )?;
    Ok(())
}

//! DuckDB document store for the price index

mod documents;
mod migrations;

use crate::db::{BulkResponse, DocumentStore, WriteError};
use crate::documents::{Fields, IndexSchema, WriteAction};
use crate::error::{AppError, Result};
use duckdb::Connection;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;

/// DuckDB database wrapper
pub struct DuckDb {
    conn: Mutex<Connection>,
    /// Mappings already read from `document_indices`
    schemas: RwLock<HashMap<String, IndexSchema>>,
}

impl DuckDb {
    /// Open (or create) a database file
    pub fn new(path: &Path) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Open a throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
            schemas: RwLock::new(HashMap::new()),
        };

        db.run_migrations()?;

        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    fn schema(&self, conn: &Connection, index: &str) -> Result<Option<IndexSchema>> {
        if let Some(schema) = self.schemas.read().get(index) {
            return Ok(Some(schema.clone()));
        }

        let loaded = documents::load_schema(conn, index)?;
        if let Some(schema) = &loaded {
            self.schemas.write().insert(index.to_string(), schema.clone());
        }
        Ok(loaded)
    }
}

impl DocumentStore for DuckDb {
    fn exists(&self, index: &str) -> Result<bool> {
        let conn = self.conn.lock();
        documents::index_exists(&conn, index)
    }

    fn create(&self, index: &str, schema: &IndexSchema) -> Result<()> {
        let conn = self.conn.lock();
        documents::create_index(&conn, index, schema)?;
        self.schemas.write().insert(index.to_string(), schema.clone());
        Ok(())
    }

    fn bulk_write(&self, actions: &[WriteAction]) -> Result<BulkResponse> {
        let conn = self.conn.lock();
        let mut response = BulkResponse::default();

        // Statements run outside a transaction: one rejected document must
        // not abort the rest of the batch.
        for action in actions {
            let Some(schema) = self.schema(&conn, action.index())? else {
                response.failures.push(WriteError {
                    id: action.id().to_string(),
                    reason: format!("index '{}' does not exist", action.index()),
                });
                continue;
            };

            match documents::apply_action(&conn, &schema, action) {
                Ok(()) => response.success += 1,
                Err(reason) => response.failures.push(WriteError {
                    id: action.id().to_string(),
                    reason,
                }),
            }
        }

        tracing::debug!(
            "DuckDb::bulk_write - {} written, {} failed",
            response.success,
            response.failures.len()
        );
        Ok(response)
    }

    fn get(&self, index: &str, id: &str) -> Result<Option<Fields>> {
        let conn = self.conn.lock();
        let schema = self
            .schema(&conn, index)?
            .ok_or_else(|| AppError::NotFound(format!("Index '{}' not found", index)))?;
        documents::fetch_document(&conn, index, &schema, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::price_index_schema;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn db() -> DuckDb {
        let db = DuckDb::in_memory().unwrap();
        db.create("nifty_data", &price_index_schema()).unwrap();
        db
    }

    fn full_doc(open: f64, rsi: f64) -> WriteAction {
        WriteAction::Full {
            index: "nifty_data".into(),
            id: "TCS.NS_2024-05-02".into(),
            document: fields(json!({
                "ticker": "TCS.NS",
                "date": "2024-05-02",
                "open": open,
                "close": 101.0,
                "high": 102.0,
                "low": 99.0,
                "volume": 1000,
                "rsi": rsi,
                "roc": 0.5,
                "roc_benchmark": 0.2,
                "atr": 1.5,
            })),
        }
    }

    #[test]
    fn test_create_registers_index() {
        let db = db();
        assert!(db.exists("nifty_data").unwrap());
        assert!(!db.exists("other").unwrap());
        assert!(db.create("nifty_data", &price_index_schema()).is_err());
        assert!(db.create("bad-name", &price_index_schema()).is_err());
    }

    #[test]
    fn test_full_write_roundtrip() {
        let db = db();
        let response = db.bulk_write(&[full_doc(100.0, 55.0)]).unwrap();
        assert_eq!(response.success, 1);
        assert!(!response.has_failures());

        let doc = db.get("nifty_data", "TCS.NS_2024-05-02").unwrap().unwrap();
        assert_eq!(doc["date"], json!("2024-05-02"));
        assert_eq!(doc["ticker"], json!("TCS.NS"));
        assert_eq!(doc["open"], json!(100.0));
        assert_eq!(doc["volume"], json!(1000));
        assert_eq!(doc["rsi"], json!(55.0));
    }

    #[test]
    fn test_full_write_is_idempotent() {
        let db = db();
        db.bulk_write(&[full_doc(100.0, 55.0)]).unwrap();
        let first = db.get("nifty_data", "TCS.NS_2024-05-02").unwrap();
        db.bulk_write(&[full_doc(100.0, 55.0)]).unwrap();
        let second = db.get("nifty_data", "TCS.NS_2024-05-02").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_incremental_keeps_unsupplied_fields() {
        let db = db();
        db.bulk_write(&[full_doc(100.0, 55.0)]).unwrap();

        let partial = WriteAction::Incremental {
            index: "nifty_data".into(),
            id: "TCS.NS_2024-05-02".into(),
            fields: fields(json!({"ticker": "TCS.NS", "date": "2024-05-02", "close": 103.0})),
        };
        db.bulk_write(&[partial]).unwrap();

        let doc = db.get("nifty_data", "TCS.NS_2024-05-02").unwrap().unwrap();
        assert_eq!(doc["close"], json!(103.0));
        assert_eq!(doc["rsi"], json!(55.0));
        assert_eq!(doc["volume"], json!(1000));
    }

    #[test]
    fn test_incremental_creates_missing_document() {
        let db = db();
        let partial = WriteAction::Incremental {
            index: "nifty_data".into(),
            id: "INFY.NS_2024-05-03".into(),
            fields: fields(json!({"ticker": "INFY.NS", "date": "2024-05-03", "open": 1400.0})),
        };
        db.bulk_write(&[partial]).unwrap();

        let doc = db.get("nifty_data", "INFY.NS_2024-05-03").unwrap().unwrap();
        assert_eq!(doc["open"], json!(1400.0));
        assert!(!doc.contains_key("rsi"));
    }

    #[test]
    fn test_partial_failures_do_not_abort_batch() {
        let db = db();
        let bad = WriteAction::Incremental {
            index: "nifty_data".into(),
            id: "TCS.NS_2024-05-03".into(),
            fields: fields(json!({"ticker": "TCS.NS", "date": "not-a-date"})),
        };
        let unknown = WriteAction::Incremental {
            index: "missing_index".into(),
            id: "TCS.NS_2024-05-04".into(),
            fields: fields(json!({"ticker": "TCS.NS"})),
        };

        let response = db
            .bulk_write(&[bad, full_doc(100.0, 55.0), unknown])
            .unwrap();
        assert_eq!(response.success, 1);
        assert_eq!(response.failures.len(), 2);
        assert_eq!(response.failures[0].id, "TCS.NS_2024-05-03");
        assert_eq!(response.failures[1].id, "TCS.NS_2024-05-04");
    }

    #[test]
    fn test_registry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.duckdb");
        {
            let db = DuckDb::new(&path).unwrap();
            db.create("nifty_data", &price_index_schema()).unwrap();
            db.bulk_write(&[full_doc(100.0, 55.0)]).unwrap();
        }

        let db = DuckDb::new(&path).unwrap();
        assert!(db.exists("nifty_data").unwrap());
        let doc = db.get("nifty_data", "TCS.NS_2024-05-02").unwrap().unwrap();
        assert_eq!(doc["open"], json!(100.0));
    }
}

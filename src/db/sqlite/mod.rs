//! SQLite database module for fundamentals

mod fundamentals;
mod migrations;

use crate::db::FundamentalsStore;
use crate::error::Result;
use crate::fundamentals::FundamentalDocument;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Create new SQLite database connection
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Open a throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };

        db.run_migrations()?;

        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }
}

impl FundamentalsStore for SqliteDb {
    fn get_fundamentals(&self, ticker: &str) -> Result<Option<FundamentalDocument>> {
        let conn = self.conn.lock();
        fundamentals::get_fundamentals(&conn, ticker)
    }

    fn put_fundamentals(&self, document: &FundamentalDocument) -> Result<()> {
        let conn = self.conn.lock();
        fundamentals::upsert_fundamentals(&conn, document)
    }
}

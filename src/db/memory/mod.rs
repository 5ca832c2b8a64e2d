//! In-process store used for dry runs

use crate::db::{check_field, validate_index_name, BulkResponse, DocumentStore, FundamentalsStore, WriteError};
use crate::documents::{Fields, IndexSchema, WriteAction};
use crate::error::{AppError, Result};
use crate::fundamentals::FundamentalDocument;
use parking_lot::Mutex;
use std::collections::HashMap;

struct MemoryIndex {
    schema: IndexSchema,
    documents: HashMap<String, Fields>,
}

/// Store keeping every index in a map, with the same per-document type checks
/// as the persistent backends
#[derive(Default)]
pub struct MemoryStore {
    indices: Mutex<HashMap<String, MemoryIndex>>,
    fundamentals: Mutex<HashMap<String, FundamentalDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in an index
    pub fn count(&self, index: &str) -> usize {
        self.indices
            .lock()
            .get(index)
            .map(|i| i.documents.len())
            .unwrap_or(0)
    }
}

impl DocumentStore for MemoryStore {
    fn exists(&self, index: &str) -> Result<bool> {
        Ok(self.indices.lock().contains_key(index))
    }

    fn create(&self, index: &str, schema: &IndexSchema) -> Result<()> {
        validate_index_name(index)?;
        let mut indices = self.indices.lock();
        if indices.contains_key(index) {
            return Err(AppError::Validation(format!("Index '{}' already exists", index)));
        }
        indices.insert(
            index.to_string(),
            MemoryIndex {
                schema: schema.clone(),
                documents: HashMap::new(),
            },
        );
        Ok(())
    }

    fn bulk_write(&self, actions: &[WriteAction]) -> Result<BulkResponse> {
        let mut indices = self.indices.lock();
        let mut response = BulkResponse::default();

        for action in actions {
            let Some(target) = indices.get_mut(action.index()) else {
                response.failures.push(WriteError {
                    id: action.id().to_string(),
                    reason: format!("index '{}' does not exist", action.index()),
                });
                continue;
            };

            let checked = action
                .fields()
                .iter()
                .try_for_each(|(name, value)| check_field(&target.schema, name, value).map(|_| ()));
            if let Err(reason) = checked {
                response.failures.push(WriteError {
                    id: action.id().to_string(),
                    reason,
                });
                continue;
            }

            match action {
                WriteAction::Full { id, document, .. } => {
                    target.documents.insert(id.clone(), document.clone());
                }
                WriteAction::Incremental { id, fields, .. } => {
                    let stored = target.documents.entry(id.clone()).or_default();
                    for (name, value) in fields {
                        stored.insert(name.clone(), value.clone());
                    }
                }
            }
            response.success += 1;
        }

        Ok(response)
    }

    fn get(&self, index: &str, id: &str) -> Result<Option<Fields>> {
        let indices = self.indices.lock();
        let target = indices
            .get(index)
            .ok_or_else(|| AppError::NotFound(format!("Index '{}' not found", index)))?;
        Ok(target.documents.get(id).cloned())
    }
}

impl FundamentalsStore for MemoryStore {
    fn get_fundamentals(&self, ticker: &str) -> Result<Option<FundamentalDocument>> {
        Ok(self.fundamentals.lock().get(ticker).cloned())
    }

    fn put_fundamentals(&self, document: &FundamentalDocument) -> Result<()> {
        self.fundamentals
            .lock()
            .insert(document.ticker.clone(), document.clone());
        Ok(())
    }
}

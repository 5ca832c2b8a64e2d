//! Index schemas

use serde::{Deserialize, Serialize};

/// Persisted field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Calendar date, `YYYY-MM-DD`
    Date,
    /// Exact-match string
    Keyword,
    Float,
    Long,
}

/// Field mapping entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub name: String,
    pub field_type: FieldType,
}

/// Schema of a document index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub fields: Vec<FieldMapping>,
}

impl IndexSchema {
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.field_type)
    }
}

/// Schema of the per-(ticker, date) price index
pub fn price_index_schema() -> IndexSchema {
    let field = |name: &str, field_type| FieldMapping {
        name: name.to_string(),
        field_type,
    };

    IndexSchema {
        fields: vec![
            field("date", FieldType::Date),
            field("ticker", FieldType::Keyword),
            field("open", FieldType::Float),
            field("close", FieldType::Float),
            field("high", FieldType::Float),
            field("low", FieldType::Float),
            field("volume", FieldType::Long),
            field("rsi", FieldType::Float),
            field("roc", FieldType::Float),
            field("roc_benchmark", FieldType::Float),
            field("atr", FieldType::Float),
        ],
    }
}

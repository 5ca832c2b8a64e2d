//! Document index tables
//!
//! Each index is a table keyed by `id VARCHAR PRIMARY KEY` with one column per
//! mapped field. Its mapping is recorded in `document_indices`.

use crate::db::{check_field, validate_index_name};
use crate::documents::{FieldType, Fields, IndexSchema, WriteAction};
use crate::error::{AppError, Result};
use duckdb::{Connection, ToSql};
use serde_json::Value;

fn column_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Date => "DATE",
        FieldType::Keyword => "VARCHAR",
        FieldType::Float => "DOUBLE",
        FieldType::Long => "BIGINT",
    }
}

fn placeholder(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Date => "CAST(? AS DATE)",
        _ => "?",
    }
}

fn sql_value(field_type: FieldType, value: Option<&Value>) -> Box<dyn ToSql> {
    match field_type {
        FieldType::Date | FieldType::Keyword => {
            Box::new(value.and_then(Value::as_str).map(str::to_string))
        }
        FieldType::Float => Box::new(value.and_then(Value::as_f64)),
        FieldType::Long => Box::new(value.and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_u64().and_then(|u| i64::try_from(u).ok()))
        })),
    }
}

/// Check whether an index is registered
pub fn index_exists(conn: &Connection, index: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM document_indices WHERE name = ?",
        [index],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Create the index table and register its mapping
pub fn create_index(conn: &Connection, index: &str, schema: &IndexSchema) -> Result<()> {
    validate_index_name(index)?;
    for field in &schema.fields {
        validate_index_name(&field.name)?;
        if field.name == "id" {
            return Err(AppError::Validation("Field name 'id' is reserved".to_string()));
        }
    }
    if index_exists(conn, index)? {
        return Err(AppError::Validation(format!("Index '{}' already exists", index)));
    }

    let columns = schema
        .fields
        .iter()
        .map(|f| format!("\"{}\" {}", f.name, column_type(f.field_type)))
        .collect::<Vec<_>>()
        .join(", ");

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (id VARCHAR PRIMARY KEY, {})",
        index, columns
    ))?;
    conn.execute(
        "INSERT INTO document_indices (name, schema_json) VALUES (?, ?)",
        duckdb::params![index, serde_json::to_string(schema)?],
    )?;

    tracing::info!("Created index '{}' with {} fields", index, schema.fields.len());
    Ok(())
}

/// Load a registered mapping
pub fn load_schema(conn: &Connection, index: &str) -> Result<Option<IndexSchema>> {
    let mut stmt = conn.prepare("SELECT schema_json FROM document_indices WHERE name = ?")?;
    let mut rows = stmt.query([index])?;

    match rows.next()? {
        Some(row) => {
            let json: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&json)?))
        }
        None => Ok(None),
    }
}

/// Apply one write action.
///
/// Full writes bind every mapped column, so fields absent from the document
/// are cleared. Incremental writes only touch the supplied columns.
pub fn apply_action(
    conn: &Connection,
    schema: &IndexSchema,
    action: &WriteAction,
) -> std::result::Result<(), String> {
    let mut columns: Vec<(&str, FieldType)> = Vec::new();
    for (name, value) in action.fields() {
        check_field(schema, name, value)?;
    }

    match action {
        WriteAction::Full { .. } => {
            columns.extend(schema.fields.iter().map(|f| (f.name.as_str(), f.field_type)));
        }
        WriteAction::Incremental { fields, .. } => {
            for field in &schema.fields {
                if fields.contains_key(&field.name) {
                    columns.push((field.name.as_str(), field.field_type));
                }
            }
        }
    }

    let fields = action.fields();
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(action.id().to_string())];
    values.extend(
        columns
            .iter()
            .map(|(name, field_type)| sql_value(*field_type, fields.get(*name))),
    );

    let column_list: String = columns
        .iter()
        .map(|(name, _)| format!(", \"{}\"", name))
        .collect();
    let placeholders: String = columns
        .iter()
        .map(|(_, field_type)| format!(", {}", placeholder(*field_type)))
        .collect();

    let sql = if action.is_replace() {
        format!(
            "INSERT OR REPLACE INTO \"{}\" (id{}) VALUES (?{})",
            action.index(),
            column_list,
            placeholders
        )
    } else if columns.is_empty() {
        format!(
            "INSERT INTO \"{}\" (id) VALUES (?) ON CONFLICT (id) DO NOTHING",
            action.index()
        )
    } else {
        let updates = columns
            .iter()
            .map(|(name, _)| format!("\"{0}\" = excluded.\"{0}\"", name))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO \"{}\" (id{}) VALUES (?{}) ON CONFLICT (id) DO UPDATE SET {}",
            action.index(),
            column_list,
            placeholders,
            updates
        )
    };

    let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&sql, params.as_slice())
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Read a document by id
pub fn fetch_document(
    conn: &Connection,
    index: &str,
    schema: &IndexSchema,
    id: &str,
) -> Result<Option<Fields>> {
    let select_list = schema
        .fields
        .iter()
        .map(|f| match f.field_type {
            FieldType::Date => format!("CAST(\"{}\" AS VARCHAR)", f.name),
            _ => format!("\"{}\"", f.name),
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM \"{}\" WHERE id = ?",
        select_list, index
    ))?;
    let mut rows = stmt.query([id])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let mut document = Fields::new();
    for (i, field) in schema.fields.iter().enumerate() {
        let value = match field.field_type {
            FieldType::Date | FieldType::Keyword => row.get::<_, Option<String>>(i)?.map(Value::from),
            FieldType::Float => row.get::<_, Option<f64>>(i)?.map(Value::from),
            FieldType::Long => row.get::<_, Option<i64>>(i)?.map(Value::from),
        };
        if let Some(value) = value {
            document.insert(field.name.clone(), value);
        }
    }

    Ok(Some(document))
}

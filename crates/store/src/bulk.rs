//! Multi-row `UPDATE ... FROM (VALUES ...)` and `INSERT ... ON CONFLICT`
//! statements for block-sized writes.
//!
//! The statements are rendered as text, so the two halves are kept apart:
//! values only ever reach SQL through [`cast_value`], which validates and
//! quotes them per [`ColumnType`], while the synthesizers only add the
//! statement shape around fragments produced by
//! [`set_bulk_rows_for_update`]. Identifiers go through [`quote_identifier`].

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDateTime};
use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// How a bulk-written column's values are rendered as SQL literals.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ColumnType {
    String,
    Numeric,
    BigInt,
    Timestamp,
    Uuid,
    Boolean,
    Binary,
    /// String-backed enums. Unlike the other typed columns, `NULL` is never
    /// suffixed with a cast.
    Enum,
}

/// Declares the type of every column a bulk write touches. A column that
/// appears in none of the lists can't be written.
#[derive(Debug, Copy, Clone, Default)]
pub struct ColumnTypes<'a> {
    pub string_columns: &'a [&'a str],
    pub numeric_columns: &'a [&'a str],
    pub bigint_columns: &'a [&'a str],
    pub timestamp_columns: &'a [&'a str],
    pub uuid_columns: &'a [&'a str],
    pub boolean_columns: &'a [&'a str],
    pub binary_columns: &'a [&'a str],
    pub enum_columns: &'a [&'a str],
}

impl ColumnTypes<'static> {
    /// Start for struct-update syntax.
    pub const EMPTY: Self = ColumnTypes {
        string_columns: &[],
        numeric_columns: &[],
        bigint_columns: &[],
        timestamp_columns: &[],
        uuid_columns: &[],
        boolean_columns: &[],
        binary_columns: &[],
        enum_columns: &[],
    };
}

impl<'a> ColumnTypes<'a> {
    pub fn classify(&self, column: &str) -> Option<ColumnType> {
        [
            (self.string_columns, ColumnType::String),
            (self.numeric_columns, ColumnType::Numeric),
            (self.bigint_columns, ColumnType::BigInt),
            (self.timestamp_columns, ColumnType::Timestamp),
            (self.uuid_columns, ColumnType::Uuid),
            (self.boolean_columns, ColumnType::Boolean),
            (self.binary_columns, ColumnType::Binary),
            (self.enum_columns, ColumnType::Enum),
        ]
        .into_iter()
        .find(|(columns, _)| columns.contains(&column))
        .map(|(_, column_type)| column_type)
    }
}

/// Wraps an identifier in double quotes. Names that are empty or contain a
/// double quote or NUL are rejected rather than escaped.
pub fn quote_identifier(name: &str) -> StoreResult<String> {
    if name.is_empty() || name.contains(['"', '\0']) {
        return Err(StoreError::InvalidIdentifier(name.to_owned()));
    }
    Ok(format!("\"{name}\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Renders one value as a SQL literal. Absent values and JSON `null` become
/// `NULL`, cast to the column's Postgres type for bigint, timestamp, uuid
/// and binary columns.
pub fn cast_value(
    column_type: ColumnType,
    column: &str,
    value: Option<&Value>,
) -> StoreResult<String> {
    let invalid = |value: &Value| StoreError::InvalidBulkValue {
        column: column.to_owned(),
        column_type,
        value: value.to_string(),
    };

    let value = match value {
        None | Some(Value::Null) => {
            return Ok(match column_type {
                ColumnType::BigInt => "NULL::bigint".to_owned(),
                ColumnType::Timestamp => "NULL::timestamp".to_owned(),
                ColumnType::Uuid => "NULL::uuid".to_owned(),
                ColumnType::Binary => "NULL::bytea".to_owned(),
                ColumnType::String
                | ColumnType::Numeric
                | ColumnType::Boolean
                | ColumnType::Enum => "NULL".to_owned(),
            })
        }
        Some(value) => value,
    };

    match column_type {
        ColumnType::String | ColumnType::Enum => match value {
            Value::String(s) => Ok(quote_literal(s)),
            Value::Number(n) => Ok(quote_literal(&n.to_string())),
            Value::Bool(b) => Ok(quote_literal(&b.to_string())),
            _ => Err(invalid(value)),
        },
        ColumnType::Numeric => {
            let text = match value {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.trim().to_owned(),
                _ => return Err(invalid(value)),
            };
            BigDecimal::from_str(&text)
                .map(|decimal| decimal.to_string())
                .map_err(|_| invalid(value))
        }
        ColumnType::Boolean => match value {
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(invalid(value)),
        },
        ColumnType::BigInt => {
            let parsed = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            parsed
                .map(|n| format!("'{n}'::bigint"))
                .ok_or_else(|| invalid(value))
        }
        ColumnType::Timestamp => {
            let Value::String(s) = value else {
                return Err(invalid(value));
            };
            // Offsets are folded into UTC; the column has no zone to keep them.
            let timestamp = NaiveDateTime::from_str(s)
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.naive_utc()))
                .map_err(|_| invalid(value))?;
            Ok(format!(
                "'{}'::timestamp",
                timestamp.format("%Y-%m-%dT%H:%M:%S%.f")
            ))
        }
        ColumnType::Uuid => match value {
            Value::String(s) => Uuid::parse_str(s)
                .map(|uuid| format!("'{uuid}'::uuid"))
                .map_err(|_| invalid(value)),
            _ => Err(invalid(value)),
        },
        ColumnType::Binary => {
            let bytes = match value {
                Value::String(s) => {
                    hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|_| invalid(value))?
                }
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .ok_or_else(|| invalid(value))?,
                _ => return Err(invalid(value)),
            };
            Ok(format!("'\\x{}'::bytea", hex::encode(bytes)))
        }
    }
}

/// Renders each row as the comma-separated body of a `VALUES` tuple, with
/// one literal per column in `columns` order. Keys missing from a row are
/// `NULL`.
///
/// Every column is classified before any row is rendered, so an
/// undeclared column always fails with [`StoreError::UnsupportedColumn`].
pub fn set_bulk_rows_for_update<T: Serialize>(
    rows: &[T],
    columns: &[&str],
    column_types: &ColumnTypes,
) -> StoreResult<Vec<String>> {
    let typed_columns = columns
        .iter()
        .map(|&column| {
            column_types
                .classify(column)
                .map(|column_type| (column, column_type))
                .ok_or_else(|| StoreError::UnsupportedColumn(column.to_owned()))
        })
        .collect::<StoreResult<Vec<_>>>()?;

    rows.iter()
        .map(|row| {
            let value = serde_json::to_value(row)?;
            let Value::Object(fields) = value else {
                return Err(StoreError::InvalidBulkRow(value.to_string()));
            };

            let literals = typed_columns
                .iter()
                .map(|&(column, column_type)| cast_value(column_type, column, fields.get(column)))
                .collect::<StoreResult<Vec<_>>>()?;
            Ok(literals.join(", "))
        })
        .collect()
}

fn quoted_list(names: &[&str]) -> StoreResult<String> {
    Ok(names
        .iter()
        .map(|name| quote_identifier(name))
        .collect::<StoreResult<Vec<_>>>()?
        .join(", "))
}

fn values_list(object_rows: &[String]) -> String {
    object_rows.iter().map(|row| format!("({row})")).join(", ")
}

/// A multi-row update joined on a unique column.
#[derive(Debug, Clone)]
pub struct BulkUpdate<'a> {
    pub table: &'a str,
    /// Fragments from [`set_bulk_rows_for_update`], rendered with `columns`.
    pub object_rows: &'a [String],
    /// Includes `unique_identifier`, which is matched on but not set.
    pub columns: &'a [&'a str],
    /// Casts the joined identifier to `uuid`.
    pub is_uuid: bool,
    pub unique_identifier: &'a str,
    /// Extra `SET` clauses appended verbatim, e.g. `"updated_at" = now()`.
    pub set_fields_to_append: &'a [&'a str],
}

impl<'a> BulkUpdate<'a> {
    pub fn new(table: &'a str, object_rows: &'a [String], columns: &'a [&'a str]) -> Self {
        Self {
            table,
            object_rows,
            columns,
            is_uuid: false,
            unique_identifier: "id",
            set_fields_to_append: &[],
        }
    }
}

/// `None` when there are no rows, or nothing to set.
pub fn generate_bulk_update_string(update: &BulkUpdate) -> StoreResult<Option<String>> {
    if update.object_rows.is_empty() {
        debug!(table = update.table, "No rows to update");
        return Ok(None);
    }

    let table = quote_identifier(update.table)?;
    let identifier = quote_identifier(update.unique_identifier)?;

    let mut set_clauses = update
        .columns
        .iter()
        .filter(|&&column| column != update.unique_identifier)
        .map(|column| quote_identifier(column).map(|column| format!("{column} = c.{column}")))
        .collect::<StoreResult<Vec<_>>>()?;
    set_clauses.extend(update.set_fields_to_append.iter().map(|s| s.to_string()));

    if set_clauses.is_empty() {
        debug!(table = update.table, "No columns to update");
        return Ok(None);
    }

    let cast = if update.is_uuid { "::uuid" } else { "" };
    let sql = format!(
        "UPDATE {table} SET {} FROM (VALUES {}) AS c({}) WHERE c.{identifier}{cast} = {table}.{identifier};",
        set_clauses.join(", "),
        values_list(update.object_rows),
        quoted_list(update.columns)?,
    );

    debug!(
        table = update.table,
        rows = update.object_rows.len(),
        "Generated bulk update"
    );
    Ok(Some(sql))
}

/// A multi-row insert that updates rows whose unique key already exists.
#[derive(Debug, Clone)]
pub struct BulkUpsert<'a> {
    pub table: &'a str,
    pub object_rows: &'a [String],
    pub columns: &'a [&'a str],
    /// The conflict target. Several tables have composite keys.
    pub unique_identifiers: &'a [&'a str],
}

impl<'a> BulkUpsert<'a> {
    pub fn new(table: &'a str, object_rows: &'a [String], columns: &'a [&'a str]) -> Self {
        Self {
            table,
            object_rows,
            columns,
            unique_identifiers: &["id"],
        }
    }
}

/// `None` when there are no rows. Rows consisting only of key columns turn
/// into `DO NOTHING`.
pub fn generate_bulk_upsert_string(upsert: &BulkUpsert) -> StoreResult<Option<String>> {
    if upsert.object_rows.is_empty() {
        debug!(table = upsert.table, "No rows to upsert");
        return Ok(None);
    }
    if upsert.unique_identifiers.is_empty() {
        return Err(StoreError::InvalidIdentifier(String::new()));
    }

    let table = quote_identifier(upsert.table)?;
    let set_clauses = upsert
        .columns
        .iter()
        .filter(|&&column| !upsert.unique_identifiers.contains(&column))
        .map(|column| quote_identifier(column).map(|column| format!("{column} = excluded.{column}")))
        .collect::<StoreResult<Vec<_>>>()?;

    let on_conflict = if set_clauses.is_empty() {
        "DO NOTHING".to_owned()
    } else {
        format!("DO UPDATE SET {}", set_clauses.join(", "))
    };

    let sql = format!(
        "INSERT INTO {table} ({}) VALUES {} ON CONFLICT ({}) {on_conflict};",
        quoted_list(upsert.columns)?,
        values_list(upsert.object_rows),
        quoted_list(upsert.unique_identifiers)?,
    );

    debug!(
        table = upsert.table,
        rows = upsert.object_rows.len(),
        "Generated bulk upsert"
    );
    Ok(Some(sql))
}

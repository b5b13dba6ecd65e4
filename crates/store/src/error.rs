use diesel::result::{DatabaseErrorKind, Error as DieselError};
use indexer_common_types::QueryableField;

use crate::bulk::ColumnType;
use crate::transaction::TxId;

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything that can go wrong in the data-access layer. Nothing is retried
/// here; callers decide what to do with each category.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A capability was requested that this process wasn't provisioned with.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("required field missing: {0}")]
    RequiredFieldMissing(QueryableField),
    /// The handle was never issued, or its transaction was already committed
    /// or rolled back. `operation` is `None` for plain lookups.
    #[error("{}", unknown_transaction(.tx_id, .operation))]
    UnknownTransaction {
        tx_id: TxId,
        operation: Option<&'static str>,
    },
    #[error("unsupported column in bulk write: {0}")]
    UnsupportedColumn(String),
    #[error("invalid {column_type} value for column {column:?}: {value}")]
    InvalidBulkValue {
        column: String,
        column_type: ColumnType,
        value: String,
    },
    #[error("bulk rows must serialize to objects, got: {0}")]
    InvalidBulkRow(String),
    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("rejected value as a possible SQL injection: {0:?}")]
    InjectionRejected(String),
    #[error("unique constraint violation: {message}")]
    UniqueViolation {
        constraint: Option<String>,
        message: String,
    },
    #[error("foreign key violation: {message}")]
    ForeignKeyViolation {
        constraint: Option<String>,
        message: String,
    },
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("migration error: {0}")]
    Migration(String),
    #[error(transparent)]
    Database(DieselError),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

fn unknown_transaction(tx_id: &TxId, operation: &Option<&'static str>) -> String {
    match operation {
        Some(operation) => format!("no transaction to {operation} for handle {tx_id}"),
        None => format!("no transaction found for handle {tx_id}"),
    }
}

impl StoreError {
    /// Whether this is a duplicate-key error, e.g. from two racing creates of
    /// the same entity.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, StoreError::ForeignKeyViolation { .. })
    }
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::UniqueViolation {
                    constraint: info.constraint_name().map(str::to_owned),
                    message: info.message().to_owned(),
                }
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                StoreError::ForeignKeyViolation {
                    constraint: info.constraint_name().map(str::to_owned),
                    message: info.message().to_owned(),
                }
            }
            other => StoreError::Database(other),
        }
    }
}

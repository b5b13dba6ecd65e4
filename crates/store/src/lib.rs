//! Database access (read and write) abstractions for the indexer.
//!
//! Every operation goes through [`Store`]. Reads pick their connection from
//! [`QueryOptions`]: the primary, a random read replica, or the connection of
//! a transaction opened with [`Store::start_transaction`]. Block-sized writes
//! are rendered by the [`bulk`] synthesizer and run with
//! [`Store::execute_bulk`].

pub mod bulk;
mod config;
mod error;
mod guards;
pub mod models;
mod options;
mod pagination;
pub mod schema;
mod store;
mod tables;
mod transaction;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use guards::{verify_all_injectable_variables, verify_all_required_fields};
pub use options::{select_replica, QueryOptions, SqlOptions};
pub use pagination::{apply_ordering, OrderableQuery, PageWindow, PaginationFromDatabase};
pub use store::{MaterializedView, PgConn, PgPool, QueryScope, Store};
pub use transaction::{IsolationLevel, TransactionRegistry, TxId};

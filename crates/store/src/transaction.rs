//! Bookkeeping for transactions that outlive a single call.
//!
//! Table functions never receive a transaction object; callers pass a
//! [`TxId`] instead, and the registry maps it back to the connection the
//! transaction was opened on. Handles are never reused, so a stale handle
//! (double commit, commit after rollback) is always detected.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};

/// Opaque handle of a registry-held transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(u64);

impl TxId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    #[strum(serialize = "READ UNCOMMITTED")]
    ReadUncommitted,
    #[strum(serialize = "READ COMMITTED")]
    ReadCommitted,
    #[strum(serialize = "REPEATABLE READ")]
    RepeatableRead,
    #[strum(serialize = "SERIALIZABLE")]
    Serializable,
}

impl IsolationLevel {
    pub(crate) fn set_statement(self) -> String {
        format!("SET TRANSACTION ISOLATION LEVEL {self}")
    }
}

struct RegistryState<T> {
    next_id: u64,
    transactions: HashMap<TxId, Arc<Mutex<T>>>,
}

/// Open transactions indexed by handle. Generic over what is held so it can
/// be exercised without a database; the store keeps pooled connections in
/// it.
///
/// Each entry sits behind an async mutex, so two statements issued on the
/// same handle run one after the other.
pub struct TransactionRegistry<T> {
    state: StdMutex<RegistryState<T>>,
}

impl<T> Default for TransactionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TransactionRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRegistry")
            .field("open", &self.len())
            .finish()
    }
}

impl<T> TransactionRegistry<T> {
    pub fn new() -> Self {
        Self {
            state: StdMutex::new(RegistryState {
                next_id: 1,
                transactions: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState<T>> {
        // The state is only touched by short, non-panicking sections.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `tx` under a fresh handle. Handles start at 1 and increase
    /// strictly.
    pub fn register(&self, tx: T) -> TxId {
        let mut state = self.lock();
        let tx_id = TxId(state.next_id);
        state.next_id += 1;
        state.transactions.insert(tx_id, Arc::new(Mutex::new(tx)));
        tx_id
    }

    /// `None` means "no transaction" and is never an error. A handle that
    /// isn't registered is.
    pub fn get(&self, tx_id: Option<TxId>) -> StoreResult<Option<Arc<Mutex<T>>>> {
        let Some(tx_id) = tx_id else {
            return Ok(None);
        };

        self.lock()
            .transactions
            .get(&tx_id)
            .cloned()
            .map(Some)
            .ok_or(StoreError::UnknownTransaction {
                tx_id,
                operation: None,
            })
    }

    /// Takes the transaction out of the registry. `operation` only shows up
    /// in the error.
    pub fn remove(&self, tx_id: TxId, operation: &'static str) -> StoreResult<Arc<Mutex<T>>> {
        self.lock()
            .transactions
            .remove(&tx_id)
            .ok_or(StoreError::UnknownTransaction {
                tx_id,
                operation: Some(operation),
            })
    }

    pub fn len(&self) -> usize {
        self.lock().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

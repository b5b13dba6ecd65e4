use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};
use tracing::debug;

use super::{pool_error, Store};
use crate::error::StoreResult;
use crate::transaction::{IsolationLevel, TxId};

type Manager = AnsiTransactionManager;

/// Transactions that span several table operations.
impl Store {
    /// Begins a transaction on a dedicated primary connection. Pass the
    /// returned handle to table operations to run them inside it.
    pub async fn start_transaction(&self) -> StoreResult<TxId> {
        let mut conn = self.primary.get().await.map_err(pool_error)?;
        <Manager as TransactionManager<AsyncPgConnection>>::begin_transaction(&mut *conn).await?;

        let tx_id = self.transactions.register(conn);
        debug!(%tx_id, "Started transaction");
        Ok(tx_id)
    }

    /// Must come before the first statement of the transaction.
    pub async fn set_isolation_level(&self, tx_id: TxId, level: IsolationLevel) -> StoreResult<()> {
        let mut scope = self.write_scope(Some(tx_id)).await?;
        diesel::sql_query(level.set_statement())
            .execute(scope.conn())
            .await?;
        debug!(%tx_id, %level, "Set transaction isolation level");
        Ok(())
    }

    /// Commits and forgets the transaction. The handle is invalid afterwards,
    /// even if the commit fails.
    pub async fn commit_transaction(&self, tx_id: TxId) -> StoreResult<()> {
        let tx = self.transactions.remove(tx_id, "commit")?;
        let mut conn = tx.lock().await;
        <Manager as TransactionManager<AsyncPgConnection>>::commit_transaction(&mut **conn).await?;
        debug!(%tx_id, "Committed transaction");
        Ok(())
    }

    pub async fn rollback_transaction(&self, tx_id: TxId) -> StoreResult<()> {
        let tx = self.transactions.remove(tx_id, "rollback")?;
        let mut conn = tx.lock().await;
        <Manager as TransactionManager<AsyncPgConnection>>::rollback_transaction(&mut **conn)
            .await?;
        debug!(%tx_id, "Rolled back transaction");
        Ok(())
    }

    /// Number of transactions started but neither committed nor rolled back.
    pub fn open_transactions(&self) -> usize {
        self.transactions.len()
    }
}

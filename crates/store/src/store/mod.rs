mod transactions;
mod views;

use std::fmt::{self, Debug, Display};
use std::sync::Arc;
use std::time::Duration;

use diesel_async::methods::{ExecuteDsl, LoadQuery};
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_async_migrations::{embed_migrations, EmbeddedMigrations};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

pub use self::views::MaterializedView;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::options::{select_replica, QueryOptions};
use crate::transaction::{TransactionRegistry, TxId};

pub type PgPool = Pool<AsyncPgConnection>;
pub type PgConn = Object<AsyncPgConnection>;

/// The connection a statement runs on: a pooled one, or the connection of
/// an open transaction, locked for as long as the scope lives.
pub enum QueryScope {
    Pooled(PgConn),
    Transaction(OwnedMutexGuard<PgConn>),
}

impl QueryScope {
    pub fn conn(&mut self) -> &mut AsyncPgConnection {
        match self {
            QueryScope::Pooled(conn) => &mut **conn,
            QueryScope::Transaction(guard) => &mut ***guard,
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, QueryScope::Transaction(_))
    }
}

impl Debug for QueryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryScope::Pooled(_) => f.write_str("QueryScope::Pooled"),
            QueryScope::Transaction(_) => f.write_str("QueryScope::Transaction"),
        }
    }
}

fn pool_error(err: impl Display) -> StoreError {
    StoreError::Pool(err.to_string())
}

/// An abstraction over all database operations. It uses [`Arc`] internally, so
/// it's cheaply cloneable.
#[derive(Clone)]
pub struct Store {
    primary: PgPool,
    replicas: Vec<PgPool>,
    transactions: Arc<TransactionRegistry<PgConn>>,
    statement_timeout: Option<Duration>,
}

impl Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // It might contain sensitive data, so don't print it.
        f.debug_struct("Store").finish()
    }
}

impl Store {
    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    /// Connects to the primary and every replica and, unless disabled, runs
    /// all pending migrations on the primary.
    pub async fn new(config: &StoreConfig) -> StoreResult<Self> {
        info!(
            replicas = config.read_replica_urls.len(),
            pool_size = config.pool_size,
            "Initializing database connection pools"
        );

        let primary = Self::pool(&config.database_url, config.pool_size)?;
        let replicas = config
            .read_replica_urls
            .iter()
            .map(|url| Self::pool(url, config.pool_size))
            .collect::<StoreResult<Vec<_>>>()?;

        let store = Self {
            primary,
            replicas,
            transactions: Arc::new(TransactionRegistry::new()),
            statement_timeout: config.statement_timeout(),
        };

        if config.run_migrations {
            store.run_migrations().await?;
        }

        Ok(store)
    }

    fn pool(url: &str, max_size: usize) -> StoreResult<PgPool> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
        Pool::builder(manager)
            .max_size(max_size)
            .build()
            .map_err(|e| StoreError::Configuration(e.to_string()))
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        let mut conn = self.conn().await?;

        // Get a lock for running migrations. Blocks until we get the lock,
        // so that concurrently starting processes don't race each other.
        diesel::sql_query("select pg_advisory_lock(1)")
            .execute(&mut conn)
            .await?;
        info!("Run database migrations");

        let result = Self::MIGRATIONS
            .run_pending_migrations(&mut conn)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()));

        // Release the migration lock.
        diesel::sql_query("select pg_advisory_unlock(1)")
            .execute(&mut conn)
            .await?;

        result
    }

    /// A pooled connection to the primary.
    pub async fn conn(&self) -> StoreResult<PgConn> {
        self.primary.get().await.map_err(pool_error)
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// Resolves the connection that `options` asks for.
    ///
    /// A read replica request is checked against the configuration even
    /// inside a transaction, but the transaction's connection wins.
    pub async fn query_scope<C>(&self, options: &QueryOptions<C>) -> StoreResult<QueryScope> {
        let replica = if options.read_replica {
            Some(select_replica(&self.replicas, &mut rand::thread_rng())?)
        } else {
            None
        };

        if let Some(tx) = self.transactions.get(options.tx_id)? {
            if replica.is_some() {
                warn!(
                    tx_id = ?options.tx_id,
                    "Read replica requested within a transaction, using the transaction"
                );
            }
            return Ok(QueryScope::Transaction(tx.lock_owned().await));
        }

        let pool = replica.unwrap_or(&self.primary);
        Ok(QueryScope::Pooled(pool.get().await.map_err(pool_error)?))
    }

    /// The scope of a write: always the primary.
    pub(crate) async fn write_scope(&self, tx_id: Option<TxId>) -> StoreResult<QueryScope> {
        self.query_scope(&QueryOptions::<()>::in_transaction(tx_id))
            .await
    }

    fn statement_timeout<C>(&self, options: &QueryOptions<C>) -> Option<Duration> {
        options
            .sql_options
            .as_ref()
            .and_then(|sql_options| sql_options.statement_timeout)
            .or(self.statement_timeout)
    }

    /// Runs a statement the query builder can't express and decodes its rows
    /// into `T`, usually a [`diesel::QueryableByName`] struct.
    pub async fn raw_query<'q, Q, T, C>(
        &self,
        query: Q,
        options: &QueryOptions<C>,
    ) -> StoreResult<Vec<T>>
    where
        Q: LoadQuery<'q, AsyncPgConnection, T> + 'q,
        T: Send,
    {
        let timeout = self.statement_timeout(options);
        let mut scope = self.query_scope(options).await?;
        let conn = scope.conn();

        set_statement_timeout(conn, timeout).await?;
        let rows = query.load::<T>(conn).await;
        reset_statement_timeout(conn, timeout).await;

        Ok(rows?)
    }

    /// Like [`Store::raw_query`], for statements without rows. Returns the
    /// number of affected rows.
    pub async fn raw_execute<Q, C>(&self, query: Q, options: &QueryOptions<C>) -> StoreResult<usize>
    where
        Q: ExecuteDsl<AsyncPgConnection>,
    {
        let timeout = self.statement_timeout(options);
        let mut scope = self.query_scope(options).await?;
        let conn = scope.conn();

        set_statement_timeout(conn, timeout).await?;
        let affected = query.execute(conn).await;
        reset_statement_timeout(conn, timeout).await;

        Ok(affected?)
    }

    /// Executes SQL produced by the bulk synthesizers on the primary. `None`
    /// (nothing to write) affects no rows.
    pub async fn execute_bulk(&self, sql: Option<String>, tx_id: Option<TxId>) -> StoreResult<usize> {
        let Some(sql) = sql else {
            debug!("Skipping empty bulk write");
            return Ok(0);
        };

        let affected = self
            .raw_execute(
                diesel::sql_query(sql),
                &QueryOptions::<()>::in_transaction(tx_id),
            )
            .await?;
        debug!(affected, "Executed bulk write");
        Ok(affected)
    }
}

async fn set_statement_timeout(
    conn: &mut AsyncPgConnection,
    timeout: Option<Duration>,
) -> StoreResult<()> {
    if let Some(timeout) = timeout {
        diesel::sql_query(format!("SET statement_timeout = {}", timeout.as_millis()))
            .execute(conn)
            .await?;
    }
    Ok(())
}

async fn reset_statement_timeout(conn: &mut AsyncPgConnection, timeout: Option<Duration>) {
    if timeout.is_none() {
        return;
    }
    if let Err(err) = diesel::sql_query("RESET statement_timeout")
        .execute(conn)
        .await
    {
        warn!(error = %err, "Failed to reset statement timeout");
    }
}

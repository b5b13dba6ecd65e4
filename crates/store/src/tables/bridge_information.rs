use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use indexer_common_types::inputs::{
    BridgeInformationColumn, BridgeInformationQueryConfig, Pagination,
};
use indexer_common_types::{Ordering, TxHash};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{BridgeInformation, NewBridgeInformation};
use crate::options::QueryOptions;
use crate::pagination::{
    apply_ordering, order_by_column, paginate, OrderableQuery, PageWindow, PaginationFromDatabase,
};
use crate::schema::bridge_information;
use crate::store::Store;
use crate::transaction::TxId;

type BridgeInformationQuery = bridge_information::BoxedQuery<'static, Pg>;

impl<'a> OrderableQuery<BridgeInformationColumn> for bridge_information::BoxedQuery<'a, Pg> {
    fn then_order(self, column: BridgeInformationColumn, ordering: Ordering) -> Self {
        use bridge_information as bi;

        match column {
            BridgeInformationColumn::Id => order_by_column!(self, bi::id, ordering),
            BridgeInformationColumn::FromAddress => {
                order_by_column!(self, bi::from_address, ordering)
            }
            BridgeInformationColumn::ChainId => order_by_column!(self, bi::chain_id, ordering),
            BridgeInformationColumn::Amount => order_by_column!(self, bi::amount, ordering),
            BridgeInformationColumn::TransactionHash => {
                order_by_column!(self, bi::transaction_hash, ordering)
            }
            BridgeInformationColumn::CreatedAt => order_by_column!(self, bi::created_at, ordering),
        }
    }
}

fn filtered(filter: &BridgeInformationQueryConfig) -> BridgeInformationQuery {
    use bridge_information as bi;

    let mut query = bi::table.into_boxed();
    if let Some(from_addresses) = &filter.from_addresses {
        // An empty list matches no rows.
        query = query.filter(bi::from_address.eq_any(from_addresses.clone()));
    }
    if let Some(chain_id) = &filter.chain_id {
        query = query.filter(bi::chain_id.eq(chain_id.clone()));
    }
    if let Some(transaction_hash) = &filter.transaction_hash {
        query = query.filter(bi::transaction_hash.eq(transaction_hash.clone()));
    }
    match filter.has_transaction_hash {
        Some(true) => query = query.filter(bi::transaction_hash.is_not_null()),
        Some(false) => query = query.filter(bi::transaction_hash.is_null()),
        None => {}
    }
    query
}

fn default_order(query: BridgeInformationQuery) -> BridgeInformationQuery {
    query.then_order(BridgeInformationColumn::CreatedAt, Ordering::Desc)
}

/// Deposits bridged in from other chains.
impl Store {
    /// Generates a random id if the record doesn't carry one. Transaction
    /// hashes are unique.
    pub async fn create_bridge_information(
        &self,
        record: &NewBridgeInformation,
        tx_id: Option<TxId>,
    ) -> StoreResult<BridgeInformation> {
        let row = BridgeInformation {
            id: record
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            from_address: record.from_address.clone(),
            chain_id: record.chain_id.clone(),
            amount: record.amount.clone(),
            transaction_hash: record.transaction_hash.clone(),
            created_at: record.created_at,
        };

        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::insert_into(bridge_information::table)
            .values(&row)
            .get_result(scope.conn())
            .await?)
    }

    pub async fn bridge_information_by_id(
        &self,
        id: &str,
        options: &QueryOptions,
    ) -> StoreResult<Option<BridgeInformation>> {
        let mut scope = self.query_scope(options).await?;
        Ok(bridge_information::table
            .find(id)
            .first(scope.conn())
            .await
            .optional()?)
    }

    /// Records sent from `from_address`, newest first unless ordered
    /// otherwise.
    pub async fn bridge_information_by_from_address(
        &self,
        from_address: &str,
        has_transaction_hash: Option<bool>,
        pagination: Pagination,
        options: &QueryOptions<BridgeInformationColumn>,
    ) -> StoreResult<PaginationFromDatabase<BridgeInformation>> {
        let filter = BridgeInformationQueryConfig {
            from_addresses: Some(vec![from_address.to_owned()]),
            has_transaction_hash,
            ..Default::default()
        };
        self.search_bridge_information(&filter, pagination, options)
            .await
    }

    pub async fn search_bridge_information(
        &self,
        filter: &BridgeInformationQueryConfig,
        pagination: Pagination,
        options: &QueryOptions<BridgeInformationColumn>,
    ) -> StoreResult<PaginationFromDatabase<BridgeInformation>> {
        let mut scope = self.query_scope(options).await?;
        paginate(
            scope.conn(),
            || filtered(filter),
            |query| apply_ordering(query, options.order_by.as_deref(), default_order),
            PageWindow::new(pagination.limit, pagination.page),
        )
        .await
    }

    /// Returns `None` if there's no record with this id.
    pub async fn set_bridge_transaction_hash(
        &self,
        id: &str,
        transaction_hash: &TxHash,
        tx_id: Option<TxId>,
    ) -> StoreResult<Option<BridgeInformation>> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::update(bridge_information::table.find(id))
            .set(bridge_information::transaction_hash.eq(transaction_hash))
            .get_result(scope.conn())
            .await
            .optional()?)
    }
}

use chrono::NaiveDateTime;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use indexer_common_types::inputs::{PnlColumn, PnlQueryConfig};
use indexer_common_types::{Ordering, QueryableField};
use uuid::Uuid;

use crate::bulk::{generate_bulk_upsert_string, set_bulk_rows_for_update, BulkUpsert, ColumnTypes};
use crate::error::StoreResult;
use crate::guards::verify_all_required_fields;
use crate::models::Pnl;
use crate::options::QueryOptions;
use crate::pagination::{
    apply_ordering, order_by_column, paginate, OrderableQuery, PageWindow, PaginationFromDatabase,
};
use crate::schema::pnl;
use crate::store::Store;
use crate::transaction::TxId;

type PnlQuery = pnl::BoxedQuery<'static, Pg>;

const COLUMNS: &[&str] = &[
    "subaccount_id",
    "created_at",
    "created_at_height",
    "equity",
    "total_pnl",
    "net_transfers",
];
const COLUMN_TYPES: ColumnTypes<'static> = ColumnTypes {
    uuid_columns: &["subaccount_id"],
    timestamp_columns: &["created_at"],
    bigint_columns: &["created_at_height"],
    numeric_columns: &["equity", "total_pnl", "net_transfers"],
    ..ColumnTypes::EMPTY
};
const PRIMARY_KEY: &[&str] = &["subaccount_id", "created_at"];

impl<'a> OrderableQuery<PnlColumn> for pnl::BoxedQuery<'a, Pg> {
    fn then_order(self, column: PnlColumn, ordering: Ordering) -> Self {
        match column {
            PnlColumn::SubaccountId => order_by_column!(self, pnl::subaccount_id, ordering),
            PnlColumn::CreatedAt => order_by_column!(self, pnl::created_at, ordering),
            PnlColumn::CreatedAtHeight => order_by_column!(self, pnl::created_at_height, ordering),
            PnlColumn::Equity => order_by_column!(self, pnl::equity, ordering),
            PnlColumn::TotalPnl => order_by_column!(self, pnl::total_pnl, ordering),
            PnlColumn::NetTransfers => order_by_column!(self, pnl::net_transfers, ordering),
        }
    }
}

fn filtered(filter: &PnlQueryConfig) -> PnlQuery {
    let mut query = pnl::table.into_boxed();
    if let Some(subaccount_ids) = &filter.subaccount_id {
        query = query.filter(pnl::subaccount_id.eq_any(subaccount_ids.clone()));
    }
    if let Some(height) = filter.created_at_height {
        query = query.filter(pnl::created_at_height.eq(height));
    }
    if let Some(before_or_at) = filter.created_before_or_at {
        query = query.filter(pnl::created_at.le(before_or_at));
    }
    if let Some(on_or_after) = filter.created_on_or_after {
        query = query.filter(pnl::created_at.ge(on_or_after));
    }
    query
}

fn default_order(query: PnlQuery) -> PnlQuery {
    query
        .then_order(PnlColumn::SubaccountId, Ordering::Asc)
        .then_order(PnlColumn::CreatedAt, Ordering::Desc)
}

/// Periodic PnL snapshots, keyed by subaccount and snapshot time.
impl Store {
    pub async fn create_pnl(&self, record: &Pnl, tx_id: Option<TxId>) -> StoreResult<Pnl> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::insert_into(pnl::table)
            .values(record)
            .get_result(scope.conn())
            .await?)
    }

    pub async fn pnl_by_id(
        &self,
        subaccount_id: Uuid,
        created_at: NaiveDateTime,
        options: &QueryOptions,
    ) -> StoreResult<Option<Pnl>> {
        let mut scope = self.query_scope(options).await?;
        Ok(pnl::table
            .find((subaccount_id, created_at))
            .first(scope.conn())
            .await
            .optional()?)
    }

    pub async fn pnl_records(
        &self,
        filter: &PnlQueryConfig,
        required: &[QueryableField],
        options: &QueryOptions<PnlColumn>,
    ) -> StoreResult<PaginationFromDatabase<Pnl>> {
        verify_all_required_fields(filter, required)?;

        let mut scope = self.query_scope(options).await?;
        paginate(
            scope.conn(),
            || filtered(filter),
            |query| apply_ordering(query, options.order_by.as_deref(), default_order),
            PageWindow::new(filter.limit, filter.page),
        )
        .await
    }

    /// Inserts snapshots, overwriting the values of snapshots that already
    /// exist for the same subaccount and time.
    pub async fn bulk_upsert_pnl(&self, records: &[Pnl], tx_id: Option<TxId>) -> StoreResult<usize> {
        let rows = set_bulk_rows_for_update(records, COLUMNS, &COLUMN_TYPES)?;
        let sql = generate_bulk_upsert_string(&BulkUpsert {
            unique_identifiers: PRIMARY_KEY,
            ..BulkUpsert::new("pnl", &rows, COLUMNS)
        })?;
        self.execute_bulk(sql, tx_id).await
    }
}

use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use indexer_common_types::inputs::{VaultColumn, VaultQueryConfig};
use indexer_common_types::{Ordering, QueryableField};

use crate::bulk::{generate_bulk_upsert_string, set_bulk_rows_for_update, BulkUpsert, ColumnTypes};
use crate::error::StoreResult;
use crate::guards::verify_all_required_fields;
use crate::models::Vault;
use crate::options::QueryOptions;
use crate::pagination::{apply_ordering, order_by_column, paginate, OrderableQuery, PageWindow};
use crate::schema::vaults;
use crate::store::Store;
use crate::transaction::TxId;

type VaultsQuery = vaults::BoxedQuery<'static, Pg>;

const COLUMNS: &[&str] = &["address", "clob_pair_id", "status", "created_at", "updated_at"];
const COLUMN_TYPES: ColumnTypes<'static> = ColumnTypes {
    string_columns: &["address"],
    bigint_columns: &["clob_pair_id"],
    enum_columns: &["status"],
    timestamp_columns: &["created_at", "updated_at"],
    ..ColumnTypes::EMPTY
};

impl<'a> OrderableQuery<VaultColumn> for vaults::BoxedQuery<'a, Pg> {
    fn then_order(self, column: VaultColumn, ordering: Ordering) -> Self {
        match column {
            VaultColumn::Address => order_by_column!(self, vaults::address, ordering),
            VaultColumn::ClobPairId => order_by_column!(self, vaults::clob_pair_id, ordering),
            VaultColumn::Status => order_by_column!(self, vaults::status, ordering),
            VaultColumn::CreatedAt => order_by_column!(self, vaults::created_at, ordering),
            VaultColumn::UpdatedAt => order_by_column!(self, vaults::updated_at, ordering),
        }
    }
}

fn filtered(filter: &VaultQueryConfig) -> VaultsQuery {
    let mut query = vaults::table.into_boxed();
    if let Some(addresses) = &filter.addresses {
        query = query.filter(vaults::address.eq_any(addresses.clone()));
    }
    if let Some(clob_pair_ids) = &filter.clob_pair_id {
        query = query.filter(vaults::clob_pair_id.eq_any(clob_pair_ids.clone()));
    }
    if let Some(statuses) = &filter.status {
        query = query.filter(vaults::status.eq_any(statuses.clone()));
    }
    query
}

fn default_order(query: VaultsQuery) -> VaultsQuery {
    query.then_order(VaultColumn::ClobPairId, Ordering::Asc)
}

/// MegaVault sub-vaults, one per CLOB pair.
impl Store {
    pub async fn create_vault(&self, vault: &Vault, tx_id: Option<TxId>) -> StoreResult<Vault> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::insert_into(vaults::table)
            .values(vault)
            .get_result(scope.conn())
            .await?)
    }

    pub async fn vaults(
        &self,
        filter: &VaultQueryConfig,
        required: &[QueryableField],
        options: &QueryOptions<VaultColumn>,
    ) -> StoreResult<Vec<Vault>> {
        verify_all_required_fields(filter, required)?;

        let mut scope = self.query_scope(options).await?;
        let page = paginate(
            scope.conn(),
            || filtered(filter),
            |query| apply_ordering(query, options.order_by.as_deref(), default_order),
            PageWindow::new(filter.limit, None),
        )
        .await?;
        Ok(page.results)
    }

    /// Inserts or overwrites vaults by address in a single statement.
    pub async fn bulk_upsert_vaults(&self, vaults: &[Vault], tx_id: Option<TxId>) -> StoreResult<usize> {
        let rows = set_bulk_rows_for_update(vaults, COLUMNS, &COLUMN_TYPES)?;
        let sql = generate_bulk_upsert_string(&BulkUpsert {
            unique_identifiers: &["address"],
            ..BulkUpsert::new("vaults", &rows, COLUMNS)
        })?;
        self.execute_bulk(sql, tx_id).await
    }
}

use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use indexer_common_types::inputs::{PermissionApprovalColumn, PermissionApprovalQueryConfig};
use indexer_common_types::{Ordering, QueryableField};

use crate::bulk::{generate_bulk_upsert_string, set_bulk_rows_for_update, BulkUpsert, ColumnTypes};
use crate::error::StoreResult;
use crate::guards::verify_all_required_fields;
use crate::models::PermissionApproval;
use crate::options::QueryOptions;
use crate::pagination::{apply_ordering, order_by_column, paginate, OrderableQuery, PageWindow};
use crate::schema::permission_approvals;
use crate::store::Store;
use crate::transaction::TxId;

type PermissionApprovalsQuery = permission_approvals::BoxedQuery<'static, Pg>;

const COLUMNS: &[&str] = &["suborg_id", "chain_id", "approval_address", "updated_at"];
const COLUMN_TYPES: ColumnTypes<'static> = ColumnTypes {
    string_columns: &["suborg_id", "chain_id", "approval_address"],
    timestamp_columns: &["updated_at"],
    ..ColumnTypes::EMPTY
};
const PRIMARY_KEY: &[&str] = &["suborg_id", "chain_id"];

impl<'a> OrderableQuery<PermissionApprovalColumn> for permission_approvals::BoxedQuery<'a, Pg> {
    fn then_order(self, column: PermissionApprovalColumn, ordering: Ordering) -> Self {
        use permission_approvals as pa;

        match column {
            PermissionApprovalColumn::SuborgId => order_by_column!(self, pa::suborg_id, ordering),
            PermissionApprovalColumn::ChainId => order_by_column!(self, pa::chain_id, ordering),
            PermissionApprovalColumn::ApprovalAddress => {
                order_by_column!(self, pa::approval_address, ordering)
            }
            PermissionApprovalColumn::UpdatedAt => order_by_column!(self, pa::updated_at, ordering),
        }
    }
}

fn filtered(filter: &PermissionApprovalQueryConfig) -> PermissionApprovalsQuery {
    let mut query = permission_approvals::table.into_boxed();
    if let Some(suborg_id) = &filter.suborg_id {
        query = query.filter(permission_approvals::suborg_id.eq(suborg_id.clone()));
    }
    if let Some(chain_id) = &filter.chain_id {
        query = query.filter(permission_approvals::chain_id.eq(chain_id.clone()));
    }
    query
}

fn default_order(query: PermissionApprovalsQuery) -> PermissionApprovalsQuery {
    query
        .then_order(PermissionApprovalColumn::SuborgId, Ordering::Asc)
        .then_order(PermissionApprovalColumn::ChainId, Ordering::Asc)
}

/// Approval addresses of sub-organizations, one per chain.
impl Store {
    pub async fn upsert_permission_approval(
        &self,
        approval: &PermissionApproval,
        tx_id: Option<TxId>,
    ) -> StoreResult<PermissionApproval> {
        use permission_approvals as pa;

        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::insert_into(pa::table)
            .values(approval)
            .on_conflict((pa::suborg_id, pa::chain_id))
            .do_update()
            .set((
                pa::approval_address.eq(excluded(pa::approval_address)),
                pa::updated_at.eq(excluded(pa::updated_at)),
            ))
            .get_result(scope.conn())
            .await?)
    }

    pub async fn bulk_upsert_permission_approvals(
        &self,
        approvals: &[PermissionApproval],
        tx_id: Option<TxId>,
    ) -> StoreResult<usize> {
        let rows = set_bulk_rows_for_update(approvals, COLUMNS, &COLUMN_TYPES)?;
        let sql = generate_bulk_upsert_string(&BulkUpsert {
            unique_identifiers: PRIMARY_KEY,
            ..BulkUpsert::new("permission_approvals", &rows, COLUMNS)
        })?;
        self.execute_bulk(sql, tx_id).await
    }

    pub async fn permission_approvals(
        &self,
        filter: &PermissionApprovalQueryConfig,
        required: &[QueryableField],
        options: &QueryOptions<PermissionApprovalColumn>,
    ) -> StoreResult<Vec<PermissionApproval>> {
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

    pub async fn permission_approval(
        &self,
        suborg_id: &str,
        chain_id: &str,
        options: &QueryOptions,
    ) -> StoreResult<Option<PermissionApproval>> {
        let mut scope = self.query_scope(options).await?;
        Ok(permission_approvals::table
            .find((suborg_id, chain_id))
            .first(scope.conn())
            .await
            .optional()?)
    }
}

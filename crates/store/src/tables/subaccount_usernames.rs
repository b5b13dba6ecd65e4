use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use indexer_common_types::inputs::{SubaccountUsernameColumn, SubaccountUsernamesQueryConfig};
use indexer_common_types::{Ordering, QueryableField};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::guards::verify_all_required_fields;
use crate::models::SubaccountUsername;
use crate::options::QueryOptions;
use crate::pagination::{apply_ordering, order_by_column, paginate, OrderableQuery, PageWindow};
use crate::schema::subaccount_usernames;
use crate::store::Store;
use crate::transaction::TxId;

type SubaccountUsernamesQuery = subaccount_usernames::BoxedQuery<'static, Pg>;

impl<'a> OrderableQuery<SubaccountUsernameColumn> for subaccount_usernames::BoxedQuery<'a, Pg> {
    fn then_order(self, column: SubaccountUsernameColumn, ordering: Ordering) -> Self {
        match column {
            SubaccountUsernameColumn::Username => {
                order_by_column!(self, subaccount_usernames::username, ordering)
            }
            SubaccountUsernameColumn::SubaccountId => {
                order_by_column!(self, subaccount_usernames::subaccount_id, ordering)
            }
        }
    }
}

fn filtered(filter: &SubaccountUsernamesQueryConfig) -> SubaccountUsernamesQuery {
    let mut query = subaccount_usernames::table.into_boxed();
    if let Some(usernames) = &filter.username {
        query = query.filter(subaccount_usernames::username.eq_any(usernames.clone()));
    }
    if let Some(subaccount_ids) = &filter.subaccount_id {
        query = query.filter(subaccount_usernames::subaccount_id.eq_any(subaccount_ids.clone()));
    }
    query
}

fn default_order(query: SubaccountUsernamesQuery) -> SubaccountUsernamesQuery {
    query.then_order(SubaccountUsernameColumn::Username, Ordering::Asc)
}

/// Usernames of subaccounts. Both the username and the subaccount are unique.
impl Store {
    /// Fails with [`StoreError::UniqueViolation`](crate::StoreError::UniqueViolation)
    /// if either the username or the subaccount is taken.
    pub async fn create_subaccount_username(
        &self,
        username: &SubaccountUsername,
        tx_id: Option<TxId>,
    ) -> StoreResult<SubaccountUsername> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::insert_into(subaccount_usernames::table)
            .values(username)
            .get_result(scope.conn())
            .await?)
    }

    pub async fn subaccount_usernames(
        &self,
        filter: &SubaccountUsernamesQueryConfig,
        required: &[QueryableField],
        options: &QueryOptions<SubaccountUsernameColumn>,
    ) -> StoreResult<Vec<SubaccountUsername>> {
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

    pub async fn subaccount_username_by_username(
        &self,
        username: &str,
        options: &QueryOptions,
    ) -> StoreResult<Option<SubaccountUsername>> {
        let mut scope = self.query_scope(options).await?;
        Ok(subaccount_usernames::table
            .find(username)
            .first(scope.conn())
            .await
            .optional()?)
    }

    pub async fn subaccount_username_by_subaccount_id(
        &self,
        subaccount_id: Uuid,
        options: &QueryOptions,
    ) -> StoreResult<Option<SubaccountUsername>> {
        let mut scope = self.query_scope(options).await?;
        Ok(subaccount_usernames::table
            .filter(subaccount_usernames::subaccount_id.eq(subaccount_id))
            .first(scope.conn())
            .await
            .optional()?)
    }
}

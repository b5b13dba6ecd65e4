use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use indexer_common_types::inputs::{TokenColumn, TokenQueryConfig};
use indexer_common_types::{Ordering, QueryableField};

use crate::error::StoreResult;
use crate::guards::verify_all_required_fields;
use crate::models::Token;
use crate::options::QueryOptions;
use crate::pagination::{apply_ordering, order_by_column, paginate, OrderableQuery, PageWindow};
use crate::schema::tokens;
use crate::store::Store;
use crate::transaction::TxId;

type TokensQuery = tokens::BoxedQuery<'static, Pg>;

impl<'a> OrderableQuery<TokenColumn> for tokens::BoxedQuery<'a, Pg> {
    fn then_order(self, column: TokenColumn, ordering: Ordering) -> Self {
        match column {
            TokenColumn::Token => order_by_column!(self, tokens::token, ordering),
            TokenColumn::Address => order_by_column!(self, tokens::address, ordering),
            TokenColumn::Language => order_by_column!(self, tokens::language, ordering),
            TokenColumn::UpdatedAt => order_by_column!(self, tokens::updated_at, ordering),
        }
    }
}

fn filtered(filter: &TokenQueryConfig) -> TokensQuery {
    let mut query = tokens::table.into_boxed();
    if let Some(address) = &filter.address {
        query = query.filter(tokens::address.eq(address.clone()));
    }
    if let Some(token) = &filter.token {
        query = query.filter(tokens::token.eq(token.clone()));
    }
    if let Some(before_or_at) = filter.updated_before_or_at {
        query = query.filter(tokens::updated_at.le(before_or_at));
    }
    query
}

fn default_order(query: TokensQuery) -> TokensQuery {
    query.then_order(TokenColumn::UpdatedAt, Ordering::Desc)
}

/// Push-notification tokens of wallet addresses.
impl Store {
    /// A token moves to the new address (and language) when registered again.
    pub async fn upsert_token(&self, token: &Token, tx_id: Option<TxId>) -> StoreResult<Token> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::insert_into(tokens::table)
            .values(token)
            .on_conflict(tokens::token)
            .do_update()
            .set((
                tokens::address.eq(excluded(tokens::address)),
                tokens::language.eq(excluded(tokens::language)),
                tokens::updated_at.eq(excluded(tokens::updated_at)),
            ))
            .get_result(scope.conn())
            .await?)
    }

    pub async fn tokens(
        &self,
        filter: &TokenQueryConfig,
        required: &[QueryableField],
        options: &QueryOptions<TokenColumn>,
    ) -> StoreResult<Vec<Token>> {
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

    /// Returns the number of deleted tokens.
    pub async fn delete_tokens(&self, values: &[String], tx_id: Option<TxId>) -> StoreResult<usize> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(
            diesel::delete(tokens::table.filter(tokens::token.eq_any(values)))
                .execute(scope.conn())
                .await?,
        )
    }
}

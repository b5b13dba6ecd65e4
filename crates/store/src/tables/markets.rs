use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use indexer_common_types::inputs::{MarketColumn, MarketQueryConfig};
use indexer_common_types::{Ordering, QueryableField};

use crate::bulk::{
    generate_bulk_update_string, set_bulk_rows_for_update, BulkUpdate, ColumnTypes,
};
use crate::error::StoreResult;
use crate::guards::verify_all_required_fields;
use crate::models::{Market, MarketPriceUpdate, MarketUpdate};
use crate::options::QueryOptions;
use crate::pagination::{apply_ordering, order_by_column, paginate, OrderableQuery, PageWindow};
use crate::schema::markets;
use crate::store::Store;
use crate::transaction::TxId;

type MarketsQuery = markets::BoxedQuery<'static, Pg>;

const PRICE_UPDATE_COLUMNS: &[&str] = &["id", "oracle_price"];
const PRICE_UPDATE_TYPES: ColumnTypes<'static> = ColumnTypes {
    numeric_columns: PRICE_UPDATE_COLUMNS,
    ..ColumnTypes::EMPTY
};

impl<'a> OrderableQuery<MarketColumn> for markets::BoxedQuery<'a, Pg> {
    fn then_order(self, column: MarketColumn, ordering: Ordering) -> Self {
        match column {
            MarketColumn::Id => order_by_column!(self, markets::id, ordering),
            MarketColumn::Pair => order_by_column!(self, markets::pair, ordering),
            MarketColumn::Exponent => order_by_column!(self, markets::exponent, ordering),
            MarketColumn::MinPriceChangePpm => {
                order_by_column!(self, markets::min_price_change_ppm, ordering)
            }
            MarketColumn::OraclePrice => order_by_column!(self, markets::oracle_price, ordering),
        }
    }
}

fn filtered(filter: &MarketQueryConfig) -> MarketsQuery {
    let mut query = markets::table.into_boxed();
    if let Some(ids) = &filter.id {
        query = query.filter(markets::id.eq_any(ids.clone()));
    }
    if let Some(pair) = &filter.pair {
        query = query.filter(markets::pair.eq(pair.clone()));
    }
    query
}

fn default_order(query: MarketsQuery) -> MarketsQuery {
    query.then_order(MarketColumn::Id, Ordering::Asc)
}

/// Perpetual markets.
impl Store {
    pub async fn create_market(&self, market: &Market, tx_id: Option<TxId>) -> StoreResult<Market> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::insert_into(markets::table)
            .values(market)
            .get_result(scope.conn())
            .await?)
    }

    pub async fn market_by_id(&self, id: i32, options: &QueryOptions) -> StoreResult<Option<Market>> {
        let mut scope = self.query_scope(options).await?;
        Ok(markets::table
            .find(id)
            .first(scope.conn())
            .await
            .optional()?)
    }

    pub async fn markets(
        &self,
        filter: &MarketQueryConfig,
        required: &[QueryableField],
        options: &QueryOptions<MarketColumn>,
    ) -> StoreResult<Vec<Market>> {
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

    /// Returns `None` if there's no market with this id.
    pub async fn update_market(
        &self,
        id: i32,
        update: &MarketUpdate,
        tx_id: Option<TxId>,
    ) -> StoreResult<Option<Market>> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::update(markets::table.find(id))
            .set(update)
            .get_result(scope.conn())
            .await
            .optional()?)
    }

    /// Writes the oracle prices of many markets with a single statement.
    /// Returns the number of updated markets.
    pub async fn update_oracle_prices(
        &self,
        updates: &[MarketPriceUpdate],
        tx_id: Option<TxId>,
    ) -> StoreResult<usize> {
        let rows = set_bulk_rows_for_update(updates, PRICE_UPDATE_COLUMNS, &PRICE_UPDATE_TYPES)?;
        let sql = generate_bulk_update_string(&BulkUpdate::new(
            "markets",
            &rows,
            PRICE_UPDATE_COLUMNS,
        ))?;
        self.execute_bulk(sql, tx_id).await
    }
}

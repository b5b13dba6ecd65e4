use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use indexer_common_types::inputs::{AssetColumn, AssetQueryConfig};
use indexer_common_types::{Ordering, QueryableField};

use crate::error::StoreResult;
use crate::guards::verify_all_required_fields;
use crate::models::{Asset, AssetUpdate};
use crate::options::QueryOptions;
use crate::pagination::{apply_ordering, order_by_column, paginate, OrderableQuery, PageWindow};
use crate::schema::assets;
use crate::store::Store;
use crate::transaction::TxId;

type AssetsQuery = assets::BoxedQuery<'static, Pg>;

impl<'a> OrderableQuery<AssetColumn> for assets::BoxedQuery<'a, Pg> {
    fn then_order(self, column: AssetColumn, ordering: Ordering) -> Self {
        match column {
            AssetColumn::Id => order_by_column!(self, assets::id, ordering),
            AssetColumn::Symbol => order_by_column!(self, assets::symbol, ordering),
            AssetColumn::AtomicResolution => {
                order_by_column!(self, assets::atomic_resolution, ordering)
            }
            AssetColumn::HasMarket => order_by_column!(self, assets::has_market, ordering),
            AssetColumn::MarketId => order_by_column!(self, assets::market_id, ordering),
        }
    }
}

fn filtered(filter: &AssetQueryConfig) -> AssetsQuery {
    let mut query = assets::table.into_boxed();
    if let Some(ids) = &filter.id {
        query = query.filter(assets::id.eq_any(ids.clone()));
    }
    if let Some(symbol) = &filter.symbol {
        query = query.filter(assets::symbol.eq(symbol.clone()));
    }
    if let Some(atomic_resolution) = filter.atomic_resolution {
        query = query.filter(assets::atomic_resolution.eq(atomic_resolution));
    }
    if let Some(has_market) = filter.has_market {
        query = query.filter(assets::has_market.eq(has_market));
    }
    if let Some(market_id) = filter.market_id {
        query = query.filter(assets::market_id.eq(market_id));
    }
    query
}

fn default_order(query: AssetsQuery) -> AssetsQuery {
    query.then_order(AssetColumn::Symbol, Ordering::Asc)
}

/// Assets.
impl Store {
    pub async fn create_asset(&self, asset: &Asset, tx_id: Option<TxId>) -> StoreResult<Asset> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::insert_into(assets::table)
            .values(asset)
            .get_result(scope.conn())
            .await?)
    }

    pub async fn asset_by_id(&self, id: &str, options: &QueryOptions) -> StoreResult<Option<Asset>> {
        let mut scope = self.query_scope(options).await?;
        Ok(assets::table
            .find(id)
            .first(scope.conn())
            .await
            .optional()?)
    }

    pub async fn assets(
        &self,
        filter: &AssetQueryConfig,
        required: &[QueryableField],
        options: &QueryOptions<AssetColumn>,
    ) -> StoreResult<Vec<Asset>> {
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

    pub async fn update_asset(
        &self,
        id: &str,
        update: &AssetUpdate,
        tx_id: Option<TxId>,
    ) -> StoreResult<Option<Asset>> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::update(assets::table.find(id))
            .set(update)
            .get_result(scope.conn())
            .await
            .optional()?)
    }

    /// Inserts the asset, or overwrites every column of the asset with the
    /// same id.
    pub async fn upsert_asset(&self, asset: &Asset, tx_id: Option<TxId>) -> StoreResult<Asset> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::insert_into(assets::table)
            .values(asset)
            .on_conflict(assets::id)
            .do_update()
            .set((
                assets::symbol.eq(excluded(assets::symbol)),
                assets::atomic_resolution.eq(excluded(assets::atomic_resolution)),
                assets::has_market.eq(excluded(assets::has_market)),
                assets::market_id.eq(excluded(assets::market_id)),
            ))
            .get_result(scope.conn())
            .await?)
    }
}

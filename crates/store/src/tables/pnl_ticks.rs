use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::{Array, Nullable, Text, Timestamp};
use diesel_async::RunQueryDsl;
use indexer_common_types::inputs::{PnlTicksColumn, PnlTicksQueryConfig};
use indexer_common_types::{Ordering, QueryableField};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::guards::{verify_all_injectable_variables, verify_all_required_fields};
use crate::models::{LatestPnlTickBlockTime, NewPnlTick, PnlTick};
use crate::options::QueryOptions;
use crate::pagination::{
    apply_ordering, order_by_column, paginate, OrderableQuery, PageWindow, PaginationFromDatabase,
};
use crate::schema::pnl_ticks;
use crate::store::{MaterializedView, Store};
use crate::transaction::TxId;

type PnlTicksQuery = pnl_ticks::BoxedQuery<'static, Pg>;

/// How far back [`Store::latest_pnl_ticks`] looks for a tick.
const LATEST_TICK_LOOKBACK_HOURS: i64 = 4;

impl<'a> OrderableQuery<PnlTicksColumn> for pnl_ticks::BoxedQuery<'a, Pg> {
    fn then_order(self, column: PnlTicksColumn, ordering: Ordering) -> Self {
        match column {
            PnlTicksColumn::Id => order_by_column!(self, pnl_ticks::id, ordering),
            PnlTicksColumn::SubaccountId => {
                order_by_column!(self, pnl_ticks::subaccount_id, ordering)
            }
            PnlTicksColumn::Equity => order_by_column!(self, pnl_ticks::equity, ordering),
            PnlTicksColumn::TotalPnl => order_by_column!(self, pnl_ticks::total_pnl, ordering),
            PnlTicksColumn::NetTransfers => {
                order_by_column!(self, pnl_ticks::net_transfers, ordering)
            }
            PnlTicksColumn::CreatedAt => order_by_column!(self, pnl_ticks::created_at, ordering),
            PnlTicksColumn::BlockHeight => {
                order_by_column!(self, pnl_ticks::block_height, ordering)
            }
            PnlTicksColumn::BlockTime => order_by_column!(self, pnl_ticks::block_time, ordering),
        }
    }
}

fn filtered(filter: &PnlTicksQueryConfig) -> PnlTicksQuery {
    let mut query = pnl_ticks::table.into_boxed();
    if let Some(ids) = &filter.id {
        query = query.filter(pnl_ticks::id.eq_any(ids.clone()));
    }
    if let Some(subaccount_ids) = &filter.subaccount_id {
        query = query.filter(pnl_ticks::subaccount_id.eq_any(subaccount_ids.clone()));
    }
    if let Some(created_at) = filter.created_at {
        query = query.filter(pnl_ticks::created_at.eq(created_at));
    }
    if let Some(block_height) = filter.block_height {
        query = query.filter(pnl_ticks::block_height.eq(block_height));
    }
    if let Some(block_time) = filter.block_time {
        query = query.filter(pnl_ticks::block_time.eq(block_time));
    }
    if let Some(before_or_at) = filter.created_before_or_at {
        query = query.filter(pnl_ticks::created_at.le(before_or_at));
    }
    if let Some(height) = filter.created_before_or_at_block_height {
        query = query.filter(pnl_ticks::block_height.le(height));
    }
    if let Some(on_or_after) = filter.created_on_or_after {
        query = query.filter(pnl_ticks::created_at.ge(on_or_after));
    }
    if let Some(height) = filter.created_on_or_after_block_height {
        query = query.filter(pnl_ticks::block_height.ge(height));
    }
    query
}

fn default_order(query: PnlTicksQuery) -> PnlTicksQuery {
    query
        .then_order(PnlTicksColumn::SubaccountId, Ordering::Asc)
        .then_order(PnlTicksColumn::BlockHeight, Ordering::Desc)
}

/// PnL ticks: per-subaccount PnL sampled at block heights.
impl Store {
    /// The tick's id is derived from its subaccount and creation time, see
    /// [`NewPnlTick::id`].
    pub async fn create_pnl_tick(&self, tick: &NewPnlTick, tx_id: Option<TxId>) -> StoreResult<PnlTick> {
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::insert_into(pnl_ticks::table)
            .values(tick.clone().into_pnl_tick())
            .get_result(scope.conn())
            .await?)
    }

    pub async fn create_pnl_ticks(&self, ticks: &[NewPnlTick], tx_id: Option<TxId>) -> StoreResult<usize> {
        if ticks.is_empty() {
            return Ok(0);
        }

        let rows: Vec<PnlTick> = ticks.iter().cloned().map(NewPnlTick::into_pnl_tick).collect();
        let mut scope = self.write_scope(tx_id).await?;
        Ok(diesel::insert_into(pnl_ticks::table)
            .values(&rows)
            .execute(scope.conn())
            .await?)
    }

    pub async fn pnl_tick_by_id(&self, id: Uuid, options: &QueryOptions) -> StoreResult<Option<PnlTick>> {
        let mut scope = self.query_scope(options).await?;
        Ok(pnl_ticks::table
            .find(id)
            .first(scope.conn())
            .await
            .optional()?)
    }

    pub async fn pnl_ticks(
        &self,
        filter: &PnlTicksQueryConfig,
        required: &[QueryableField],
        options: &QueryOptions<PnlTicksColumn>,
    ) -> StoreResult<PaginationFromDatabase<PnlTick>> {
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

    /// The block time of the most recent ticks and how many ticks were
    /// written at that time. Without ticks, the time is `None` and the count
    /// zero.
    pub async fn latest_processed_block_time_and_count(
        &self,
        options: &QueryOptions,
    ) -> StoreResult<LatestPnlTickBlockTime> {
        let query = diesel::sql_query(
            r#"
            WITH latest AS (
                SELECT MAX(block_time) AS max_block_time FROM pnl_ticks
            )
            SELECT latest.max_block_time, COUNT(pnl_ticks.id) AS count
            FROM latest
            LEFT JOIN pnl_ticks ON pnl_ticks.block_time = latest.max_block_time
            GROUP BY latest.max_block_time
            "#,
        );

        let rows: Vec<LatestPnlTickBlockTime> = self.raw_query(query, options).await?;
        Ok(rows.into_iter().next().unwrap_or(LatestPnlTickBlockTime {
            max_block_time: None,
            count: 0,
        }))
    }

    /// The most recent tick of every subaccount among the ticks at or after
    /// `created_on_or_after_height`, keyed by subaccount.
    pub async fn most_recent_pnl_tick_per_subaccount(
        &self,
        created_on_or_after_height: &str,
        options: &QueryOptions,
    ) -> StoreResult<HashMap<Uuid, PnlTick>> {
        verify_all_injectable_variables(&[Some(created_on_or_after_height)])?;

        let query = diesel::sql_query(
            r#"
            SELECT DISTINCT ON (subaccount_id) *
            FROM pnl_ticks
            WHERE block_height >= $1::bigint
            ORDER BY subaccount_id ASC, block_height DESC, created_at DESC
            "#,
        )
        .bind::<Text, _>(created_on_or_after_height);

        let ticks: Vec<PnlTick> = self.raw_query(query, options).await?;
        Ok(ticks
            .into_iter()
            .map(|tick| (tick.subaccount_id, tick))
            .collect())
    }

    /// The latest tick of each subaccount within the four hours up to and
    /// including `before_or_at`.
    pub async fn latest_pnl_ticks(
        &self,
        subaccount_ids: &[Uuid],
        before_or_at: NaiveDateTime,
        options: &QueryOptions,
    ) -> StoreResult<Vec<PnlTick>> {
        if subaccount_ids.is_empty() {
            return Ok(vec![]);
        }

        let query = diesel::sql_query(
            r#"
            SELECT DISTINCT ON (subaccount_id) *
            FROM pnl_ticks
            WHERE subaccount_id = ANY($1)
              AND block_time <= $2
              AND block_time >= $3
            ORDER BY subaccount_id, block_time DESC
            "#,
        )
        .bind::<Array<diesel::sql_types::Uuid>, _>(subaccount_ids.to_vec())
        .bind::<Timestamp, _>(before_or_at)
        .bind::<Timestamp, _>(before_or_at - Duration::hours(LATEST_TICK_LOOKBACK_HOURS));

        self.raw_query(query, options).await
    }

    /// The first tick of each hour or day (depending on `view`) since
    /// `earliest`, from the materialized views. Refresh the view first for
    /// up-to-date results. With a `time_window`, ticks must also be younger
    /// than the window.
    pub async fn pnl_ticks_at_interval(
        &self,
        view: MaterializedView,
        time_window: Option<std::time::Duration>,
        subaccount_ids: &[Uuid],
        earliest: NaiveDateTime,
        options: &QueryOptions,
    ) -> StoreResult<Vec<PnlTick>> {
        if subaccount_ids.is_empty() {
            return Ok(vec![]);
        }

        // A window too large to subtract from now doesn't bound anything.
        let window_start = time_window
            .and_then(|window| Duration::from_std(window).ok())
            .and_then(|window| Utc::now().naive_utc().checked_sub_signed(window));

        let query = diesel::sql_query(format!(
            "SELECT * FROM {view} \
             WHERE subaccount_id = ANY($1) AND block_time >= $2 \
               AND ($3::timestamp IS NULL OR block_time > $3) \
             ORDER BY subaccount_id, block_time"
        ))
        .bind::<Array<diesel::sql_types::Uuid>, _>(subaccount_ids.to_vec())
        .bind::<Timestamp, _>(earliest)
        .bind::<Nullable<Timestamp>, _>(window_start);

        self.raw_query(query, options).await
    }
}

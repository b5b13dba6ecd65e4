mod common;

use std::time::Duration;

use chrono::NaiveDateTime;
use indexer_common_types::inputs::{PnlTicksColumn, PnlTicksQueryConfig};
use indexer_common_types::{Ordering, QueryableField};
use indexer_store::models::NewPnlTick;
use indexer_store::{MaterializedView, QueryOptions, SqlOptions, StoreError};
use uuid::Uuid;

use crate::common::{at, decimal, EmptyStoreForTesting};

fn tick(subaccount_id: Uuid, block_height: i64, block_time: NaiveDateTime) -> NewPnlTick {
    NewPnlTick {
        subaccount_id,
        equity: decimal("1000"),
        total_pnl: decimal(&block_height.to_string()),
        net_transfers: decimal("0"),
        created_at: block_time,
        block_height,
        block_time,
    }
}

/// Five ticks: three for `alice` and two for `bob`, one per hour.
async fn seed(store: &EmptyStoreForTesting) -> (Uuid, Uuid) {
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let ticks = vec![
        tick(alice, 10, at(1, 0)),
        tick(alice, 20, at(1, 1)),
        tick(alice, 30, at(1, 2)),
        tick(bob, 10, at(1, 0)),
        tick(bob, 20, at(1, 1)),
    ];
    assert_eq!(store.create_pnl_ticks(&ticks, None).await.unwrap(), 5);
    (alice, bob)
}

#[tokio::test]
async fn single_tick_roundtrip() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let new_tick = tick(Uuid::new_v4(), 1, at(1, 0));

    let created = store.create_pnl_tick(&new_tick, None).await.unwrap();
    assert_eq!(created.id, new_tick.id());

    let read = store
        .pnl_tick_by_id(created.id, &QueryOptions::read_replica())
        .await
        .unwrap();
    assert_eq!(read, Some(created));

    // Same subaccount and time, same id.
    let err = store.create_pnl_tick(&new_tick, None).await.unwrap_err();
    assert!(err.is_unique_violation());
}

#[tokio::test]
async fn pages_report_the_total() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    seed(&store).await;

    let filter = PnlTicksQueryConfig {
        limit: Some(2),
        page: Some(2),
        ..Default::default()
    };
    let options = QueryOptions::read_replica()
        .order_by([(PnlTicksColumn::BlockHeight, Ordering::Asc)]);
    let page = store.pnl_ticks(&filter, &[], &options).await.unwrap();

    assert_eq!(page.total, Some(5));
    assert_eq!(page.limit, Some(2));
    assert_eq!(page.offset, Some(2));
    assert_eq!(page.results.len(), 2);
    assert!(page.results.iter().all(|tick| tick.block_height >= 10));

    let last = PnlTicksQueryConfig {
        page: Some(3),
        ..filter.clone()
    };
    let page = store.pnl_ticks(&last, &[], &options).await.unwrap();
    assert_eq!(page.total, Some(5));
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].block_height, 30);

    // Pages below one are the first page.
    let zeroth = PnlTicksQueryConfig {
        page: Some(0),
        ..filter
    };
    let page = store.pnl_ticks(&zeroth, &[], &options).await.unwrap();
    assert_eq!(page.offset, Some(0));
    assert_eq!(page.results.len(), 2);
}

#[tokio::test]
async fn default_order_and_limit() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let (alice, _) = seed(&store).await;

    let filter = PnlTicksQueryConfig {
        subaccount_id: Some(vec![alice]),
        ..Default::default()
    };
    let ticks = store
        .pnl_ticks(&filter, &[], &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(ticks.total, None);
    let heights: Vec<_> = ticks.results.iter().map(|t| t.block_height).collect();
    assert_eq!(heights, vec![30, 20, 10]);

    let capped = PnlTicksQueryConfig {
        limit: Some(1),
        ..filter
    };
    let ticks = store
        .pnl_ticks(&capped, &[], &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(ticks.results.len(), 1);
    assert_eq!(ticks.results[0].block_height, 30);
}

#[tokio::test]
async fn required_fields_are_checked_before_querying() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let err = store
        .pnl_ticks(
            &PnlTicksQueryConfig::default(),
            &[QueryableField::SubaccountId],
            &QueryOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::RequiredFieldMissing(QueryableField::SubaccountId)
    ));
}

#[tokio::test]
async fn latest_block_time_and_count() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let empty = store
        .latest_processed_block_time_and_count(&QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(empty.max_block_time, None);
    assert_eq!(empty.count, 0);

    seed(&store).await;
    let latest = store
        .latest_processed_block_time_and_count(&QueryOptions::read_replica())
        .await
        .unwrap();
    assert_eq!(latest.max_block_time, Some(at(1, 2)));
    assert_eq!(latest.count, 1);
}

#[tokio::test]
async fn most_recent_tick_per_subaccount() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let (alice, bob) = seed(&store).await;

    let ticks = store
        .most_recent_pnl_tick_per_subaccount("15", &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(ticks.len(), 2);
    assert_eq!(ticks[&alice].block_height, 30);
    assert_eq!(ticks[&bob].block_height, 20);

    let err = store
        .most_recent_pnl_tick_per_subaccount("0; DROP TABLE pnl_ticks", &QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InjectionRejected(_)));
}

#[tokio::test]
async fn latest_ticks_look_back_four_hours() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let (alice, bob) = seed(&store).await;

    let ticks = store
        .latest_pnl_ticks(&[alice, bob], at(1, 1), &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(ticks.len(), 2);
    assert!(ticks.iter().all(|tick| tick.block_time == at(1, 1)));

    // Nothing within the window.
    let ticks = store
        .latest_pnl_ticks(&[alice], at(1, 7), &QueryOptions::default())
        .await
        .unwrap();
    assert!(ticks.is_empty());

    let ticks = store
        .latest_pnl_ticks(&[], at(1, 1), &QueryOptions::default())
        .await
        .unwrap();
    assert!(ticks.is_empty());
}

#[tokio::test]
async fn interval_ticks_come_from_refreshed_views() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let alice = Uuid::new_v4();
    let half_past = at(1, 0) + chrono::Duration::minutes(30);
    store
        .create_pnl_ticks(
            &[
                tick(alice, 1, at(1, 0)),
                tick(alice, 2, half_past),
                tick(alice, 3, at(1, 1)),
                tick(alice, 4, at(2, 0)),
            ],
            None,
        )
        .await
        .unwrap();

    // Stale until refreshed.
    let ticks = store
        .pnl_ticks_at_interval(
            MaterializedView::PnlTicksHourly,
            None,
            &[alice],
            at(1, 0),
            &QueryOptions::default(),
        )
        .await
        .unwrap();
    assert!(ticks.is_empty());

    store
        .refresh_materialized_view(MaterializedView::PnlTicksHourly, false, None)
        .await
        .unwrap();
    store
        .refresh_materialized_view(MaterializedView::PnlTicksDaily, true, None)
        .await
        .unwrap();

    let hourly = store
        .pnl_ticks_at_interval(
            MaterializedView::PnlTicksHourly,
            None,
            &[alice],
            at(1, 0),
            &QueryOptions::default(),
        )
        .await
        .unwrap();
    let heights: Vec<_> = hourly.iter().map(|t| t.block_height).collect();
    assert_eq!(heights, vec![1, 3, 4]);

    let daily = store
        .pnl_ticks_at_interval(
            MaterializedView::PnlTicksDaily,
            None,
            &[alice],
            at(1, 12),
            &QueryOptions::default(),
        )
        .await
        .unwrap();
    let heights: Vec<_> = daily.iter().map(|t| t.block_height).collect();
    assert_eq!(heights, vec![4]);

    // The ticks are from 2024, far outside a one-hour window.
    let recent = store
        .pnl_ticks_at_interval(
            MaterializedView::PnlTicksHourly,
            Some(Duration::from_secs(60 * 60)),
            &[alice],
            at(1, 0),
            &QueryOptions::default(),
        )
        .await
        .unwrap();
    assert!(recent.is_empty());

    let unbounded = store
        .pnl_ticks_at_interval(
            MaterializedView::PnlTicksHourly,
            Some(Duration::MAX),
            &[alice],
            at(1, 0),
            &QueryOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(unbounded, hourly);
}

#[tokio::test]
async fn statement_timeout_cancels_slow_queries() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let options = QueryOptions::<()>::default().sql_options(SqlOptions {
        statement_timeout: Some(Duration::from_millis(50)),
    });
    let err = store
        .raw_execute(diesel::sql_query("SELECT pg_sleep(2)"), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));

    // Pooled connections don't keep the timeout around.
    store
        .raw_execute(
            diesel::sql_query("SELECT pg_sleep(0.2)"),
            &QueryOptions::<()>::default(),
        )
        .await
        .unwrap();
}

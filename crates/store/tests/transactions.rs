mod common;

use diesel::sql_types::Text;
use diesel::QueryableByName;
use indexer_store::models::{Market, MarketUpdate};
use indexer_store::{IsolationLevel, QueryOptions, StoreError};

use crate::common::{decimal, EmptyStoreForTesting};

fn btc_usd() -> Market {
    Market {
        id: 1,
        pair: "BTC-USD".to_owned(),
        exponent: -5,
        min_price_change_ppm: 50,
        oracle_price: Some(decimal("42000.5")),
    }
}

#[derive(QueryableByName)]
struct TransactionIsolation {
    #[diesel(sql_type = Text)]
    transaction_isolation: String,
}

#[tokio::test]
async fn rolled_back_writes_disappear() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let tx = store.start_transaction().await.unwrap();
    store.create_market(&btc_usd(), Some(tx)).await.unwrap();
    let update = MarketUpdate {
        pair: Some("ETH-USD".to_owned()),
        ..Default::default()
    };
    store.update_market(1, &update, Some(tx)).await.unwrap();

    // Visible inside the transaction only.
    let inside = store
        .market_by_id(1, &QueryOptions::in_transaction(Some(tx)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(inside.pair, "ETH-USD");
    assert!(store
        .market_by_id(1, &QueryOptions::default())
        .await
        .unwrap()
        .is_none());

    store.rollback_transaction(tx).await.unwrap();
    assert!(store
        .market_by_id(1, &QueryOptions::default())
        .await
        .unwrap()
        .is_none());
    assert_eq!(store.open_transactions(), 0);
}

#[tokio::test]
async fn committed_writes_persist() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let tx = store.start_transaction().await.unwrap();
    store.create_market(&btc_usd(), Some(tx)).await.unwrap();
    store.commit_transaction(tx).await.unwrap();

    let market = store
        .market_by_id(1, &QueryOptions::read_replica())
        .await
        .unwrap();
    assert_eq!(market, Some(btc_usd()));
}

#[tokio::test]
async fn finished_transactions_are_unknown() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let tx = store.start_transaction().await.unwrap();
    store.commit_transaction(tx).await.unwrap();

    let err = store.commit_transaction(tx).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::UnknownTransaction {
            operation: Some("commit"),
            ..
        }
    ));
    let err = store.rollback_transaction(tx).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("no transaction to rollback for handle {tx}")
    );

    let err = store
        .market_by_id(1, &QueryOptions::in_transaction(Some(tx)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::UnknownTransaction {
            operation: None,
            ..
        }
    ));
    assert_eq!(err.to_string(), format!("no transaction found for handle {tx}"));
}

#[tokio::test]
async fn handles_are_never_reused() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let first = store.start_transaction().await.unwrap();
    store.rollback_transaction(first).await.unwrap();
    let second = store.start_transaction().await.unwrap();
    let third = store.start_transaction().await.unwrap();

    assert!(first < second && second < third);
    assert_eq!(store.open_transactions(), 2);
}

#[tokio::test]
async fn isolation_level_applies_to_the_transaction() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let tx = store.start_transaction().await.unwrap();
    store
        .set_isolation_level(tx, IsolationLevel::Serializable)
        .await
        .unwrap();

    let rows: Vec<TransactionIsolation> = store
        .raw_query(
            diesel::sql_query("SHOW transaction_isolation"),
            &QueryOptions::<()>::in_transaction(Some(tx)),
        )
        .await
        .unwrap();
    assert_eq!(rows[0].transaction_isolation, "serializable");

    store.commit_transaction(tx).await.unwrap();
}

#[tokio::test]
async fn transaction_wins_over_read_replica() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let tx = store.start_transaction().await.unwrap();
    store.create_market(&btc_usd(), Some(tx)).await.unwrap();

    let options = QueryOptions {
        tx_id: Some(tx),
        read_replica: true,
        ..Default::default()
    };
    let scope = store.query_scope(&options).await.unwrap();
    assert!(scope.is_transaction());
    drop(scope);

    // Only the transaction's connection can see the uncommitted market.
    assert!(store.market_by_id(1, &options).await.unwrap().is_some());
    store.rollback_transaction(tx).await.unwrap();
}

#[tokio::test]
async fn read_replica_without_replicas_is_a_configuration_error() {
    let store = EmptyStoreForTesting::with_config(|config| config.read_replica_urls.clear())
        .await
        .unwrap();
    assert_eq!(store.replica_count(), 0);

    let err = store
        .market_by_id(1, &QueryOptions::read_replica())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Configuration(_)));

    // The check happens even when a transaction would supply the connection.
    let tx = store.start_transaction().await.unwrap();
    let options = QueryOptions {
        tx_id: Some(tx),
        read_replica: true,
        ..Default::default()
    };
    let err = store.market_by_id(1, &options).await.unwrap_err();
    assert!(matches!(err, StoreError::Configuration(_)));
    store.rollback_transaction(tx).await.unwrap();
}

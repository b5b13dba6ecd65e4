mod common;

use indexer_common_types::inputs::{
    PermissionApprovalQueryConfig, PnlQueryConfig, VaultQueryConfig,
};
use indexer_common_types::VaultStatus;
use indexer_store::models::{Market, MarketPriceUpdate, PermissionApproval, Pnl, Vault};
use indexer_store::QueryOptions;
use uuid::Uuid;

use crate::common::{at, decimal, EmptyStoreForTesting};

fn pnl(subaccount_id: Uuid, hour: u32, equity: &str) -> Pnl {
    Pnl {
        subaccount_id,
        created_at: at(1, hour),
        created_at_height: i64::from(hour) * 100,
        equity: decimal(equity),
        total_pnl: decimal("-12.75"),
        net_transfers: decimal("500"),
    }
}

#[tokio::test]
async fn pnl_upsert_is_keyed_by_subaccount_and_time() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let subaccount = Uuid::new_v4();

    let records = vec![pnl(subaccount, 0, "1000"), pnl(subaccount, 1, "1100")];
    assert_eq!(store.bulk_upsert_pnl(&records, None).await.unwrap(), 2);

    // Replaying the block overwrites instead of duplicating.
    let replayed = vec![pnl(subaccount, 1, "1250.5"), pnl(subaccount, 2, "900")];
    assert_eq!(store.bulk_upsert_pnl(&replayed, None).await.unwrap(), 2);

    let filter = PnlQueryConfig {
        subaccount_id: Some(vec![subaccount]),
        ..Default::default()
    };
    let page = store
        .pnl_records(&filter, &[], &QueryOptions::read_replica())
        .await
        .unwrap();
    let equities: Vec<_> = page.results.iter().map(|p| p.equity.clone()).collect();
    assert_eq!(
        equities,
        vec![decimal("900"), decimal("1250.5"), decimal("1000")]
    );

    let single = store
        .pnl_by_id(subaccount, at(1, 1), &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(single, Some(pnl(subaccount, 1, "1250.5")));
}

#[tokio::test]
async fn empty_bulk_writes_are_no_ops() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    assert_eq!(store.bulk_upsert_pnl(&[], None).await.unwrap(), 0);
    assert_eq!(store.bulk_upsert_vaults(&[], None).await.unwrap(), 0);
    assert_eq!(store.update_oracle_prices(&[], None).await.unwrap(), 0);
    assert_eq!(store.execute_bulk(None, None).await.unwrap(), 0);
}

#[tokio::test]
async fn oracle_prices_update_in_one_statement() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    for (id, pair) in [(0, "BTC-USD"), (1, "ETH-USD"), (2, "SOL-USD")] {
        let market = Market {
            id,
            pair: pair.to_owned(),
            exponent: -6,
            min_price_change_ppm: 1000,
            oracle_price: None,
        };
        store.create_market(&market, None).await.unwrap();
    }

    let updates = vec![
        MarketPriceUpdate {
            id: 0,
            oracle_price: decimal("64000.25"),
        },
        MarketPriceUpdate {
            id: 2,
            oracle_price: decimal("0.000001"),
        },
    ];
    assert_eq!(store.update_oracle_prices(&updates, None).await.unwrap(), 2);

    let prices: Vec<_> = store
        .markets(&Default::default(), &[], &QueryOptions::default())
        .await
        .unwrap()
        .into_iter()
        .map(|market| market.oracle_price)
        .collect();
    assert_eq!(
        prices,
        vec![Some(decimal("64000.25")), None, Some(decimal("0.000001"))]
    );
}

#[tokio::test]
async fn vaults_upsert_inside_a_transaction() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let vault = |address: &str, status| Vault {
        address: address.to_owned(),
        clob_pair_id: 7,
        status,
        created_at: at(1, 0),
        updated_at: at(1, 0),
    };

    let tx = store.start_transaction().await.unwrap();
    store
        .bulk_upsert_vaults(
            &[vault("dydx1a", VaultStatus::Quoting), vault("dydx1b", VaultStatus::StandBy)],
            Some(tx),
        )
        .await
        .unwrap();
    let updated = Vault {
        updated_at: at(2, 0),
        ..vault("dydx1a", VaultStatus::CloseOnly)
    };
    store
        .bulk_upsert_vaults(&[updated.clone()], Some(tx))
        .await
        .unwrap();
    store.commit_transaction(tx).await.unwrap();

    let filter = VaultQueryConfig {
        status: Some(vec![VaultStatus::CloseOnly]),
        ..Default::default()
    };
    let vaults = store
        .vaults(&filter, &[], &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(vaults, vec![updated]);
}

#[tokio::test]
async fn permission_approvals_keep_one_address_per_chain() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let approval = |chain_id: &str, address: &str, day| PermissionApproval {
        suborg_id: "suborg-1".to_owned(),
        chain_id: chain_id.to_owned(),
        approval_address: address.to_owned(),
        updated_at: at(day, 0),
    };

    store
        .bulk_upsert_permission_approvals(
            &[approval("arbitrum", "0xaaa", 1), approval("base", "0xbbb", 1)],
            None,
        )
        .await
        .unwrap();
    store
        .bulk_upsert_permission_approvals(&[approval("base", "0xccc", 2)], None)
        .await
        .unwrap();
    store
        .upsert_permission_approval(&approval("arbitrum", "0xddd", 3), None)
        .await
        .unwrap();

    let filter = PermissionApprovalQueryConfig {
        suborg_id: Some("suborg-1".to_owned()),
        ..Default::default()
    };
    let approvals = store
        .permission_approvals(&filter, &[], &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(
        approvals,
        vec![approval("arbitrum", "0xddd", 3), approval("base", "0xccc", 2)]
    );

    let base = store
        .permission_approval("suborg-1", "base", &QueryOptions::read_replica())
        .await
        .unwrap();
    assert_eq!(base, Some(approval("base", "0xccc", 2)));
}

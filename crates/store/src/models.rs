//! Row types of the indexer tables. Structs that go through the bulk
//! synthesizer also derive [`Serialize`]; their field names are the column
//! names.

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::sql_types::{BigInt, Nullable, Timestamp};
use diesel::{AsChangeset, Insertable, Queryable, QueryableByName, Selectable};
use indexer_common_types::{TxHash, VaultStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::*;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = assets)]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub atomic_resolution: i32,
    pub has_market: bool,
    pub market_id: Option<i32>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = assets)]
pub struct AssetUpdate {
    pub symbol: Option<String>,
    pub atomic_resolution: Option<i32>,
    pub has_market: Option<bool>,
    /// `Some(None)` clears the market.
    pub market_id: Option<Option<i32>>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = markets)]
pub struct Market {
    pub id: i32,
    pub pair: String,
    pub exponent: i32,
    pub min_price_change_ppm: i32,
    pub oracle_price: Option<BigDecimal>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = markets)]
pub struct MarketUpdate {
    pub pair: Option<String>,
    pub exponent: Option<i32>,
    pub min_price_change_ppm: Option<i32>,
    pub oracle_price: Option<Option<BigDecimal>>,
}

/// One row of a bulk oracle price update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketPriceUpdate {
    pub id: i32,
    pub oracle_price: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = vaults)]
pub struct Vault {
    pub address: String,
    pub clob_pair_id: i64,
    pub status: VaultStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = pnl)]
pub struct Pnl {
    pub subaccount_id: Uuid,
    pub created_at: NaiveDateTime,
    pub created_at_height: i64,
    pub equity: BigDecimal,
    pub total_pnl: BigDecimal,
    pub net_transfers: BigDecimal,
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Queryable,
    QueryableByName,
    Selectable,
    Insertable,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = pnl_ticks)]
pub struct PnlTick {
    pub id: Uuid,
    pub subaccount_id: Uuid,
    pub equity: BigDecimal,
    pub total_pnl: BigDecimal,
    pub net_transfers: BigDecimal,
    pub created_at: NaiveDateTime,
    pub block_height: i64,
    pub block_time: NaiveDateTime,
}

/// A PnL tick before its id is derived.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPnlTick {
    pub subaccount_id: Uuid,
    pub equity: BigDecimal,
    pub total_pnl: BigDecimal,
    pub net_transfers: BigDecimal,
    pub created_at: NaiveDateTime,
    pub block_height: i64,
    pub block_time: NaiveDateTime,
}

impl NewPnlTick {
    /// Tick ids are a UUIDv5 of the subaccount and creation time, so
    /// re-indexing the same block produces the same ids.
    pub fn id(&self) -> Uuid {
        let name = format!("{}-{}", self.subaccount_id, self.created_at);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }

    pub fn into_pnl_tick(self) -> PnlTick {
        PnlTick {
            id: self.id(),
            subaccount_id: self.subaccount_id,
            equity: self.equity,
            total_pnl: self.total_pnl,
            net_transfers: self.net_transfers,
            created_at: self.created_at,
            block_height: self.block_height,
            block_time: self.block_time,
        }
    }
}

/// Most recent `block_time` in `pnl_ticks` and how many ticks share it.
#[derive(Debug, Clone, PartialEq, QueryableByName)]
pub struct LatestPnlTickBlockTime {
    #[diesel(sql_type = Nullable<Timestamp>)]
    pub max_block_time: Option<NaiveDateTime>,
    #[diesel(sql_type = BigInt)]
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = bridge_information)]
pub struct BridgeInformation {
    pub id: String,
    pub from_address: String,
    pub chain_id: String,
    pub amount: BigDecimal,
    pub transaction_hash: Option<TxHash>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBridgeInformation {
    /// Generated when absent.
    pub id: Option<String>,
    pub from_address: String,
    pub chain_id: String,
    pub amount: BigDecimal,
    pub transaction_hash: Option<TxHash>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = tokens)]
pub struct Token {
    pub token: String,
    pub address: String,
    pub language: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = subaccount_usernames)]
pub struct SubaccountUsername {
    pub username: String,
    pub subaccount_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = permission_approvals)]
pub struct PermissionApproval {
    pub suborg_id: String,
    pub chain_id: String,
    pub approval_address: String,
    pub updated_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;

    use super::*;

    fn tick(subaccount_id: Uuid, created_at: NaiveDateTime) -> NewPnlTick {
        NewPnlTick {
            subaccount_id,
            equity: BigDecimal::from_str("100").unwrap(),
            total_pnl: BigDecimal::from_str("1.5").unwrap(),
            net_transfers: BigDecimal::from(0),
            created_at,
            block_height: 10,
            block_time: created_at,
        }
    }

    #[test]
    fn pnl_tick_ids_are_deterministic() {
        let subaccount = Uuid::new_v4();
        let at = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let later = at + chrono::Duration::hours(1);

        assert_eq!(tick(subaccount, at).id(), tick(subaccount, at).id());
        assert_ne!(tick(subaccount, at).id(), tick(subaccount, later).id());
        assert_ne!(tick(subaccount, at).id(), tick(Uuid::new_v4(), at).id());
        assert_eq!(tick(subaccount, at).into_pnl_tick().id, tick(subaccount, at).id());
    }
}

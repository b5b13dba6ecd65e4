//! Filters ("query configs") and column enums accepted by the table modules.
//!
//! Every filter serializes its fields under the same names as
//! [`QueryableField`](crate::QueryableField), so required-field checks can
//! be performed generically. `None` means "don't filter on this field".

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{TxHash, VaultStatus};

macro_rules! columns {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Copy,
            Clone,
            PartialEq,
            Eq,
            Hash,
            Serialize,
            Deserialize,
            strum::Display,
            strum::EnumString,
            strum::IntoStaticStr,
            strum::EnumIter,
        )]
        #[serde(rename_all = "snake_case")]
        #[strum(serialize_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }
    };
}

columns! {
    /// Columns of the `assets` table.
    AssetColumn { Id, Symbol, AtomicResolution, HasMarket, MarketId }
}

columns! {
    /// Columns of the `markets` table.
    MarketColumn { Id, Pair, Exponent, MinPriceChangePpm, OraclePrice }
}

columns! {
    /// Columns of the `vaults` table.
    VaultColumn { Address, ClobPairId, Status, CreatedAt, UpdatedAt }
}

columns! {
    /// Columns of the `pnl` table.
    PnlColumn { SubaccountId, CreatedAt, CreatedAtHeight, Equity, TotalPnl, NetTransfers }
}

columns! {
    /// Columns of the `pnl_ticks` table.
    PnlTicksColumn {
        Id,
        SubaccountId,
        Equity,
        TotalPnl,
        NetTransfers,
        CreatedAt,
        BlockHeight,
        BlockTime,
    }
}

columns! {
    /// Columns of the `bridge_information` table.
    BridgeInformationColumn { Id, FromAddress, ChainId, Amount, TransactionHash, CreatedAt }
}

columns! {
    /// Columns of the `tokens` table.
    TokenColumn { Token, Address, Language, UpdatedAt }
}

columns! {
    /// Columns of the `subaccount_usernames` table.
    SubaccountUsernameColumn { Username, SubaccountId }
}

columns! {
    /// Columns of the `permission_approvals` table.
    PermissionApprovalColumn { SuborgId, ChainId, ApprovalAddress, UpdatedAt }
}

/// Page-based access to a result set. When only `limit` is set it acts as a
/// plain cap; together with `page` it's the page size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

/// A filter for assets.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetQueryConfig {
    pub id: Option<Vec<String>>,
    pub symbol: Option<String>,
    pub atomic_resolution: Option<i32>,
    pub has_market: Option<bool>,
    pub market_id: Option<i32>,
    /// Upper limit on the number of returned rows.
    pub limit: Option<u32>,
}

/// A filter for perpetual markets.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketQueryConfig {
    pub id: Option<Vec<i32>>,
    pub pair: Option<String>,
    pub limit: Option<u32>,
}

/// A filter for vaults.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultQueryConfig {
    pub addresses: Option<Vec<String>>,
    pub clob_pair_id: Option<Vec<i64>>,
    pub status: Option<Vec<VaultStatus>>,
    pub limit: Option<u32>,
}

/// A filter for PnL snapshots.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlQueryConfig {
    pub subaccount_id: Option<Vec<Uuid>>,
    pub created_at_height: Option<i64>,
    pub created_before_or_at: Option<NaiveDateTime>,
    pub created_on_or_after: Option<NaiveDateTime>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

/// A filter for PnL ticks.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlTicksQueryConfig {
    pub id: Option<Vec<Uuid>>,
    pub subaccount_id: Option<Vec<Uuid>>,
    pub created_at: Option<NaiveDateTime>,
    pub block_height: Option<i64>,
    pub block_time: Option<NaiveDateTime>,
    pub created_before_or_at: Option<NaiveDateTime>,
    pub created_before_or_at_block_height: Option<i64>,
    pub created_on_or_after: Option<NaiveDateTime>,
    pub created_on_or_after_block_height: Option<i64>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

/// A filter for bridge records.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeInformationQueryConfig {
    /// Matches any of the given sender addresses. An empty list matches
    /// nothing.
    pub from_addresses: Option<Vec<String>>,
    pub chain_id: Option<String>,
    pub transaction_hash: Option<TxHash>,
    /// `true` keeps only records with a transaction hash, `false` only
    /// records without one.
    pub has_transaction_hash: Option<bool>,
}

/// A filter for push-notification tokens.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenQueryConfig {
    pub address: Option<String>,
    pub token: Option<String>,
    pub updated_before_or_at: Option<NaiveDateTime>,
    pub limit: Option<u32>,
}

/// A filter for subaccount usernames.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubaccountUsernamesQueryConfig {
    pub username: Option<Vec<String>>,
    pub subaccount_id: Option<Vec<Uuid>>,
    pub limit: Option<u32>,
}

/// A filter for permission approvals.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionApprovalQueryConfig {
    pub suborg_id: Option<String>,
    pub chain_id: Option<String>,
    pub limit: Option<u32>,
}

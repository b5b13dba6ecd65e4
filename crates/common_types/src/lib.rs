//! Value types shared by the indexer's data-access layer and its callers.
//!
//! Nothing in here performs I/O. Filters, column enums and field names live in
//! [`inputs`]; byte and enum column types are defined at the crate root.

mod hex_string;
pub mod inputs;
mod vault_status;

pub use hex_string::HexString;
use serde::{Deserialize, Serialize};
pub use vault_status::VaultStatus;

/// Transaction hashes have chain-dependent lengths, so they're stored as
/// variable-length byte sequences.
pub type TxHash = HexString<Vec<u8>>;

/// Sort direction of an `ORDER BY` term.
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
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Ordering {
    Asc,
    Desc,
}

/// Names of the fields that filters accept. The string form of each variant
/// is exactly the serialized key of the corresponding field in the
/// [`inputs`] filter structs, which is what required-field checks compare
/// against.
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
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum QueryableField {
    Limit,
    Page,
    Id,
    Address,
    Addresses,
    Symbol,
    AtomicResolution,
    HasMarket,
    MarketId,
    Pair,
    ClobPairId,
    Status,
    SubaccountId,
    CreatedAt,
    CreatedAtHeight,
    CreatedBeforeOrAt,
    CreatedBeforeOrAtHeight,
    CreatedOnOrAfter,
    CreatedOnOrAfterHeight,
    BlockHeight,
    BlockTime,
    CreatedBeforeOrAtBlockHeight,
    CreatedOnOrAfterBlockHeight,
    FromAddresses,
    ChainId,
    TransactionHash,
    HasTransactionHash,
    Token,
    UpdatedBeforeOrAt,
    Username,
    SuborgId,
}

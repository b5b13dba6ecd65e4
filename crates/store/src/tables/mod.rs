//! One `impl Store` block per table. Reads take a filter, the fields the
//! caller requires it to set, and [`QueryOptions`](crate::QueryOptions) with
//! the table's column enum; writes take an optional transaction handle and
//! always run on the primary.

mod assets;
mod bridge_information;
mod markets;
mod permission_approvals;
mod pnl;
mod pnl_ticks;
mod subaccount_usernames;
mod tokens;
mod vaults;

use tracing::info;

use super::Store;
use crate::error::StoreResult;
use crate::options::QueryOptions;
use crate::transaction::TxId;

/// Materialized views shipped with the migrations. Only these names are ever
/// interpolated into SQL.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum MaterializedView {
    /// First PnL tick of every subaccount per hour.
    PnlTicksHourly,
    /// First PnL tick of every subaccount per day.
    PnlTicksDaily,
}

impl MaterializedView {
    fn refresh_statement(self, concurrently: bool) -> String {
        let concurrently = if concurrently { "CONCURRENTLY " } else { "" };
        format!("REFRESH MATERIALIZED VIEW {concurrently}{self}")
    }
}

impl Store {
    /// `concurrently` keeps the view readable during the refresh; it relies
    /// on the view's unique index.
    pub async fn refresh_materialized_view(
        &self,
        view: MaterializedView,
        concurrently: bool,
        tx_id: Option<TxId>,
    ) -> StoreResult<()> {
        info!(%view, concurrently, "Refreshing materialized view");
        self.raw_execute(
            diesel::sql_query(view.refresh_statement(concurrently)),
            &QueryOptions::<()>::in_transaction(tx_id),
        )
        .await?;
        Ok(())
    }
}

use std::time::Duration;

use indexer_common_types::Ordering;
use rand::Rng;

use crate::error::{StoreError, StoreResult};
use crate::transaction::TxId;

/// Per-call options of every table operation.
///
/// `C` is the column enum of the table being queried; it's only used by
/// `order_by`. The default targets the primary outside any transaction,
/// which is what writes use. Reads usually start from
/// [`QueryOptions::read_replica`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions<C = ()> {
    pub tx_id: Option<TxId>,
    pub read_replica: bool,
    /// Replaces the table's default ordering.
    pub order_by: Option<Vec<(C, Ordering)>>,
    pub sql_options: Option<SqlOptions>,
}

impl<C> Default for QueryOptions<C> {
    fn default() -> Self {
        Self {
            tx_id: None,
            read_replica: false,
            order_by: None,
            sql_options: None,
        }
    }
}

impl<C> QueryOptions<C> {
    pub fn read_replica() -> Self {
        Self {
            read_replica: true,
            ..Default::default()
        }
    }

    /// Primary, inside `tx_id` if there is one.
    pub fn in_transaction(tx_id: Option<TxId>) -> Self {
        Self {
            tx_id,
            ..Default::default()
        }
    }

    pub fn order_by(mut self, order_by: impl IntoIterator<Item = (C, Ordering)>) -> Self {
        self.order_by = Some(order_by.into_iter().collect());
        self
    }

    pub fn sql_options(mut self, sql_options: SqlOptions) -> Self {
        self.sql_options = Some(sql_options);
        self
    }
}

/// Session settings applied around a raw statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlOptions {
    /// Postgres cancels the statement once it runs longer than this.
    pub statement_timeout: Option<Duration>,
}

/// Picks one of `replicas` uniformly at random. Without replicas, read
/// replica queries are a configuration error.
pub fn select_replica<'a, T>(replicas: &'a [T], rng: &mut impl Rng) -> StoreResult<&'a T> {
    if replicas.is_empty() {
        return Err(StoreError::Configuration(
            "service not configured to use a read replica".to_owned(),
        ));
    }
    Ok(&replicas[rng.gen_range(0..replicas.len())])
}

#[cfg(test)]
mod tests {
    use indexer_common_types::inputs::AssetColumn;
    use quickcheck_macros::quickcheck;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn writes_default_to_the_primary() {
        let options = QueryOptions::<()>::default();
        assert!(!options.read_replica);
        assert!(options.tx_id.is_none());
        assert!(QueryOptions::<()>::read_replica().read_replica);
    }

    #[test]
    fn order_by_builder() {
        let options = QueryOptions::read_replica()
            .order_by([(AssetColumn::Symbol, Ordering::Desc), (AssetColumn::Id, Ordering::Asc)]);
        assert_eq!(
            options.order_by.as_deref(),
            Some(&[(AssetColumn::Symbol, Ordering::Desc), (AssetColumn::Id, Ordering::Asc)][..])
        );
    }

    #[quickcheck]
    fn no_replicas_is_a_configuration_error(seed: u64) -> bool {
        let mut rng = SmallRng::seed_from_u64(seed);
        matches!(
            select_replica::<()>(&[], &mut rng),
            Err(StoreError::Configuration(_))
        )
    }

    #[quickcheck]
    fn single_replica_is_always_chosen(seed: u64) -> bool {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..16).all(|_| *select_replica(&["only"], &mut rng).unwrap() == "only")
    }

    #[test]
    fn replicas_are_chosen_uniformly() {
        const REPLICAS: usize = 4;
        const DRAWS: usize = 40_000;

        let replicas: Vec<usize> = (0..REPLICAS).collect();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut counts = [0usize; REPLICAS];
        for _ in 0..DRAWS {
            counts[*select_replica(&replicas, &mut rng).unwrap()] += 1;
        }

        let expected = DRAWS / REPLICAS;
        for count in counts {
            // Within 5% of a perfectly even split.
            assert!(count.abs_diff(expected) < expected / 20, "{counts:?}");
        }
    }
}

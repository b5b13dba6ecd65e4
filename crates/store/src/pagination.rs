//! Ordering and paging shared by every list query.
//!
//! An explicit `order_by` replaces the table's default ordering. A `limit`
//! without a `page` is a plain cap; with a `page` it's a page size, and the
//! total number of matching rows is counted on an unordered copy of the
//! query before the page is loaded.

use diesel::dsl::{self, CountStar};
use diesel::query_dsl::methods::{LimitDsl, OffsetDsl, SelectDsl};
use diesel_async::methods::LoadQuery;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use indexer_common_types::Ordering;
use serde::Serialize;

use crate::error::StoreResult;

/// Applies one `ORDER BY` term to a boxed diesel query, after the ones
/// already present.
macro_rules! order_by_column {
    ($query:expr, $column:expr, $ordering:expr) => {
        match $ordering {
            ::indexer_common_types::Ordering::Asc => $query.then_order_by($column.asc()),
            ::indexer_common_types::Ordering::Desc => $query.then_order_by($column.desc()),
        }
    };
}

pub(crate) use order_by_column;

/// Queries that can be ordered by the columns of `C`.
pub trait OrderableQuery<C>: Sized {
    fn then_order(self, column: C, ordering: Ordering) -> Self;
}

/// Applies `order_by` term by term, or the table's `default` ordering when
/// no (or an empty) ordering was requested.
pub fn apply_ordering<Q, C>(
    query: Q,
    order_by: Option<&[(C, Ordering)]>,
    default: impl FnOnce(Q) -> Q,
) -> Q
where
    Q: OrderableQuery<C>,
    C: Copy,
{
    match order_by {
        Some(terms) if !terms.is_empty() => terms
            .iter()
            .fold(query, |query, &(column, ordering)| query.then_order(column, ordering)),
        _ => default(query),
    }
}

/// Which slice of the result set to load.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PageWindow {
    Unbounded,
    /// `LIMIT n`, without counting.
    Limit(i64),
    /// `OFFSET offset LIMIT limit`, with a count of all matches.
    Page { limit: i64, offset: i64 },
}

impl PageWindow {
    /// A `page` without a `limit` is ignored. Pages are 1-based and `0`
    /// counts as the first page. A zero `limit` selects no rows. Offsets
    /// beyond `i64::MAX` saturate, which selects no rows either.
    pub fn new(limit: Option<u32>, page: Option<u32>) -> Self {
        match (limit, page) {
            (None, _) => PageWindow::Unbounded,
            (Some(limit), None) => PageWindow::Limit(limit.into()),
            (Some(limit), Some(page)) => {
                let current_page = i64::from(page.max(1));
                let limit = i64::from(limit);
                PageWindow::Page {
                    limit,
                    offset: (current_page - 1).saturating_mul(limit),
                }
            }
        }
    }
}

/// Rows of one page plus, for page-based queries, where the page sits in
/// the full result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationFromDatabase<T> {
    pub results: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

impl<T> PaginationFromDatabase<T> {
    fn unpaged(results: Vec<T>) -> Self {
        Self {
            results,
            limit: None,
            offset: None,
            total: None,
        }
    }
}

/// Loads the window of a filtered query. `filtered` must build the query
/// with its filters but without ordering; it's called once more for the
/// count when the window is a page.
pub(crate) async fn paginate<'a, Q, T>(
    conn: &mut AsyncPgConnection,
    filtered: impl Fn() -> Q,
    order: impl FnOnce(Q) -> Q,
    window: PageWindow,
) -> StoreResult<PaginationFromDatabase<T>>
where
    Q: SelectDsl<CountStar>
        + LimitDsl<Output = Q>
        + OffsetDsl<Output = Q>
        + LoadQuery<'a, AsyncPgConnection, T>
        + 'a,
    dsl::Select<Q, CountStar>: LoadQuery<'a, AsyncPgConnection, i64> + 'a,
    T: Send,
{
    match window {
        PageWindow::Unbounded => {
            let results = order(filtered()).load::<T>(conn).await?;
            Ok(PaginationFromDatabase::unpaged(results))
        }
        PageWindow::Limit(limit) => {
            let query = LimitDsl::limit(order(filtered()), limit);
            let results = query.load::<T>(conn).await?;
            Ok(PaginationFromDatabase::unpaged(results))
        }
        PageWindow::Page { limit, offset } => {
            let total = SelectDsl::select(filtered(), dsl::count_star())
                .get_result::<i64>(conn)
                .await?;
            let query = LimitDsl::limit(OffsetDsl::offset(order(filtered()), offset), limit);
            let results = query.load::<T>(conn).await?;
            Ok(PaginationFromDatabase {
                results,
                limit: Some(limit),
                offset: Some(offset),
                total: Some(total),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct RecordedOrder(Vec<(&'static str, Ordering)>);

    impl OrderableQuery<&'static str> for RecordedOrder {
        fn then_order(mut self, column: &'static str, ordering: Ordering) -> Self {
            self.0.push((column, ordering));
            self
        }
    }

    fn by_symbol(query: RecordedOrder) -> RecordedOrder {
        query.then_order("symbol", Ordering::Asc)
    }

    #[test]
    fn explicit_order_replaces_default() {
        let order_by = [("id", Ordering::Desc), ("symbol", Ordering::Asc)];
        let query = apply_ordering(RecordedOrder::default(), Some(&order_by[..]), by_symbol);
        assert_eq!(query.0, order_by.to_vec());
    }

    #[test]
    fn default_order_when_nothing_requested() {
        let query = apply_ordering(RecordedOrder::default(), None, by_symbol);
        assert_eq!(query.0, vec![("symbol", Ordering::Asc)]);

        let query = apply_ordering(RecordedOrder::default(), Some(&[][..]), by_symbol);
        assert_eq!(query.0, vec![("symbol", Ordering::Asc)]);
    }

    #[test]
    fn windows() {
        assert_eq!(PageWindow::new(None, None), PageWindow::Unbounded);
        assert_eq!(PageWindow::new(None, Some(3)), PageWindow::Unbounded);
        assert_eq!(PageWindow::new(Some(5), None), PageWindow::Limit(5));
        assert_eq!(PageWindow::new(Some(0), None), PageWindow::Limit(0));
        assert_eq!(
            PageWindow::new(Some(5), Some(3)),
            PageWindow::Page {
                limit: 5,
                offset: 10
            }
        );
    }

    #[quickcheck]
    fn first_page_and_page_zero_coincide(limit: u32) -> bool {
        PageWindow::new(Some(limit), Some(0)) == PageWindow::new(Some(limit), Some(1))
    }

    #[quickcheck]
    fn page_sizes_match_the_remaining_rows(rows: u16, limit: u32, page: u32) -> bool {
        let rows = i64::from(rows);
        let PageWindow::Page { limit, offset } =
            PageWindow::new(Some(limit.into()), Some(page.into()))
        else {
            return false;
        };
        let current_page = i64::from(page.max(1));
        let loaded = (0..rows).skip(offset as usize).take(limit as usize).count() as i64;
        let skipped = (current_page - 1).saturating_mul(limit);
        offset >= 0 && loaded == limit.min(rows.saturating_sub(skipped).max(0))
    }

    #[test]
    fn huge_pages_saturate_the_offset() {
        assert_eq!(
            PageWindow::new(Some(u32::MAX), Some(u32::MAX)),
            PageWindow::Page {
                limit: i64::from(u32::MAX),
                offset: i64::MAX,
            }
        );
    }

    #[test]
    fn unpaged_results_serialize_without_metadata() {
        let page = PaginationFromDatabase::unpaged(vec![1, 2]);
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            serde_json::json!({ "results": [1, 2] })
        );
    }
}

//! Real-time arrival aggregation.
//!
//! Three aggregators sit on top of the upstream feeds:
//! - [`SubwayService`] fetches the GTFS-realtime feed groups, filters
//!   predictions by stop, and merges them across groups
//! - [`BusService`] discovers stops near a point and fans out per-stop
//!   SIRI stop-monitoring queries
//! - [`AlertService`] reads the single service alerts feed
//!
//! All of them are best-effort: one failing feed or stop is logged and
//! skipped, never turned into an error for the whole query.

mod alerts;
mod bus;
mod error;
mod feeds;
mod fetch;
mod siri;
mod subway;

use std::fmt::Display;

use tracing::warn;

pub use alerts::{AlertConfig, AlertService, ServiceAlert};
pub use bus::{BusArrival, BusConfig, BusService, BusStop};
pub use error::TransitError;
pub use feeds::FeedConfig;
pub use fetch::{Fetch, HttpConfig, HttpFetcher};
pub use siri::OneOrMany;
pub use subway::{Arrival, Direction, StationArrivals, SubwayConfig, SubwayService};

#[cfg(test)]
pub(crate) use fetch::fake::FakeFetcher;

/// Outcome of merging several per-source attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged<T> {
    /// Items from every source that succeeded, sorted.
    pub items: Vec<T>,
    /// Number of sources that failed and were skipped.
    pub failed: usize,
}

/// Merge per-source results: drop failures, concatenate successes, and sort.
///
/// The sort is stable, so items with equal keys keep source order. Each
/// skipped source is logged with its label.
pub fn merge_best_effort<T, K, L>(
    attempts: impl IntoIterator<Item = (L, Result<Vec<T>, TransitError>)>,
    sort_key: impl FnMut(&T) -> K,
) -> Merged<T>
where
    K: Ord,
    L: Display,
{
    let mut items = Vec::new();
    let mut failed = 0;

    for (source, attempt) in attempts {
        match attempt {
            Ok(mut found) => items.append(&mut found),
            Err(e) => {
                warn!(%source, error = %e, "skipping upstream source");
                failed += 1;
            }
        }
    }

    items.sort_by_key(sort_key);
    Merged { items, failed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_discards_failures_and_sorts() {
        let attempts = vec![
            ("ace", Ok(vec![5, 1])),
            (
                "bdfm",
                Err(TransitError::Timeout {
                    url: "http://feeds.test/bdfm".into(),
                }),
            ),
            ("g", Ok(vec![3])),
        ];

        let merged = merge_best_effort(attempts, |n: &i32| *n);

        assert_eq!(merged.items, vec![1, 3, 5]);
        assert_eq!(merged.failed, 1);
    }

    #[test]
    fn merge_all_failed_is_empty() {
        let attempts: Vec<(&str, Result<Vec<i32>, TransitError>)> =
            vec![("l", Err(TransitError::UnknownFeed("l".into())))];

        let merged = merge_best_effort(attempts, |n| *n);

        assert!(merged.items.is_empty());
        assert_eq!(merged.failed, 1);
    }

    #[test]
    fn merge_is_stable() {
        let attempts: Vec<(&str, Result<Vec<(i32, &str)>, TransitError>)> =
            vec![("first", Ok(vec![(1, "a")])), ("second", Ok(vec![(1, "b")]))];

        let merged = merge_best_effort(attempts, |(n, _)| *n);

        assert_eq!(merged.items, vec![(1, "a"), (1, "b")]);
    }
}

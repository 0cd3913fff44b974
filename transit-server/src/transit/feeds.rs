//! Rail feed routing table.
//!
//! Each feed group is one GTFS-realtime endpoint carrying a fixed set of
//! routes. The table is immutable once built and handed to the subway
//! aggregator at construction.

use std::collections::{BTreeMap, HashMap, HashSet};

/// Base URL shared by the NYC subway feeds.
const MTA_FEED_BASE_URL: &str = "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs";

/// NYC subway feed groups: (group name, URL suffix, routes carried).
const MTA_FEEDS: &[(&str, &str, &[&str])] = &[
    ("ace", "-ace", &["A", "C", "E", "FS", "H"]),
    ("bdfm", "-bdfm", &["B", "D", "F", "M"]),
    ("g", "-g", &["G"]),
    ("jz", "-jz", &["J", "Z"]),
    ("nqrw", "-nqrw", &["N", "Q", "R", "W"]),
    ("l", "-l", &["L"]),
    ("1234567", "", &["1", "2", "3", "4", "5", "6", "7", "GS"]),
    ("si", "-si", &["SI"]),
];

/// Feed group URLs and the route → group mapping.
#[derive(Debug, Clone, Default)]
pub struct FeedConfig {
    /// Group name → URL. Ordered so "all feeds" is deterministic.
    feeds: BTreeMap<String, String>,
    /// Upper-cased route id → group name.
    routes: HashMap<String, String>,
}

impl FeedConfig {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The NYC subway feeds.
    pub fn mta() -> Self {
        MTA_FEEDS
            .iter()
            .fold(Self::new(), |config, (group, suffix, routes)| {
                config.with_feed(group, format!("{MTA_FEED_BASE_URL}{suffix}"), routes)
            })
    }

    /// Add a feed group carrying `routes`.
    ///
    /// A route already mapped to another group is moved to this one.
    pub fn with_feed(mut self, group: &str, url: impl Into<String>, routes: &[&str]) -> Self {
        self.feeds.insert(group.to_string(), url.into());
        for route in routes {
            self.routes.insert(route.to_uppercase(), group.to_string());
        }
        self
    }

    /// URL of a feed group.
    pub fn url(&self, group: &str) -> Option<&str> {
        self.feeds.get(group).map(String::as_str)
    }

    /// All group names.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.feeds.keys().map(String::as_str)
    }

    /// Group carrying a route (case-insensitive).
    pub fn group_for_route(&self, route: &str) -> Option<&str> {
        self.routes
            .get(&route.trim().to_uppercase())
            .map(String::as_str)
    }

    /// The distinct groups needed to cover `routes`, in first-seen order.
    ///
    /// An empty route list means every group. Unknown routes are ignored.
    pub fn groups_for_routes<S: AsRef<str>>(&self, routes: &[S]) -> Vec<&str> {
        if routes.is_empty() {
            return self.groups().collect();
        }

        let mut seen = HashSet::new();
        routes
            .iter()
            .filter_map(|r| self.group_for_route(r.as_ref()))
            .filter(|g| seen.insert(*g))
            .collect()
    }

    /// Number of feed groups.
    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    /// Returns true if no feed groups are configured.
    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mta_table() {
        let config = FeedConfig::mta();

        assert_eq!(config.len(), 8);
        assert_eq!(
            config.url("ace"),
            Some("https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-ace")
        );
        assert_eq!(
            config.url("1234567"),
            Some("https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs")
        );
        assert_eq!(config.group_for_route("7"), Some("1234567"));
        assert_eq!(config.group_for_route("si"), Some("si"));
        assert_eq!(config.group_for_route("X"), None);
    }

    #[test]
    fn routes_deduplicate_to_groups() {
        let config = FeedConfig::mta();
        let groups = config.groups_for_routes(&["1", "2", "a", "3", "C", "X"]);

        assert_eq!(groups, ["1234567", "ace"]);
    }

    #[test]
    fn empty_routes_means_all_groups() {
        let config = FeedConfig::mta();
        let groups = config.groups_for_routes::<&str>(&[]);

        assert_eq!(groups.len(), 8);
        assert_eq!(groups, config.groups().collect::<Vec<_>>());
    }

    #[test]
    fn custom_table() {
        let config = FeedConfig::new()
            .with_feed("one", "http://feeds.test/one", &["A"])
            .with_feed("two", "http://feeds.test/two", &["B", "a"]);

        // "A" was re-assigned to the second group.
        assert_eq!(config.group_for_route("A"), Some("two"));
        assert_eq!(config.groups().collect::<Vec<_>>(), ["one", "two"]);
    }
}

//! Service alerts from the MTA all-alerts GTFS-realtime feed.

use std::collections::HashSet;

use bytes::Bytes;
use chrono::Utc;
use gtfs_rt::{Alert, FeedMessage, TranslatedString};
use prost::Message;
use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheConfig, TtlCache};

use super::error::TransitError;
use super::fetch::{Fetch, HttpFetcher};

/// MTA all-alerts feed.
const MTA_ALERTS_URL: &str = "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/camsys%2Fall-alerts";

/// There is only one alerts feed, so one cache key.
const CACHE_KEY: &str = "all";

/// Alerts feed configuration.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub url: String,
}

impl AlertConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self::new(MTA_ALERTS_URL)
    }
}

/// An active service disruption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceAlert {
    pub id: String,
    /// Affected routes, deduplicated, in feed order.
    pub routes: Vec<String>,
    pub header: String,
    pub description: String,
}

impl ServiceAlert {
    /// Whether the alert names any of `routes`.
    pub fn affects_any(&self, routes: &HashSet<&str>) -> bool {
        self.routes.iter().any(|r| routes.contains(r.as_str()))
    }
}

/// Service alert aggregator.
pub struct AlertService<F = HttpFetcher> {
    fetcher: F,
    config: AlertConfig,
    cache: TtlCache<Bytes>,
}

impl<F: Fetch> AlertService<F> {
    pub fn new(fetcher: F, config: AlertConfig, cache: &CacheConfig) -> Self {
        Self {
            fetcher,
            config,
            cache: TtlCache::new(cache),
        }
    }

    /// Alerts active now, limited to those naming one of `routes`.
    ///
    /// An empty route list returns every active alert.
    pub async fn get_alerts(&self, routes: &[String]) -> Result<Vec<ServiceAlert>, TransitError> {
        let feed = self.feed().await?;
        let alerts = active_alerts(&feed, Utc::now().timestamp());

        if routes.is_empty() {
            return Ok(alerts);
        }

        let wanted: HashSet<&str> = routes.iter().map(String::as_str).collect();
        Ok(alerts.into_iter().filter(|a| a.affects_any(&wanted)).collect())
    }

    async fn feed(&self) -> Result<FeedMessage, TransitError> {
        if let Some(body) = self.cache.get(CACHE_KEY).await {
            return Ok(FeedMessage::decode(body)?);
        }

        let body = self.fetcher.get(&self.config.url, &[]).await?;
        let feed = FeedMessage::decode(body.clone())?;
        debug!(entities = feed.entity.len(), "alerts feed fetched");

        self.cache.set(CACHE_KEY, body).await;
        Ok(feed)
    }
}

/// Materialize the alerts that are active at `now` and have a header.
fn active_alerts(feed: &FeedMessage, now: i64) -> Vec<ServiceAlert> {
    feed.entity
        .iter()
        .filter_map(|entity| {
            let alert = entity.alert.as_ref()?;
            if !is_active(alert, now) {
                return None;
            }

            let header = translated_text(alert.header_text.as_ref());
            if header.is_empty() {
                return None;
            }

            Some(ServiceAlert {
                id: entity.id.clone(),
                routes: informed_routes(alert),
                header,
                description: translated_text(alert.description_text.as_ref()),
            })
        })
        .collect()
}

/// No periods means always active. Otherwise `now` must fall in one of
/// them; an end of zero is open-ended.
fn is_active(alert: &Alert, now: i64) -> bool {
    if alert.active_period.is_empty() {
        return true;
    }

    alert.active_period.iter().any(|period| {
        let start = period.start.unwrap_or(0) as i64;
        let end = period.end.unwrap_or(0) as i64;
        now >= start && (end == 0 || now < end)
    })
}

fn informed_routes(alert: &Alert) -> Vec<String> {
    let mut seen = HashSet::new();
    alert
        .informed_entity
        .iter()
        .filter_map(|e| e.route_id.as_deref())
        .filter(|r| !r.is_empty() && seen.insert(*r))
        .map(str::to_string)
        .collect()
}

/// English (or untagged) text, else the first translation.
fn translated_text(text: Option<&TranslatedString>) -> String {
    let Some(text) = text else {
        return String::new();
    };

    text.translation
        .iter()
        .find(|t| matches!(t.language.as_deref(), None | Some("") | Some("en")))
        .or_else(|| text.translation.first())
        .map(|t| t.text.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use gtfs_rt::translated_string::Translation;
    use gtfs_rt::{EntitySelector, FeedEntity, TimeRange};

    use super::*;
    use crate::transit::FakeFetcher;

    const URL: &str = "http://alerts.test/all";

    fn text(parts: &[(Option<&str>, &str)]) -> TranslatedString {
        let mut translated = TranslatedString::default();
        translated.translation = parts
            .iter()
            .map(|(language, text)| {
                let mut t = Translation::default();
                t.language = language.map(str::to_string);
                t.text = text.to_string();
                t
            })
            .collect();
        translated
    }

    fn period(start: u64, end: u64) -> TimeRange {
        let mut range = TimeRange::default();
        range.start = Some(start);
        range.end = Some(end);
        range
    }

    fn alert(id: &str, routes: &[&str], header: &str, periods: Vec<TimeRange>) -> FeedEntity {
        let mut alert = Alert::default();
        alert.active_period = periods;
        alert.informed_entity = routes
            .iter()
            .map(|r| {
                let mut selector = EntitySelector::default();
                selector.route_id = Some(r.to_string());
                selector
            })
            .collect();
        if !header.is_empty() {
            alert.header_text = Some(text(&[(Some("en"), header)]));
        }
        alert.description_text = Some(text(&[(Some("en-html"), "<p>details</p>"), (Some("en"), "details")]));

        let mut entity = FeedEntity::default();
        entity.id = id.to_string();
        entity.alert = Some(alert);
        entity
    }

    fn encode(entities: Vec<FeedEntity>) -> Vec<u8> {
        let mut feed = FeedMessage::default();
        feed.header.gtfs_realtime_version = "2.0".to_string();
        feed.entity = entities;
        feed.encode_to_vec()
    }

    fn service(body: Vec<u8>) -> AlertService<FakeFetcher> {
        AlertService::new(
            FakeFetcher::new().with_body(URL, body),
            AlertConfig::new(URL),
            &CacheConfig::default(),
        )
    }

    fn now() -> u64 {
        Utc::now().timestamp() as u64
    }

    #[test]
    fn open_ended_period_stays_active() {
        let entity = alert("a", &["A"], "Delays", vec![period(1_000, 0)]);
        let alert = entity.alert.unwrap();

        assert!(is_active(&alert, 1_000));
        assert!(is_active(&alert, 4_000_000_000));
        assert!(!is_active(&alert, 999));
    }

    #[test]
    fn closed_period_bounds() {
        let entity = alert("a", &["A"], "Delays", vec![period(100, 200), period(500, 600)]);
        let alert = entity.alert.unwrap();

        assert!(is_active(&alert, 100));
        assert!(!is_active(&alert, 200));
        assert!(!is_active(&alert, 300));
        assert!(is_active(&alert, 550));
        assert!(is_active(&Alert::default(), 0));
    }

    #[test]
    fn translation_preference() {
        assert_eq!(
            translated_text(Some(&text(&[(Some("es"), "Demoras"), (Some("en"), "Delays")]))),
            "Delays"
        );
        assert_eq!(
            translated_text(Some(&text(&[(Some("es"), "Demoras"), (None, "Delays")]))),
            "Delays"
        );
        assert_eq!(
            translated_text(Some(&text(&[(Some("es"), "Demoras"), (Some("fr"), "Retards")]))),
            "Demoras"
        );
        assert_eq!(translated_text(None), "");
        assert_eq!(translated_text(Some(&TranslatedString::default())), "");
    }

    #[tokio::test]
    async fn active_alerts_with_headers_only() {
        let t = now();
        let body = encode(vec![
            alert("open", &["A", "C", "A"], "A/C delays", vec![period(t - 3_600, 0)]),
            alert("expired", &["A"], "Old", vec![period(t - 7_200, t - 3_600)]),
            alert("future", &["L"], "Weekend work", vec![period(t + 3_600, t + 7_200)]),
            alert("blank", &["G"], "", vec![]),
            alert("always", &["G"], "G reroute", vec![]),
        ]);
        let alerts = service(body);

        let all = alerts.get_alerts(&[]).await.unwrap();

        let ids: Vec<_> = all.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["open", "always"]);
        assert_eq!(all[0].routes, ["A", "C"]);
        assert_eq!(all[0].header, "A/C delays");
        assert_eq!(all[0].description, "details");
    }

    #[tokio::test]
    async fn filter_by_route_and_cache() {
        let t = now();
        let body = encode(vec![
            alert("ac", &["A", "C"], "A/C delays", vec![period(t - 60, 0)]),
            alert("g", &["G"], "G reroute", vec![]),
        ]);
        let alerts = service(body);

        let c = alerts.get_alerts(&["C".to_string()]).await.unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].id, "ac");

        let none = alerts.get_alerts(&["7".to_string()]).await.unwrap();
        assert!(none.is_empty());

        assert_eq!(alerts.fetcher.calls_to(URL), 1);
    }

    #[tokio::test]
    async fn feed_failure_is_an_error() {
        let alerts = AlertService::new(
            FakeFetcher::new().with_timeout(URL),
            AlertConfig::new(URL),
            &CacheConfig::default(),
        );

        let err = alerts.get_alerts(&[]).await.unwrap_err();
        assert!(matches!(err, TransitError::Timeout { .. }));
    }

    #[test]
    fn default_url() {
        assert!(AlertConfig::default().url.ends_with("camsys%2Fall-alerts"));
    }
}

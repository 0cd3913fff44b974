//! HTTP access to upstream feeds.
//!
//! Aggregators talk to the network only through the [`Fetch`] trait, so tests
//! can substitute canned payloads and failures.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Semaphore;

use super::error::TransitError;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum concurrent upstream requests.
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Fetches a raw response body from an upstream endpoint.
pub trait Fetch: Send + Sync {
    /// GET `url` with the given query parameters.
    ///
    /// Non-success statuses and timeouts are errors.
    fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> impl Future<Output = Result<Bytes, TransitError>> + Send;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum requests in flight at once.
    pub max_concurrent: usize,
}

impl HttpConfig {
    /// Create a config with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

/// `reqwest`-backed [`Fetch`] implementation.
///
/// Uses a semaphore to bound concurrent upstream requests across all
/// aggregators sharing the fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
    semaphore: Arc<Semaphore>,
}

impl HttpFetcher {
    /// Create a new fetcher.
    pub fn new(config: &HttpConfig) -> Result<Self, TransitError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("transit-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }
}

impl Fetch for HttpFetcher {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Bytes, TransitError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| TransitError::LimiterClosed)?;

        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| classify(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransitError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.bytes().await.map_err(|e| classify(e, url))
    }
}

/// Map timeouts to their own variant; `url` never carries the query string,
/// so credentials stay out of error messages.
fn classify(err: reqwest::Error, url: &str) -> TransitError {
    if err.is_timeout() {
        TransitError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransitError::Http(err.without_url())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory [`Fetch`] for tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    enum Canned {
        Body(Bytes),
        Status(u16),
        Timeout,
    }

    /// Serves canned responses and records every request.
    ///
    /// Responses are keyed by URL. A key of the form `url?param=value` takes
    /// precedence for requests carrying that query parameter.
    #[derive(Default)]
    pub struct FakeFetcher {
        responses: HashMap<String, Canned>,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_body(mut self, url: &str, body: impl Into<Bytes>) -> Self {
            self.responses
                .insert(url.to_string(), Canned::Body(body.into()));
            self
        }

        pub fn with_status(mut self, url: &str, status: u16) -> Self {
            self.responses
                .insert(url.to_string(), Canned::Status(status));
            self
        }

        pub fn with_timeout(mut self, url: &str) -> Self {
            self.responses.insert(url.to_string(), Canned::Timeout);
            self
        }

        /// Number of requests made to `url`.
        pub fn calls_to(&self, url: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| u == url)
                .count()
        }

        /// Query parameters of the most recent request to `url`.
        pub fn last_query(&self, url: &str) -> Option<Vec<(String, String)>> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(u, _)| u == url)
                .map(|(_, q)| q.clone())
        }
    }

    impl Fetch for FakeFetcher {
        async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Bytes, TransitError> {
            self.calls.lock().unwrap().push((
                url.to_string(),
                query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            ));

            let canned = query
                .iter()
                .find_map(|(k, v)| self.responses.get(&format!("{url}?{k}={v}")))
                .or_else(|| self.responses.get(url));

            match canned {
                Some(Canned::Body(body)) => Ok(body.clone()),
                Some(Canned::Status(status)) => Err(TransitError::Status {
                    status: *status,
                    url: url.to_string(),
                }),
                Some(Canned::Timeout) => Err(TransitError::Timeout {
                    url: url.to_string(),
                }),
                None => Err(TransitError::Status {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }
    }
}

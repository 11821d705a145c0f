//! Bounded Hacker News API client
//!
//! This module handles all HTTP access to the Hacker News Firebase API:
//! - Typed fetches for items, users, and the max item ID
//! - A global admission ceiling on simultaneously in-flight requests
//! - Retry with exponential backoff for transient failures
//! - The absence contract: a `null` body (or 404) means the record does not
//!   exist, which is an expected outcome, never an error
//!
//! The client is an explicitly constructed, explicitly owned object. It owns
//! one shared connection pool for its lifetime; dropping it releases the
//! pool. There is no process-wide singleton.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::retry::fetch_with_retry;
use crate::types::{Item, ItemId, User};
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

/// Transport-independent view of the Hacker News API
///
/// The puller consumes the client through this seam, so traversal logic can
/// be exercised against a mock in tests. [`HnClient`] is the production
/// implementation.
#[async_trait::async_trait]
pub trait HnApi: Send + Sync {
    /// Fetch one item by ID; `Ok(None)` if the ID resolves to nothing
    async fn item(&self, id: ItemId) -> Result<Option<Item>>;

    /// Fetch one user by handle; `Ok(None)` if no such profile exists
    async fn user(&self, handle: &str) -> Result<Option<User>>;

    /// Fetch the current largest allocated item ID
    async fn max_item_id(&self) -> Result<ItemId>;

    /// Fetch a batch of items
    ///
    /// Results carry no completion-order guarantee; each entry is addressed
    /// by its ID. The default implementation fetches sequentially;
    /// implementations with an admission ceiling overlap requests up to it.
    async fn items(&self, ids: &[ItemId]) -> Vec<(ItemId, Result<Option<Item>>)> {
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            results.push((id, self.item(id).await));
        }
        results
    }
}

/// HTTP client for the Hacker News Firebase API
///
/// Requests beyond the configured `max_concurrent` ceiling queue on an
/// internal semaphore and are admitted as capacity frees. The permit is
/// acquired per attempt, so a request waiting out a retry backoff does not
/// hold capacity.
pub struct HnClient {
    http: reqwest::Client,
    base_url: String,
    permits: Arc<Semaphore>,
    retry: crate::config::RetryConfig,
    max_concurrent: usize,
}

impl HnClient {
    /// Build a client from the configuration
    ///
    /// Validates the base URL and constructs the connection pool with the
    /// configured timeouts.
    pub fn new(config: &Config) -> Result<Self> {
        let base = Url::parse(&config.api.base_url).map_err(|e| Error::Config {
            message: format!("base_url is not a valid URL: {e}"),
            key: Some("base_url".to_string()),
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.api.request_timeout)
            .connect_timeout(config.api.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            permits: Arc::new(Semaphore::new(config.pull.max_concurrent)),
            retry: config.retry.clone(),
            max_concurrent: config.pull.max_concurrent,
        })
    }

    /// Fetch one item by ID
    pub async fn item(&self, id: ItemId) -> Result<Option<Item>> {
        self.get_json(&format!("item/{id}")).await
    }

    /// Fetch one user profile by handle (case-sensitive)
    pub async fn user(&self, handle: &str) -> Result<Option<User>> {
        self.get_json(&format!("user/{handle}")).await
    }

    /// Fetch the current largest allocated item ID
    pub async fn max_item_id(&self) -> Result<ItemId> {
        let max: Option<u64> = self.get_json("maxitem").await?;
        match max {
            Some(id) => Ok(ItemId::new(id)),
            None => Err(Error::MalformedPayload {
                endpoint: "maxitem".to_string(),
                reason: "endpoint returned null".to_string(),
            }),
        }
    }

    /// Fetch a batch of items, overlapping requests up to the ceiling
    pub async fn items(&self, ids: &[ItemId]) -> Vec<(ItemId, Result<Option<Item>>)> {
        stream::iter(ids.iter().copied())
            .map(|id| async move { (id, self.item(id).await) })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }

    /// GET an endpoint with retry, honoring the absence contract
    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>> {
        fetch_with_retry(&self.retry, || self.attempt(endpoint)).await
    }

    /// One admission-gated request attempt
    async fn attempt<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::ShuttingDown)?;

        let url = format!("{}/{}.json", self.base_url, endpoint);
        let response = self.http.get(&url).send().await?;
        let status = response.status();

        // The API signals absence with a 200 "null" body; 404 is mapped to
        // the same outcome for robustness
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }

        response.json::<Option<T>>().await.map_err(|e| {
            if e.is_decode() {
                Error::MalformedPayload {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                }
            } else {
                Error::Network(e)
            }
        })
    }
}

#[async_trait::async_trait]
impl HnApi for HnClient {
    async fn item(&self, id: ItemId) -> Result<Option<Item>> {
        HnClient::item(self, id).await
    }

    async fn user(&self, handle: &str) -> Result<Option<User>> {
        HnClient::user(self, handle).await
    }

    async fn max_item_id(&self) -> Result<ItemId> {
        HnClient::max_item_id(self).await
    }

    async fn items(&self, ids: &[ItemId]) -> Vec<(ItemId, Result<Option<Item>>)> {
        HnClient::items(self, ids).await
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PullConfig, RetryConfig};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_RESPONSE_DELAY: Duration = Duration::from_millis(100);

    fn test_config(base_url: &str, max_concurrent: usize) -> Config {
        Config {
            api: crate::config::ApiConfig {
                base_url: base_url.to_string(),
                ..Default::default()
            },
            pull: PullConfig {
                max_concurrent,
                ..Default::default()
            },
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(100),
                backoff_multiplier: 2.0,
                jitter: false,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn item_deserializes_story_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/8863.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"id":8863,"type":"story","by":"dhouston","time":1175714200,
                    "score":104,"title":"My YC app: Dropbox","descendants":71,
                    "kids":[9224,8917]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = HnClient::new(&test_config(&server.uri(), 50)).unwrap();
        let item = client.item(ItemId::new(8863)).await.unwrap().unwrap();
        assert_eq!(item.id, 8863u64);
        assert_eq!(item.by.as_deref(), Some("dhouston"));
        assert_eq!(item.descendants, Some(71));
    }

    #[tokio::test]
    async fn null_body_is_absence_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/77.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("null", "application/json"))
            .mount(&server)
            .await;

        let client = HnClient::new(&test_config(&server.uri(), 50)).unwrap();
        assert_eq!(client.item(ItemId::new(77)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn http_404_is_absence_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/ghost.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HnClient::new(&test_config(&server.uri(), 50)).unwrap();
        assert_eq!(client.user("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn persistent_5xx_surfaces_as_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/5.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HnClient::new(&test_config(&server.uri(), 50)).unwrap();
        let err = client.item(ItemId::new(5)).await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 503, .. }));
    }

    #[tokio::test]
    async fn transient_5xx_is_retried_to_success() {
        let server = MockServer::start().await;
        // First attempt fails, the retry succeeds
        Mock::given(method("GET"))
            .and(path("/item/7.json"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/7.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"id":7,"type":"comment","by":"norvig","time":1160423461,"parent":6}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let client = HnClient::new(&test_config(&server.uri(), 50)).unwrap();
        let item = client.item(ItemId::new(7)).await.unwrap().unwrap();
        assert_eq!(item.id, 7u64);
    }

    #[tokio::test]
    async fn malformed_payload_is_typed_and_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/9.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"["not","an","item"]"#, "application/json"),
            )
            .mount(&server)
            .await;

        let client = HnClient::new(&test_config(&server.uri(), 50)).unwrap();
        let err = client.item(ItemId::new(9)).await.unwrap_err();
        assert!(matches!(err, Error::MalformedPayload { .. }));
    }

    #[tokio::test]
    async fn max_item_id_parses_scalar() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maxitem.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("9130260", "application/json"))
            .mount(&server)
            .await;

        let client = HnClient::new(&test_config(&server.uri(), 50)).unwrap();
        assert_eq!(client.max_item_id().await.unwrap(), ItemId::new(9130260));
    }

    #[tokio::test]
    async fn batch_results_are_id_addressable_with_mixed_outcomes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/3.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"id":3,"type":"story","by":"pg","time":100,"title":"three"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/2.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("null", "application/json"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/1.json"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = HnClient::new(&test_config(&server.uri(), 50)).unwrap();
        let ids = [ItemId::new(3), ItemId::new(2), ItemId::new(1)];
        let mut results = client.items(&ids).await;
        results.sort_by_key(|(id, _)| std::cmp::Reverse(*id));

        assert_eq!(results.len(), 3);
        assert!(matches!(&results[0].1, Ok(Some(item)) if item.id == 3u64));
        assert!(matches!(&results[1].1, Ok(None)));
        assert!(matches!(&results[2].1, Err(Error::Http { status: 403, .. })));
    }

    #[tokio::test]
    async fn admission_ceiling_bounds_in_flight_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("null", "application/json")
                    .set_delay(TEST_RESPONSE_DELAY),
            )
            .mount(&server)
            .await;

        // Ceiling of 2: six 100ms requests need at least three waves
        let client = HnClient::new(&test_config(&server.uri(), 2)).unwrap();
        let ids: Vec<ItemId> = (1..=6).map(ItemId::new).collect();

        let start = std::time::Instant::now();
        let results = client.items(&ids).await;
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 6);
        assert!(
            elapsed >= Duration::from_millis(290),
            "ceiling of 2 must serialize six 100ms requests into >=3 waves, took {elapsed:?}"
        );
    }
}

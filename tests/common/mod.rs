//! Common test utilities for hn-pull E2E tests
//!
//! Builds a mock Hacker News Firebase API on wiremock: items and users as
//! JSON bodies, absences as `null` bodies, and transient-failure mounts for
//! retry scenarios.

use hn_pull::{ApiConfig, Config, OutputConfig, PullConfig, RetryConfig};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A mock Hacker News API server
pub struct MockHn {
    server: MockServer,
}

#[allow(dead_code)]
impl MockHn {
    /// Start a mock server whose `maxitem` endpoint reports `max_id`
    pub async fn start(max_id: u64) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maxitem.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(max_id.to_string(), "application/json"),
            )
            .mount(&server)
            .await;
        Self { server }
    }

    /// Base URI of the mock API
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Mount a story item with the given author and creation time
    pub async fn mount_story(&self, id: u64, by: &str, time: i64) {
        let body = json!({
            "id": id,
            "type": "story",
            "by": by,
            "time": time,
            "score": 10,
            "title": format!("story {id}"),
            "descendants": 0,
        });
        Mock::given(method("GET"))
            .and(path(format!("/item/{id}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mount a tombstoned/unallocated item ID (the API returns `null`)
    pub async fn mount_absent_item(&self, id: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/item/{id}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_raw("null", "application/json"))
            .mount(&self.server)
            .await;
    }

    /// Mount a story that fails once with a 500, then succeeds
    pub async fn mount_transient_then_story(&self, id: u64, by: &str, time: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/item/{id}.json")))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
        self.mount_story(id, by, time).await;
    }

    /// Mount a user profile
    pub async fn mount_user(&self, handle: &str) {
        let body = json!({
            "id": handle,
            "created": 1_173_923_446u64,
            "karma": 100,
        });
        Mock::given(method("GET"))
            .and(path(format!("/user/{handle}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mount an absent user profile (`null` body)
    pub async fn mount_absent_user(&self, handle: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/user/{handle}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_raw("null", "application/json"))
            .mount(&self.server)
            .await;
    }
}

/// Build a run configuration against the mock server with fast retries
pub fn test_config(
    api_uri: &str,
    out_dir: &Path,
    max_concurrent: usize,
    batch_size: usize,
) -> Config {
    Config {
        api: ApiConfig {
            base_url: api_uri.to_string(),
            ..Default::default()
        },
        pull: PullConfig {
            max_concurrent,
            batch_size,
            max_items: None,
            n_months: None,
        },
        output: OutputConfig {
            items_path: out_dir.join("items.jsonl"),
            users_path: out_dir.join("users.jsonl"),
        },
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            jitter: false,
        },
    }
}

/// Item IDs persisted in a JSONL items stream, in file order
#[allow(dead_code)]
pub fn persisted_item_ids(path: &Path) -> Vec<u64> {
    read_field(path, "id")
        .into_iter()
        .map(|v| v.as_u64().expect("item id is an integer"))
        .collect()
}

/// User handles persisted in a JSONL users stream, in file order
#[allow(dead_code)]
pub fn persisted_user_handles(path: &Path) -> Vec<String> {
    read_field(path, "id")
        .into_iter()
        .map(|v| v.as_str().expect("user id is a string").to_string())
        .collect()
}

fn read_field(path: &Path, field: &str) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| {
            let record: serde_json::Value =
                serde_json::from_str(line).expect("stream line is valid JSON");
            record[field].clone()
        })
        .collect()
}

//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use order_sync::config::{ApiConfig, Config, RateLimitConfig, RetryConfig, StorageConfig};
use order_sync::storage::StateStore;
use order_sync::sync::{HttpOrderApi, OrderSyncCoordinator};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CUSTOMER_ID: &str = "c-42";

/// Create a test configuration pointing at a mock server, without pacing or backoff
pub fn create_test_config(base_url: &str, data_dir: &str) -> Config {
    Config {
        customer_id: CUSTOMER_ID.to_string(),
        api: ApiConfig {
            base_url: base_url.to_string(),
            token: None,
            timeout_secs: 5,
        },
        rate_limit: RateLimitConfig {
            max_per_window: 100,
            window_secs: 60,
            min_spacing_ms: 0,
        },
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_factor: 1.0,
            jitter: false,
        },
        storage: StorageConfig {
            data_dir: data_dir.to_string(),
        },
        ..Default::default()
    }
}

/// Create a coordinator talking HTTP to the mock server
pub fn create_test_coordinator(config: &Config, store: Arc<dyn StateStore>) -> OrderSyncCoordinator {
    let api = HttpOrderApi::new(&config.api).expect("Failed to create HTTP order API");
    OrderSyncCoordinator::from_config(config, Arc::new(api), store)
}

/// JSON for one order as served by the order service
pub fn order_json(id: &str) -> Value {
    json!({
        "id": id,
        "status_code": 3,
        "status_label": "delivered",
        "started_at": "2024-02-01T08:00:00Z",
        "ended_at": "2024-02-01T09:00:00Z",
        "warehouse": "W7",
        "price": 30.0
    })
}

/// JSON for one order line
pub fn line_json(product_id: &str, quantity: f64) -> Value {
    json!({
        "product_id": product_id,
        "name": format!("Product {}", product_id),
        "quantity": quantity
    })
}

/// Serve the order list as a single terminal page
pub async fn mount_order_list(server: &MockServer, order_ids: &[&str]) {
    let orders: Vec<Value> = order_ids.iter().map(|id| order_json(id)).collect();
    Mock::given(method("GET"))
        .and(path(format!("/customers/{}/orders", CUSTOMER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next_page": null,
            "orders": orders
        })))
        .mount(server)
        .await;
}

/// Serve the lines of one order
pub async fn mount_order_lines(server: &MockServer, order_id: &str, lines: Vec<Value>, timestamp: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/customers/{}/orders/{}/lines", CUSTOMER_ID, order_id)))
        .and(query_param("warehouse", "W7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lines": lines,
            "order_timestamp": timestamp
        })))
        .expect(1)
        .mount(server)
        .await;
}

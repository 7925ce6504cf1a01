#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use shopfloor_api::{
    config::AppConfig,
    events::{self, EventSender},
    store::InMemoryDocumentStore,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Helper harness for spinning up the full router over an in-memory document store.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub backend: InMemoryDocumentStore,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with an empty store.
    pub async fn new() -> Self {
        let cfg = AppConfig {
            tenant: "integration".to_string(),
            default_production_stages: vec!["cutting".to_string(), "welding".to_string()],
            logo_max_bytes: 64 * 1024,
            ..AppConfig::default()
        };

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let backend = InMemoryDocumentStore::new();
        let state = AppState::new(cfg, Arc::new(backend.clone()), event_sender);
        state
            .services
            .start_all()
            .expect("live collections should subscribe");

        let router = shopfloor_api::build_router(state.clone());

        Self {
            router,
            state,
            backend,
            _event_task: event_task,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send raw bytes, e.g. an uploaded image.
    pub async fn request_bytes(
        &self,
        method: Method,
        uri: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", content_type)
            .body(Body::from(bytes))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request, asserts the status and returns the parsed body.
    pub async fn expect(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        status: StatusCode,
    ) -> Value {
        let response = self.request(method.clone(), uri, body).await;
        let actual = response.status();
        let payload = body_json(response).await;
        assert_eq!(actual, status, "{} {} returned {}", method, uri, payload);
        payload
    }

    /// Creates a board column and returns its id.
    pub async fn seed_column(&self, title: &str) -> String {
        let body = self
            .expect(
                Method::POST,
                "/api/v1/columns",
                Some(json!({ "title": title })),
                StatusCode::CREATED,
            )
            .await;
        body["data"]["id"]
            .as_str()
            .expect("column id")
            .to_string()
    }

    /// Creates an order with one item per `(code, quantity)` and returns the response data.
    pub async fn seed_order(&self, customer: &str, items: &[(&str, u32)]) -> Value {
        let items: Vec<Value> = items
            .iter()
            .map(|(code, qty)| {
                json!({
                    "code": code,
                    "description": format!("Part {}", code),
                    "quantity": qty,
                    "unitWeight": "2.5"
                })
            })
            .collect();
        let body = self
            .expect(
                Method::POST,
                "/api/v1/orders",
                Some(json!({ "customerName": customer, "items": items })),
                StatusCode::CREATED,
            )
            .await;
        body["data"].clone()
    }

    /// Creates a draft quotation and returns the response data.
    pub async fn seed_quotation(&self, customer: &str) -> Value {
        let body = self
            .expect(
                Method::POST,
                "/api/v1/quotations",
                Some(json!({
                    "customerName": customer,
                    "items": [
                        {
                            "code": "FR-100",
                            "description": "Welded frame",
                            "quantity": 2,
                            "unitPrice": "150.00",
                            "taxRate": 22,
                            "leadTimeDays": 10,
                            "unitWeight": "12.5"
                        },
                        {
                            "code": "BR-7",
                            "description": "Bracket",
                            "quantity": 10,
                            "unitPrice": "4.20",
                            "taxRate": 22,
                            "leadTimeDays": 3
                        }
                    ]
                })),
                StatusCode::CREATED,
            )
            .await;
        body["data"].clone()
    }

    /// Moves a quotation through the given statuses, asserting each step succeeds.
    pub async fn transition_through(&self, id: &str, statuses: &[&str]) {
        for status in statuses {
            self.expect(
                Method::PUT,
                &format!("/api/v1/quotations/{}/status", id),
                Some(json!({ "status": status })),
                StatusCode::OK,
            )
            .await;
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.state.services.stop_all();
        self._event_task.abort();
    }
}

/// Reads a response body as JSON. Empty bodies become `null`, plain-text
/// extractor rejections become a JSON string.
pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Small PNG for logo uploads.
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 40) as u8, (y * 40) as u8, 128])
    });
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

mod common;

use std::str::FromStr;

use axum::http::{header, Method, StatusCode};
use chrono::{Duration, NaiveDate, Utc};
use common::{body_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a decimal, got {}", other),
    }
}

#[tokio::test]
async fn quotations_are_numbered_and_totalled() {
    let app = TestApp::new().await;

    let first = app.seed_quotation("Rossi Srl").await;
    let second = app.seed_quotation("Bianchi SpA").await;

    assert_eq!(first["number"], 1);
    assert_eq!(first["displayNumber"], "Q-00001");
    assert_eq!(second["number"], 2);
    assert_eq!(first["status"], "draft");
    assert_eq!(first["effectiveStatus"], "draft");
    assert_eq!(first["statusBadge"]["label"], "Draft");

    let totals = &first["totals"];
    assert_eq!(decimal(&totals["subtotal"]), dec!(342.00));
    assert_eq!(decimal(&totals["tax"]), dec!(75.24));
    assert_eq!(decimal(&totals["total"]), dec!(417.24));
    assert_eq!(decimal(&totals["totalWeight"]), dec!(25.0));

    let list = app
        .expect(Method::GET, "/api/v1/quotations", None, StatusCode::OK)
        .await;
    let numbers: Vec<i64> = list["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["number"].as_i64().unwrap())
        .collect();
    assert_eq!(numbers, vec![2, 1]);
}

#[tokio::test]
async fn only_drafts_can_be_edited() {
    let app = TestApp::new().await;
    let quotation = app.seed_quotation("Rossi Srl").await;
    let id = quotation["id"].as_str().unwrap();
    let uri = format!("/api/v1/quotations/{}", id);

    let edited = app
        .expect(
            Method::PATCH,
            &uri,
            Some(json!({ "customerName": "Rossi & Figli Srl", "items": [] })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(edited["data"]["customerName"], "Rossi & Figli Srl");
    assert_eq!(decimal(&edited["data"]["totals"]["total"]), Decimal::ZERO);

    app.transition_through(id, &["sent"]).await;

    let rejected = app
        .expect(
            Method::PATCH,
            &uri,
            Some(json!({ "customerName": "Too late", "items": [] })),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert!(rejected["message"].as_str().unwrap().contains("no longer be edited"));
}

#[tokio::test]
async fn invalid_transition_leaves_quotation_unchanged() {
    let app = TestApp::new().await;
    let quotation = app.seed_quotation("Rossi Srl").await;
    let id = quotation["id"].as_str().unwrap();

    app.expect(
        Method::PUT,
        &format!("/api/v1/quotations/{}/status", id),
        Some(json!({ "status": "approved" })),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;

    let stored = app
        .expect(
            Method::GET,
            &format!("/api/v1/quotations/{}", id),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(stored["data"]["status"], "draft");
    assert!(stored["data"]["approvedAt"].is_null());
}

#[tokio::test]
async fn transitions_report_conversion_availability() {
    let app = TestApp::new().await;
    let quotation = app.seed_quotation("Rossi Srl").await;
    let id = quotation["id"].as_str().unwrap();
    let uri = format!("/api/v1/quotations/{}/status", id);

    let sent = app
        .expect(
            Method::PUT,
            &uri,
            Some(json!({ "status": "sent" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(sent["data"]["from"], "draft");
    assert_eq!(sent["data"]["to"], "sent");
    assert_eq!(sent["data"]["conversionAvailable"], false);
    assert!(!sent["data"]["quotation"]["sentAt"].is_null());

    let approved = app
        .expect(
            Method::PUT,
            &uri,
            Some(json!({ "status": "approved" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(approved["data"]["conversionAvailable"], true);
}

#[tokio::test]
async fn conversion_requires_a_configured_board() {
    let app = TestApp::new().await;
    let quotation = app.seed_quotation("Rossi Srl").await;
    let id = quotation["id"].as_str().unwrap();
    app.transition_through(id, &["sent", "approved"]).await;

    let blocked = app
        .expect(
            Method::POST,
            &format!("/api/v1/quotations/{}/convert", id),
            None,
            StatusCode::PRECONDITION_FAILED,
        )
        .await;
    assert_eq!(blocked["action"], "/settings/board");

    let orders = app
        .expect(Method::GET, "/api/v1/orders", None, StatusCode::OK)
        .await;
    assert!(orders["data"].as_array().unwrap().is_empty());

    let stored = app
        .expect(
            Method::GET,
            &format!("/api/v1/quotations/{}", id),
            None,
            StatusCode::OK,
        )
        .await;
    assert!(stored["data"]["convertedToOrderId"].is_null());
}

#[tokio::test]
async fn approved_quotation_converts_exactly_once() {
    let app = TestApp::new().await;
    app.seed_column("Backlog").await;
    let quotation = app.seed_quotation("Rossi Srl").await;
    let id = quotation["id"].as_str().unwrap();
    app.transition_through(id, &["sent", "approved"]).await;
    let convert_uri = format!("/api/v1/quotations/{}/convert", id);

    let converted = app
        .expect(Method::POST, &convert_uri, None, StatusCode::CREATED)
        .await;
    let order = &converted["data"]["order"];
    let order_id = order["id"].as_str().unwrap();
    let today = Utc::now().date_naive();

    assert_eq!(order["quotationId"], id);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["internalNumber"], "Q-00001");
    assert!(order["columnId"].is_null());
    assert_eq!(
        NaiveDate::from_str(order["startDate"].as_str().unwrap()).unwrap(),
        today
    );
    assert_eq!(
        NaiveDate::from_str(order["deliveryDate"].as_str().unwrap()).unwrap(),
        today + Duration::days(10)
    );
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["progress"], json!({ "cutting": 0, "welding": 0 }));
    assert_eq!(
        converted["data"]["quotation"]["convertedToOrderId"],
        order_id
    );

    let again = app
        .expect(Method::POST, &convert_uri, None, StatusCode::CONFLICT)
        .await;
    assert!(again["message"].as_str().unwrap().contains("already"));

    let orders = app
        .expect(Method::GET, "/api/v1/orders", None, StatusCode::OK)
        .await;
    assert_eq!(orders["data"].as_array().unwrap().len(), 1);

    let stored = app
        .expect(
            Method::GET,
            &format!("/api/v1/quotations/{}", id),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(stored["data"]["convertedToOrderId"], order_id);
}

#[tokio::test]
async fn concurrent_conversions_create_one_order() {
    let app = TestApp::new().await;
    app.seed_column("Backlog").await;
    let quotation = app.seed_quotation("Rossi Srl").await;
    let id = quotation["id"].as_str().unwrap();
    app.transition_through(id, &["sent", "approved"]).await;
    let uri = format!("/api/v1/quotations/{}/convert", id);

    let (a, b) = tokio::join!(
        app.request(Method::POST, &uri, None),
        app.request(Method::POST, &uri, None)
    );
    let mut statuses = vec![a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);

    let orders = app
        .expect(Method::GET, "/api/v1/orders", None, StatusCode::OK)
        .await;
    assert_eq!(orders["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unapproved_quotations_cannot_convert() {
    let app = TestApp::new().await;
    app.seed_column("Backlog").await;
    let quotation = app.seed_quotation("Rossi Srl").await;
    let id = quotation["id"].as_str().unwrap();
    app.transition_through(id, &["sent", "rejected"]).await;

    app.expect(
        Method::POST,
        &format!("/api/v1/quotations/{}/convert", id),
        None,
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
}

#[tokio::test]
async fn expired_quotations_are_flagged_but_keep_their_status() {
    let app = TestApp::new().await;
    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let created = app
        .expect(
            Method::POST,
            "/api/v1/quotations",
            Some(json!({
                "customerName": "Verdi",
                "items": [],
                "validUntil": yesterday.to_string()
            })),
            StatusCode::CREATED,
        )
        .await;
    let id = created["data"]["id"].as_str().unwrap();
    assert_eq!(created["data"]["effectiveStatus"], "draft");

    app.transition_through(id, &["sent"]).await;
    let stored = app
        .expect(
            Method::GET,
            &format!("/api/v1/quotations/{}", id),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(stored["data"]["status"], "sent");
    assert_eq!(stored["data"]["effectiveStatus"], "expired");
    assert_eq!(stored["data"]["statusBadge"]["label"], "Expired");
}

#[tokio::test]
async fn quotation_pdf_is_served_inline() {
    let app = TestApp::new().await;
    let quotation = app.seed_quotation("Rossi Srl").await;
    let id = quotation["id"].as_str().unwrap();

    let response = app
        .request(Method::GET, &format!("/api/v1/quotations/{}/pdf", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"quotation-Q-00001.pdf\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn unknown_quotation_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api/v1/quotations/does-not-exist", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn out_of_range_lines_are_rejected() {
    let app = TestApp::new().await;
    let line = |overrides: Value| {
        let mut item = json!({
            "code": "FR-1",
            "quantity": 1,
            "unitPrice": "10.00",
            "taxRate": 22
        });
        if let (Some(item), Some(extra)) = (item.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                item.insert(key.clone(), value.clone());
            }
        }
        json!({ "customerName": "Rossi", "items": [item] })
    };

    app.expect(
        Method::POST,
        "/api/v1/quotations",
        Some(line(json!({
            "quantity": "10000000000000000000",
            "unitPrice": "10000000000000000000"
        }))),
        StatusCode::BAD_REQUEST,
    )
    .await;
    app.expect(
        Method::POST,
        "/api/v1/quotations",
        Some(line(json!({ "leadTimeDays": 4000000000u32 }))),
        StatusCode::BAD_REQUEST,
    )
    .await;
    app.expect(
        Method::POST,
        "/api/v1/quotations",
        Some(line(json!({ "leadTimeDays": 3650 }))),
        StatusCode::CREATED,
    )
    .await;
}

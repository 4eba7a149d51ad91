//! Tracking views over carrier payloads of varying quality.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use moogship_client::views::TrackingView;
use moogship_core::ShipmentId;
use moogship_core::tracking::EventList;
use moogship_integration_tests::{TestContext, shipment_json};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_tracking(ctx: &TestContext, id: i64, payload: Value) {
    let mut shipment = shipment_json(id, "in_transit", 5000);
    shipment["carrierTrackingData"] = payload;
    Mock::given(method("POST"))
        .and(path(format!("/api/shipments/{id}/track")))
        .respond_with(ResponseTemplate::new(200).set_body_json(shipment))
        .mount(&ctx.server)
        .await;
}

#[tokio::test]
async fn test_unparseable_dates_yield_no_events() {
    let ctx = TestContext::new().await;
    mount_tracking(
        &ctx,
        7,
        json!({"events": [
            {"timestamp": "not a date", "status": "In transit"},
            {"timestamp": "32/13/2026", "status": "Delivered"}
        ]}),
    )
    .await;

    let view = TrackingView::new(&ctx.console, ShipmentId::new(7));
    assert_eq!(view.events().await, EventList::NoEvents);
}

#[tokio::test]
async fn test_double_encoded_payload_is_ordered_newest_first() {
    let ctx = TestContext::new().await;
    let encoded = json!({"events": [
        {"timestamp": "2026-03-02T08:00:00Z", "status": "Picked up", "location": "Istanbul"},
        {"timestamp": "2026-03-04T15:30:00Z", "status": "Delivered", "location": "Austin"},
        {"timestamp": "2026-03-03T11:00:00Z", "status": "In transit"}
    ]})
    .to_string();
    mount_tracking(&ctx, 8, Value::String(encoded)).await;

    let view = TrackingView::new(&ctx.console, ShipmentId::new(8));
    let events = view.events().await;
    let statuses: Vec<&str> = events.events().iter().map(|e| e.status.as_str()).collect();
    assert_eq!(statuses, ["Delivered", "In transit", "Picked up"]);
}

#[tokio::test]
async fn test_tracking_failure_degrades_to_no_events() {
    let ctx = TestContext::new().await;
    Mock::given(method("POST"))
        .and(path("/api/shipments/9/track"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&ctx.server)
        .await;

    let view = TrackingView::new(&ctx.console, ShipmentId::new(9));
    assert!(view.events().await.is_empty());
}

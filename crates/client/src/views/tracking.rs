//! Live tracking panel.

use moogship_core::tracking::{EventList, reconstruct_events};
use moogship_core::{Shipment, ShipmentId};
use tracing::warn;

use crate::cache::QueryObserver;
use crate::console::Console;

/// Tracking events for one shipment, polled while the view is alive.
///
/// Dropping the view stops polling.
#[derive(Debug)]
pub struct TrackingView {
    id: ShipmentId,
    observer: QueryObserver<Shipment>,
}

impl TrackingView {
    #[must_use]
    pub fn new(console: &Console, id: ShipmentId) -> Self {
        Self {
            id,
            observer: console.observe_tracking(id),
        }
    }

    #[must_use]
    pub const fn shipment_id(&self) -> ShipmentId {
        self.id
    }

    /// Current events, newest first. Any failure renders as "no events".
    pub async fn events(&self) -> EventList {
        match self.observer.read().await {
            Ok(shipment) => {
                reconstruct_events(shipment.carrier_tracking_data.as_ref(), shipment.created_at)
            }
            Err(err) => {
                warn!(shipment_id = %self.id, error = %err, "Tracking unavailable");
                EventList::NoEvents
            }
        }
    }

    /// Wait for the next refresh of this shipment's tracking.
    pub async fn changed(&self) -> EventList {
        let mut events = self.observer.subscribe();
        events.next().await;
        self.events().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ClientConfig;

    fn tracked(payload: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": 5, "status": "in_transit", "totalPrice": 5000,
            "sender": {"name": "A", "address1": "x", "city": "Istanbul", "postalCode": "34000", "country": "TR"},
            "receiver": {"name": "B", "address1": "y", "city": "Austin", "postalCode": "78701", "country": "US"},
            "createdAt": "2026-03-01T10:00:00Z",
            "carrierTrackingData": payload
        })
    }

    #[tokio::test]
    async fn test_bad_dates_show_no_events() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/shipments/5/track"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tracked(
                serde_json::json!({"events": [{"timestamp": "bad-date", "status": "X"}]}),
            )))
            .mount(&server)
            .await;
        let console = Console::new(ClientConfig::new(&server.uri()).unwrap()).unwrap();

        let view = TrackingView::new(&console, ShipmentId::new(5));
        assert_eq!(view.events().await, EventList::NoEvents);
    }

    #[tokio::test]
    async fn test_server_error_shows_no_events() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/shipments/5/track"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let console = Console::new(ClientConfig::new(&server.uri()).unwrap()).unwrap();

        let view = TrackingView::new(&console, ShipmentId::new(5));
        assert!(view.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_events_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/shipments/5/track"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tracked(serde_json::json!({
                "events": [
                    {"timestamp": "2026-03-02T08:00:00Z", "status": "Picked up"},
                    {"timestamp": "2026-03-04T08:00:00Z", "status": "Delivered"}
                ]
            }))))
            .mount(&server)
            .await;
        let console = Console::new(ClientConfig::new(&server.uri()).unwrap()).unwrap();

        let view = TrackingView::new(&console, ShipmentId::new(5));
        let events = view.events().await;
        assert_eq!(events.events()[0].status, "Delivered");
        assert_eq!(events.events()[1].status, "Picked up");
    }
}

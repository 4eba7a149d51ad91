//! Integration tests for the MoogShip console.
//!
//! Every scenario runs a real [`Console`] against a `wiremock` server standing
//! in for the MoogShip API, so call counts can be asserted exactly.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p moogship-integration-tests
//! ```

use moogship_client::{ClientConfig, Console};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::MockServer;

/// A console wired to a fresh mock API and a private state directory.
pub struct TestContext {
    pub server: MockServer,
    pub console: Console,
    pub state_dir: TempDir,
}

impl TestContext {
    /// # Panics
    ///
    /// Panics if the temp directory or console cannot be created.
    #[allow(clippy::unwrap_used)]
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let state_dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::new(&server.uri()).unwrap();
        config.state_dir = state_dir.path().to_path_buf();
        let console = Console::new(config).unwrap();
        Self {
            server,
            console,
            state_dir,
        }
    }

    /// Number of requests the mock API has seen.
    ///
    /// # Panics
    ///
    /// Panics if request recording is disabled.
    #[allow(clippy::unwrap_used)]
    pub async fn request_count(&self) -> usize {
        self.server.received_requests().await.unwrap().len()
    }
}

/// A shipment as the API returns it.
#[must_use]
pub fn shipment_json(id: i64, status: &str, total_price: i64) -> Value {
    json!({
        "id": id,
        "userId": 3,
        "status": status,
        "trackingNumber": format!("MOG{id:06}"),
        "totalPrice": total_price,
        "basePrice": total_price - 800,
        "fuelCharge": 500,
        "taxes": 300,
        "serviceLevel": "shipentegra-ups-ekspress",
        "sender": {
            "name": "Moog Istanbul", "address1": "Ataturk Cd. 1", "city": "Istanbul",
            "postalCode": "34000", "country": "TR"
        },
        "receiver": {
            "name": "Jane Doe", "address1": "500 Congress Ave", "city": "Austin",
            "state": "TX", "postalCode": "78701", "country": "US"
        },
        "packageWeight": 1.5,
        "packageLength": 30,
        "packageWidth": 20,
        "packageHeight": 10,
        "createdAt": "2026-03-01T10:00:00Z"
    })
}

/// A user as the API returns it.
#[must_use]
pub fn user_json(id: i64, balance: i64, approved: bool) -> Value {
    json!({
        "id": id,
        "username": format!("user{id}"),
        "name": format!("User {id}"),
        "role": "user",
        "balance": balance,
        "priceMultiplier": 1.25,
        "isApproved": approved
    })
}

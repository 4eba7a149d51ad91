//! The console: one API client, one cache, one notification log.
//!
//! Views and commands hold a cloned [`Console`]; every clone shares the same
//! cache, so all of them observe the same state.

use std::future::Future;
use std::sync::Arc;

use moogship_core::{
    CountryPriceMultiplier, PackageItem, Shipment, ShipmentId, ShipmentPage, User, UserId,
    WeightRangePriceMultiplier,
};
use tracing::instrument;

use crate::api::{ApiClient, ApiError};
use crate::cache::{
    Cached, Fetcher, KeyPart, QueryCache, QueryKey, QueryObserver, QueryOptions, erase,
};
use crate::config::ClientConfig;
use crate::mutation::{Mutations, PendingOperations};
use crate::notify::Notifications;

/// Entry point for queries and actions.
#[derive(Debug, Clone)]
pub struct Console {
    pub(crate) api: ApiClient,
    pub(crate) cache: QueryCache,
    pub(crate) notifications: Notifications,
    pub(crate) mutations: Mutations,
    config: Arc<ClientConfig>,
}

impl Console {
    /// Build a console with a fresh cache.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config)?;
        let cache = QueryCache::new(&config);
        cache.set_resolver(Arc::new({
            let api = api.clone();
            move |key: &QueryKey| loader(&api, key)
        }));
        let notifications = Notifications::default();
        let mutations = Mutations::new(cache.clone(), notifications.clone());

        Ok(Self {
            api,
            cache,
            notifications,
            mutations,
            config: Arc::new(config),
        })
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn cache(&self) -> &QueryCache {
        &self.cache
    }

    #[must_use]
    pub const fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    #[must_use]
    pub const fn pending(&self) -> &PendingOperations {
        self.mutations.pending()
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The signed-in user's shipments.
    ///
    /// # Errors
    ///
    /// Returns an `ApiError` if a fetch was needed and failed.
    pub async fn my_shipments(&self) -> Result<Arc<Vec<Shipment>>, ApiError> {
        self.cache
            .read(&QueryKey::my_shipments(), self.cache.options(), || {
                self.api.my_shipments()
            })
            .await
    }

    /// Every shipment (admin).
    ///
    /// # Errors
    ///
    /// Returns an `ApiError` if a fetch was needed and failed.
    pub async fn all_shipments(&self) -> Result<Arc<Vec<Shipment>>, ApiError> {
        self.cache
            .read(&QueryKey::all_shipments(), self.cache.options(), || {
                self.api.all_shipments()
            })
            .await
    }

    /// One server-side page of the admin list.
    ///
    /// # Errors
    ///
    /// Returns an `ApiError` if a fetch was needed and failed.
    pub async fn shipments_page(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<Arc<ShipmentPage>, ApiError> {
        self.cache
            .read(
                &QueryKey::shipments_page(page, limit),
                self.cache.options(),
                || self.api.shipments_page(page, limit),
            )
            .await
    }

    /// Package contents of a shipment.
    ///
    /// # Errors
    ///
    /// Returns an `ApiError` if a fetch was needed and failed.
    pub async fn shipment_items(&self, id: ShipmentId) -> Result<Arc<Vec<PackageItem>>, ApiError> {
        self.cache
            .read(&QueryKey::shipment_items(id), self.cache.options(), || {
                self.api.shipment_items(id)
            })
            .await
    }

    /// # Errors
    ///
    /// Returns an `ApiError` if a fetch was needed and failed.
    pub async fn users(&self) -> Result<Arc<Vec<User>>, ApiError> {
        self.cache
            .read(&QueryKey::users(), self.cache.options(), || self.api.users())
            .await
    }

    /// # Errors
    ///
    /// Returns an `ApiError` if a fetch was needed and failed.
    pub async fn country_multipliers(
        &self,
    ) -> Result<Arc<Vec<CountryPriceMultiplier>>, ApiError> {
        self.cache
            .read(&QueryKey::country_multipliers(), self.cache.options(), || {
                self.api.country_multipliers()
            })
            .await
    }

    /// # Errors
    ///
    /// Returns an `ApiError` if a fetch was needed and failed.
    pub async fn weight_multipliers(
        &self,
    ) -> Result<Arc<Vec<WeightRangePriceMultiplier>>, ApiError> {
        self.cache
            .read(&QueryKey::weight_multipliers(), self.cache.options(), || {
                self.api.weight_multipliers()
            })
            .await
    }

    /// Keep the user's shipment list live while the observer is held.
    #[must_use]
    pub fn observe_my_shipments(&self) -> QueryObserver<Vec<Shipment>> {
        let api = self.api.clone();
        self.cache.observe(
            QueryKey::my_shipments(),
            self.cache.options(),
            move || {
                let api = api.clone();
                async move { api.my_shipments().await }
            },
        )
    }

    /// Poll carrier tracking for a shipment while the observer is held.
    #[must_use]
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub fn observe_tracking(&self, id: ShipmentId) -> QueryObserver<Shipment> {
        let api = self.api.clone();
        let options = QueryOptions::new(self.config.tracking_poll)
            .with_refetch_interval(self.config.tracking_poll);
        self.cache
            .observe(QueryKey::tracking(id), options, move || {
                let api = api.clone();
                async move { api.track_shipment(id).await }
            })
    }

    // =========================================================================
    // Cached lookups
    // =========================================================================

    /// The cached copy of a shipment, from whichever list holds it.
    pub async fn cached_shipment(&self, id: ShipmentId) -> Option<Shipment> {
        for key in [QueryKey::my_shipments(), QueryKey::all_shipments()] {
            if let Some(list) = self.cache.get::<Vec<Shipment>>(&key).await
                && let Some(found) = list.iter().find(|s| s.id == id)
            {
                return Some(found.clone());
            }
        }
        for key in self.cache.keys_under(&QueryKey::all_shipments()) {
            if let Some(page) = self.cache.get::<ShipmentPage>(&key).await
                && let Some(found) = page.shipments.iter().find(|s| s.id == id)
            {
                return Some(found.clone());
            }
        }
        self.cache
            .get::<Shipment>(&QueryKey::tracking(id))
            .await
            .map(|s| Shipment::clone(&s))
    }

    /// The cached copy of a user.
    pub async fn cached_user(&self, id: UserId) -> Option<User> {
        self.cache
            .get::<Vec<User>>(&QueryKey::users())
            .await
            .and_then(|users| users.iter().find(|u| u.id == id).cloned())
    }

    /// Write `update` into every cached copy of a shipment.
    pub(crate) async fn patch_shipment<F>(&self, id: ShipmentId, update: F)
    where
        F: Fn(&Shipment) -> Shipment + Send + Sync,
    {
        let patch_list = |list: &Vec<Shipment>| -> Vec<Shipment> {
            list.iter()
                .map(|s| if s.id == id { update(s) } else { s.clone() })
                .collect()
        };

        self.cache
            .write_matching(&QueryKey::my_shipments(), &patch_list)
            .await;
        self.cache
            .write_matching(&QueryKey::all_shipments(), &patch_list)
            .await;
        self.cache
            .write_matching::<ShipmentPage, _>(&QueryKey::all_shipments(), |page| ShipmentPage {
                shipments: patch_list(&page.shipments),
                pagination: page.pagination,
            })
            .await;
        self.cache
            .write::<Shipment, _>(&QueryKey::tracking(id), |s| update(s))
            .await;
    }

    /// Write `update` into the cached user list.
    pub(crate) async fn patch_users<F>(&self, update: F)
    where
        F: FnOnce(&Vec<User>) -> Vec<User> + Send,
    {
        self.cache.write(&QueryKey::users(), update).await;
    }
}

/// Keys holding copies of a shipment.
pub(crate) fn shipment_keys(id: ShipmentId) -> [QueryKey; 3] {
    [
        QueryKey::my_shipments(),
        QueryKey::all_shipments(),
        QueryKey::tracking(id),
    ]
}


/// The API call that loads `key`, for keys the console caches.
fn loader(api: &ApiClient, key: &QueryKey) -> Option<Fetcher> {
    let api = api.clone();
    let fetcher = match key.parts() {
        [_] if *key == QueryKey::my_shipments() => {
            via(api, |api| async move { api.my_shipments().await })
        }
        [_] if *key == QueryKey::all_shipments() => {
            via(api, |api| async move { api.all_shipments().await })
        }
        [_] if *key == QueryKey::users() => via(api, |api| async move { api.users().await }),
        [_] if *key == QueryKey::country_multipliers() => {
            via(api, |api| async move { api.country_multipliers().await })
        }
        [_] if *key == QueryKey::weight_multipliers() => {
            via(api, |api| async move { api.weight_multipliers().await })
        }
        [_, KeyPart::Int(page), KeyPart::Int(limit)] => {
            let page = u32::try_from(*page).ok()?;
            let limit = u32::try_from(*limit).ok()?;
            if *key != QueryKey::shipments_page(page, limit) {
                return None;
            }
            via(api, move |api| async move {
                api.shipments_page(page, limit).await
            })
        }
        [_, KeyPart::Int(id)] => {
            let id = ShipmentId::new(*id);
            if *key == QueryKey::shipment_items(id) {
                via(api, move |api| async move { api.shipment_items(id).await })
            } else if *key == QueryKey::tracking(id) {
                via(api, move |api| async move { api.track_shipment(id).await })
            } else {
                return None;
            }
        }
        _ => return None,
    };
    Some(fetcher)
}

fn via<T, F, Fut>(api: ApiClient, call: F) -> Fetcher
where
    T: Cached,
    F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    erase(move || call(api.clone()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use moogship_core::ShipmentStatus;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn shipment_json(id: i64, status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id, "status": status, "totalPrice": 5000,
            "sender": {"name": "A", "address1": "x", "city": "Istanbul", "postalCode": "34000", "country": "TR"},
            "receiver": {"name": "B", "address1": "y", "city": "Austin", "postalCode": "78701", "country": "US"},
            "createdAt": "2026-03-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_patch_reaches_every_copy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/shipments/my"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(vec![shipment_json(7, "pending")]),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/shipments/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "shipments": [shipment_json(7, "pending"), shipment_json(8, "pending")],
                "pagination": {"page": 1, "limit": 25, "total": 2, "totalPages": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let console = Console::new(ClientConfig::new(&server.uri()).unwrap()).unwrap();
        console.my_shipments().await.unwrap();
        console.shipments_page(1, 25).await.unwrap();

        let id = ShipmentId::new(7);
        console
            .patch_shipment(id, |s| s.with_status(ShipmentStatus::Cancelled))
            .await;

        let mine = console.my_shipments().await.unwrap();
        assert_eq!(mine[0].status, ShipmentStatus::Cancelled);
        let page = console.shipments_page(1, 25).await.unwrap();
        assert_eq!(page.shipments[0].status, ShipmentStatus::Cancelled);
        assert_eq!(page.shipments[1].status, ShipmentStatus::Pending);
        assert_eq!(
            console.cached_shipment(id).await.unwrap().status,
            ShipmentStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_loader_covers_cached_keys() {
        let server = MockServer::start().await;
        let api = ApiClient::new(&ClientConfig::new(&server.uri()).unwrap()).unwrap();
        let id = ShipmentId::new(7);
        for key in [
            QueryKey::my_shipments(),
            QueryKey::all_shipments(),
            QueryKey::shipments_page(2, 25),
            QueryKey::shipment_items(id),
            QueryKey::tracking(id),
            QueryKey::users(),
            QueryKey::country_multipliers(),
            QueryKey::weight_multipliers(),
        ] {
            assert!(loader(&api, &key).is_some(), "{key}");
        }
        assert!(loader(&api, &QueryKey::tracking_root()).is_none());
        assert!(loader(&api, &QueryKey::new("/api/unknown")).is_none());
    }

    #[tokio::test]
    async fn test_page_loader_requests_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/shipments/all"))
            .and(query_param("page", "2"))
            .and(query_param("limit", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "shipments": [shipment_json(9, "pending")],
                "pagination": {"page": 2, "limit": 25, "total": 26, "totalPages": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;
        let api = ApiClient::new(&ClientConfig::new(&server.uri()).unwrap()).unwrap();

        let fetcher = loader(&api, &QueryKey::shipments_page(2, 25)).unwrap();
        let value = fetcher().await.unwrap();
        let page = ShipmentPage::from_value(&value).unwrap();
        assert_eq!(page.shipments[0].id, ShipmentId::new(9));
    }

    #[tokio::test]
    async fn test_cached_shipment_without_network() {
        let server = MockServer::start().await;
        let console = Console::new(ClientConfig::new(&server.uri()).unwrap()).unwrap();
        assert!(console.cached_shipment(ShipmentId::new(1)).await.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}

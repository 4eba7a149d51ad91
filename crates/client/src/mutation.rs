//! Optimistic mutation orchestration.
//!
//! Every console action runs the same protocol:
//!
//! 1. Check preconditions against cached state; on failure notify and stop
//!    without a request ([`Mutations::reject`]).
//! 2. Patch every cached copy of the entity.
//! 3. Send the request.
//! 4. On success, invalidate the patched keys so the server's state
//!    replaces the patch. On failure, refetch them right away and drop any
//!    that cannot be reloaded. Then notify.
//!
//! Rollback is a refetch, never a reverse patch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tracing::{info, warn};

use crate::api::ApiError;
use crate::cache::{QueryCache, QueryKey};
use crate::error::{MutationError, ValidationError};
use crate::notify::Notifications;

/// A user-triggered state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CancelShipment,
    RequestTracking,
    RefreshTracking,
    DownloadLabel,
    UploadInvoice,
    DeleteInvoice,
    ChangePrice,
    BatchPrint,
    BatchPickup,
    ApproveUser,
    RejectUser,
    UpdateUser,
    AddBalance,
    SetBalance,
    SetMinimumBalance,
    DeleteUser,
    CreateCountryRule,
    UpdateCountryRule,
    DeleteCountryRule,
    CreateWeightRule,
    UpdateWeightRule,
    DeleteWeightRule,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CancelShipment => "cancel_shipment",
            Self::RequestTracking => "request_tracking",
            Self::RefreshTracking => "refresh_tracking",
            Self::DownloadLabel => "download_label",
            Self::UploadInvoice => "upload_invoice",
            Self::DeleteInvoice => "delete_invoice",
            Self::ChangePrice => "change_price",
            Self::BatchPrint => "batch_print",
            Self::BatchPickup => "batch_pickup",
            Self::ApproveUser => "approve_user",
            Self::RejectUser => "reject_user",
            Self::UpdateUser => "update_user",
            Self::AddBalance => "add_balance",
            Self::SetBalance => "set_balance",
            Self::SetMinimumBalance => "set_minimum_balance",
            Self::DeleteUser => "delete_user",
            Self::CreateCountryRule => "create_country_rule",
            Self::UpdateCountryRule => "update_country_rule",
            Self::DeleteCountryRule => "delete_country_rule",
            Self::CreateWeightRule => "create_weight_rule",
            Self::UpdateWeightRule => "update_weight_rule",
            Self::DeleteWeightRule => "delete_weight_rule",
        }
    }

    /// Title of the success notification.
    #[must_use]
    pub const fn success_title(self) -> &'static str {
        match self {
            Self::CancelShipment => "Shipment cancelled",
            Self::RequestTracking => "Tracking requested",
            Self::RefreshTracking => "Tracking updated",
            Self::DownloadLabel => "Label downloaded",
            Self::UploadInvoice => "Invoice uploaded",
            Self::DeleteInvoice => "Invoice deleted",
            Self::ChangePrice => "Price updated",
            Self::BatchPrint => "Labels ready",
            Self::BatchPickup => "Pickup scheduled",
            Self::ApproveUser => "User approved",
            Self::RejectUser => "User rejected",
            Self::UpdateUser => "User updated",
            Self::AddBalance | Self::SetBalance => "Balance updated",
            Self::SetMinimumBalance => "Minimum balance updated",
            Self::DeleteUser => "User deleted",
            Self::CreateCountryRule | Self::CreateWeightRule => "Pricing rule created",
            Self::UpdateCountryRule | Self::UpdateWeightRule => "Pricing rule updated",
            Self::DeleteCountryRule | Self::DeleteWeightRule => "Pricing rule deleted",
        }
    }

    /// Title of the error notification.
    #[must_use]
    pub const fn failure_title(self) -> &'static str {
        match self {
            Self::CancelShipment => "Could not cancel shipment",
            Self::RequestTracking | Self::RefreshTracking => "Could not update tracking",
            Self::DownloadLabel => "Could not download label",
            Self::UploadInvoice => "Could not upload invoice",
            Self::DeleteInvoice => "Could not delete invoice",
            Self::ChangePrice => "Could not update price",
            Self::BatchPrint => "Could not print labels",
            Self::BatchPickup => "Could not schedule pickup",
            Self::ApproveUser | Self::RejectUser | Self::UpdateUser | Self::DeleteUser => {
                "Could not update user"
            }
            Self::AddBalance | Self::SetBalance | Self::SetMinimumBalance => {
                "Could not update balance"
            }
            Self::CreateCountryRule
            | Self::UpdateCountryRule
            | Self::DeleteCountryRule
            | Self::CreateWeightRule
            | Self::UpdateWeightRule
            | Self::DeleteWeightRule => "Could not save pricing rule",
        }
    }
}

/// Lifecycle of one mutation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationState {
    #[default]
    Idle,
    /// Patch applied, request in flight.
    Optimistic,
    Committed,
    /// Request failed; cached state was refetched.
    RolledBack,
}

impl MutationState {
    /// Whether `self -> next` is a legal step.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Idle | Self::Committed | Self::RolledBack,
                Self::Optimistic
            ) | (Self::Optimistic, Self::Committed | Self::RolledBack)
        )
    }

    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Optimistic)
    }
}

/// Identifies one action on one entity (a row or a dialog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub action: Action,
    /// Entity id, or 0 for actions over a selection.
    pub target: i64,
}

impl OperationKey {
    #[must_use]
    pub fn new(action: Action, target: impl Into<i64>) -> Self {
        Self {
            action,
            target: target.into(),
        }
    }
}

/// Per-operation mutation state, for row and dialog spinners.
#[derive(Debug, Clone, Default)]
pub struct PendingOperations {
    inner: Arc<Mutex<HashMap<OperationKey, MutationState>>>,
}

impl PendingOperations {
    #[must_use]
    pub fn state_of(&self, key: OperationKey) -> MutationState {
        self.lock().get(&key).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn is_pending(&self, key: OperationKey) -> bool {
        self.state_of(key).is_in_flight()
    }

    /// Actions currently in flight for an entity.
    #[must_use]
    pub fn in_flight_for(&self, target: i64) -> Vec<Action> {
        self.lock()
            .iter()
            .filter(|(key, state)| key.target == target && state.is_in_flight())
            .map(|(key, _)| key.action)
            .collect()
    }

    fn transition(&self, key: OperationKey, next: MutationState) -> Result<(), ValidationError> {
        let mut states = self.lock();
        let current = states.get(&key).copied().unwrap_or_default();
        if !current.can_transition(next) {
            return Err(ValidationError::AlreadyInFlight);
        }
        states.insert(key, next);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OperationKey, MutationState>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What a mutation touches.
#[derive(Debug, Clone)]
pub struct MutationPlan {
    pub key: OperationKey,
    /// Keys refetched once the request settles.
    pub invalidates: Vec<QueryKey>,
}

impl MutationPlan {
    #[must_use]
    pub fn new(action: Action, target: impl Into<i64>) -> Self {
        Self {
            key: OperationKey::new(action, target),
            invalidates: Vec::new(),
        }
    }

    #[must_use]
    pub fn invalidates(mut self, key: QueryKey) -> Self {
        if !self.invalidates.contains(&key) {
            self.invalidates.push(key);
        }
        self
    }
}

/// Runs mutations against a shared cache.
#[derive(Debug, Clone)]
pub struct Mutations {
    cache: QueryCache,
    notifications: Notifications,
    pending: PendingOperations,
}

impl Mutations {
    #[must_use]
    pub fn new(cache: QueryCache, notifications: Notifications) -> Self {
        Self {
            cache,
            notifications,
            pending: PendingOperations::default(),
        }
    }

    #[must_use]
    pub const fn pending(&self) -> &PendingOperations {
        &self.pending
    }

    /// Abort before any request: notify and return the validation error.
    ///
    /// # Errors
    ///
    /// Always returns `err` as a [`MutationError::Validation`].
    pub fn reject<T>(&self, action: Action, err: ValidationError) -> Result<T, MutationError> {
        warn!(action = action.as_str(), error = %err, "Mutation rejected before request");
        self.notifications
            .error(action.failure_title(), err.to_string());
        Err(err.into())
    }

    /// Run the patch, then the request, then reconcile.
    ///
    /// `patch` and `call` are lazy futures; nothing happens until this runs
    /// them. `describe` builds the success notification's description.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInFlight` if the same operation is running, or the
    /// request's error after the cache has been reconciled.
    pub async fn run<T, P, C, D>(
        &self,
        plan: MutationPlan,
        patch: P,
        call: C,
        describe: D,
    ) -> Result<T, MutationError>
    where
        P: Future<Output = ()>,
        C: Future<Output = Result<T, ApiError>>,
        D: FnOnce(&T) -> Option<String>,
    {
        let action = plan.key.action;
        if let Err(err) = self
            .pending
            .transition(plan.key, MutationState::Optimistic)
        {
            return self.reject(action, err);
        }

        patch.await;
        match call.await {
            Ok(value) => {
                self.reconcile(&plan.invalidates).await;
                self.settle(plan.key, MutationState::Committed);
                info!(action = action.as_str(), target = plan.key.target, "Mutation committed");
                self.notifications
                    .success(action.success_title(), describe(&value));
                Ok(value)
            }
            Err(err) => {
                self.rollback(&plan.invalidates).await;
                self.settle(plan.key, MutationState::RolledBack);
                warn!(
                    action = action.as_str(),
                    target = plan.key.target,
                    error = %err,
                    "Mutation rolled back"
                );
                self.notifications
                    .error(action.failure_title(), err.message());
                Err(err.into())
            }
        }
    }

    async fn reconcile(&self, keys: &[QueryKey]) {
        join_all(keys.iter().map(|key| self.cache.invalidate(key))).await;
    }

    /// Replace the optimistic patch with server state before the failure is
    /// reported; keys that cannot be reloaded are dropped.
    async fn rollback(&self, keys: &[QueryKey]) {
        join_all(keys.iter().map(|key| self.cache.refetch(key))).await;
    }

    fn settle(&self, key: OperationKey, state: MutationState) {
        // Optimistic -> terminal is always legal
        let _ = self.pending.transition(key, state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use moogship_core::{Shipment, ShipmentId, ShipmentStatus};

    use super::*;
    use crate::cache::QueryOptions;
    use crate::notify::NotificationKind;

    fn setup() -> (Mutations, QueryCache, Notifications) {
        let cache =
            QueryCache::with_settings(100, Duration::from_secs(300), QueryOptions::default());
        let notifications = Notifications::default();
        (
            Mutations::new(cache.clone(), notifications.clone()),
            cache,
            notifications,
        )
    }

    fn shipment(id: i64, status: &str) -> Shipment {
        serde_json::from_value(serde_json::json!({
            "id": id, "status": status, "totalPrice": 5000,
            "sender": {"name": "A", "address1": "x", "city": "Istanbul", "postalCode": "34000", "country": "TR"},
            "receiver": {"name": "B", "address1": "y", "city": "Austin", "postalCode": "78701", "country": "US"},
            "createdAt": "2026-03-01T10:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_state_machine() {
        use MutationState::{Committed, Idle, Optimistic, RolledBack};
        assert!(Idle.can_transition(Optimistic));
        assert!(Optimistic.can_transition(Committed));
        assert!(Optimistic.can_transition(RolledBack));
        assert!(Committed.can_transition(Optimistic));
        assert!(!Idle.can_transition(Committed));
        assert!(!Optimistic.can_transition(Optimistic));
        assert!(!RolledBack.can_transition(Committed));
    }

    #[tokio::test]
    async fn test_success_invalidates_and_notifies() {
        let (mutations, cache, notifications) = setup();
        let key = QueryKey::my_shipments();
        cache.set(&key, vec![shipment(7, "pending")]).await;

        let plan = MutationPlan::new(Action::CancelShipment, ShipmentId::new(7))
            .invalidates(key.clone());
        let patch = async {
            cache
                .write::<Vec<Shipment>, _>(&key, |old| {
                    old.iter()
                        .map(|s| s.with_status(ShipmentStatus::Cancelled))
                        .collect()
                })
                .await;
        };
        let result = mutations
            .run(plan.clone(), patch, async { Ok(()) }, |()| None)
            .await;

        assert!(result.is_ok());
        assert!(cache.is_stale(&key).await);
        assert_eq!(
            mutations.pending().state_of(plan.key),
            MutationState::Committed
        );
        let latest = notifications.latest().unwrap();
        assert_eq!(latest.kind, NotificationKind::Success);
        assert_eq!(latest.title, "Shipment cancelled");
    }

    #[tokio::test]
    async fn test_failure_rolls_back_with_server_message() {
        let (mutations, _cache, notifications) = setup();
        let plan = MutationPlan::new(Action::ApproveUser, 5_i64);

        let result: Result<(), _> = mutations
            .run(
                plan.clone(),
                async {},
                async {
                    Err(ApiError::Status {
                        status: 409,
                        message: "User already approved".to_string(),
                    })
                },
                |()| None,
            )
            .await;

        assert!(matches!(result, Err(MutationError::Api(_))));
        assert_eq!(
            mutations.pending().state_of(plan.key),
            MutationState::RolledBack
        );
        let latest = notifications.latest().unwrap();
        assert_eq!(latest.kind, NotificationKind::Error);
        assert_eq!(latest.description.as_deref(), Some("User already approved"));
    }

    #[tokio::test]
    async fn test_failure_removes_patch_that_cannot_be_reloaded() {
        let (mutations, cache, _notifications) = setup();
        let key = QueryKey::my_shipments();
        cache.set(&key, vec![shipment(7, "pending")]).await;

        let plan = MutationPlan::new(Action::CancelShipment, ShipmentId::new(7))
            .invalidates(key.clone());
        let patch = async {
            cache
                .write::<Vec<Shipment>, _>(&key, |old| {
                    old.iter()
                        .map(|s| s.with_status(ShipmentStatus::Cancelled))
                        .collect()
                })
                .await;
        };
        let result: Result<(), _> = mutations
            .run(
                plan,
                patch,
                async {
                    Err(ApiError::Status {
                        status: 503,
                        message: "Service unavailable".to_string(),
                    })
                },
                |()| None,
            )
            .await;

        assert!(result.is_err());
        assert!(cache.get::<Vec<Shipment>>(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_in_flight_operation_is_rejected() {
        let (mutations, _cache, _notifications) = setup();
        let key = OperationKey::new(Action::UploadInvoice, 4_i64);
        mutations
            .pending()
            .transition(key, MutationState::Optimistic)
            .unwrap();
        assert!(mutations.pending().is_pending(key));
        assert_eq!(
            mutations.pending().in_flight_for(4),
            vec![Action::UploadInvoice]
        );

        let called = std::sync::atomic::AtomicBool::new(false);
        let result: Result<(), _> = mutations
            .run(
                MutationPlan::new(Action::UploadInvoice, 4_i64),
                async {},
                async {
                    called.store(true, std::sync::atomic::Ordering::SeqCst);
                    Ok(())
                },
                |()| None,
            )
            .await;

        assert!(matches!(
            result,
            Err(MutationError::Validation(ValidationError::AlreadyInFlight))
        ));
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }
}

//! User administration endpoints.

use moogship_core::{Cents, PriceMultiplier, User, UserId, UserRole};
use reqwest::Method;
use serde::Serialize;
use tracing::instrument;

use super::{ApiClient, ApiError};

pub(crate) const USERS_PATH: &str = "/api/users";

/// Partial update of a user. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_multiplier: Option<PriceMultiplier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_access_carrier_labels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_access_return_system: Option<bool>,
}

impl UserPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Copy of `user` with this patch applied.
    #[must_use]
    pub fn apply(&self, user: &User) -> User {
        let mut next = user.clone();
        if let Some(name) = &self.name {
            next.name = Some(name.clone());
        }
        if let Some(email) = &self.email {
            next.email = Some(email.clone());
        }
        if let Some(role) = self.role {
            next.role = role;
        }
        if let Some(multiplier) = self.price_multiplier {
            next.price_multiplier = multiplier;
        }
        if let Some(flag) = self.can_access_carrier_labels {
            next.can_access_carrier_labels = flag;
        }
        if let Some(flag) = self.can_access_return_system {
            next.can_access_return_system = flag;
        }
        next
    }
}

#[derive(Serialize)]
struct RejectBody<'a> {
    reason: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceAddBody {
    user_id: UserId,
    amount: Cents,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceSetBody {
    user_id: UserId,
    balance: Cents,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MinimumBalanceBody {
    /// `null` restores the system default.
    minimum_balance: Option<Cents>,
}

impl ApiClient {
    /// `GET /api/users`
    #[instrument(skip(self))]
    pub async fn users(&self) -> Result<Vec<User>, ApiError> {
        self.get_json(self.url(USERS_PATH)?).await
    }

    /// `POST /api/users/{id}/approve`
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn approve_user(&self, id: UserId) -> Result<User, ApiError> {
        self.send_json::<(), _>(
            Method::POST,
            self.url(&format!("/api/users/{id}/approve"))?,
            None,
        )
        .await
    }

    /// `POST /api/users/{id}/reject`
    #[instrument(skip(self, reason), fields(user_id = %id))]
    pub async fn reject_user(&self, id: UserId, reason: &str) -> Result<User, ApiError> {
        self.send_json(
            Method::POST,
            self.url(&format!("/api/users/{id}/reject"))?,
            Some(&RejectBody { reason }),
        )
        .await
    }

    /// `PATCH /api/users/{id}`
    #[instrument(skip(self, patch), fields(user_id = %id))]
    pub async fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<User, ApiError> {
        self.send_json(
            Method::PATCH,
            self.url(&format!("/api/users/{id}"))?,
            Some(patch),
        )
        .await
    }

    /// `POST /api/balance/add` - add a signed amount to a user's balance.
    #[instrument(skip(self), fields(user_id = %id, amount = %amount))]
    pub async fn add_balance(&self, id: UserId, amount: Cents) -> Result<User, ApiError> {
        self.send_json(
            Method::POST,
            self.url("/api/balance/add")?,
            Some(&BalanceAddBody {
                user_id: id,
                amount,
            }),
        )
        .await
    }

    /// `POST /api/balance/set`
    #[instrument(skip(self), fields(user_id = %id, balance = %balance))]
    pub async fn set_balance(&self, id: UserId, balance: Cents) -> Result<User, ApiError> {
        self.send_json(
            Method::POST,
            self.url("/api/balance/set")?,
            Some(&BalanceSetBody {
                user_id: id,
                balance,
            }),
        )
        .await
    }

    /// `POST /api/users/{id}/min-balance`
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn set_minimum_balance(
        &self,
        id: UserId,
        minimum: Option<Cents>,
    ) -> Result<User, ApiError> {
        self.send_json(
            Method::POST,
            self.url(&format!("/api/users/{id}/min-balance"))?,
            Some(&MinimumBalanceBody {
                minimum_balance: minimum,
            }),
        )
        .await
    }

    /// `DELETE /api/users/{id}`
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: UserId) -> Result<(), ApiError> {
        self.send_unit::<()>(Method::DELETE, self.url(&format!("/api/users/{id}"))?, None)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ClientConfig;

    fn user_json(balance: i64) -> serde_json::Value {
        serde_json::json!({"id": 5, "username": "mehmet", "balance": balance})
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = UserPatch {
            can_access_carrier_labels: Some(true),
            ..UserPatch::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"canAccessCarrierLabels": true})
        );
        assert!(UserPatch::default().is_empty());
    }

    #[tokio::test]
    async fn test_clear_minimum_balance_sends_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/5/min-balance"))
            .and(body_json(serde_json::json!({"minimumBalance": null})))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json(0)))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(&ClientConfig::new(&server.uri()).unwrap()).unwrap();
        api.set_minimum_balance(UserId::new(5), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_balance_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/balance/add"))
            .and(body_json(serde_json::json!({"userId": 5, "amount": -2500})))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json(7500)))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(&ClientConfig::new(&server.uri()).unwrap()).unwrap();
        let user = api
            .add_balance(UserId::new(5), Cents::new(-2_500))
            .await
            .unwrap();
        assert_eq!(user.balance, Cents::new(7_500));
    }
}

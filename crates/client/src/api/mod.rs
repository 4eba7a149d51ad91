//! Remote resource client for the MoogShip HTTP API.
//!
//! # Architecture
//!
//! - Thin typed wrappers over `reqwest`; every call carries the session cookie
//! - Non-2xx responses become [`ApiError`] carrying the server's `message`
//! - The client never touches the query cache
//!
//! # Example
//!
//! ```rust,ignore
//! use moogship_client::{ApiClient, ClientConfig};
//!
//! let api = ApiClient::new(&ClientConfig::from_env()?)?;
//! let shipments = api.my_shipments().await?;
//! let shipment = api.cancel_shipment(shipments[0].id).await?;
//! ```

mod pricing;
mod shipments;
mod users;

pub use shipments::{
    BatchPickupRequest, BatchPrintResponse, InvoiceFile, Label, PriceChange,
};
pub use users::UserPatch;

pub(crate) use pricing::{COUNTRY_MULTIPLIERS_PATH, WEIGHT_MULTIPLIERS_PATH};
pub(crate) use shipments::{ALL_SHIPMENTS_PATH, MY_SHIPMENTS_PATH};
pub(crate) use users::USERS_PATH;

use std::sync::Arc;

use reqwest::header::{ACCEPT, COOKIE, HeaderValue, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::ClientConfig;

/// Maximum number of body characters included in error logs.
const LOG_BODY_LIMIT: usize = 500;

/// Errors that can occur when talking to the MoogShip API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// Session missing or expired.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the API. Carries the server's `message`, if any.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimited {
        retry_after: u64,
        message: Option<String>,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Text suitable for an error notification.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Status { message, .. } | Self::Unauthorized(message) => message.clone(),
            Self::RateLimited {
                message: Some(message),
                ..
            } => message.clone(),
            Self::RateLimited {
                retry_after,
                message: None,
            } => format!("Too many requests, please retry in {retry_after} seconds"),
            Self::Parse(_) => "Unexpected response from server".to_string(),
            Self::Http(err) if err.is_timeout() => "Request timed out".to_string(),
            Self::Http(_) | Self::Url(_) => self.to_string(),
        }
    }

    /// HTTP status of the failed response, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(401),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

/// Error body shape returned by the API.
#[derive(serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// The non-blank `message` field of an error body.
fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}

/// Pull the `message` field out of an error body, or fall back to a generic
/// message.
fn error_message(status: StatusCode, body: &str) -> String {
    server_message(body)
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
}

fn truncated(body: &str) -> String {
    body.chars().take(LOG_BODY_LIMIT).collect()
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the MoogShip API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session_cookie: Option<SecretString>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("moogship-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                session_cookie: config.session_cookie.clone(),
            }),
        })
    }

    /// Resolve an API path (`/api/shipments/my`) against the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Start a request with session credentials and a request id.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self
            .inner
            .client
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header("x-request-id", uuid::Uuid::new_v4().to_string());

        if let Some(cookie) = &self.inner.session_cookie
            && let Ok(mut value) = HeaderValue::from_str(cookie.expose_secret())
        {
            value.set_sensitive(true);
            builder = builder.header(COOKIE, value);
        }
        builder
    }

    /// Send a request and turn non-success statuses into errors.
    async fn execute(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            let body = response.text().await.unwrap_or_default();
            warn!(retry_after, body = %truncated(&body), "MoogShip API rate limited");
            return Err(ApiError::RateLimited {
                retry_after,
                message: server_message(&body),
            });
        }

        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);

        error!(
            status = %status,
            path = %url,
            body = %truncated(&body),
            "MoogShip API returned non-success status"
        );

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized(message));
        }
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Decode a JSON response body.
    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            error!(
                error = %e,
                body = %truncated(&text),
                "Failed to parse MoogShip API response"
            );
            ApiError::Parse(e)
        })
    }

    /// `GET` a JSON resource.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        debug!(url = %url.path(), "GET");
        let response = self.execute(self.request(Method::GET, url)).await?;
        Self::parse(response).await
    }

    /// Send a JSON body (or none) and decode the JSON response.
    pub(crate) async fn send_json<B, T>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method = %method, url = %url.path(), "send");
        let mut builder = self.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.execute(builder).await?;
        Self::parse(response).await
    }

    /// Send a request whose response body is not needed.
    pub(crate) async fn send_unit<B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        debug!(method = %method, url = %url.path(), "send");
        let mut builder = self.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.execute(builder).await.map(drop)
    }

    /// Upload a multipart form.
    ///
    /// The content type is left to `reqwest` so the boundary is filled in.
    pub(crate) async fn upload<T: DeserializeOwned>(
        &self,
        url: Url,
        form: reqwest::multipart::Form,
    ) -> Result<T, ApiError> {
        debug!(url = %url.path(), "upload");
        let response = self
            .execute(self.request(Method::POST, url).multipart(form))
            .await?;
        Self::parse(response).await
    }

    /// `GET` a binary resource; returns the body and its content type.
    pub(crate) async fn get_bytes(&self, url: Url) -> Result<(Vec<u8>, Option<String>), ApiError> {
        debug!(url = %url.path(), "GET bytes");
        let response = self.execute(self.request(Method::GET, url)).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn client(server: &MockServer) -> ApiClient {
        let mut config = ClientConfig::new(&server.uri()).unwrap();
        config.session_cookie = Some(SecretString::from("connect.sid=s%3Aabc"));
        ApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_error_message_fallback() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"Shipment already approved"}"#),
            "Shipment already approved"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            "Request failed with status 502"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":""}"#),
            "Request failed with status 400"
        );
    }

    #[tokio::test]
    async fn test_sends_cookie_and_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ping"))
            .and(header("cookie", "connect.sid=s%3Aabc"))
            .and(header_exists("x-request-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).await;
        let body: serde_json::Value = api.get_json(api.url("/api/ping").unwrap()).await.unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_status_error_carries_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/shipments/3/cancel"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"message": "Shipment cannot be cancelled"})),
            )
            .mount(&server)
            .await;

        let api = client(&server).await;
        let err = api
            .send_json::<(), serde_json::Value>(
                Method::POST,
                api.url("/api/shipments/3/cancel").unwrap(),
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.message(), "Shipment cannot be cancelled");
    }

    #[tokio::test]
    async fn test_unauthorized_and_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(path("/api/users"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(path("/api/shipments/all"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let api = client(&server).await;
        let err = api
            .get_json::<serde_json::Value>(api.url("/api/users").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Request failed with status 401"));

        let err = api
            .get_json::<serde_json::Value>(api.url("/api/shipments/all").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::RateLimited {
                retry_after: 7,
                message: None
            }
        ));
        assert_eq!(err.message(), "Too many requests, please retry in 7 seconds");
    }

    #[tokio::test]
    async fn test_rate_limited_keeps_server_message() {
        let server = MockServer::start().await;
        Mock::given(path("/api/shipments/5/cancel"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "5")
                    .set_body_json(serde_json::json!({"message": "Slow down"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).await;
        let err = api
            .send_json::<(), serde_json::Value>(
                Method::POST,
                api.url("/api/shipments/5/cancel").unwrap(),
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.message(), "Slow down");
        assert!(matches!(err, ApiError::RateLimited { retry_after: 5, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/shipments/my"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let api = client(&server).await;
        let err = api
            .get_json::<serde_json::Value>(api.url("/api/shipments/my").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
        assert_eq!(err.message(), "Unexpected response from server");
    }
}

//! MoogShip Client - data synchronisation for the MoogShip console.
//!
//! # Architecture
//!
//! ```text
//! view -> action -> [optimistic cache patch] -> ApiClient -> API
//!                                                   |
//!        view <- [cache invalidation/refetch] <-----+
//! ```
//!
//! - [`api`] - Typed requests against the MoogShip HTTP API
//! - [`cache`] - Keyed query cache with observers, polling and invalidation
//! - [`mutation`] - The optimistic mutation protocol and per-operation state
//! - [`Console`] - Facade owning one API client, cache and notification log;
//!   every action is a method on it
//! - [`views`] - Table, detail and tracking view models read from the cache
//! - [`selection`] - Persisted bulk-action selection
//!
//! # Example
//!
//! ```rust,ignore
//! use moogship_client::{ClientConfig, Console};
//! use moogship_core::ShipmentId;
//!
//! let console = Console::new(ClientConfig::from_env()?)?;
//! console.my_shipments().await?;
//! console.cancel_shipment(ShipmentId::new(7)).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod actions;
pub mod api;
pub mod cache;
pub mod config;
pub mod console;
pub mod error;
pub mod mutation;
pub mod notify;
pub mod selection;
pub mod views;

pub use api::{ApiClient, ApiError, InvoiceFile, Label, PriceChange, UserPatch};
pub use cache::{QueryCache, QueryKey, QueryObserver, QueryOptions};
pub use config::{ClientConfig, ConfigError};
pub use console::Console;
pub use error::{MAX_INVOICE_BYTES, MutationError, ValidationError};
pub use mutation::{Action, MutationState, OperationKey, PendingOperations};
pub use notify::{Notification, NotificationKind, Notifications};
pub use selection::{SelectionError, SelectionStore};

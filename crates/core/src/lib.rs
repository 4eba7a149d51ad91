//! MoogShip Core - Shared types library.
//!
//! This crate provides the types shared by every MoogShip console component:
//! - `client` - API client, query cache and optimistic mutations
//! - `cli` - Operator command line over the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no caches. Everything here can be unit tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, integer-cent money, price multipliers and statuses
//! - [`models`] - Shipment, user and pricing-rule records as the API returns them
//! - [`format`] - Display helpers (currency, padded ids, service names, tracking URLs)
//! - [`tracking`] - Defensive parsing of carrier tracking payloads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod format;
pub mod models;
pub mod tracking;
pub mod types;

pub use models::*;
pub use types::*;

//! Console actions.
//!
//! Each action is an `impl Console` method that checks its preconditions
//! against cached state, patches every cached copy, sends the request and
//! reconciles through [`crate::mutation::Mutations::run`].

mod pricing;
mod shipments;
mod users;

pub use shipments::{validate_invoice, validate_pickup_date};

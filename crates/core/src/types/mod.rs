//! Core types for MoogShip.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod status;

pub use id::*;
pub use money::{Cents, MoneyError, MultiplierError, PriceMultiplier};
pub use status::*;

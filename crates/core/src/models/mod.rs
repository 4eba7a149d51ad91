//! Records exchanged with the MoogShip API.

pub mod pricing;
pub mod shipment;
pub mod user;

pub use pricing::{
    CountryMultiplierInput, CountryPriceMultiplier, RuleError, WeightRangeInput,
    WeightRangePriceMultiplier,
};
pub use shipment::{
    Address, Package, PackageItem, PageMeta, Shipment, ShipmentPage, TrackingRef,
};
pub use user::{ApprovalState, User};

//! Cache value types.

use std::sync::Arc;

use moogship_core::{
    CountryPriceMultiplier, PackageItem, Shipment, ShipmentPage, User, WeightRangePriceMultiplier,
};

/// Cached value types.
///
/// Values are shared behind `Arc` and never mutated in place; writes replace
/// the whole value.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Shipments(Arc<Vec<Shipment>>),
    ShipmentPage(Arc<ShipmentPage>),
    Shipment(Arc<Shipment>),
    Items(Arc<Vec<PackageItem>>),
    Users(Arc<Vec<User>>),
    CountryMultipliers(Arc<Vec<CountryPriceMultiplier>>),
    WeightMultipliers(Arc<Vec<WeightRangePriceMultiplier>>),
}

/// A type that can live in the query cache.
pub trait Cached: Send + Sync + Sized + 'static {
    fn into_value(value: Arc<Self>) -> CacheValue;

    /// The typed value, or `None` if the entry holds a different type.
    fn from_value(value: &CacheValue) -> Option<Arc<Self>>;
}

macro_rules! cached {
    ($ty:ty => $variant:ident) => {
        impl Cached for $ty {
            fn into_value(value: Arc<Self>) -> CacheValue {
                CacheValue::$variant(value)
            }

            fn from_value(value: &CacheValue) -> Option<Arc<Self>> {
                match value {
                    CacheValue::$variant(v) => Some(Arc::clone(v)),
                    _ => None,
                }
            }
        }
    };
}

cached!(Vec<Shipment> => Shipments);
cached!(ShipmentPage => ShipmentPage);
cached!(Shipment => Shipment);
cached!(Vec<PackageItem> => Items);
cached!(Vec<User> => Users);
cached!(Vec<CountryPriceMultiplier> => CountryMultipliers);
cached!(Vec<WeightRangePriceMultiplier> => WeightMultipliers);

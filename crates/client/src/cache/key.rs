//! Hierarchical query keys.

use std::fmt;

use moogship_core::ShipmentId;

use crate::api::{
    ALL_SHIPMENTS_PATH, COUNTRY_MULTIPLIERS_PATH, MY_SHIPMENTS_PATH, USERS_PATH,
    WEIGHT_MULTIPLIERS_PATH,
};

/// One segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Path(String),
    Int(i64),
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        Self::Path(s.to_string())
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for KeyPart {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<ShipmentId> for KeyPart {
    fn from(id: ShipmentId) -> Self {
        Self::Int(id.as_i64())
    }
}

/// Identifies a cached query, e.g. `["/api/shipments/track", 7]`.
///
/// Invalidating a key also invalidates every key it is a prefix of, so
/// `["/api/shipments/all"]` covers each cached page of the admin list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    #[must_use]
    pub fn new(root: &str) -> Self {
        Self(vec![KeyPart::from(root)])
    }

    /// Extend the key with another segment.
    #[must_use]
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    #[must_use]
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Whether `self` is `other` or one of its ancestors.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }

    #[must_use]
    pub fn my_shipments() -> Self {
        Self::new(MY_SHIPMENTS_PATH)
    }

    #[must_use]
    pub fn all_shipments() -> Self {
        Self::new(ALL_SHIPMENTS_PATH)
    }

    /// One page of the server-paginated admin list.
    #[must_use]
    pub fn shipments_page(page: u32, limit: u32) -> Self {
        Self::all_shipments().with(page).with(limit)
    }

    #[must_use]
    pub fn shipment_items(id: ShipmentId) -> Self {
        Self::new("/api/shipments/items").with(id)
    }

    /// Prefix of every tracking query.
    #[must_use]
    pub fn tracking_root() -> Self {
        Self::new("/api/shipments/track")
    }

    #[must_use]
    pub fn tracking(id: ShipmentId) -> Self {
        Self::tracking_root().with(id)
    }

    #[must_use]
    pub fn users() -> Self {
        Self::new(USERS_PATH)
    }

    #[must_use]
    pub fn country_multipliers() -> Self {
        Self::new(COUNTRY_MULTIPLIERS_PATH)
    }

    #[must_use]
    pub fn weight_multipliers() -> Self {
        Self::new(WEIGHT_MULTIPLIERS_PATH)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match part {
                KeyPart::Path(p) => write!(f, "\"{p}\"")?,
                KeyPart::Int(n) => write!(f, "{n}")?,
            }
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matching() {
        let all = QueryKey::all_shipments();
        let page = QueryKey::shipments_page(2, 25);
        assert!(all.is_prefix_of(&page));
        assert!(all.is_prefix_of(&all));
        assert!(!page.is_prefix_of(&all));
        assert!(!QueryKey::my_shipments().is_prefix_of(&page));
    }

    #[test]
    fn test_tracking_keys() {
        let key = QueryKey::tracking(ShipmentId::new(7));
        assert!(QueryKey::tracking_root().is_prefix_of(&key));
        assert_eq!(key.to_string(), r#"["/api/shipments/track", 7]"#);
    }

    #[test]
    fn test_path_prefix_is_segment_based() {
        // "/api/shipments/all" must not cover "/api/shipments/allocations"
        let other = QueryKey::new("/api/shipments/allocations");
        assert!(!QueryKey::all_shipments().is_prefix_of(&other));
    }
}

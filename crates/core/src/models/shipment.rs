//! Shipment records as returned by the shipments API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::format::tracking_url;
use crate::types::{Cents, PackageItemId, PriceMultiplier, ShipmentId, ShipmentStatus, UserId};

/// A shipment.
///
/// Monetary fields are integer cents; the server is authoritative for every
/// one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: ShipmentId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub status: ShipmentStatus,

    /// Platform-assigned tracking number.
    #[serde(default)]
    pub tracking_number: Option<String>,
    /// Carrier-issued tracking number, present once a label was purchased.
    #[serde(default)]
    pub carrier_tracking_number: Option<String>,
    /// Admin override of the tracking number.
    #[serde(default)]
    pub manual_tracking_number: Option<String>,
    #[serde(default)]
    pub manual_carrier_name: Option<String>,
    #[serde(default)]
    pub manual_carrier_link: Option<String>,
    #[serde(default)]
    pub carrier_name: Option<String>,
    /// Raw service code chosen at booking time (`shipentegra-ups-ekspress`).
    #[serde(default)]
    pub service_level: Option<String>,
    /// Carrier-specific tracking blob; either a JSON string or an object.
    #[serde(default)]
    pub carrier_tracking_data: Option<serde_json::Value>,

    #[serde(default)]
    pub base_price: Cents,
    #[serde(default)]
    pub fuel_charge: Cents,
    #[serde(default)]
    pub taxes: Cents,
    pub total_price: Cents,
    #[serde(default)]
    pub insurance_cost: Option<Cents>,
    /// Price before the user's multiplier or an admin override.
    #[serde(default)]
    pub original_total_price: Option<Cents>,
    #[serde(default)]
    pub price_multiplier: PriceMultiplier,

    pub sender: Address,
    pub receiver: Address,
    #[serde(flatten)]
    pub package: Package,

    #[serde(default)]
    pub invoice_filename: Option<String>,
    #[serde(default)]
    pub invoice_uploaded_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_by: Option<UserId>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Sender or receiver address block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub name: String,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Physical package description (flattened into the shipment on the wire).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Weight in kilograms.
    #[serde(
        rename = "packageWeight",
        default,
        with = "rust_decimal::serde::float"
    )]
    pub weight: Decimal,
    #[serde(
        rename = "packageLength",
        default,
        with = "rust_decimal::serde::float"
    )]
    pub length: Decimal,
    #[serde(rename = "packageWidth", default, with = "rust_decimal::serde::float")]
    pub width: Decimal,
    #[serde(
        rename = "packageHeight",
        default,
        with = "rust_decimal::serde::float"
    )]
    pub height: Decimal,
    #[serde(default = "one")]
    pub piece_count: u32,
    #[serde(rename = "packageContents", default)]
    pub description: Option<String>,
}

const fn one() -> u32 {
    1
}

/// A package-contents line item (`GET /api/shipments/{id}/items`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageItem {
    pub id: PackageItemId,
    #[serde(default)]
    pub shipment_id: Option<ShipmentId>,
    pub name: String,
    pub quantity: u32,
    /// Unit price.
    pub price: Cents,
    #[serde(default)]
    pub gtin: Option<String>,
    #[serde(default)]
    pub hs_code: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub weight: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub length: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub width: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub height: Option<Decimal>,
}

impl PackageItem {
    /// Declared value of the line (`price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Cents {
        Cents::new(self.price.as_i64().saturating_mul(i64::from(self.quantity)))
    }
}

/// The tracking reference a view should show for a shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingRef {
    pub number: String,
    pub carrier: Option<String>,
    pub url: Option<String>,
}

impl Shipment {
    /// Six-digit zero-padded id for display.
    #[must_use]
    pub fn display_id(&self) -> String {
        self.id.padded()
    }

    /// Admin-visible margin: `totalPrice - originalTotalPrice`.
    #[must_use]
    pub fn margin(&self) -> Option<Cents> {
        self.original_total_price
            .map(|original| self.total_price - original)
    }

    /// A carrier tracking number means a carrier label has been purchased.
    #[must_use]
    pub const fn has_carrier_label(&self) -> bool {
        self.carrier_tracking_number.is_some()
    }

    #[must_use]
    pub const fn has_invoice(&self) -> bool {
        self.invoice_filename.is_some()
    }

    /// Tracking reference to display, manual override first.
    ///
    /// A manual carrier link is used verbatim; otherwise the URL is built
    /// from the carrier name.
    #[must_use]
    pub fn effective_tracking(&self) -> Option<TrackingRef> {
        if let Some(number) = non_empty(self.manual_tracking_number.as_deref()) {
            let carrier = non_empty(self.manual_carrier_name.as_deref()).map(str::to_string);
            let url = non_empty(self.manual_carrier_link.as_deref())
                .map(str::to_string)
                .or_else(|| carrier.as_deref().and_then(|c| tracking_url(c, number)));
            return Some(TrackingRef {
                number: number.to_string(),
                carrier,
                url,
            });
        }

        let number = non_empty(self.carrier_tracking_number.as_deref())?;
        let carrier = non_empty(self.carrier_name.as_deref())
            .or_else(|| self.service_level.as_deref())
            .map(str::to_string);
        let url = carrier.as_deref().and_then(|c| tracking_url(c, number));
        Some(TrackingRef {
            number: number.to_string(),
            carrier,
            url,
        })
    }

    /// Copy of this shipment with a different status.
    #[must_use]
    pub fn with_status(&self, status: ShipmentStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Server pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

/// One page of a server-paginated shipment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentPage {
    pub shipments: Vec<Shipment>,
    pub pagination: PageMeta,
}

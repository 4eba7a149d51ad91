//! Shipment endpoints.

use chrono::{NaiveDate, Utc};
use moogship_core::{Cents, LabelKind, PackageItem, Shipment, ShipmentId, ShipmentPage};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ApiClient, ApiError};

pub(crate) const MY_SHIPMENTS_PATH: &str = "/api/shipments/my";
pub(crate) const ALL_SHIPMENTS_PATH: &str = "/api/shipments/all";

/// An invoice file picked for upload.
#[derive(Debug, Clone)]
pub struct InvoiceFile {
    pub filename: String,
    /// MIME type reported by the picker, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl InvoiceFile {
    /// Whether the file is a PDF by MIME type or extension.
    #[must_use]
    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.eq_ignore_ascii_case("application/pdf"))
            || std::path::Path::new(&self.filename)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    }
}

/// A downloaded label document.
#[derive(Debug, Clone)]
pub struct Label {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Result of an admin price override.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceChange {
    pub shipment: Shipment,
    /// Amount charged (positive) or refunded (negative) to the owner's balance.
    pub balance_adjustment: Cents,
}

#[derive(Deserialize)]
struct PriceChangeResponse {
    shipment: PricedShipment,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricedShipment {
    #[serde(flatten)]
    shipment: Shipment,
    #[serde(default)]
    balance_adjustment: Cents,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceChangeBody {
    new_price: Cents,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchPrintBody<'a> {
    shipment_ids: &'a [ShipmentId],
}

/// Response of a batch label print.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPrintResponse {
    /// URL of the merged label PDF.
    pub label_url: String,
}

/// Body of a batch pickup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPickupRequest {
    pub shipment_ids: Vec<ShipmentId>,
    /// `YYYY-MM-DD`
    pub pickup_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_notes: Option<String>,
}

impl ApiClient {
    /// `GET /api/shipments/my` - the signed-in user's shipments.
    #[instrument(skip(self))]
    pub async fn my_shipments(&self) -> Result<Vec<Shipment>, ApiError> {
        self.get_json(self.url(MY_SHIPMENTS_PATH)?).await
    }

    /// `GET /api/shipments/all` - every shipment (admin).
    #[instrument(skip(self))]
    pub async fn all_shipments(&self) -> Result<Vec<Shipment>, ApiError> {
        self.get_json(self.url(ALL_SHIPMENTS_PATH)?).await
    }

    /// `GET /api/shipments/all?page=&limit=` - one server-side page (admin).
    #[instrument(skip(self))]
    pub async fn shipments_page(&self, page: u32, limit: u32) -> Result<ShipmentPage, ApiError> {
        let mut url = self.url(ALL_SHIPMENTS_PATH)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());
        self.get_json(url).await
    }

    /// `GET /api/shipments/{id}/items`
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub async fn shipment_items(&self, id: ShipmentId) -> Result<Vec<PackageItem>, ApiError> {
        self.get_json(self.url(&format!("/api/shipments/{id}/items"))?)
            .await
    }

    /// `POST /api/shipments/{id}/cancel`
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub async fn cancel_shipment(&self, id: ShipmentId) -> Result<Shipment, ApiError> {
        self.send_json::<(), _>(
            Method::POST,
            self.url(&format!("/api/shipments/{id}/cancel"))?,
            None,
        )
        .await
    }

    /// `POST /api/shipments/{id}/request-tracking` - ask the carrier for a
    /// tracking number.
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub async fn request_tracking(&self, id: ShipmentId) -> Result<Shipment, ApiError> {
        self.send_json::<(), _>(
            Method::POST,
            self.url(&format!("/api/shipments/{id}/request-tracking"))?,
            None,
        )
        .await
    }

    /// `POST /api/shipments/{id}/track` - refresh carrier tracking data.
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub async fn track_shipment(&self, id: ShipmentId) -> Result<Shipment, ApiError> {
        self.send_json::<(), _>(
            Method::POST,
            self.url(&format!("/api/shipments/{id}/track"))?,
            None,
        )
        .await
    }

    /// `GET /api/shipments/{id}/label?type=..&v=..`
    ///
    /// The `v` parameter busts intermediary caches so a regenerated label is
    /// never served stale.
    #[instrument(skip(self), fields(shipment_id = %id, kind = kind.as_str()))]
    pub async fn label(&self, id: ShipmentId, kind: LabelKind) -> Result<Label, ApiError> {
        let mut url = self.url(&format!("/api/shipments/{id}/label"))?;
        url.query_pairs_mut()
            .append_pair("type", kind.as_str())
            .append_pair("v", &Utc::now().timestamp_millis().to_string());

        let (bytes, content_type) = self.get_bytes(url).await?;
        Ok(Label {
            filename: format!("label-{}-{}.pdf", id.padded(), kind.as_str()),
            content_type: content_type.unwrap_or_else(|| "application/pdf".to_string()),
            bytes,
        })
    }

    /// `POST /api/shipments/{id}/upload-invoice` as multipart field `invoice`.
    #[instrument(skip(self, file), fields(shipment_id = %id, filename = %file.filename, size = file.bytes.len()))]
    pub async fn upload_invoice(
        &self,
        id: ShipmentId,
        file: InvoiceFile,
    ) -> Result<Shipment, ApiError> {
        let part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("invoice", part);
        self.upload(self.url(&format!("/api/shipments/{id}/upload-invoice"))?, form)
            .await
    }

    /// `DELETE /api/shipments/{id}/delete-invoice`
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub async fn delete_invoice(&self, id: ShipmentId) -> Result<(), ApiError> {
        self.send_unit::<()>(
            Method::DELETE,
            self.url(&format!("/api/shipments/{id}/delete-invoice"))?,
            None,
        )
        .await
    }

    /// `PATCH /api/admin/shipments/{id}/price`
    #[instrument(skip(self), fields(shipment_id = %id, new_price = %new_price))]
    pub async fn update_price(
        &self,
        id: ShipmentId,
        new_price: Cents,
    ) -> Result<PriceChange, ApiError> {
        let response: PriceChangeResponse = self
            .send_json(
                Method::PATCH,
                self.url(&format!("/api/admin/shipments/{id}/price"))?,
                Some(&PriceChangeBody { new_price }),
            )
            .await?;
        Ok(PriceChange {
            shipment: response.shipment.shipment,
            balance_adjustment: response.shipment.balance_adjustment,
        })
    }

    /// `POST /api/shipments/batch-print`
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn batch_print(&self, ids: &[ShipmentId]) -> Result<BatchPrintResponse, ApiError> {
        self.send_json(
            Method::POST,
            self.url("/api/shipments/batch-print")?,
            Some(&BatchPrintBody { shipment_ids: ids }),
        )
        .await
    }

    /// `POST /api/shipments/batch-pickup`
    #[instrument(skip(self, request), fields(count = request.shipment_ids.len(), date = %request.pickup_date))]
    pub async fn batch_pickup(&self, request: &BatchPickupRequest) -> Result<(), ApiError> {
        self.send_unit(
            Method::POST,
            self.url("/api/shipments/batch-pickup")?,
            Some(request),
        )
        .await
    }
}

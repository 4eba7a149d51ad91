//! Shipment actions: cancel, tracking, labels, invoices, price, batches.

use chrono::{Local, NaiveDate, Utc};
use moogship_core::{Cents, LabelKind, Shipment, ShipmentId, ShipmentStatus};
use tracing::instrument;

use crate::api::{BatchPickupRequest, InvoiceFile, Label, PriceChange};
use crate::cache::QueryKey;
use crate::console::{Console, shipment_keys};
use crate::error::{MAX_INVOICE_BYTES, MutationError, ValidationError};
use crate::mutation::{Action, MutationPlan};

fn shipment_plan(action: Action, id: ShipmentId) -> MutationPlan {
    shipment_keys(id)
        .into_iter()
        .fold(MutationPlan::new(action, id), MutationPlan::invalidates)
}

/// Check an invoice before upload.
///
/// # Errors
///
/// Returns `NotPdf`, `EmptyFile` or `FileTooLarge`.
pub fn validate_invoice(file: &InvoiceFile) -> Result<(), ValidationError> {
    if !file.is_pdf() {
        return Err(ValidationError::NotPdf);
    }
    if file.bytes.is_empty() {
        return Err(ValidationError::EmptyFile);
    }
    if file.bytes.len() > MAX_INVOICE_BYTES {
        return Err(ValidationError::FileTooLarge {
            size: file.bytes.len(),
            max: MAX_INVOICE_BYTES,
        });
    }
    Ok(())
}

/// Parse a pickup date (`YYYY-MM-DD`) that must not be in the past.
///
/// # Errors
///
/// Returns `InvalidPickupDate` for malformed or past dates.
pub fn validate_pickup_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidPickupDate(raw.to_string()))?;
    if date < today {
        return Err(ValidationError::InvalidPickupDate(raw.to_string()));
    }
    Ok(date)
}

impl Console {
    /// Cancel a pending shipment.
    ///
    /// # Errors
    ///
    /// Fails without a request if the shipment is not cached or not pending;
    /// otherwise returns the API error after reconciling the cache.
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub async fn cancel_shipment(&self, id: ShipmentId) -> Result<Shipment, MutationError> {
        let action = Action::CancelShipment;
        let Some(current) = self.cached_shipment(id).await else {
            return self
                .mutations
                .reject(action, ValidationError::ShipmentNotLoaded(id));
        };
        if !current.status.is_cancellable() {
            return self.mutations.reject(
                action,
                ValidationError::NotCancellable {
                    id,
                    status: current.status,
                },
            );
        }

        self.mutations
            .run(
                shipment_plan(action, id),
                self.patch_shipment(id, |s| s.with_status(ShipmentStatus::Cancelled)),
                self.api.cancel_shipment(id),
                |s: &Shipment| Some(format!("Shipment #{} has been cancelled", s.display_id())),
            )
            .await
    }

    /// Ask the carrier for a tracking number.
    ///
    /// # Errors
    ///
    /// Returns the API error after reconciling the cache.
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub async fn request_tracking(&self, id: ShipmentId) -> Result<Shipment, MutationError> {
        self.mutations
            .run(
                shipment_plan(Action::RequestTracking, id),
                async {},
                self.api.request_tracking(id),
                |s: &Shipment| {
                    s.effective_tracking()
                        .map(|t| format!("Tracking number {}", t.number))
                },
            )
            .await
    }

    /// Pull fresh carrier tracking data.
    ///
    /// # Errors
    ///
    /// Returns the API error after reconciling the cache.
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub async fn refresh_tracking(&self, id: ShipmentId) -> Result<Shipment, MutationError> {
        self.mutations
            .run(
                shipment_plan(Action::RefreshTracking, id),
                async {},
                self.api.track_shipment(id),
                |_| None,
            )
            .await
    }

    /// Download a label. Carrier labels need a purchased carrier label.
    ///
    /// # Errors
    ///
    /// Fails without a request if a carrier label is asked for and the cached
    /// shipment has none.
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub async fn download_label(
        &self,
        id: ShipmentId,
        kind: LabelKind,
    ) -> Result<Label, MutationError> {
        let action = Action::DownloadLabel;
        if kind == LabelKind::Carrier {
            let purchased = self
                .cached_shipment(id)
                .await
                .is_some_and(|s| s.has_carrier_label());
            if !purchased {
                return self
                    .mutations
                    .reject(action, ValidationError::CarrierLabelUnavailable(id));
            }
        }

        self.mutations
            .run(
                MutationPlan::new(action, id),
                async {},
                self.api.label(id, kind),
                |label: &Label| Some(label.filename.clone()),
            )
            .await
    }

    /// Upload a PDF invoice of at most 10 MB.
    ///
    /// # Errors
    ///
    /// Fails without a request for non-PDF, empty or oversized files.
    #[instrument(skip(self, file), fields(shipment_id = %id, filename = %file.filename))]
    pub async fn upload_invoice(
        &self,
        id: ShipmentId,
        file: InvoiceFile,
    ) -> Result<Shipment, MutationError> {
        let action = Action::UploadInvoice;
        if let Err(err) = validate_invoice(&file) {
            return self.mutations.reject(action, err);
        }

        let filename = file.filename.clone();
        let uploaded_at = Utc::now();
        self.mutations
            .run(
                shipment_plan(action, id),
                self.patch_shipment(id, |s| Shipment {
                    invoice_filename: Some(filename.clone()),
                    invoice_uploaded_at: Some(uploaded_at),
                    ..s.clone()
                }),
                self.api.upload_invoice(id, file),
                |s: &Shipment| s.invoice_filename.clone(),
            )
            .await
    }

    /// # Errors
    ///
    /// Returns the API error after reconciling the cache.
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub async fn delete_invoice(&self, id: ShipmentId) -> Result<(), MutationError> {
        self.mutations
            .run(
                shipment_plan(Action::DeleteInvoice, id),
                self.patch_shipment(id, |s| Shipment {
                    invoice_filename: None,
                    invoice_uploaded_at: None,
                    ..s.clone()
                }),
                self.api.delete_invoice(id),
                |()| None,
            )
            .await
    }

    /// Override a shipment's price (admin). The owner's balance is adjusted
    /// server-side, so the user list is refetched too.
    ///
    /// # Errors
    ///
    /// Fails without a request for non-positive prices.
    #[instrument(skip(self), fields(shipment_id = %id, new_price = %new_price))]
    pub async fn change_price(
        &self,
        id: ShipmentId,
        new_price: Cents,
    ) -> Result<PriceChange, MutationError> {
        let action = Action::ChangePrice;
        if new_price <= Cents::ZERO {
            return self.mutations.reject(
                action,
                ValidationError::InvalidPrice(format!("{new_price} must be greater than zero")),
            );
        }

        self.mutations
            .run(
                shipment_plan(action, id).invalidates(QueryKey::users()),
                self.patch_shipment(id, |s| Shipment {
                    total_price: new_price,
                    original_total_price: s.original_total_price.or(Some(s.total_price)),
                    ..s.clone()
                }),
                self.api.update_price(id, new_price),
                |change: &PriceChange| {
                    (change.balance_adjustment != Cents::ZERO)
                        .then(|| format!("Balance adjusted by {}", change.balance_adjustment))
                },
            )
            .await
    }

    /// Merge labels for the selected shipments into one PDF; returns its URL.
    ///
    /// # Errors
    ///
    /// Fails without a request when nothing is selected.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn batch_print(&self, ids: &[ShipmentId]) -> Result<String, MutationError> {
        let action = Action::BatchPrint;
        if ids.is_empty() {
            return self.mutations.reject(action, ValidationError::EmptySelection);
        }

        self.mutations
            .run(
                MutationPlan::new(action, 0_i64),
                async {},
                self.api.batch_print(ids),
                |r| Some(r.label_url.clone()),
            )
            .await
            .map(|r| r.label_url)
    }

    /// Schedule a carrier pickup for the selected shipments.
    ///
    /// # Errors
    ///
    /// Fails without a request for an empty selection or a bad date.
    #[instrument(skip(self, ids, notes), fields(count = ids.len()))]
    pub async fn batch_pickup(
        &self,
        ids: &[ShipmentId],
        pickup_date: &str,
        notes: Option<String>,
    ) -> Result<(), MutationError> {
        let action = Action::BatchPickup;
        if ids.is_empty() {
            return self.mutations.reject(action, ValidationError::EmptySelection);
        }
        let date = match validate_pickup_date(pickup_date, Local::now().date_naive()) {
            Ok(date) => date,
            Err(err) => return self.mutations.reject(action, err),
        };

        let request = BatchPickupRequest {
            shipment_ids: ids.to_vec(),
            pickup_date: date,
            pickup_notes: notes.filter(|n| !n.trim().is_empty()),
        };
        self.mutations
            .run(
                MutationPlan::new(action, 0_i64)
                    .invalidates(QueryKey::my_shipments())
                    .invalidates(QueryKey::all_shipments()),
                async {},
                self.api.batch_pickup(&request),
                |()| Some(format!("{} shipments on {date}", ids.len())),
            )
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pdf(size: usize) -> InvoiceFile {
        InvoiceFile {
            filename: "invoice.PDF".to_string(),
            content_type: None,
            bytes: vec![b'%'; size],
        }
    }

    #[test]
    fn test_invoice_limits() {
        assert!(validate_invoice(&pdf(1024)).is_ok());
        assert!(validate_invoice(&pdf(MAX_INVOICE_BYTES)).is_ok());
        assert!(matches!(
            validate_invoice(&pdf(MAX_INVOICE_BYTES + 1)),
            Err(ValidationError::FileTooLarge { .. })
        ));
        assert_eq!(validate_invoice(&pdf(0)), Err(ValidationError::EmptyFile));

        let doc = InvoiceFile {
            filename: "invoice.docx".to_string(),
            content_type: None,
            bytes: vec![1],
        };
        assert_eq!(validate_invoice(&doc), Err(ValidationError::NotPdf));
    }

    #[test]
    fn test_pickup_date() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(
            validate_pickup_date("2026-10-16", today).unwrap(),
            today
        );
        assert!(validate_pickup_date("2026-10-20", today).is_ok());
        assert!(validate_pickup_date("2026-10-15", today).is_err());
        assert!(validate_pickup_date("16/10/2026", today).is_err());
    }

    #[test]
    fn test_plan_covers_every_copy() {
        let plan = shipment_plan(Action::CancelShipment, ShipmentId::new(7));
        assert_eq!(plan.invalidates.len(), 3);
        assert!(plan.invalidates.contains(&QueryKey::tracking(ShipmentId::new(7))));
    }
}

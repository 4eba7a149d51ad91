//! Shipment tables and the shipment detail dialog.

use chrono::{DateTime, Utc};
use moogship_core::format::{format_cents, normalize_service_name};
use moogship_core::tracking::{EventList, reconstruct_events};
use moogship_core::{Address, Cents, Package, PackageItem, Shipment, ShipmentId, ShipmentStatus};
use serde::Serialize;
use tracing::{instrument, warn};

use super::table::{
    ClientPaged, ServerPaged, SortDirection, SortState, SortValue, Sortable, TableColumn,
    sort_rows,
};
use crate::api::ApiError;
use crate::console::Console;

/// Rows per page when none is chosen.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

pub const SHIPMENT_COLUMNS: [TableColumn; 8] = [
    TableColumn::sortable("id", "ID"),
    TableColumn::sortable("created_at", "Created"),
    TableColumn::sortable("status", "Status"),
    TableColumn::sortable("receiver", "Receiver"),
    TableColumn::sortable("destination", "Destination"),
    TableColumn::sortable("service", "Service"),
    TableColumn::sortable("total", "Total"),
    TableColumn::new("tracking", "Tracking"),
];

/// One table row, formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentRow {
    pub id: ShipmentId,
    pub display_id: String,
    pub status: ShipmentStatus,
    pub status_label: &'static str,
    pub receiver: String,
    pub destination: String,
    pub service: String,
    pub total: Cents,
    pub total_display: String,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub has_invoice: bool,
    pub can_cancel: bool,
}

impl From<&Shipment> for ShipmentRow {
    fn from(s: &Shipment) -> Self {
        let tracking = s.effective_tracking();
        let service = s
            .service_level
            .as_deref()
            .or(s.carrier_name.as_deref())
            .unwrap_or_default();
        Self {
            id: s.id,
            display_id: s.display_id(),
            status: s.status,
            status_label: s.status.label(),
            receiver: s.receiver.name.clone(),
            destination: s.receiver.country.clone(),
            service: normalize_service_name(service),
            total: s.total_price,
            total_display: format_cents(s.total_price),
            tracking_number: tracking
                .as_ref()
                .map(|t| t.number.clone())
                .or_else(|| s.tracking_number.clone()),
            tracking_url: tracking.and_then(|t| t.url),
            created_at: s.created_at,
            has_invoice: s.has_invoice(),
            can_cancel: s.status.is_cancellable(),
        }
    }
}

impl Sortable for ShipmentRow {
    fn sort_value(&self, column: &str) -> Option<SortValue> {
        Some(match column {
            "id" => SortValue::Number(self.id.as_i64()),
            "created_at" => SortValue::Date(Some(self.created_at)),
            "status" => SortValue::Text(self.status_label.to_string()),
            "receiver" => SortValue::Text(self.receiver.clone()),
            "destination" => SortValue::Text(self.destination.clone()),
            "service" => SortValue::Text(self.service.clone()),
            "total" => SortValue::Number(self.total.as_i64()),
            _ => return None,
        })
    }
}

fn default_sort() -> SortState {
    SortState::new("created_at", SortDirection::Desc)
}

fn sorted_rows<'a>(shipments: impl IntoIterator<Item = &'a Shipment>, sort: &SortState) -> Vec<ShipmentRow> {
    let mut rows: Vec<ShipmentRow> = shipments.into_iter().map(ShipmentRow::from).collect();
    sort_rows(&mut rows, sort);
    rows
}

/// The signed-in user's shipments, paged client-side.
#[derive(Debug, Clone)]
pub struct ShipmentListView {
    console: Console,
    sort: SortState,
    page: u32,
    page_size: u32,
}

impl ShipmentListView {
    #[must_use]
    pub fn new(console: Console) -> Self {
        Self {
            console,
            sort: default_sort(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Column header click.
    pub fn sort_by(&mut self, column: &str) {
        self.sort.toggle(column);
    }

    pub fn set_sort(&mut self, sort: SortState) {
        self.sort = sort;
    }

    pub const fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    #[must_use]
    pub const fn sort(&self) -> &SortState {
        &self.sort
    }

    /// # Errors
    ///
    /// Returns an `ApiError` if the list had to be fetched and the fetch failed.
    #[instrument(skip(self), fields(page = self.page, column = %self.sort.column))]
    pub async fn load(&self) -> Result<ClientPaged<ShipmentRow>, ApiError> {
        let shipments = self.console.my_shipments().await?;
        Ok(ClientPaged::new(
            sorted_rows(shipments.iter(), &self.sort),
            self.page,
            self.page_size,
        ))
    }

    /// The cached row for one shipment, without fetching.
    pub async fn row(&self, id: ShipmentId) -> Option<ShipmentRow> {
        self.console
            .cached_shipment(id)
            .await
            .map(|s| ShipmentRow::from(&s))
    }
}

/// Every shipment (admin), paged by the server.
#[derive(Debug, Clone)]
pub struct AdminShipmentListView {
    console: Console,
    sort: SortState,
    page: u32,
    limit: u32,
}

impl AdminShipmentListView {
    #[must_use]
    pub fn new(console: Console) -> Self {
        Self {
            console,
            sort: default_sort(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn sort_by(&mut self, column: &str) {
        self.sort.toggle(column);
    }

    pub fn set_sort(&mut self, sort: SortState) {
        self.sort = sort;
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Load the current page. Sorting applies within the page.
    ///
    /// # Errors
    ///
    /// Returns an `ApiError` if the page had to be fetched and the fetch failed.
    #[instrument(skip(self), fields(page = self.page, limit = self.limit))]
    pub async fn load(&self) -> Result<ServerPaged<ShipmentRow>, ApiError> {
        let page = self.console.shipments_page(self.page, self.limit).await?;
        Ok(ServerPaged::new(
            sorted_rows(page.shipments.iter(), &self.sort),
            page.pagination,
        ))
    }
}

/// Price lines shown in the detail dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub base: Cents,
    pub fuel: Cents,
    pub taxes: Cents,
    pub insurance: Option<Cents>,
    pub total: Cents,
    pub original_total: Option<Cents>,
    /// Admin-visible `total - original_total`.
    pub margin: Option<Cents>,
}

/// Everything the detail dialog renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipmentDetail {
    pub row: ShipmentRow,
    pub sender: Address,
    pub receiver: Address,
    pub package: Package,
    pub items: Vec<PackageItem>,
    pub items_total: Cents,
    pub pricing: PriceBreakdown,
    pub invoice_filename: Option<String>,
    pub invoice_uploaded_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub events: EventList,
}

/// Detail dialog for one shipment.
///
/// Reads the shipment from the shared cache on every load, so it always
/// shows what the lists show.
#[derive(Debug, Clone)]
pub struct ShipmentDetailView {
    console: Console,
    id: ShipmentId,
}

impl ShipmentDetailView {
    #[must_use]
    pub const fn new(console: Console, id: ShipmentId) -> Self {
        Self { console, id }
    }

    /// `None` if no cached list holds the shipment. A failed items fetch
    /// renders an empty contents table.
    #[instrument(skip(self), fields(shipment_id = %self.id))]
    pub async fn load(&self) -> Option<ShipmentDetail> {
        let shipment = self.console.cached_shipment(self.id).await?;
        let items = match self.console.shipment_items(self.id).await {
            Ok(items) => items.as_ref().clone(),
            Err(err) => {
                warn!(error = %err, "Failed to load package items");
                Vec::new()
            }
        };
        let items_total = items
            .iter()
            .fold(Cents::ZERO, |sum, item| sum + item.line_total());

        Some(ShipmentDetail {
            row: ShipmentRow::from(&shipment),
            pricing: PriceBreakdown {
                base: shipment.base_price,
                fuel: shipment.fuel_charge,
                taxes: shipment.taxes,
                insurance: shipment.insurance_cost,
                total: shipment.total_price,
                original_total: shipment.original_total_price,
                margin: shipment.margin(),
            },
            events: reconstruct_events(
                shipment.carrier_tracking_data.as_ref(),
                shipment.created_at,
            ),
            sender: shipment.sender,
            receiver: shipment.receiver,
            package: shipment.package,
            items,
            items_total,
            invoice_filename: shipment.invoice_filename,
            invoice_uploaded_at: shipment.invoice_uploaded_at,
            rejection_reason: shipment.rejection_reason,
        })
    }
}

//! Shipment commands.
//!
//! # Usage
//!
//! ```bash
//! moogship shipments list --sort total --order desc --page 2
//! moogship shipments list --all --limit 50
//! moogship shipments label 7 --carrier -o label.pdf
//! moogship shipments upload-invoice 7 ./invoice.pdf
//! moogship shipments batch-pickup --date 2026-11-02 7 8 9
//! ```

use std::path::{Path, PathBuf};

use clap::{Subcommand, ValueEnum};
use moogship_client::views::{
    AdminShipmentListView, DEFAULT_PAGE_SIZE, ShipmentDetailView, ShipmentListView, ShipmentRow,
    SortDirection, SortState, TrackingView,
};
use moogship_client::{Console, InvoiceFile, SelectionStore};
use moogship_core::tracking::EventList;
use moogship_core::{Cents, LabelKind, ShipmentId};
use tracing::{info, warn};

use super::CommandError;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Order {
    Asc,
    Desc,
}

impl From<Order> for SortDirection {
    fn from(order: Order) -> Self {
        match order {
            Order::Asc => Self::Asc,
            Order::Desc => Self::Desc,
        }
    }
}

#[derive(Subcommand)]
pub enum ShipmentAction {
    /// List shipments
    List {
        /// Every shipment, paged by the server (admin)
        #[arg(long)]
        all: bool,

        #[arg(short, long, default_value_t = 1)]
        page: u32,

        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: u32,

        /// Column: id, `created_at`, status, receiver, destination, service, total
        #[arg(short, long, default_value = "created_at")]
        sort: String,

        #[arg(short, long, value_enum, default_value = "desc")]
        order: Order,
    },
    /// Show one shipment with its contents and tracking
    Show { id: i64 },
    /// Cancel a pending shipment
    Cancel { id: i64 },
    /// Show carrier tracking events
    Track {
        id: i64,

        /// Keep polling until interrupted
        #[arg(short, long)]
        watch: bool,
    },
    /// Ask the carrier for a tracking number
    RequestTracking { id: i64 },
    /// Download a label PDF
    Label {
        id: i64,

        /// The purchased carrier label instead of the MoogShip label
        #[arg(long)]
        carrier: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload a PDF invoice (at most 10 MB)
    UploadInvoice { id: i64, file: PathBuf },
    /// Delete the uploaded invoice
    DeleteInvoice { id: i64 },
    /// Override a shipment's price (admin)
    SetPrice { id: i64, price: Cents },
    /// Merge labels of the selected shipments into one PDF
    BatchPrint { ids: Vec<i64> },
    /// Schedule a pickup for the selected shipments
    BatchPickup {
        /// Pickup date, YYYY-MM-DD
        #[arg(long)]
        date: String,

        #[arg(long)]
        notes: Option<String>,

        ids: Vec<i64>,
    },
}

/// Run a shipment command.
///
/// # Errors
///
/// Returns a `CommandError` if the request or validation fails.
pub async fn run(console: &Console, action: ShipmentAction) -> Result<(), CommandError> {
    match action {
        ShipmentAction::List {
            all,
            page,
            limit,
            sort,
            order,
        } => list(console, all, page, limit, SortState::new(sort, order.into())).await,
        ShipmentAction::Show { id } => show(console, ShipmentId::new(id)).await,
        ShipmentAction::Cancel { id } => {
            let id = ShipmentId::new(id);
            load(console).await;
            let shipment = console.cancel_shipment(id).await?;
            info!("Shipment {} is now {}", shipment.display_id(), shipment.status.label());
            Ok(())
        }
        ShipmentAction::Track { id, watch } => track(console, ShipmentId::new(id), watch).await,
        ShipmentAction::RequestTracking { id } => {
            let shipment = console.request_tracking(ShipmentId::new(id)).await?;
            match shipment.effective_tracking() {
                Some(tracking) => info!(
                    "Tracking {} {}",
                    tracking.number,
                    tracking.url.unwrap_or_default()
                ),
                None => info!("Tracking requested; no number assigned yet"),
            }
            Ok(())
        }
        ShipmentAction::Label {
            id,
            carrier,
            output,
        } => {
            let id = ShipmentId::new(id);
            let kind = if carrier {
                load(console).await;
                LabelKind::Carrier
            } else {
                LabelKind::Moogship
            };
            let label = console.download_label(id, kind).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(&label.filename));
            write_file(&path, &label.bytes).await?;
            info!("Saved {} ({} bytes)", path.display(), label.bytes.len());
            Ok(())
        }
        ShipmentAction::UploadInvoice { id, file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .map_err(|source| CommandError::File {
                    path: file.clone(),
                    source,
                })?;
            let filename = file
                .file_name()
                .map_or_else(|| "invoice.pdf".to_string(), |n| n.to_string_lossy().into_owned());
            let invoice = InvoiceFile {
                filename,
                content_type: None,
                bytes,
            };
            let shipment = console.upload_invoice(ShipmentId::new(id), invoice).await?;
            info!(
                "Invoice {} attached to shipment {}",
                shipment.invoice_filename.as_deref().unwrap_or_default(),
                shipment.display_id()
            );
            Ok(())
        }
        ShipmentAction::DeleteInvoice { id } => {
            console.delete_invoice(ShipmentId::new(id)).await?;
            info!("Invoice deleted");
            Ok(())
        }
        ShipmentAction::SetPrice { id, price } => {
            let change = console.change_price(ShipmentId::new(id), price).await?;
            info!(
                "Shipment {} now costs {} (balance adjustment {})",
                change.shipment.display_id(),
                change.shipment.total_price,
                change.balance_adjustment
            );
            Ok(())
        }
        ShipmentAction::BatchPrint { ids } => {
            let mut selection = SelectionStore::from_config(console.config())?;
            selection.select(ids.into_iter().map(ShipmentId::new))?;
            let url = console.batch_print(&selection.ids()).await?;
            selection.clear()?;
            info!("Labels: {url}");
            Ok(())
        }
        ShipmentAction::BatchPickup { date, notes, ids } => {
            let mut selection = SelectionStore::from_config(console.config())?;
            selection.select(ids.into_iter().map(ShipmentId::new))?;
            console
                .batch_pickup(&selection.ids(), &date, notes)
                .await?;
            info!("Pickup scheduled for {} shipments on {date}", selection.len());
            selection.clear()?;
            Ok(())
        }
    }
}

/// Warm the cache with whichever lists this session may read.
async fn load(console: &Console) {
    if let Err(e) = console.my_shipments().await {
        warn!("Could not load your shipments: {}", e.message());
    }
    // Admin-only; other sessions get a 403 here
    if let Err(e) = console.all_shipments().await {
        tracing::debug!("All shipments unavailable: {}", e.message());
    }
}

async fn list(
    console: &Console,
    all: bool,
    page: u32,
    limit: u32,
    sort: SortState,
) -> Result<(), CommandError> {
    if all {
        let mut view = AdminShipmentListView::new(console.clone()).with_limit(limit);
        view.set_sort(sort);
        view.set_page(page);
        let paged = view.load().await?;
        for row in paged.page_rows() {
            log_row(row);
        }
        info!(
            "Page {} of {} ({} shipments)",
            paged.page(),
            paged.page_count(),
            paged.total()
        );
    } else {
        let mut view = ShipmentListView::new(console.clone()).with_page_size(limit);
        view.set_sort(sort);
        view.set_page(page);
        let paged = view.load().await?;
        for row in paged.page_rows() {
            log_row(row);
        }
        info!(
            "Page {} of {} ({} shipments)",
            paged.page(),
            paged.page_count(),
            paged.total()
        );
    }
    Ok(())
}

fn log_row(row: &ShipmentRow) {
    info!(
        "{}  {:<10}  {:<24}  {:<20}  {:>10}  {}",
        row.display_id,
        row.status_label,
        row.service,
        row.receiver,
        row.total_display,
        row.tracking_number.as_deref().unwrap_or("-")
    );
}

async fn show(console: &Console, id: ShipmentId) -> Result<(), CommandError> {
    load(console).await;
    let detail = ShipmentDetailView::new(console.clone(), id)
        .load()
        .await
        .ok_or(CommandError::NotFound(id.as_i64()))?;

    log_row(&detail.row);
    info!(
        "From {}, {} {} to {}, {} {}",
        detail.sender.name,
        detail.sender.city,
        detail.sender.country,
        detail.receiver.name,
        detail.receiver.city,
        detail.receiver.country
    );
    info!(
        "Base {}  Fuel {}  Taxes {}  Total {}",
        detail.pricing.base, detail.pricing.fuel, detail.pricing.taxes, detail.pricing.total
    );
    if let Some(margin) = detail.pricing.margin {
        info!("Margin {margin}");
    }
    for item in &detail.items {
        info!("  {} x{} @ {}", item.name, item.quantity, item.price);
    }
    if let Some(invoice) = &detail.invoice_filename {
        info!("Invoice {invoice}");
    }
    log_events(&detail.events);
    Ok(())
}

async fn track(console: &Console, id: ShipmentId, watch: bool) -> Result<(), CommandError> {
    let view = TrackingView::new(console, id);
    log_events(&view.events().await);
    if !watch {
        return Ok(());
    }

    loop {
        tokio::select! {
            events = view.changed() => log_events(&events),
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn log_events(events: &EventList) {
    match events {
        EventList::NoEvents => info!("No tracking events"),
        EventList::Events(events) => {
            for event in events {
                let at = event
                    .time
                    .map_or_else(|| "unknown time".to_string(), |t| t.to_rfc3339());
                info!(
                    "{at}  {}  {}",
                    event.status,
                    event.location.as_deref().unwrap_or_default()
                );
            }
        }
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CommandError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| CommandError::File {
            path: path.to_path_buf(),
            source,
        })
}

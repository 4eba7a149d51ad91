//! View models: what tables, dialogs and panels render.
//!
//! Views hold a [`crate::Console`] and read through its cache on every
//! load, so two views over the same key never disagree.

pub mod shipments;
pub mod table;
pub mod tracking;
pub mod users;

pub use shipments::{
    AdminShipmentListView, DEFAULT_PAGE_SIZE, PriceBreakdown, SHIPMENT_COLUMNS, ShipmentDetail,
    ShipmentDetailView, ShipmentListView, ShipmentRow,
};
pub use table::{
    ClientPaged, ServerPaged, SortDirection, SortState, SortValue, Sortable, TableColumn,
    sort_rows,
};
pub use tracking::TrackingView;
pub use users::{USER_COLUMNS, UserListView, UserRow};

//! Errors surfaced by console actions.
//!
//! Every action fails in one of two ways: a [`ValidationError`] raised from
//! cached state before anything touches the network, or an [`ApiError`] from
//! the request itself. Both end up as an error notification.

use moogship_core::{MoneyError, RuleError, ShipmentId, ShipmentStatus};
use thiserror::Error;

use crate::api::ApiError;

/// Largest invoice the upload endpoint accepts.
pub const MAX_INVOICE_BYTES: usize = 10 * 1024 * 1024;

/// A precondition failed; no request was made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Only pending shipments can be cancelled (shipment {id} is {status})")]
    NotCancellable {
        id: ShipmentId,
        status: ShipmentStatus,
    },

    #[error("Shipment {0} is not loaded")]
    ShipmentNotLoaded(ShipmentId),

    #[error("Invoice must be a PDF file")]
    NotPdf,

    #[error("File Too Large")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invoice file is empty")]
    EmptyFile,

    #[error("No shipments selected")]
    EmptySelection,

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid price multiplier: {0}")]
    InvalidMultiplier(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid pricing rule: {0}")]
    InvalidRule(#[from] RuleError),

    #[error("A rejection reason is required")]
    MissingRejectionReason,

    #[error("No carrier label has been purchased for shipment {0}")]
    CarrierLabelUnavailable(ShipmentId),

    #[error("Invalid pickup date {0}: use YYYY-MM-DD, today or later")]
    InvalidPickupDate(String),

    #[error("This action is already in progress")]
    AlreadyInFlight,
}

impl From<MoneyError> for ValidationError {
    fn from(err: MoneyError) -> Self {
        Self::InvalidAmount(err.to_string())
    }
}

/// Why an action did not complete.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl MutationError {
    /// Text for the error notification.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Api(err) => err.message(),
        }
    }

    /// Whether the failure happened before any request was sent.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

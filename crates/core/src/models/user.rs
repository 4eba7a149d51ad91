//! Console user records as returned by the users API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Cents, PriceMultiplier, UserId, UserRole};

/// A platform user as seen by the admin console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    /// Account balance. May be negative down to the minimum-balance floor.
    #[serde(default)]
    pub balance: Cents,
    /// Per-user floor. `None` means the system default applies.
    #[serde(default)]
    pub minimum_balance: Option<Cents>,
    #[serde(default)]
    pub price_multiplier: PriceMultiplier,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub can_access_carrier_labels: bool,
    #[serde(default)]
    pub can_access_return_system: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Where a user stands in the approval workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected { reason: String },
}

impl User {
    /// Name to show in tables, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }

    #[must_use]
    pub fn approval_state(&self) -> ApprovalState {
        if self.is_approved {
            return ApprovalState::Approved;
        }
        match self.rejection_reason.as_deref() {
            Some(reason) if !reason.trim().is_empty() => ApprovalState::Rejected {
                reason: reason.to_string(),
            },
            _ => ApprovalState::Pending,
        }
    }

    /// The balance floor for this user.
    #[must_use]
    pub fn effective_minimum_balance(&self, system_default: Cents) -> Cents {
        self.minimum_balance.unwrap_or(system_default)
    }

    /// Whether charging `amount` keeps the balance at or above the floor.
    #[must_use]
    pub fn can_cover(&self, amount: Cents, system_default: Cents) -> bool {
        self.balance - amount >= self.effective_minimum_balance(system_default)
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

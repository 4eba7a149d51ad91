//! Admin user table.

use moogship_core::format::format_cents;
use moogship_core::{ApprovalState, Cents, User, UserId, UserRole};
use serde::Serialize;
use tracing::instrument;

use super::table::{
    ClientPaged, SortDirection, SortState, SortValue, Sortable, TableColumn, sort_rows,
};
use crate::api::ApiError;
use crate::console::Console;

pub const USER_COLUMNS: [TableColumn; 6] = [
    TableColumn::sortable("id", "ID"),
    TableColumn::sortable("name", "Name"),
    TableColumn::sortable("role", "Role"),
    TableColumn::sortable("balance", "Balance"),
    TableColumn::sortable("approval", "Approval"),
    TableColumn::new("multiplier", "Multiplier"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub balance: Cents,
    pub balance_display: String,
    pub minimum_balance: Option<Cents>,
    pub multiplier: String,
    pub approval: &'static str,
    pub rejection_reason: Option<String>,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        let (approval, rejection_reason) = match u.approval_state() {
            ApprovalState::Approved => ("Approved", None),
            ApprovalState::Pending => ("Pending", None),
            ApprovalState::Rejected { reason } => ("Rejected", Some(reason)),
        };
        Self {
            id: u.id,
            username: u.username.clone(),
            name: u.display_name().to_string(),
            email: u.email.clone(),
            role: u.role,
            balance: u.balance,
            balance_display: format_cents(u.balance),
            minimum_balance: u.minimum_balance,
            multiplier: u.price_multiplier.to_string(),
            approval,
            rejection_reason,
        }
    }
}

impl Sortable for UserRow {
    fn sort_value(&self, column: &str) -> Option<SortValue> {
        Some(match column {
            "id" => SortValue::Number(self.id.as_i64()),
            "name" => SortValue::Text(self.name.clone()),
            "role" => SortValue::Text(self.role.to_string()),
            "balance" => SortValue::Number(self.balance.as_i64()),
            "approval" => SortValue::Text(self.approval.to_string()),
            _ => return None,
        })
    }
}

/// Users awaiting approval, then everyone else, paged client-side.
#[derive(Debug, Clone)]
pub struct UserListView {
    console: Console,
    sort: SortState,
    page: u32,
    page_size: u32,
}

impl UserListView {
    #[must_use]
    pub fn new(console: Console) -> Self {
        Self {
            console,
            sort: SortState::new("id", SortDirection::Asc),
            page: 1,
            page_size: super::shipments::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn sort_by(&mut self, column: &str) {
        self.sort.toggle(column);
    }

    pub const fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    /// # Errors
    ///
    /// Returns an `ApiError` if the list had to be fetched and the fetch failed.
    #[instrument(skip(self), fields(page = self.page, column = %self.sort.column))]
    pub async fn load(&self) -> Result<ClientPaged<UserRow>, ApiError> {
        let users = self.console.users().await?;
        let mut rows: Vec<UserRow> = users.iter().map(UserRow::from).collect();
        sort_rows(&mut rows, &self.sort);
        Ok(ClientPaged::new(rows, self.page, self.page_size))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_row_carries_reason() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": 9, "username": "acme", "balance": -150,
            "isApproved": false, "rejectionReason": "Incomplete documents"
        }))
        .unwrap();
        let row = UserRow::from(&user);
        assert_eq!(row.name, "acme");
        assert_eq!(row.balance_display, "-$1.50");
        assert_eq!(row.approval, "Rejected");
        assert_eq!(row.rejection_reason.as_deref(), Some("Incomplete documents"));
    }
}

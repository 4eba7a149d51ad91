//! User administration commands.
//!
//! # Usage
//!
//! ```bash
//! moogship users list --sort balance
//! moogship users reject 12 --reason "Incomplete documents"
//! moogship users update 12 --multiplier 1.15 --carrier-labels true
//! moogship users add-balance 12 -- -5.00
//! moogship users min-balance 12 --clear
//! ```

use clap::Subcommand;
use moogship_client::views::UserListView;
use moogship_client::{Console, UserPatch};
use moogship_core::{Cents, PriceMultiplier, User, UserId, UserRole};
use tracing::info;

use super::CommandError;

#[derive(Subcommand)]
pub enum UserAction {
    /// List users
    List {
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Column: id, name, role, balance, approval
        #[arg(short, long)]
        sort: Option<String>,
    },
    /// Approve a registration
    Approve { id: i64 },
    /// Reject a registration
    Reject {
        id: i64,

        #[arg(short, long)]
        reason: String,
    },
    /// Change profile, multiplier or capabilities
    Update {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        role: Option<UserRole>,

        #[arg(long)]
        multiplier: Option<PriceMultiplier>,

        #[arg(long)]
        carrier_labels: Option<bool>,

        #[arg(long)]
        return_system: Option<bool>,
    },
    /// Add a signed amount to a balance
    AddBalance {
        id: i64,

        #[arg(allow_negative_numbers = true)]
        amount: Cents,
    },
    /// Overwrite a balance
    SetBalance {
        id: i64,

        #[arg(allow_negative_numbers = true)]
        balance: Cents,
    },
    /// Set or clear the per-user minimum balance
    MinBalance {
        id: i64,

        #[arg(allow_negative_numbers = true, required_unless_present = "clear")]
        minimum: Option<Cents>,

        /// Fall back to the system default
        #[arg(long, conflicts_with = "minimum")]
        clear: bool,
    },
    /// Delete a user
    Delete { id: i64 },
}

/// Run a user command.
///
/// # Errors
///
/// Returns a `CommandError` if the request or validation fails.
pub async fn run(console: &Console, action: UserAction) -> Result<(), CommandError> {
    match action {
        UserAction::List { page, sort } => {
            let mut view = UserListView::new(console.clone());
            if let Some(column) = sort {
                view.sort_by(&column);
            }
            view.set_page(page);
            let paged = view.load().await?;
            for row in paged.page_rows() {
                info!(
                    "{:>6}  {:<24}  {:<6}  {:>12}  {:<8}  {}",
                    row.id, row.name, row.role, row.balance_display, row.approval, row.multiplier
                );
            }
            info!("Page {} of {} ({} users)", paged.page(), paged.page_count(), paged.total());
        }
        UserAction::Approve { id } => {
            report(&console.approve_user(UserId::new(id)).await?);
        }
        UserAction::Reject { id, reason } => {
            report(&console.reject_user(UserId::new(id), &reason).await?);
        }
        UserAction::Update {
            id,
            name,
            email,
            role,
            multiplier,
            carrier_labels,
            return_system,
        } => {
            let patch = UserPatch {
                name,
                email,
                role,
                price_multiplier: multiplier,
                can_access_carrier_labels: carrier_labels,
                can_access_return_system: return_system,
            };
            report(&console.update_user(UserId::new(id), patch).await?);
        }
        UserAction::AddBalance { id, amount } => {
            report(&console.add_balance(UserId::new(id), amount).await?);
        }
        UserAction::SetBalance { id, balance } => {
            report(&console.set_balance(UserId::new(id), balance).await?);
        }
        UserAction::MinBalance { id, minimum, clear } => {
            let minimum = if clear { None } else { minimum };
            report(&console.set_minimum_balance(UserId::new(id), minimum).await?);
        }
        UserAction::Delete { id } => {
            console.delete_user(UserId::new(id)).await?;
            info!("User {id} deleted");
        }
    }
    Ok(())
}

fn report(user: &User) {
    info!(
        "{} ({}) balance {} multiplier {} approved {}",
        user.display_name(),
        user.role,
        user.balance,
        user.price_multiplier,
        user.is_approved
    );
}

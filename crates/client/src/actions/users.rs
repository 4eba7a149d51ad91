//! User administration actions.

use moogship_core::{Cents, User, UserId};
use tracing::instrument;

use crate::api::UserPatch;
use crate::cache::QueryKey;
use crate::console::Console;
use crate::error::{MutationError, ValidationError};
use crate::mutation::{Action, MutationPlan};

fn user_plan(action: Action, id: UserId) -> MutationPlan {
    MutationPlan::new(action, id).invalidates(QueryKey::users())
}

fn replace_user(users: &[User], id: UserId, update: impl Fn(&User) -> User) -> Vec<User> {
    users
        .iter()
        .map(|u| if u.id == id { update(u) } else { u.clone() })
        .collect()
}

impl Console {
    /// # Errors
    ///
    /// Returns the API error after reconciling the cache.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn approve_user(&self, id: UserId) -> Result<User, MutationError> {
        self.mutations
            .run(
                user_plan(Action::ApproveUser, id),
                self.patch_users(|users| {
                    replace_user(users, id, |u| User {
                        is_approved: true,
                        rejection_reason: None,
                        ..u.clone()
                    })
                }),
                self.api.approve_user(id),
                |u: &User| Some(u.display_name().to_string()),
            )
            .await
    }

    /// Reject a registration. The reason is shown to the user.
    ///
    /// # Errors
    ///
    /// Fails without a request if `reason` is blank.
    #[instrument(skip(self, reason), fields(user_id = %id))]
    pub async fn reject_user(&self, id: UserId, reason: &str) -> Result<User, MutationError> {
        let action = Action::RejectUser;
        let reason = reason.trim();
        if reason.is_empty() {
            return self
                .mutations
                .reject(action, ValidationError::MissingRejectionReason);
        }

        self.mutations
            .run(
                user_plan(action, id),
                self.patch_users(|users| {
                    replace_user(users, id, |u| User {
                        is_approved: false,
                        rejection_reason: Some(reason.to_string()),
                        ..u.clone()
                    })
                }),
                self.api.reject_user(id, reason),
                |u: &User| Some(u.display_name().to_string()),
            )
            .await
    }

    /// # Errors
    ///
    /// Fails without a request for an empty patch or a non-positive multiplier.
    #[instrument(skip(self, patch), fields(user_id = %id))]
    pub async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User, MutationError> {
        let action = Action::UpdateUser;
        if patch.is_empty() {
            return self.mutations.reject(
                action,
                ValidationError::InvalidAmount("nothing to update".to_string()),
            );
        }
        if let Some(multiplier) = patch.price_multiplier {
            let value = multiplier.as_decimal();
            if value.is_zero() || value.is_sign_negative() {
                return self.mutations.reject(
                    action,
                    ValidationError::InvalidMultiplier(multiplier.to_string()),
                );
            }
        }

        self.mutations
            .run(
                user_plan(action, id),
                self.patch_users(|users| replace_user(users, id, |u| patch.apply(u))),
                self.api.update_user(id, &patch),
                |u: &User| Some(u.display_name().to_string()),
            )
            .await
    }

    /// Credit (or debit, when negative) a user's balance.
    ///
    /// # Errors
    ///
    /// Fails without a request for a zero amount.
    #[instrument(skip(self), fields(user_id = %id, amount = %amount))]
    pub async fn add_balance(&self, id: UserId, amount: Cents) -> Result<User, MutationError> {
        let action = Action::AddBalance;
        if amount == Cents::ZERO {
            return self.mutations.reject(
                action,
                ValidationError::InvalidAmount("amount must not be zero".to_string()),
            );
        }

        self.mutations
            .run(
                user_plan(action, id),
                self.patch_users(|users| {
                    replace_user(users, id, |u| User {
                        balance: u.balance + amount,
                        ..u.clone()
                    })
                }),
                self.api.add_balance(id, amount),
                |u: &User| Some(format!("New balance {}", u.balance)),
            )
            .await
    }

    /// # Errors
    ///
    /// Returns the API error after reconciling the cache.
    #[instrument(skip(self), fields(user_id = %id, balance = %balance))]
    pub async fn set_balance(&self, id: UserId, balance: Cents) -> Result<User, MutationError> {
        self.mutations
            .run(
                user_plan(Action::SetBalance, id),
                self.patch_users(|users| {
                    replace_user(users, id, |u| User {
                        balance,
                        ..u.clone()
                    })
                }),
                self.api.set_balance(id, balance),
                |u: &User| Some(format!("New balance {}", u.balance)),
            )
            .await
    }

    /// Set a per-user balance floor; `None` falls back to the system default.
    ///
    /// # Errors
    ///
    /// Fails without a request for a positive floor.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn set_minimum_balance(
        &self,
        id: UserId,
        minimum: Option<Cents>,
    ) -> Result<User, MutationError> {
        let action = Action::SetMinimumBalance;
        if let Some(floor) = minimum
            && floor > Cents::ZERO
        {
            return self.mutations.reject(
                action,
                ValidationError::InvalidAmount(format!("{floor} must be zero or negative")),
            );
        }

        self.mutations
            .run(
                user_plan(action, id),
                self.patch_users(|users| {
                    replace_user(users, id, |u| User {
                        minimum_balance: minimum,
                        ..u.clone()
                    })
                }),
                self.api.set_minimum_balance(id, minimum),
                |_| None,
            )
            .await
    }

    /// # Errors
    ///
    /// Returns the API error after reconciling the cache.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: UserId) -> Result<(), MutationError> {
        self.mutations
            .run(
                user_plan(Action::DeleteUser, id),
                self.patch_users(|users| users.iter().filter(|u| u.id != id).cloned().collect()),
                self.api.delete_user(id),
                |()| None,
            )
            .await
    }
}

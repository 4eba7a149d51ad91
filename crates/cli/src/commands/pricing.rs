//! Price multiplier rule commands.
//!
//! # Usage
//!
//! ```bash
//! moogship pricing countries
//! moogship pricing add-country US "United States" 1.2
//! moogship pricing add-weight 0 --max 5 1.1
//! moogship pricing delete-weight 3
//! ```

use clap::Subcommand;
use moogship_client::Console;
use moogship_core::{
    CountryMultiplierId, CountryMultiplierInput, PriceMultiplier, WeightRangeInput,
    WeightRangeMultiplierId,
};
use rust_decimal::Decimal;
use tracing::info;

use super::CommandError;

#[derive(Subcommand)]
pub enum PricingAction {
    /// List country rules
    Countries,
    /// List weight-range rules
    Weights,
    /// Create a country rule
    AddCountry {
        /// ISO 3166-1 alpha-2 code
        code: String,
        name: String,
        multiplier: PriceMultiplier,

        #[arg(long)]
        inactive: bool,
    },
    /// Replace a country rule
    UpdateCountry {
        id: i64,
        code: String,
        name: String,
        multiplier: PriceMultiplier,

        #[arg(long)]
        inactive: bool,
    },
    /// Delete a country rule
    DeleteCountry { id: i64 },
    /// Create a weight-range rule (kilograms)
    AddWeight {
        min: Decimal,
        multiplier: PriceMultiplier,

        /// Open-ended when omitted
        #[arg(long)]
        max: Option<Decimal>,

        #[arg(long)]
        inactive: bool,
    },
    /// Replace a weight-range rule
    UpdateWeight {
        id: i64,
        min: Decimal,
        multiplier: PriceMultiplier,

        #[arg(long)]
        max: Option<Decimal>,

        #[arg(long)]
        inactive: bool,
    },
    /// Delete a weight-range rule
    DeleteWeight { id: i64 },
}

/// Run a pricing command.
///
/// # Errors
///
/// Returns a `CommandError` if the request or validation fails.
pub async fn run(console: &Console, action: PricingAction) -> Result<(), CommandError> {
    match action {
        PricingAction::Countries => {
            for rule in console.country_multipliers().await?.iter() {
                info!(
                    "{:>4}  {}  {:<24}  {}{}",
                    rule.id,
                    rule.country_code,
                    rule.country_name,
                    rule.price_multiplier,
                    if rule.is_active { "" } else { "  (inactive)" }
                );
            }
        }
        PricingAction::Weights => {
            for rule in console.weight_multipliers().await?.iter() {
                info!(
                    "{:>4}  {:<16}  {}{}",
                    rule.id,
                    rule.range_label(),
                    rule.price_multiplier,
                    if rule.is_active { "" } else { "  (inactive)" }
                );
            }
        }
        PricingAction::AddCountry {
            code,
            name,
            multiplier,
            inactive,
        } => {
            let rule = console
                .create_country_rule(country_input(code, name, multiplier, inactive))
                .await?;
            info!("Created country rule {}", rule.id);
        }
        PricingAction::UpdateCountry {
            id,
            code,
            name,
            multiplier,
            inactive,
        } => {
            console
                .update_country_rule(
                    CountryMultiplierId::new(id),
                    country_input(code, name, multiplier, inactive),
                )
                .await?;
            info!("Updated country rule {id}");
        }
        PricingAction::DeleteCountry { id } => {
            console
                .delete_country_rule(CountryMultiplierId::new(id))
                .await?;
            info!("Deleted country rule {id}");
        }
        PricingAction::AddWeight {
            min,
            multiplier,
            max,
            inactive,
        } => {
            let rule = console
                .create_weight_rule(weight_input(min, max, multiplier, inactive))
                .await?;
            info!("Created weight rule {} ({})", rule.id, rule.range_label());
        }
        PricingAction::UpdateWeight {
            id,
            min,
            multiplier,
            max,
            inactive,
        } => {
            console
                .update_weight_rule(
                    WeightRangeMultiplierId::new(id),
                    weight_input(min, max, multiplier, inactive),
                )
                .await?;
            info!("Updated weight rule {id}");
        }
        PricingAction::DeleteWeight { id } => {
            console
                .delete_weight_rule(WeightRangeMultiplierId::new(id))
                .await?;
            info!("Deleted weight rule {id}");
        }
    }
    Ok(())
}

const fn country_input(
    country_code: String,
    country_name: String,
    price_multiplier: PriceMultiplier,
    inactive: bool,
) -> CountryMultiplierInput {
    CountryMultiplierInput {
        country_code,
        country_name,
        price_multiplier,
        is_active: !inactive,
    }
}

const fn weight_input(
    min_weight: Decimal,
    max_weight: Option<Decimal>,
    price_multiplier: PriceMultiplier,
    inactive: bool,
) -> WeightRangeInput {
    WeightRangeInput {
        min_weight,
        max_weight,
        price_multiplier,
        is_active: !inactive,
    }
}

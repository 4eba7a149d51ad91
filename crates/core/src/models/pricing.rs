//! Country and weight-range price multiplier rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CountryMultiplierId, PriceMultiplier, WeightRangeMultiplierId};

/// Why a pricing rule was rejected before being sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("country code must be two letters: {0}")]
    InvalidCountryCode(String),
    #[error("country name cannot be empty")]
    EmptyCountryName,
    #[error("price multiplier must be greater than zero")]
    ZeroMultiplier,
    #[error("minimum weight cannot be negative")]
    NegativeWeight,
    #[error("maximum weight {max} must be greater than minimum weight {min}")]
    InvertedRange { min: Decimal, max: Decimal },
}

/// A multiplier applied to shipments bound for a destination country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryPriceMultiplier {
    pub id: CountryMultiplierId,
    pub country_code: String,
    pub country_name: String,
    pub price_multiplier: PriceMultiplier,
    #[serde(default = "active")]
    pub is_active: bool,
}

/// A multiplier applied to shipments within a weight band (kilograms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightRangePriceMultiplier {
    pub id: WeightRangeMultiplierId,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_weight: Decimal,
    /// Open-ended when `None`.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub max_weight: Option<Decimal>,
    pub price_multiplier: PriceMultiplier,
    #[serde(default = "active")]
    pub is_active: bool,
}

const fn active() -> bool {
    true
}

impl CountryPriceMultiplier {
    #[must_use]
    pub fn applies_to(&self, country_code: &str) -> bool {
        self.is_active && self.country_code.eq_ignore_ascii_case(country_code.trim())
    }
}

impl WeightRangePriceMultiplier {
    /// Matches weights in `[min_weight, max_weight)`.
    #[must_use]
    pub fn applies_to(&self, weight: Decimal) -> bool {
        self.is_active
            && weight >= self.min_weight
            && self.max_weight.is_none_or(|max| weight < max)
    }

    /// Short label such as `0.5-2 kg` or `30+ kg`.
    #[must_use]
    pub fn range_label(&self) -> String {
        match self.max_weight {
            Some(max) => format!("{}-{} kg", self.min_weight.normalize(), max.normalize()),
            None => format!("{}+ kg", self.min_weight.normalize()),
        }
    }
}

/// Body for creating or replacing a country rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryMultiplierInput {
    pub country_code: String,
    pub country_name: String,
    pub price_multiplier: PriceMultiplier,
    pub is_active: bool,
}

impl CountryMultiplierInput {
    /// Check the rule and upper-case the country code.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] describing the first invalid field.
    pub fn validated(mut self) -> Result<Self, RuleError> {
        let code = self.country_code.trim().to_ascii_uppercase();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(RuleError::InvalidCountryCode(self.country_code));
        }
        if self.country_name.trim().is_empty() {
            return Err(RuleError::EmptyCountryName);
        }
        if self.price_multiplier.as_decimal().is_zero() {
            return Err(RuleError::ZeroMultiplier);
        }
        self.country_code = code;
        Ok(self)
    }
}

/// Body for creating or replacing a weight-range rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightRangeInput {
    #[serde(with = "rust_decimal::serde::float")]
    pub min_weight: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub max_weight: Option<Decimal>,
    pub price_multiplier: PriceMultiplier,
    pub is_active: bool,
}

impl WeightRangeInput {
    /// # Errors
    ///
    /// Returns a [`RuleError`] for negative, inverted or zero-multiplier ranges.
    pub fn validated(self) -> Result<Self, RuleError> {
        if self.min_weight.is_sign_negative() && !self.min_weight.is_zero() {
            return Err(RuleError::NegativeWeight);
        }
        if let Some(max) = self.max_weight
            && max <= self.min_weight
        {
            return Err(RuleError::InvertedRange {
                min: self.min_weight,
                max,
            });
        }
        if self.price_multiplier.as_decimal().is_zero() {
            return Err(RuleError::ZeroMultiplier);
        }
        Ok(self)
    }
}

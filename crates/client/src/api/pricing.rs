//! Country and weight-range price multiplier endpoints.

use moogship_core::{
    CountryMultiplierId, CountryMultiplierInput, CountryPriceMultiplier, WeightRangeInput,
    WeightRangeMultiplierId, WeightRangePriceMultiplier,
};
use reqwest::Method;
use tracing::instrument;

use super::{ApiClient, ApiError};

pub(crate) const COUNTRY_MULTIPLIERS_PATH: &str = "/api/price-multipliers/countries";
pub(crate) const WEIGHT_MULTIPLIERS_PATH: &str = "/api/price-multipliers/weight-ranges";

impl ApiClient {
    /// `GET /api/price-multipliers/countries`
    #[instrument(skip(self))]
    pub async fn country_multipliers(&self) -> Result<Vec<CountryPriceMultiplier>, ApiError> {
        self.get_json(self.url(COUNTRY_MULTIPLIERS_PATH)?).await
    }

    #[instrument(skip(self, input), fields(country = %input.country_code))]
    pub async fn create_country_multiplier(
        &self,
        input: &CountryMultiplierInput,
    ) -> Result<CountryPriceMultiplier, ApiError> {
        self.send_json(Method::POST, self.url(COUNTRY_MULTIPLIERS_PATH)?, Some(input))
            .await
    }

    #[instrument(skip(self, input), fields(id = %id, country = %input.country_code))]
    pub async fn update_country_multiplier(
        &self,
        id: CountryMultiplierId,
        input: &CountryMultiplierInput,
    ) -> Result<CountryPriceMultiplier, ApiError> {
        self.send_json(
            Method::PUT,
            self.url(&format!("{COUNTRY_MULTIPLIERS_PATH}/{id}"))?,
            Some(input),
        )
        .await
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_country_multiplier(&self, id: CountryMultiplierId) -> Result<(), ApiError> {
        self.send_unit::<()>(
            Method::DELETE,
            self.url(&format!("{COUNTRY_MULTIPLIERS_PATH}/{id}"))?,
            None,
        )
        .await
    }

    /// `GET /api/price-multipliers/weight-ranges`
    #[instrument(skip(self))]
    pub async fn weight_multipliers(&self) -> Result<Vec<WeightRangePriceMultiplier>, ApiError> {
        self.get_json(self.url(WEIGHT_MULTIPLIERS_PATH)?).await
    }

    #[instrument(skip(self, input))]
    pub async fn create_weight_multiplier(
        &self,
        input: &WeightRangeInput,
    ) -> Result<WeightRangePriceMultiplier, ApiError> {
        self.send_json(Method::POST, self.url(WEIGHT_MULTIPLIERS_PATH)?, Some(input))
            .await
    }

    #[instrument(skip(self, input), fields(id = %id))]
    pub async fn update_weight_multiplier(
        &self,
        id: WeightRangeMultiplierId,
        input: &WeightRangeInput,
    ) -> Result<WeightRangePriceMultiplier, ApiError> {
        self.send_json(
            Method::PUT,
            self.url(&format!("{WEIGHT_MULTIPLIERS_PATH}/{id}"))?,
            Some(input),
        )
        .await
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_weight_multiplier(
        &self,
        id: WeightRangeMultiplierId,
    ) -> Result<(), ApiError> {
        self.send_unit::<()>(
            Method::DELETE,
            self.url(&format!("{WEIGHT_MULTIPLIERS_PATH}/{id}"))?,
            None,
        )
        .await
    }
}

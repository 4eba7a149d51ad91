//! Price multiplier rule actions (admin).

use moogship_core::{
    CountryMultiplierId, CountryMultiplierInput, CountryPriceMultiplier, WeightRangeInput,
    WeightRangeMultiplierId, WeightRangePriceMultiplier,
};
use tracing::instrument;

use crate::cache::QueryKey;
use crate::console::Console;
use crate::error::{MutationError, ValidationError};
use crate::mutation::{Action, MutationPlan};

impl Console {
    /// # Errors
    ///
    /// Fails without a request if the rule does not validate.
    #[instrument(skip(self, input), fields(country = %input.country_code))]
    pub async fn create_country_rule(
        &self,
        input: CountryMultiplierInput,
    ) -> Result<CountryPriceMultiplier, MutationError> {
        let action = Action::CreateCountryRule;
        let input = match input.validated() {
            Ok(input) => input,
            Err(err) => return self.mutations.reject(action, ValidationError::from(err)),
        };

        self.mutations
            .run(
                MutationPlan::new(action, 0_i64).invalidates(QueryKey::country_multipliers()),
                async {},
                self.api.create_country_multiplier(&input),
                |rule: &CountryPriceMultiplier| {
                    Some(format!("{} {}", rule.country_name, rule.price_multiplier))
                },
            )
            .await
    }

    /// Replace a country rule; the cached list shows the new values at once.
    ///
    /// # Errors
    ///
    /// Fails without a request if the rule does not validate.
    #[instrument(skip(self, input), fields(id = %id, country = %input.country_code))]
    pub async fn update_country_rule(
        &self,
        id: CountryMultiplierId,
        input: CountryMultiplierInput,
    ) -> Result<CountryPriceMultiplier, MutationError> {
        let action = Action::UpdateCountryRule;
        let input = match input.validated() {
            Ok(input) => input,
            Err(err) => return self.mutations.reject(action, ValidationError::from(err)),
        };

        let key = QueryKey::country_multipliers();
        let patch = self
            .cache
            .write::<Vec<CountryPriceMultiplier>, _>(&key, |rules| {
                rules
                    .iter()
                    .map(|r| {
                        if r.id == id {
                            CountryPriceMultiplier {
                                id,
                                country_code: input.country_code.clone(),
                                country_name: input.country_name.clone(),
                                price_multiplier: input.price_multiplier,
                                is_active: input.is_active,
                            }
                        } else {
                            r.clone()
                        }
                    })
                    .collect()
            });

        self.mutations
            .run(
                MutationPlan::new(action, id).invalidates(key.clone()),
                async {
                    patch.await;
                },
                self.api.update_country_multiplier(id, &input),
                |_| None,
            )
            .await
    }

    /// # Errors
    ///
    /// Returns the API error after reconciling the cache.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_country_rule(&self, id: CountryMultiplierId) -> Result<(), MutationError> {
        let key = QueryKey::country_multipliers();
        let patch = self
            .cache
            .write::<Vec<CountryPriceMultiplier>, _>(&key, |rules| {
                rules.iter().filter(|r| r.id != id).cloned().collect()
            });

        self.mutations
            .run(
                MutationPlan::new(Action::DeleteCountryRule, id).invalidates(key.clone()),
                async {
                    patch.await;
                },
                self.api.delete_country_multiplier(id),
                |()| None,
            )
            .await
    }

    /// # Errors
    ///
    /// Fails without a request if the range does not validate.
    #[instrument(skip(self, input))]
    pub async fn create_weight_rule(
        &self,
        input: WeightRangeInput,
    ) -> Result<WeightRangePriceMultiplier, MutationError> {
        let action = Action::CreateWeightRule;
        let input = match input.validated() {
            Ok(input) => input,
            Err(err) => return self.mutations.reject(action, ValidationError::from(err)),
        };

        self.mutations
            .run(
                MutationPlan::new(action, 0_i64).invalidates(QueryKey::weight_multipliers()),
                async {},
                self.api.create_weight_multiplier(&input),
                |rule: &WeightRangePriceMultiplier| {
                    Some(format!("{} {}", rule.range_label(), rule.price_multiplier))
                },
            )
            .await
    }

    /// # Errors
    ///
    /// Fails without a request if the range does not validate.
    #[instrument(skip(self, input), fields(id = %id))]
    pub async fn update_weight_rule(
        &self,
        id: WeightRangeMultiplierId,
        input: WeightRangeInput,
    ) -> Result<WeightRangePriceMultiplier, MutationError> {
        let action = Action::UpdateWeightRule;
        let input = match input.validated() {
            Ok(input) => input,
            Err(err) => return self.mutations.reject(action, ValidationError::from(err)),
        };

        let key = QueryKey::weight_multipliers();
        let patch = self
            .cache
            .write::<Vec<WeightRangePriceMultiplier>, _>(&key, |rules| {
                rules
                    .iter()
                    .map(|r| {
                        if r.id == id {
                            WeightRangePriceMultiplier {
                                id,
                                min_weight: input.min_weight,
                                max_weight: input.max_weight,
                                price_multiplier: input.price_multiplier,
                                is_active: input.is_active,
                            }
                        } else {
                            r.clone()
                        }
                    })
                    .collect()
            });

        self.mutations
            .run(
                MutationPlan::new(action, id).invalidates(key.clone()),
                async {
                    patch.await;
                },
                self.api.update_weight_multiplier(id, &input),
                |_| None,
            )
            .await
    }

    /// # Errors
    ///
    /// Returns the API error after reconciling the cache.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_weight_rule(
        &self,
        id: WeightRangeMultiplierId,
    ) -> Result<(), MutationError> {
        let key = QueryKey::weight_multipliers();
        let patch = self
            .cache
            .write::<Vec<WeightRangePriceMultiplier>, _>(&key, |rules| {
                rules.iter().filter(|r| r.id != id).cloned().collect()
            });

        self.mutations
            .run(
                MutationPlan::new(Action::DeleteWeightRule, id).invalidates(key.clone()),
                async {
                    patch.await;
                },
                self.api.delete_weight_multiplier(id),
                |()| None,
            )
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use moogship_core::{PriceMultiplier, RuleError};
    use rust_decimal::Decimal;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ClientConfig;

    #[tokio::test]
    async fn test_invalid_country_code_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/price-multipliers/countries"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;
        let console = Console::new(ClientConfig::new(&server.uri()).unwrap()).unwrap();

        let err = console
            .create_country_rule(CountryMultiplierInput {
                country_code: "USA".to_string(),
                country_name: "United States".to_string(),
                price_multiplier: PriceMultiplier::new(Decimal::new(12, 1)).unwrap(),
                is_active: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MutationError::Validation(ValidationError::InvalidRule(
                RuleError::InvalidCountryCode(_)
            ))
        ));
    }

    #[tokio::test]
    async fn test_delete_weight_rule_patches_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/price-multipliers/weight-ranges"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "minWeight": 0.0, "maxWeight": 5.0, "priceMultiplier": 1.1},
                {"id": 2, "minWeight": 5.0, "priceMultiplier": 1.3}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/price-multipliers/weight-ranges/2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let console = Console::new(ClientConfig::new(&server.uri()).unwrap()).unwrap();
        console.weight_multipliers().await.unwrap();

        console
            .delete_weight_rule(WeightRangeMultiplierId::new(2))
            .await
            .unwrap();

        let cached = console
            .cache()
            .get::<Vec<WeightRangePriceMultiplier>>(&QueryKey::weight_multipliers())
            .await
            .unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, WeightRangeMultiplierId::new(1));
    }
}

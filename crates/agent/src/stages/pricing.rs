use std::sync::Arc;

use rust_decimal::Decimal;
use tenderdesk_core::catalog::Catalog;
use tenderdesk_core::domain::analysis::{PricingStrategy, ProductMatch};
use tenderdesk_core::errors::{StageError, StageName};
use tenderdesk_core::pricing::{price_from_catalog, PricingEngine, PricingInput};
use tracing::info;

/// Prices the selected product. The completion service is never consulted.
pub struct PricingStage {
    catalog: Arc<dyn Catalog>,
    engine: Arc<dyn PricingEngine>,
}

impl PricingStage {
    pub fn new(catalog: Arc<dyn Catalog>, engine: Arc<dyn PricingEngine>) -> Self {
        Self { catalog, engine }
    }

    pub fn run(
        &self,
        product: &ProductMatch,
        quantity: u32,
        testing_required: &[String],
        services_requested: &[String],
        estimated_value: Option<Decimal>,
    ) -> Result<PricingStrategy, StageError> {
        let input = PricingInput {
            sku: product.sku.clone(),
            match_score: product.match_score,
            quantity,
            tests: testing_required.to_vec(),
            services: services_requested.to_vec(),
            estimated_value,
        };

        let strategy = price_from_catalog(self.catalog.as_ref(), self.engine.as_ref(), &input)
            .map_err(|error| StageError::new(StageName::Pricing, error))?;

        info!(
            event_name = "pipeline.stage.pricing.priced",
            sku = %product.sku,
            quantity,
            recommended_price = %strategy.recommended_price,
            risk_level = strategy.risk_level.as_str(),
            "pricing strategy computed"
        );
        Ok(strategy)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use tenderdesk_core::catalog::{InMemoryCatalog, SpecMatcher};
    use tenderdesk_core::domain::analysis::{ExtractedSpecs, ProductMatch};
    use tenderdesk_core::domain::product::{CableSpecification, Product, ProductSku};
    use tenderdesk_core::errors::{StageFailure, StageName};
    use tenderdesk_core::pricing::{DeterministicPricingEngine, PricingInputError};

    use super::PricingStage;

    fn product() -> Product {
        Product {
            sku: ProductSku("MV-11-240".to_string()),
            name: "11kV 3C x 240 Al XLPE SWA".to_string(),
            category: "Medium Voltage".to_string(),
            specifications: CableSpecification {
                voltage: "11kV".to_string(),
                armoring: "SWA".to_string(),
                conductor: "Aluminum".to_string(),
                ..CableSpecification::default()
            },
            price_per_meter: Some(Decimal::from(480)),
            test_costs: BTreeMap::from([("Routine Tests".to_string(), Decimal::from(30_000))]),
            service_costs: BTreeMap::new(),
            certifications: Vec::new(),
            available: true,
        }
    }

    fn selected(product: &Product) -> ProductMatch {
        SpecMatcher
            .match_product(&ExtractedSpecs::default(), product)
            .into_product_match(1, 70)
    }

    fn stage() -> PricingStage {
        PricingStage::new(
            Arc::new(InMemoryCatalog::new(vec![product()], 70)),
            Arc::new(DeterministicPricingEngine::default()),
        )
    }

    #[test]
    fn prices_the_selected_product_with_its_cost_tables() {
        let strategy = stage()
            .run(
                &selected(&product()),
                5000,
                &["Routine Tests".to_string()],
                &["Delivery".to_string()],
                None,
            )
            .expect("priceable");

        let breakdown = &strategy.pricing_breakdown;
        assert_eq!(breakdown.material_cost, Decimal::from(2_400_000));
        assert_eq!(breakdown.total_test_cost, Decimal::from(30_000));
        assert_eq!(breakdown.total_service_cost, Decimal::from(15_000));
        assert_eq!(breakdown.total, Decimal::from(2_445_000));
        assert!(strategy.scenarios.aggressive.price <= strategy.scenarios.premium.price);
    }

    #[test]
    fn unknown_sku_fails_the_pricing_stage() {
        let mut ghost = selected(&product());
        ghost.sku = ProductSku("RETIRED".to_string());

        let error = stage().run(&ghost, 100, &[], &[], None).expect_err("not in catalog");
        assert_eq!(error.stage, StageName::Pricing);
        assert_eq!(
            error.failure,
            StageFailure::PricingInput(PricingInputError::UnknownSku("RETIRED".to_string()))
        );
        assert_eq!(error.to_string(), "Pricing Agent failed: Pricing data not found for SKU: RETIRED");
    }
}

//! Deterministic bid pricing: cost breakdown, margin scenarios, market
//! position and risk. Nothing in here calls out to a completion service.

pub mod breakdown;
pub mod market;
pub mod risk;
pub mod scenarios;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::domain::{
    analysis::{PricingStrategy, StageStatus},
    product::{Product, ProductSku},
};

pub use breakdown::{build_breakdown, service_cost, test_cost, VolumeDiscountSchedule};
pub use market::{competitive_analysis, market_range, MarketRange};
pub use risk::{assess_risk, risk_score};
pub use scenarios::{build_scenarios, price_at_margin, realized_margin, TargetMargins};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingInputError {
    #[error("Pricing data not found for SKU: {0}")]
    UnknownSku(String),
    #[error("no positive unit price for SKU: {0}")]
    MissingUnitPrice(String),
    #[error("quantity must be greater than zero")]
    ZeroQuantity,
    #[error("{scenario} margin {margin}% is outside 0..100")]
    InvalidMargin { scenario: &'static str, margin: Decimal },
    #[error(
        "target margins must satisfy aggressive <= recommended <= premium (got {aggressive}, {recommended}, {premium})"
    )]
    NonMonotonicMargins { aggressive: Decimal, recommended: Decimal, premium: Decimal },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingInput {
    pub sku: ProductSku,
    pub match_score: u8,
    /// Meters.
    pub quantity: u32,
    pub tests: Vec<String>,
    pub services: Vec<String>,
    pub estimated_value: Option<Decimal>,
}

pub trait PricingEngine: Send + Sync {
    fn price(
        &self,
        product: &Product,
        input: &PricingInput,
    ) -> Result<PricingStrategy, PricingInputError>;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicPricingEngine {
    margins: TargetMargins,
    volume_discounts: Option<VolumeDiscountSchedule>,
}

impl DeterministicPricingEngine {
    pub fn new(margins: TargetMargins) -> Self {
        Self { margins, volume_discounts: None }
    }

    pub fn with_volume_discounts(mut self, schedule: VolumeDiscountSchedule) -> Self {
        self.volume_discounts = Some(schedule);
        self
    }

    pub fn margins(&self) -> &TargetMargins {
        &self.margins
    }
}

impl PricingEngine for DeterministicPricingEngine {
    fn price(
        &self,
        product: &Product,
        input: &PricingInput,
    ) -> Result<PricingStrategy, PricingInputError> {
        let pricing_breakdown = build_breakdown(
            product,
            input.quantity,
            &input.tests,
            &input.services,
            self.volume_discounts.as_ref(),
        )?;
        let scenarios = build_scenarios(pricing_breakdown.total, &self.margins)?;

        let recommended_price = scenarios.recommended.price;
        let competitive_analysis = competitive_analysis(
            market_range(&product.category),
            input.quantity,
            recommended_price,
        );
        let risk_level = assess_risk(
            input.match_score,
            self.margins.recommended,
            input.estimated_value,
            recommended_price,
        );

        Ok(PricingStrategy {
            recommended_price,
            aggressive_price: scenarios.aggressive.price,
            premium_price: scenarios.premium.price,
            margin_pct: self.margins.recommended,
            total_value: recommended_price,
            risk_level,
            pricing_breakdown,
            scenarios,
            competitive_analysis,
            status: StageStatus::Completed,
        })
    }
}

/// Resolves the SKU against `catalog` and prices it with `engine`.
pub fn price_from_catalog<C, E>(
    catalog: &C,
    engine: &E,
    input: &PricingInput,
) -> Result<PricingStrategy, PricingInputError>
where
    C: Catalog + ?Sized,
    E: PricingEngine + ?Sized,
{
    let product =
        catalog.find(&input.sku).ok_or_else(|| PricingInputError::UnknownSku(input.sku.0.clone()))?;
    engine.price(product, input)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{price_from_catalog, DeterministicPricingEngine, PricingInput, PricingInputError};
    use crate::catalog::{list_price_per_meter, InMemoryCatalog};
    use crate::domain::analysis::{MarketPosition, RiskLevel, StageStatus};
    use crate::domain::product::{CableSpecification, Product, ProductSku};

    fn mv_cable() -> Product {
        let specifications = CableSpecification {
            voltage: "11kV".to_string(),
            size: "3C x 240".to_string(),
            conductor: "Aluminum".to_string(),
            insulation: "XLPE".to_string(),
            armoring: "SWA".to_string(),
            standard: "IS 7098 Part 2".to_string(),
        };
        Product {
            sku: ProductSku("MV-11-240-AL-SWA".to_string()),
            name: "11kV 3C x 240 sq mm Al XLPE SWA".to_string(),
            category: "Medium Voltage".to_string(),
            price_per_meter: Some(list_price_per_meter(&specifications)),
            specifications,
            test_costs: Default::default(),
            service_costs: Default::default(),
            certifications: vec!["BIS Certified".to_string()],
            available: true,
        }
    }

    fn input(quantity: u32) -> PricingInput {
        PricingInput {
            sku: ProductSku("MV-11-240-AL-SWA".to_string()),
            match_score: 100,
            quantity,
            tests: Vec::new(),
            services: Vec::new(),
            estimated_value: Some(Decimal::from(6_000_000)),
        }
    }

    #[test]
    fn eleven_kv_armoured_aluminium_prices_at_the_documented_figures() {
        let catalog = InMemoryCatalog::new(vec![mv_cable()], 70);
        let strategy =
            price_from_catalog(&catalog, &DeterministicPricingEngine::default(), &input(5000))
                .expect("priceable");

        assert_eq!(strategy.pricing_breakdown.unit_price, Decimal::from(480));
        assert_eq!(strategy.pricing_breakdown.material_cost, Decimal::from(2_400_000));
        assert_eq!(strategy.recommended_price, Decimal::from(2_823_529));
        assert_eq!(strategy.total_value, strategy.recommended_price);
        assert_eq!(strategy.margin_pct, Decimal::from(15));
        assert_eq!(strategy.risk_level, RiskLevel::Low);
        assert_eq!(strategy.competitive_analysis.our_position, MarketPosition::Discount);
        assert_eq!(strategy.status, StageStatus::Completed);
        assert!(strategy.aggressive_price <= strategy.recommended_price);
        assert!(strategy.recommended_price <= strategy.premium_price);
    }

    #[test]
    fn unknown_sku_is_a_pricing_input_error() {
        let catalog = InMemoryCatalog::new(vec![mv_cable()], 70);
        let mut request = input(100);
        request.sku = ProductSku("NOPE".to_string());

        assert_eq!(
            price_from_catalog(&catalog, &DeterministicPricingEngine::default(), &request),
            Err(PricingInputError::UnknownSku("NOPE".to_string()))
        );
    }

    #[test]
    fn zero_quantity_is_rejected_before_any_arithmetic() {
        let catalog = InMemoryCatalog::new(vec![mv_cable()], 70);
        assert_eq!(
            price_from_catalog(&catalog, &DeterministicPricingEngine::default(), &input(0)),
            Err(PricingInputError::ZeroQuantity)
        );
    }
}

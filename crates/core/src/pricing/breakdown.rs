use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    analysis::{CostItem, PricingBreakdown},
    product::Product,
};
use crate::pricing::PricingInputError;

const DEFAULT_TEST_COST: i64 = 50_000;
const DEFAULT_SERVICE_COST: i64 = 20_000;

const TEST_COST_DEFAULTS: [(&str, i64); 6] = [
    ("routine", 25_000),
    ("type", 150_000),
    ("sample", 50_000),
    ("high voltage", 75_000),
    ("partial discharge", 80_000),
    ("fire", 100_000),
];

const SERVICE_COST_DEFAULTS: [(&str, i64); 4] = [
    ("delivery", 15_000),
    ("installation", 50_000),
    ("commissioning", 75_000),
    ("documentation", 10_000),
];

/// Exact name, then substring either way, then `None`.
fn lookup(name: &str, table: &BTreeMap<String, Decimal>) -> Option<Decimal> {
    if let Some(cost) = table.get(name).filter(|cost| !cost.is_zero()) {
        return Some(*cost);
    }

    let wanted = name.to_lowercase();
    table.iter().find_map(|(key, cost)| {
        let key = key.to_lowercase();
        (key.contains(&wanted) || wanted.contains(&key)).then_some(*cost)
    })
}

fn keyword_default(name: &str, defaults: &[(&str, i64)], fallback: i64) -> Decimal {
    let wanted = name.to_lowercase();
    let cost = defaults
        .iter()
        .find(|(keyword, _)| wanted.contains(keyword))
        .map(|(_, cost)| *cost)
        .unwrap_or(fallback);
    Decimal::from(cost)
}

pub fn test_cost(test: &str, table: &BTreeMap<String, Decimal>) -> Decimal {
    lookup(test, table)
        .unwrap_or_else(|| keyword_default(test, &TEST_COST_DEFAULTS, DEFAULT_TEST_COST))
}

pub fn service_cost(service: &str, table: &BTreeMap<String, Decimal>) -> Decimal {
    lookup(service, table)
        .unwrap_or_else(|| keyword_default(service, &SERVICE_COST_DEFAULTS, DEFAULT_SERVICE_COST))
}

/// Per-meter discount tiers keyed by minimum quantity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDiscountSchedule {
    /// `(minimum meters, discount percent)`, highest threshold first.
    pub tiers: Vec<(u32, Decimal)>,
}

impl Default for VolumeDiscountSchedule {
    fn default() -> Self {
        Self {
            tiers: vec![
                (10_000, Decimal::from(15)),
                (5_000, Decimal::from(10)),
                (2_000, Decimal::from(5)),
            ],
        }
    }
}

impl VolumeDiscountSchedule {
    pub fn discounted(&self, unit_price: Decimal, quantity: u32) -> Decimal {
        self.tiers
            .iter()
            .find(|(minimum, _)| quantity >= *minimum)
            .map(|(_, pct)| unit_price * (Decimal::ONE - pct / Decimal::ONE_HUNDRED))
            .unwrap_or(unit_price)
    }
}

pub fn build_breakdown(
    product: &Product,
    quantity: u32,
    tests: &[String],
    services: &[String],
    discounts: Option<&VolumeDiscountSchedule>,
) -> Result<PricingBreakdown, PricingInputError> {
    if quantity == 0 {
        return Err(PricingInputError::ZeroQuantity);
    }

    let list_price = product
        .price_per_meter
        .filter(|price| *price > Decimal::ZERO)
        .ok_or_else(|| PricingInputError::MissingUnitPrice(product.sku.0.clone()))?;
    let unit_price = match discounts {
        Some(schedule) => schedule.discounted(list_price, quantity),
        None => list_price,
    };
    let material_cost = unit_price * Decimal::from(quantity);

    let test_costs: Vec<CostItem> = tests
        .iter()
        .map(|name| CostItem { name: name.clone(), cost: test_cost(name, &product.test_costs) })
        .collect();
    let total_test_cost: Decimal = test_costs.iter().map(|item| item.cost).sum();

    let service_costs: Vec<CostItem> = services
        .iter()
        .map(|name| CostItem {
            name: name.clone(),
            cost: service_cost(name, &product.service_costs),
        })
        .collect();
    let total_service_cost: Decimal = service_costs.iter().map(|item| item.cost).sum();

    let subtotal = material_cost + total_test_cost + total_service_cost;

    Ok(PricingBreakdown {
        sku: product.sku.clone(),
        product_name: product.name.clone(),
        quantity,
        unit_price,
        material_cost,
        test_costs,
        total_test_cost,
        service_costs,
        total_service_cost,
        subtotal,
        total: subtotal,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::{build_breakdown, service_cost, test_cost, VolumeDiscountSchedule};
    use crate::domain::product::{CableSpecification, Product, ProductSku};
    use crate::pricing::PricingInputError;

    fn product(price: Option<Decimal>) -> Product {
        let mut test_costs = BTreeMap::new();
        test_costs.insert("Routine Test".to_string(), Decimal::from(30_000));
        Product {
            sku: ProductSku("MV-11-240-AL-SWA".to_string()),
            name: "11kV 3C x 240 Al XLPE SWA".to_string(),
            category: "Medium Voltage".to_string(),
            specifications: CableSpecification::default(),
            price_per_meter: price,
            test_costs,
            service_costs: BTreeMap::new(),
            certifications: Vec::new(),
            available: true,
        }
    }

    #[test]
    fn material_cost_is_unit_price_times_quantity() {
        let breakdown = build_breakdown(&product(Some(Decimal::from(480))), 5000, &[], &[], None)
            .expect("priceable");

        assert_eq!(breakdown.unit_price, Decimal::from(480));
        assert_eq!(breakdown.material_cost, Decimal::from(2_400_000));
        assert_eq!(breakdown.material_cost, breakdown.unit_price * Decimal::from(breakdown.quantity));
        assert_eq!(breakdown.total, breakdown.subtotal);
    }

    #[test]
    fn costs_fall_back_from_table_to_keyword_defaults() {
        let table = product(None).test_costs;
        assert_eq!(test_cost("Routine test", &table), Decimal::from(30_000));
        assert_eq!(test_cost("Type test", &table), Decimal::from(150_000));
        assert_eq!(test_cost("Fire survival test", &table), Decimal::from(100_000));
        assert_eq!(test_cost("Smoke density test", &table), Decimal::from(50_000));
        assert_eq!(service_cost("Delivery", &BTreeMap::new()), Decimal::from(15_000));
        assert_eq!(service_cost("Training", &BTreeMap::new()), Decimal::from(20_000));
    }

    #[test]
    fn totals_sum_material_tests_and_services() {
        let breakdown = build_breakdown(
            &product(Some(Decimal::from(480))),
            1000,
            &["Routine test".to_string(), "Type test".to_string()],
            &["Documentation".to_string(), "Delivery".to_string()],
            None,
        )
        .expect("priceable");

        assert_eq!(breakdown.total_test_cost, Decimal::from(180_000));
        assert_eq!(breakdown.total_service_cost, Decimal::from(25_000));
        assert_eq!(breakdown.subtotal, Decimal::from(480_000 + 180_000 + 25_000));
    }

    #[test]
    fn volume_discount_applies_only_when_scheduled() {
        let schedule = VolumeDiscountSchedule::default();
        let breakdown =
            build_breakdown(&product(Some(Decimal::from(480))), 5000, &[], &[], Some(&schedule))
                .expect("priceable");
        assert_eq!(breakdown.unit_price, Decimal::from(432));
        assert_eq!(schedule.discounted(Decimal::from(480), 1999), Decimal::from(480));
    }

    #[test]
    fn unpriceable_inputs_fail_fast() {
        assert!(matches!(
            build_breakdown(&product(None), 100, &[], &[], None),
            Err(PricingInputError::MissingUnitPrice(_))
        ));
        assert!(matches!(
            build_breakdown(&product(Some(Decimal::from(480))), 0, &[], &[], None),
            Err(PricingInputError::ZeroQuantity)
        ));
    }
}

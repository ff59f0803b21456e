use rust_decimal::Decimal;

use crate::domain::analysis::{
    ConsolidatedResponse, PricingStrategy, RiskLevel, SalesSummary, SelectedProduct,
    TechnicalAnalysis,
};

/// Minimum win probability, in percent, for a bid recommendation.
pub const BID_THRESHOLD: u8 = 60;

pub fn should_bid(win_probability: u8, compatible: bool, risk: RiskLevel) -> bool {
    win_probability >= BID_THRESHOLD && compatible && risk != RiskLevel::High
}

/// Folds the three stage outputs into the customer-facing response.
pub fn consolidate(
    sales: &SalesSummary,
    technical: &TechnicalAnalysis,
    pricing: &PricingStrategy,
) -> ConsolidatedResponse {
    let breakdown = &pricing.pricing_breakdown;
    let selected = &technical.selected_product;

    ConsolidatedResponse {
        selected_products: vec![SelectedProduct {
            sku: selected.sku.clone(),
            name: selected.name.clone(),
            specifications: selected.specifications.clone(),
            quantity: breakdown.quantity,
            unit_price: breakdown.unit_price,
            total_price: breakdown.material_cost,
        }],
        total_material_cost: breakdown.material_cost,
        total_test_cost: breakdown.total_test_cost,
        total_service_cost: breakdown.total_service_cost,
        grand_total: pricing.total_value,
        timeline: sales.delivery_timeline.clone(),
        certifications: sales.certifications.clone(),
    }
}

/// Sum of the line items before margin; equals the breakdown total.
pub fn cost_basis(response: &ConsolidatedResponse) -> Decimal {
    response.total_material_cost + response.total_test_cost + response.total_service_cost
}

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::analysis::{CompetitiveAnalysis, MarketPosition};

/// Per-meter market price band for a product category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRange {
    pub min: Decimal,
    pub max: Decimal,
    pub average: Decimal,
}

impl MarketRange {
    fn between(min: i64, max: i64) -> Self {
        let (min, max) = (Decimal::from(min), Decimal::from(max));
        Self { min, max, average: (min + max) / Decimal::TWO }
    }
}

pub fn market_range(category: &str) -> MarketRange {
    if category.contains("High Voltage") {
        MarketRange::between(3000, 5000)
    } else if category.contains("Medium Voltage") {
        MarketRange::between(1000, 2500)
    } else if category.contains("Fire Survival") {
        MarketRange::between(350, 600)
    } else if category.contains("Aerial") {
        MarketRange::between(400, 700)
    } else {
        MarketRange::between(500, 2000)
    }
}

fn whole(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Positions `recommended_price` against the market band scaled to `quantity`.
pub fn competitive_analysis(
    range: MarketRange,
    quantity: u32,
    recommended_price: Decimal,
) -> CompetitiveAnalysis {
    let meters = Decimal::from(quantity);
    let average = range.average * meters;

    let our_position = if recommended_price <= average * Decimal::new(95, 2) {
        MarketPosition::Discount
    } else if recommended_price >= average * Decimal::new(110, 2) {
        MarketPosition::Premium
    } else {
        MarketPosition::Competitive
    };

    CompetitiveAnalysis {
        market_price_min: whole(range.min * meters),
        market_price_max: whole(range.max * meters),
        market_price_avg: whole(average),
        our_position,
    }
}

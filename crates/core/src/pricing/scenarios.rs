use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::analysis::{PricingScenario, PricingScenarios};
use crate::pricing::PricingInputError;

/// Target gross margins, in percent of selling price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMargins {
    pub aggressive: Decimal,
    pub recommended: Decimal,
    pub premium: Decimal,
    pub optimal: Decimal,
}

impl Default for TargetMargins {
    fn default() -> Self {
        Self {
            aggressive: Decimal::from(8),
            recommended: Decimal::from(15),
            premium: Decimal::from(22),
            optimal: Decimal::from(18),
        }
    }
}

impl TargetMargins {
    pub fn validate(&self) -> Result<(), PricingInputError> {
        for (scenario, margin) in [
            ("aggressive", self.aggressive),
            ("recommended", self.recommended),
            ("premium", self.premium),
            ("optimal", self.optimal),
        ] {
            if margin < Decimal::ZERO || margin >= Decimal::ONE_HUNDRED {
                return Err(PricingInputError::InvalidMargin { scenario, margin });
            }
        }

        if self.aggressive > self.recommended || self.recommended > self.premium {
            return Err(PricingInputError::NonMonotonicMargins {
                aggressive: self.aggressive,
                recommended: self.recommended,
                premium: self.premium,
            });
        }

        Ok(())
    }
}

/// Price at which `margin_pct` of the selling price is margin over `cost`,
/// rounded to whole currency units.
pub fn price_at_margin(cost: Decimal, margin_pct: Decimal) -> Decimal {
    let retained = Decimal::ONE - margin_pct / Decimal::ONE_HUNDRED;
    (cost / retained).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Margin actually earned at `price`, in percent to two decimals.
pub fn realized_margin(cost: Decimal, price: Decimal) -> Decimal {
    if price.is_zero() {
        return Decimal::ZERO;
    }
    ((price - cost) / price * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn scenario(cost: Decimal, margin_pct: Decimal) -> PricingScenario {
    let price = price_at_margin(cost, margin_pct);
    PricingScenario { price, margin_pct: realized_margin(cost, price) }
}

pub fn build_scenarios(
    cost: Decimal,
    margins: &TargetMargins,
) -> Result<PricingScenarios, PricingInputError> {
    margins.validate()?;

    let scenarios = PricingScenarios {
        aggressive: scenario(cost, margins.aggressive),
        recommended: scenario(cost, margins.recommended),
        premium: scenario(cost, margins.premium),
        optimal: scenario(cost, margins.optimal),
    };

    let ordered = |low: &PricingScenario, high: &PricingScenario| {
        low.price <= high.price && low.margin_pct <= high.margin_pct
    };
    if !ordered(&scenarios.aggressive, &scenarios.recommended)
        || !ordered(&scenarios.recommended, &scenarios.premium)
    {
        return Err(PricingInputError::NonMonotonicMargins {
            aggressive: margins.aggressive,
            recommended: margins.recommended,
            premium: margins.premium,
        });
    }

    Ok(scenarios)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{build_scenarios, price_at_margin, realized_margin, TargetMargins};
    use crate::pricing::PricingInputError;

    #[test]
    fn recommended_price_inverts_the_margin() {
        let price = price_at_margin(Decimal::from(2_400_000), Decimal::from(15));
        assert_eq!(price, Decimal::from(2_823_529));
        assert_eq!(realized_margin(Decimal::from(2_400_000), price), Decimal::new(1500, 2));
    }

    #[test]
    fn scenarios_are_monotonic_in_price_and_margin() {
        let scenarios =
            build_scenarios(Decimal::from(1_234_567), &TargetMargins::default()).expect("valid");

        assert!(scenarios.aggressive.price <= scenarios.recommended.price);
        assert!(scenarios.recommended.price <= scenarios.premium.price);
        assert!(scenarios.aggressive.margin_pct <= scenarios.recommended.margin_pct);
        assert!(scenarios.recommended.margin_pct <= scenarios.premium.margin_pct);
        assert!(scenarios.optimal.price > scenarios.recommended.price);
    }

    #[test]
    fn zero_cost_prices_at_zero() {
        let scenarios = build_scenarios(Decimal::ZERO, &TargetMargins::default()).expect("valid");
        assert_eq!(scenarios.premium.price, Decimal::ZERO);
        assert_eq!(scenarios.premium.margin_pct, Decimal::ZERO);
    }

    #[test]
    fn non_monotonic_targets_are_rejected() {
        let margins = TargetMargins {
            aggressive: Decimal::from(20),
            ..TargetMargins::default()
        };
        assert!(matches!(
            build_scenarios(Decimal::from(1000), &margins),
            Err(PricingInputError::NonMonotonicMargins { .. })
        ));
    }

    #[test]
    fn margin_of_one_hundred_percent_is_rejected() {
        let margins = TargetMargins {
            premium: Decimal::ONE_HUNDRED,
            optimal: Decimal::from(18),
            ..TargetMargins::default()
        };
        assert!(matches!(
            margins.validate(),
            Err(PricingInputError::InvalidMargin { scenario: "premium", .. })
        ));
    }
}

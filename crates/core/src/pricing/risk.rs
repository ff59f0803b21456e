use rust_decimal::Decimal;

use crate::domain::analysis::RiskLevel;

/// Additive risk points; pure in all of its inputs.
pub fn risk_score(
    match_score: u8,
    margin_pct: Decimal,
    estimated_value: Option<Decimal>,
    price: Decimal,
) -> u8 {
    let mut score = 0;

    score += match match_score {
        0..=79 => 2,
        80..=89 => 1,
        _ => 0,
    };

    if margin_pct < Decimal::from(10) {
        score += 2;
    } else if margin_pct < Decimal::from(15) {
        score += 1;
    }

    if let Some(estimate) = estimated_value.filter(|value| *value > Decimal::ZERO) {
        let overshoot_pct = (price - estimate) / estimate * Decimal::ONE_HUNDRED;
        if overshoot_pct > Decimal::from(20) {
            score += 2;
        } else if overshoot_pct > Decimal::from(10) {
            score += 1;
        }
    }

    score
}

pub fn level_for_score(score: u8) -> RiskLevel {
    match score {
        4.. => RiskLevel::High,
        2..=3 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

pub fn assess_risk(
    match_score: u8,
    margin_pct: Decimal,
    estimated_value: Option<Decimal>,
    price: Decimal,
) -> RiskLevel {
    level_for_score(risk_score(match_score, margin_pct, estimated_value, price))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{assess_risk, risk_score};
    use crate::domain::analysis::RiskLevel;

    #[test]
    fn weak_match_thin_margin_and_overshoot_is_high_risk() {
        let estimate = Decimal::from(1_000_000);
        let price = Decimal::from(1_250_000);

        assert_eq!(risk_score(75, Decimal::from(9), Some(estimate), price), 6);
        assert_eq!(assess_risk(75, Decimal::from(9), Some(estimate), price), RiskLevel::High);
    }

    #[test]
    fn strong_match_at_standard_margin_is_low_risk() {
        assert_eq!(
            assess_risk(95, Decimal::from(15), Some(Decimal::from(3_000_000)), Decimal::from(2_823_529)),
            RiskLevel::Low
        );
    }

    #[test]
    fn missing_or_zero_estimate_skips_the_price_factor() {
        let price = Decimal::from(5_000_000);
        assert_eq!(risk_score(85, Decimal::from(15), None, price), 1);
        assert_eq!(risk_score(85, Decimal::from(15), Some(Decimal::ZERO), price), 1);
        assert_eq!(assess_risk(85, Decimal::from(12), None, price), RiskLevel::Medium);
    }

    #[test]
    fn assessment_is_deterministic() {
        let run = || assess_risk(82, Decimal::from(11), Some(Decimal::from(900)), Decimal::from(1000));
        assert_eq!(run(), run());
        assert_eq!(run(), RiskLevel::Medium);
    }
}

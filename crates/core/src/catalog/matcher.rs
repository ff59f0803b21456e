use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{
    analysis::{ExtractedSpecs, ProductMatch},
    product::Product,
};

pub const VOLTAGE_WEIGHT: f64 = 20.0;
pub const CONDUCTOR_WEIGHT: f64 = 15.0;
pub const INSULATION_WEIGHT: f64 = 20.0;
pub const SIZE_WEIGHT: f64 = 25.0;
pub const ARMORING_WEIGHT: f64 = 10.0;
pub const STANDARD_WEIGHT: f64 = 10.0;

/// Score of one product against one set of tender requirements.
#[derive(Clone, Debug, PartialEq)]
pub struct SpecMatch<'a> {
    pub product: &'a Product,
    pub score: u8,
    pub matched: Vec<String>,
    pub unmatched: Vec<String>,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
}

impl SpecMatch<'_> {
    pub fn into_product_match(self, rank: u8, threshold: u8) -> ProductMatch {
        let product = self.product;
        ProductMatch {
            rank,
            sku: product.sku.clone(),
            name: product.name.clone(),
            category: product.category.clone(),
            specifications: product.specifications.clone(),
            match_score: self.score,
            matched_specs: self.matched,
            unmatched_specs: self.unmatched,
            strengths: self.strengths,
            gaps: self.gaps,
            certifications: product.certifications.clone(),
            price_per_meter: product.price_per_meter,
            compatible: self.score >= threshold,
        }
    }
}

/// Weighted comparison of tender requirements against catalog specifications.
///
/// A requirement missing on either side contributes nothing, but its weight
/// still counts toward the maximum, so sparse tenders score low.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpecMatcher;

#[derive(Default)]
struct Tally {
    total: f64,
    max: f64,
    matched: Vec<String>,
    unmatched: Vec<String>,
    strengths: Vec<String>,
    gaps: Vec<String>,
}

impl Tally {
    fn credit(&mut self, points: f64, label: &str, strength: Option<String>) {
        self.total += points;
        self.matched.push(label.to_string());
        if let Some(strength) = strength {
            self.strengths.push(strength);
        }
    }

    fn miss(&mut self, label: &str, gap: String) {
        self.unmatched.push(label.to_string());
        self.gaps.push(gap);
    }
}

impl SpecMatcher {
    pub fn match_product<'a>(&self, specs: &ExtractedSpecs, product: &'a Product) -> SpecMatch<'a> {
        let offered = &product.specifications;
        let mut tally = Tally::default();

        tally.max += VOLTAGE_WEIGHT;
        if let (Some(required), Some(has)) = (specs.voltage.as_deref(), offered.field("voltage")) {
            let similarity = voltage_similarity(required, has);
            if similarity >= 0.8 {
                tally.credit(
                    VOLTAGE_WEIGHT * similarity,
                    "Voltage",
                    Some(format!("Voltage rating {has} matches requirement")),
                );
            } else {
                tally.miss("Voltage", format!("Voltage {has} may not match {required}"));
            }
        }

        tally.max += CONDUCTOR_WEIGHT;
        if let (Some(required), Some(has)) =
            (specs.conductor.as_deref(), offered.field("conductor"))
        {
            if normalize(required) == normalize(has) {
                tally.credit(CONDUCTOR_WEIGHT, "Conductor", Some(format!("{has} conductor as required")));
            } else {
                tally.miss("Conductor", format!("Requires {required}, product has {has}"));
            }
        }

        tally.max += INSULATION_WEIGHT;
        if let (Some(required), Some(has)) =
            (specs.insulation.as_deref(), offered.field("insulation"))
        {
            let similarity = insulation_similarity(required, has);
            if similarity >= 0.8 {
                tally.credit(
                    INSULATION_WEIGHT * similarity,
                    "Insulation",
                    Some(format!("Insulation type {has} matches requirement")),
                );
            } else {
                tally.miss(
                    "Insulation",
                    format!("Insulation mismatch: requires {required}, has {has}"),
                );
            }
        }

        tally.max += SIZE_WEIGHT;
        if let (Some(required), Some(has)) = (specs.size.as_deref(), offered.field("size")) {
            let similarity = size_similarity(required, has);
            if similarity >= 0.9 {
                tally.credit(
                    SIZE_WEIGHT * similarity,
                    "Size/Cross-section",
                    Some(format!("Size {has} matches specification")),
                );
            } else if similarity >= 0.5 {
                tally.credit(SIZE_WEIGHT * similarity * 0.7, "Size/Cross-section (Partial)", None);
                tally.gaps.push(format!("Size {has} approximately matches {required}"));
            } else {
                tally.miss(
                    "Size/Cross-section",
                    format!("Size mismatch: requires {required}, has {has}"),
                );
            }
        }

        tally.max += ARMORING_WEIGHT;
        if let (Some(required), Some(has)) = (specs.armoring.as_deref(), offered.field("armoring")) {
            if armoring_matches(required, has) {
                tally.credit(ARMORING_WEIGHT, "Armoring", Some(format!("Armoring type {has} as specified")));
            } else {
                tally.miss("Armoring", format!("Armoring type differs: requires {required}"));
            }
        }

        tally.max += STANDARD_WEIGHT;
        if let (Some(required), Some(has)) = (specs.standard.as_deref(), offered.field("standard")) {
            if standard_matches(required, has) {
                tally.credit(STANDARD_WEIGHT, "Standard", Some(format!("Compliant with {has}")));
            } else {
                tally.miss("Standard", format!("Standard mismatch: requires {required}"));
            }
        }

        let score = if tally.max > 0.0 {
            ((tally.total / tally.max) * 100.0).round().clamp(0.0, 100.0) as u8
        } else {
            0
        };

        SpecMatch {
            product,
            score,
            matched: tally.matched,
            unmatched: tally.unmatched,
            strengths: tally.strengths,
            gaps: tally.gaps,
        }
    }

    /// Best `limit` products by descending score; equal scores keep catalog order.
    pub fn top_matches<'a>(
        &self,
        specs: &ExtractedSpecs,
        products: &'a [Product],
        limit: usize,
    ) -> Vec<SpecMatch<'a>> {
        let mut matches: Vec<SpecMatch<'a>> =
            products.iter().map(|product| self.match_product(specs, product)).collect();
        matches.sort_by(|left, right| right.score.cmp(&left.score));
        matches.truncate(limit);
        matches
    }
}

fn normalize(value: &str) -> String {
    value.chars().filter(char::is_ascii_alphanumeric).map(|c| c.to_ascii_lowercase()).collect()
}

fn first_number(value: &str) -> Option<f64> {
    number_pattern().find(value).and_then(|found| found.as_str().parse::<f64>().ok())
}

fn voltage_similarity(required: &str, offered: &str) -> f64 {
    let required = first_number(required).unwrap_or(0.0);
    let offered = first_number(offered).unwrap_or(0.0);
    let distance = (required - offered).abs();

    if distance == 0.0 {
        1.0
    } else if distance <= 1.0 {
        0.9
    } else if distance <= 5.0 {
        0.7
    } else {
        0.3
    }
}

fn insulation_similarity(required: &str, offered: &str) -> f64 {
    let required = normalize(required);
    let offered = normalize(offered);
    let same_family = ["xlpe", "pvc", "lszh"]
        .iter()
        .any(|family| required.contains(family) && offered.contains(family));

    if required == offered || same_family {
        1.0
    } else {
        0.4
    }
}

fn size_similarity(required: &str, offered: &str) -> f64 {
    if normalize(required) == normalize(offered) {
        return 1.0;
    }

    let mut similarity = 0.0;
    if cores(required) == cores(offered) {
        similarity += 0.5;
    }

    let distance = (cross_section(required) - cross_section(offered)).abs();
    if distance == 0.0 {
        similarity += 0.5;
    } else if distance <= 10.0 {
        similarity += 0.4;
    } else if distance <= 50.0 {
        similarity += 0.2;
    }

    similarity
}

fn cores(size: &str) -> u32 {
    cores_pattern()
        .captures(size)
        .and_then(|captures| captures[1].parse::<u32>().ok())
        .unwrap_or(1)
}

fn cross_section(size: &str) -> f64 {
    cross_section_pattern()
        .captures(size)
        .and_then(|captures| captures[1].parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn armoring_matches(required: &str, offered: &str) -> bool {
    let required = normalize(required);
    let offered = normalize(offered);
    let unarmored = |value: &str| value.contains("unarmor") || value.contains("none");

    required == offered
        || (required.contains("swa") && offered.contains("swa"))
        || (required.contains("awa") && offered.contains("awa"))
        || (unarmored(&required) && unarmored(&offered))
}

fn standard_matches(required: &str, offered: &str) -> bool {
    if normalize(required) == normalize(offered) {
        return true;
    }

    let same_family = ["IS", "IEC"]
        .iter()
        .any(|family| required.contains(family) && offered.contains(family));
    if !same_family {
        return false;
    }

    let digits = |value: &str| digits_pattern().find(value).map(|found| found.as_str().to_string());
    matches!((digits(required), digits(offered)), (Some(left), Some(right)) if left == right)
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+\.?\d*").expect("valid regex"))
}

fn digits_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

fn cores_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)(\d+)C?\s*x").expect("valid regex"))
}

fn cross_section_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"x\s*(\d+\.?\d*)").expect("valid regex"))
}

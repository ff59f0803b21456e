pub mod compliance;
pub mod matcher;

use rust_decimal::Decimal;

use crate::domain::{
    analysis::{ExtractedSpecs, ProductMatch},
    product::{CableSpecification, Product, ProductSku},
};
use crate::pricing::{market_range, MarketRange};

pub use compliance::{comparison_table, standards_for, testing_capabilities};
pub use matcher::{SpecMatch, SpecMatcher};

pub const DEFAULT_COMPATIBILITY_THRESHOLD: u8 = 70;
pub const RECOMMENDATION_LIMIT: usize = 3;

/// Read-only product catalog the technical and pricing stages consult.
pub trait Catalog: Send + Sync {
    /// Products eligible for matching.
    fn products(&self) -> &[Product];

    fn compatibility_threshold(&self) -> u8;

    fn find(&self, sku: &ProductSku) -> Option<&Product> {
        self.products().iter().find(|product| &product.sku == sku)
    }

    /// Ranked best-first, rank starting at 1.
    fn top_matches(&self, specs: &ExtractedSpecs, limit: usize) -> Vec<ProductMatch> {
        let threshold = self.compatibility_threshold();
        SpecMatcher
            .top_matches(specs, self.products(), limit)
            .into_iter()
            .zip(1u8..)
            .map(|(found, rank)| found.into_product_match(rank, threshold))
            .collect()
    }

    fn find_best_match(&self, specs: &ExtractedSpecs) -> Option<ProductMatch> {
        self.top_matches(specs, 1).into_iter().next()
    }

    fn estimate_market_price(&self, category: &str) -> MarketRange {
        market_range(category)
    }
}

#[derive(Clone, Debug)]
pub struct InMemoryCatalog {
    products: Vec<Product>,
    threshold: u8,
}

impl InMemoryCatalog {
    /// Unavailable products are dropped on construction.
    pub fn new(products: Vec<Product>, threshold: u8) -> Self {
        let products = products.into_iter().filter(|product| product.available).collect();
        Self { products, threshold }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new(Vec::new(), DEFAULT_COMPATIBILITY_THRESHOLD)
    }
}

impl Catalog for InMemoryCatalog {
    fn products(&self) -> &[Product] {
        &self.products
    }

    fn compatibility_threshold(&self) -> u8 {
        self.threshold
    }
}

/// List price per meter used when seeding the catalog.
pub fn list_price_per_meter(specs: &CableSpecification) -> Decimal {
    let voltage = specs.voltage.as_str();
    let base = if voltage.contains("33") {
        650
    } else if voltage.contains("22") {
        550
    } else if voltage.contains("11") {
        450
    } else if voltage.contains("6.6") {
        400
    } else {
        450
    };

    let armoring = if specs.armoring.to_ascii_uppercase().contains("SWA") { 30 } else { 0 };
    let conductor = if specs.conductor.eq_ignore_ascii_case("copper") { 50 } else { 0 };

    Decimal::from(base + armoring + conductor)
}

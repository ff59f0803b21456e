use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductSku(pub String);

impl std::fmt::Display for ProductSku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rated construction of a cable as listed in the catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CableSpecification {
    pub voltage: String,
    pub size: String,
    pub conductor: String,
    pub insulation: String,
    pub armoring: String,
    pub standard: String,
}

impl CableSpecification {
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "voltage" => &self.voltage,
            "size" => &self.size,
            "conductor" => &self.conductor,
            "insulation" => &self.insulation,
            "armoring" => &self.armoring,
            "standard" => &self.standard,
            _ => return None,
        };
        (!value.trim().is_empty()).then_some(value.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub sku: ProductSku,
    pub name: String,
    pub category: String,
    pub specifications: CableSpecification,
    /// `None` marks a catalog entry that cannot be priced.
    pub price_per_meter: Option<Decimal>,
    #[serde(default)]
    pub test_costs: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub service_costs: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub certifications: Vec<String>,
    pub available: bool,
}

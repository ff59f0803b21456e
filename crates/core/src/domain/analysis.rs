//! Typed outputs of the analysis stages.
//!
//! Each record is produced once by its stage and carried forward unchanged;
//! a record is only meaningful to downstream consumers once its `status`
//! reads [`StageStatus::Completed`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{CableSpecification, ProductSku};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Completed,
}

/// Fields recovered from raw tender text. Absence is `None`, never an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedSpecs {
    pub voltage: Option<String>,
    pub size: Option<String>,
    pub conductor: Option<String>,
    pub insulation: Option<String>,
    pub armoring: Option<String>,
    pub standard: Option<String>,
    /// Meters.
    pub quantity: Option<u32>,
}

impl ExtractedSpecs {
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "voltage" => self.voltage.as_deref(),
            "size" => self.size.as_deref(),
            "conductor" => self.conductor.as_deref(),
            "insulation" => self.insulation.as_deref(),
            "armoring" => self.armoring.as_deref(),
            "standard" => self.standard.as_deref(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub scope_of_supply: String,
    /// Display form, e.g. `"5,000 meters"` or `"Not specified"`.
    pub quantity: String,
    pub testing_required: Vec<String>,
    pub certifications: Vec<String>,
    pub delivery_timeline: String,
    pub estimated_value: Option<Decimal>,
    pub extracted_specs: ExtractedSpecs,
    pub status: StageStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub rank: u8,
    pub sku: ProductSku,
    pub name: String,
    pub category: String,
    pub specifications: CableSpecification,
    pub match_score: u8,
    pub matched_specs: Vec<String>,
    pub unmatched_specs: Vec<String>,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub certifications: Vec<String>,
    pub price_per_meter: Option<Decimal>,
    pub compatible: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub parameter: String,
    pub requirement: String,
    pub candidates: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalAnalysis {
    pub product_match_score: u8,
    pub compatible: bool,
    pub standards: Vec<String>,
    pub testing_capabilities: Vec<String>,
    pub recommendations: Vec<ProductMatch>,
    pub selected_product: ProductMatch,
    pub comparison_table: Vec<ComparisonRow>,
    pub status: StageStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostItem {
    pub name: String,
    pub cost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub sku: ProductSku,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub material_cost: Decimal,
    pub test_costs: Vec<CostItem>,
    pub total_test_cost: Decimal,
    pub service_costs: Vec<CostItem>,
    pub total_service_cost: Decimal,
    pub subtotal: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingScenario {
    pub price: Decimal,
    pub margin_pct: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingScenarios {
    pub aggressive: PricingScenario,
    pub recommended: PricingScenario,
    pub premium: PricingScenario,
    pub optimal: PricingScenario,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPosition {
    Competitive,
    Premium,
    Discount,
}

impl MarketPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Competitive => "competitive",
            Self::Premium => "premium",
            Self::Discount => "discount",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitiveAnalysis {
    pub market_price_min: Decimal,
    pub market_price_max: Decimal,
    pub market_price_avg: Decimal,
    pub our_position: MarketPosition,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingStrategy {
    pub recommended_price: Decimal,
    pub aggressive_price: Decimal,
    pub premium_price: Decimal,
    pub margin_pct: Decimal,
    pub total_value: Decimal,
    pub risk_level: RiskLevel,
    pub pricing_breakdown: PricingBreakdown,
    pub scenarios: PricingScenarios,
    pub competitive_analysis: CompetitiveAnalysis,
    pub status: StageStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinProbability {
    pub score: u8,
    pub reasoning: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedProduct {
    pub sku: ProductSku,
    pub name: String,
    pub specifications: CableSpecification,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedResponse {
    pub selected_products: Vec<SelectedProduct>,
    pub total_material_cost: Decimal,
    pub total_test_cost: Decimal,
    pub total_service_cost: Decimal,
    pub grand_total: Decimal,
    pub timeline: String,
    pub certifications: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidResponse {
    pub win_probability: u8,
    pub reasoning: String,
    pub recommendation: String,
    pub should_bid: bool,
    pub consolidated_response: ConsolidatedResponse,
    pub generated_at: DateTime<Utc>,
}

/// Everything a completed pipeline run produced for one tender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidAnalysis {
    pub sales: SalesSummary,
    pub technical: TechnicalAnalysis,
    pub pricing: PricingStrategy,
    pub bid: BidResponse,
}

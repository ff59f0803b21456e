use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use tenderdesk_core::catalog::list_price_per_meter;
use tenderdesk_core::domain::product::{CableSpecification, Product, ProductSku};
use tenderdesk_core::domain::tender::{TenderId, TenderRecord};
use tenderdesk_core::extraction::SpecExtractor;

use crate::connection::DbPool;
use crate::repositories::{
    ProductRepository, RepositoryError, SqlProductRepository, SqlTenderRepository,
    TenderRepository,
};

struct SeedProduct {
    sku: &'static str,
    category: &'static str,
    voltage: &'static str,
    size: &'static str,
    conductor: &'static str,
    insulation: &'static str,
    armoring: &'static str,
    standard: &'static str,
    certifications: &'static [&'static str],
}

const SEED_PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        sku: "LV-1.1-4C-95-AL",
        category: "Low Voltage",
        voltage: "1.1kV",
        size: "4C x 95",
        conductor: "Aluminum",
        insulation: "PVC",
        armoring: "SWA",
        standard: "IS 1554",
        certifications: &["BIS Certified", "ISO 9001:2015"],
    },
    SeedProduct {
        sku: "LV-1.1-4C-185-CU",
        category: "Low Voltage",
        voltage: "1.1kV",
        size: "4C x 185",
        conductor: "Copper",
        insulation: "XLPE",
        armoring: "SWA",
        standard: "IS 7098",
        certifications: &["BIS Certified", "ISO 9001:2015"],
    },
    SeedProduct {
        sku: "MV-6.6-3C-185-AL",
        category: "Medium Voltage",
        voltage: "6.6kV",
        size: "3C x 185",
        conductor: "Aluminum",
        insulation: "XLPE",
        armoring: "SWA",
        standard: "IS 7098",
        certifications: &["BIS Certified", "ISO 9001:2015"],
    },
    SeedProduct {
        sku: "MV-11-3C-240-AL",
        category: "Medium Voltage",
        voltage: "11kV",
        size: "3C x 240",
        conductor: "Aluminum",
        insulation: "XLPE",
        armoring: "SWA",
        standard: "IS 7098",
        certifications: &["BIS Certified", "ISO 9001:2015", "CPRI Type Tested"],
    },
    SeedProduct {
        sku: "MV-11-3C-300-CU",
        category: "Medium Voltage",
        voltage: "11kV",
        size: "3C x 300",
        conductor: "Copper",
        insulation: "XLPE",
        armoring: "SWA",
        standard: "IEC 60502",
        certifications: &["BIS Certified", "IEC Certified"],
    },
    SeedProduct {
        sku: "MV-22-3C-240-AL",
        category: "Medium Voltage",
        voltage: "22kV",
        size: "3C x 240",
        conductor: "Aluminum",
        insulation: "XLPE",
        armoring: "SWA",
        standard: "IS 7098",
        certifications: &["BIS Certified", "ISO 9001:2015"],
    },
    SeedProduct {
        sku: "HV-33-1C-400-CU",
        category: "High Voltage",
        voltage: "33kV",
        size: "1C x 400",
        conductor: "Copper",
        insulation: "XLPE",
        armoring: "Unarmored",
        standard: "IEC 60502",
        certifications: &["IEC Certified", "CPRI Type Tested"],
    },
    SeedProduct {
        sku: "HV-33-3C-300-AL",
        category: "High Voltage",
        voltage: "33kV",
        size: "3C x 300",
        conductor: "Aluminum",
        insulation: "XLPE",
        armoring: "SWA",
        standard: "IS 7098",
        certifications: &["BIS Certified", "CPRI Type Tested"],
    },
];

struct SeedTender {
    id: &'static str,
    title: &'static str,
    issued_by: &'static str,
    summary: &'static str,
    days_to_deadline: i64,
}

const SEED_TENDERS: &[SeedTender] = &[
    SeedTender {
        id: "TND-DEMO-001",
        title: "Supply of 11kV XLPE Power Cable - 5,000 Meters",
        issued_by: "Maharashtra State Electricity Distribution Co. Ltd.",
        summary: "Tender for supply and delivery of 11kV power cable, size 3C x 240 sq mm, as \
                  per IS 7098. Conductor: Aluminum. Insulation: XLPE. Armoring: SWA. \
                  Quantity: 5,000 meters. Routine tests and type tests shall be witnessed. \
                  BIS certification and ISO 9001:2015 required. Delivery within 90 days.",
        days_to_deadline: 14,
    },
    SeedTender {
        id: "TND-DEMO-002",
        title: "Supply of 33kV Copper Cable for Substation Feeders",
        issued_by: "Power Grid Corporation of India Ltd.",
        summary: "Supply of 33kV cable, size 1C x 400 sq mm, conforming to IEC 60502. \
                  Conductor: Copper. Insulation: XLPE. Armoring: Unarmored. \
                  Quantity: 12,000 meters. Type tests and partial discharge tests required. \
                  Delivery within 120 days.",
        days_to_deadline: 45,
    },
    SeedTender {
        id: "TND-DEMO-003",
        title: "LT Distribution Cable for Smart City Works",
        issued_by: "Smart City Development Corporation",
        summary: "Supply of 1.1kV LT cable, size 4C x 95 sq mm, as per IS 1554. \
                  Conductor: Aluminum. Insulation: PVC. Armoring: SWA. \
                  Quantity: 2,500 meters. Routine tests at factory. Delivery within 60 days.",
        days_to_deadline: 120,
    },
];

/// Fixed cost tables; anything not listed falls back to keyword defaults at pricing time.
fn seed_test_costs(voltage: &str) -> BTreeMap<String, Decimal> {
    let type_tests = if voltage.contains("33") { 200_000 } else { 150_000 };
    BTreeMap::from([
        ("Routine Tests".to_string(), Decimal::from(25_000)),
        ("Type Tests".to_string(), Decimal::from(type_tests)),
        ("Sample Tests".to_string(), Decimal::from(50_000)),
    ])
}

fn seed_service_costs() -> BTreeMap<String, Decimal> {
    BTreeMap::from([
        ("Delivery".to_string(), Decimal::from(15_000)),
        ("Installation".to_string(), Decimal::from(50_000)),
        ("Documentation".to_string(), Decimal::from(10_000)),
    ])
}

/// Products the seed loads, priced with the list-price rule.
pub fn seed_products() -> Vec<Product> {
    SEED_PRODUCTS
        .iter()
        .map(|seed| {
            let specifications = CableSpecification {
                voltage: seed.voltage.to_string(),
                size: seed.size.to_string(),
                conductor: seed.conductor.to_string(),
                insulation: seed.insulation.to_string(),
                armoring: seed.armoring.to_string(),
                standard: seed.standard.to_string(),
            };
            Product {
                sku: ProductSku(seed.sku.to_string()),
                name: format!(
                    "{} {} {} {} {}",
                    seed.voltage, seed.size, seed.conductor, seed.insulation, seed.armoring
                ),
                category: seed.category.to_string(),
                price_per_meter: Some(list_price_per_meter(&specifications)),
                specifications,
                test_costs: seed_test_costs(seed.voltage),
                service_costs: seed_service_costs(),
                certifications: seed.certifications.iter().map(|c| c.to_string()).collect(),
                available: true,
            }
        })
        .collect()
}

/// Demo tenders with deadlines relative to `today`; specs are pre-extracted from the summary.
pub fn seed_tenders(today: NaiveDate) -> Vec<TenderRecord> {
    let now = Utc::now();

    SEED_TENDERS
        .iter()
        .map(|seed| {
            TenderRecord::new(
                TenderId(seed.id.to_string()),
                seed.title,
                seed.issued_by,
                seed.summary,
                today + Duration::days(seed.days_to_deadline),
                now,
            )
            .with_extracted_terms(SpecExtractor.extract(seed.summary))
        })
        .collect()
}

pub struct SeedDataset;

impl SeedDataset {
    /// Upserts the catalog and demo tenders; safe to run repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let products = SqlProductRepository::new(pool.clone());
        let tenders = SqlTenderRepository::new(pool.clone());

        let mut result = SeedResult::default();
        for product in seed_products() {
            result.products_seeded.push(product.sku.0.clone());
            products.save(product).await?;
        }
        for tender in seed_tenders(Utc::now().date_naive()) {
            if tenders.find_by_id(&tender.id).await?.is_some() {
                result.tenders_skipped.push(tender.id.0.clone());
                continue;
            }
            result.tenders_seeded.push(tender.id.0.clone());
            tenders.save(tender).await?;
        }

        Ok(result)
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let products = SqlProductRepository::new(pool.clone());
        let tenders = SqlTenderRepository::new(pool.clone());

        let mut checks = Vec::new();
        for seed in SEED_PRODUCTS {
            let found = products.find_by_sku(&ProductSku(seed.sku.to_string())).await?;
            let priced = found
                .as_ref()
                .map(|product| product.available && product.price_per_meter.is_some())
                .unwrap_or(false);
            checks.push((format!("product {} present and priced", seed.sku), priced));
        }
        for seed in SEED_TENDERS {
            let found = tenders.find_by_id(&TenderId(seed.id.to_string())).await?;
            checks.push((format!("tender {} present", seed.id), found.is_some()));
        }

        Ok(VerificationResult { all_present: checks.iter().all(|(_, ok)| *ok), checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let tenders = SqlTenderRepository::new(pool.clone());
        for seed in SEED_TENDERS {
            tenders.permanent_delete(&TenderId(seed.id.to_string())).await?;
        }
        for seed in SEED_PRODUCTS {
            sqlx::query("DELETE FROM product WHERE sku = ?").bind(seed.sku).execute(pool).await?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub products_seeded: Vec<String>,
    pub tenders_seeded: Vec<String>,
    /// Demo tenders already present; left untouched so analyses survive a re-seed.
    pub tenders_skipped: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

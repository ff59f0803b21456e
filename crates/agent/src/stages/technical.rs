use std::sync::Arc;

use tenderdesk_core::catalog::{
    comparison_table, standards_for, testing_capabilities, Catalog, RECOMMENDATION_LIMIT,
};
use tenderdesk_core::domain::analysis::{ExtractedSpecs, StageStatus, TechnicalAnalysis};
use tenderdesk_core::errors::{StageError, StageFailure, StageName};
use tracing::info;

/// Technical analysis against the product catalog. Fully deterministic.
pub struct TechnicalStage {
    catalog: Arc<dyn Catalog>,
}

impl TechnicalStage {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    pub fn run(
        &self,
        specs: &ExtractedSpecs,
        testing_required: &[String],
        certifications: &[String],
    ) -> Result<TechnicalAnalysis, StageError> {
        let threshold = self.catalog.compatibility_threshold();
        let recommendations = self.catalog.top_matches(specs, RECOMMENDATION_LIMIT);

        let selected = match recommendations.first() {
            Some(best) if best.compatible => best.clone(),
            best => {
                let best_score = best.map(|found| found.match_score).unwrap_or(0);
                return Err(StageError::new(
                    StageName::Technical,
                    StageFailure::NoSuitableProduct { best_score, threshold },
                ));
            }
        };

        info!(
            event_name = "pipeline.stage.technical.selected",
            sku = %selected.sku,
            match_score = selected.match_score,
            candidates = recommendations.len(),
            "technical analysis selected a product"
        );

        Ok(TechnicalAnalysis {
            product_match_score: selected.match_score,
            compatible: selected.compatible,
            standards: standards_for(specs, certifications),
            testing_capabilities: testing_capabilities(testing_required),
            comparison_table: comparison_table(specs, &recommendations),
            recommendations,
            selected_product: selected,
            status: StageStatus::Completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use tenderdesk_core::catalog::InMemoryCatalog;
    use tenderdesk_core::domain::analysis::{ExtractedSpecs, StageStatus};
    use tenderdesk_core::domain::product::{CableSpecification, Product, ProductSku};
    use tenderdesk_core::errors::{StageFailure, StageName};

    use super::TechnicalStage;

    fn cable(sku: &str, voltage: &str, size: &str) -> Product {
        Product {
            sku: ProductSku(sku.to_string()),
            name: format!("{voltage} {size} Al XLPE SWA"),
            category: "Medium Voltage".to_string(),
            specifications: CableSpecification {
                voltage: voltage.to_string(),
                size: size.to_string(),
                conductor: "Aluminum".to_string(),
                insulation: "XLPE".to_string(),
                armoring: "SWA".to_string(),
                standard: "IS 7098".to_string(),
            },
            price_per_meter: Some(Decimal::from(480)),
            test_costs: BTreeMap::new(),
            service_costs: BTreeMap::new(),
            certifications: vec!["BIS Certified".to_string()],
            available: true,
        }
    }

    fn mv_specs() -> ExtractedSpecs {
        ExtractedSpecs {
            voltage: Some("11kV".to_string()),
            size: Some("3C x 240".to_string()),
            conductor: Some("Aluminum".to_string()),
            insulation: Some("XLPE".to_string()),
            armoring: Some("SWA".to_string()),
            standard: Some("IS 7098".to_string()),
            quantity: Some(5000),
        }
    }

    fn stage(products: Vec<Product>) -> TechnicalStage {
        TechnicalStage::new(Arc::new(InMemoryCatalog::new(products, 70)))
    }

    #[test]
    fn selects_the_best_compatible_product() {
        let analysis = stage(vec![
            cable("MV-22-240", "22kV", "3C x 240"),
            cable("MV-11-240", "11kV", "3C x 240"),
            cable("MV-11-185", "11kV", "3C x 185"),
        ])
        .run(&mv_specs(), &["Routine test".to_string()], &[])
        .expect("compatible product");

        assert_eq!(analysis.selected_product.sku.0, "MV-11-240");
        assert_eq!(analysis.product_match_score, 100);
        assert!(analysis.compatible);
        assert_eq!(analysis.recommendations.len(), 3);
        assert_eq!(analysis.recommendations[0].rank, 1);
        assert_eq!(analysis.testing_capabilities, vec!["Routine Test - In-house lab"]);
        assert!(!analysis.comparison_table.is_empty());
        assert_eq!(analysis.status, StageStatus::Completed);
    }

    #[test]
    fn empty_catalog_has_no_suitable_product() {
        let error = stage(Vec::new()).run(&mv_specs(), &[], &[]).expect_err("nothing to match");

        assert_eq!(error.stage, StageName::Technical);
        assert_eq!(error.failure, StageFailure::NoSuitableProduct { best_score: 0, threshold: 70 });
    }

    #[test]
    fn best_match_below_threshold_is_rejected() {
        let specs = ExtractedSpecs {
            voltage: Some("66kV".to_string()),
            size: Some("1C x 630".to_string()),
            conductor: Some("Copper".to_string()),
            insulation: Some("EPR".to_string()),
            armoring: Some("Unarmored".to_string()),
            standard: Some("IEC 60840".to_string()),
            quantity: None,
        };

        let error = stage(vec![cable("MV-11-240", "11kV", "3C x 240")])
            .run(&specs, &[], &[])
            .expect_err("poor fit");

        assert!(matches!(
            error.failure,
            StageFailure::NoSuitableProduct { best_score, threshold: 70 } if best_score < 70
        ));
        assert!(error.to_string().starts_with("Technical Agent failed: No suitable product"));
    }
}

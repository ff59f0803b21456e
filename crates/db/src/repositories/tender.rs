use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tenderdesk_core::domain::tender::{TenderId, TenderRecord, TenderStatus};

use super::{decode_err, RepositoryError, TenderRepository};
use crate::DbPool;

const TENDER_COLUMNS: &str = "id, title, issued_by, summary, deadline, status,
    specifications_json, certifications_json, testing_requirements_json,
    delivery_timeline, estimated_value, sales_summary_json, technical_analysis_json,
    pricing_strategy_json, bid_response_json, deleted, deleted_at, created_at, updated_at";

pub struct SqlTenderRepository {
    pool: DbPool,
}

impl SqlTenderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(decode_err)
}

fn json_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T, RepositoryError> {
    let raw: String = row.try_get(column).map_err(decode_err)?;
    serde_json::from_str(&raw).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn optional_json_column<T: DeserializeOwned>(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<T>, RepositoryError> {
    let raw: Option<String> = row.try_get(column).map_err(decode_err)?;
    raw.map(|raw| {
        serde_json::from_str(&raw).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
    })
    .transpose()
}

fn optional_json<T: Serialize>(value: &Option<T>) -> Result<Option<String>, RepositoryError> {
    value.as_ref().map(serde_json::to_string).transpose().map_err(RepositoryError::from)
}

fn row_to_tender(row: &SqliteRow) -> Result<TenderRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let status_str: String = row.try_get("status").map_err(decode_err)?;
    let deadline_str: String = row.try_get("deadline").map_err(decode_err)?;
    let estimated_value: Option<String> = row.try_get("estimated_value").map_err(decode_err)?;
    let deleted: i64 = row.try_get("deleted").map_err(decode_err)?;
    let deleted_at: Option<String> = row.try_get("deleted_at").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    let status = TenderStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown tender status `{status_str}`")))?;

    Ok(TenderRecord {
        id: TenderId(id),
        title: row.try_get("title").map_err(decode_err)?,
        issued_by: row.try_get("issued_by").map_err(decode_err)?,
        summary: row.try_get("summary").map_err(decode_err)?,
        deadline: NaiveDate::from_str(&deadline_str).map_err(decode_err)?,
        status,
        specifications: json_column(row, "specifications_json")?,
        certifications: json_column(row, "certifications_json")?,
        testing_requirements: json_column(row, "testing_requirements_json")?,
        delivery_timeline: row.try_get("delivery_timeline").map_err(decode_err)?,
        estimated_value: estimated_value
            .map(|raw| Decimal::from_str(&raw).map_err(decode_err))
            .transpose()?,
        sales_summary: optional_json_column(row, "sales_summary_json")?,
        technical_analysis: optional_json_column(row, "technical_analysis_json")?,
        pricing_strategy: optional_json_column(row, "pricing_strategy_json")?,
        bid_response: optional_json_column(row, "bid_response_json")?,
        deleted: deleted != 0,
        deleted_at: deleted_at.as_deref().map(parse_timestamp).transpose()?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl TenderRepository for SqlTenderRepository {
    async fn find_by_id(&self, id: &TenderId) -> Result<Option<TenderRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TENDER_COLUMNS} FROM tender WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_tender).transpose()
    }

    async fn list(&self, include_deleted: bool) -> Result<Vec<TenderRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {TENDER_COLUMNS} FROM tender
             WHERE (? = 1 OR deleted = 0)
             ORDER BY deadline ASC, created_at ASC, id ASC"
        ))
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_tender).collect()
    }

    async fn save(&self, tender: TenderRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO tender (id, title, issued_by, summary, deadline, status,
                                 specifications_json, certifications_json, testing_requirements_json,
                                 delivery_timeline, estimated_value, sales_summary_json,
                                 technical_analysis_json, pricing_strategy_json, bid_response_json,
                                 deleted, deleted_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 issued_by = excluded.issued_by,
                 summary = excluded.summary,
                 deadline = excluded.deadline,
                 status = excluded.status,
                 specifications_json = excluded.specifications_json,
                 certifications_json = excluded.certifications_json,
                 testing_requirements_json = excluded.testing_requirements_json,
                 delivery_timeline = excluded.delivery_timeline,
                 estimated_value = excluded.estimated_value,
                 sales_summary_json = excluded.sales_summary_json,
                 technical_analysis_json = excluded.technical_analysis_json,
                 pricing_strategy_json = excluded.pricing_strategy_json,
                 bid_response_json = excluded.bid_response_json,
                 deleted = excluded.deleted,
                 deleted_at = excluded.deleted_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&tender.id.0)
        .bind(&tender.title)
        .bind(&tender.issued_by)
        .bind(&tender.summary)
        .bind(tender.deadline.to_string())
        .bind(tender.status.as_str())
        .bind(serde_json::to_string(&tender.specifications)?)
        .bind(serde_json::to_string(&tender.certifications)?)
        .bind(serde_json::to_string(&tender.testing_requirements)?)
        .bind(&tender.delivery_timeline)
        .bind(tender.estimated_value.map(|value| value.to_string()))
        .bind(optional_json(&tender.sales_summary)?)
        .bind(optional_json(&tender.technical_analysis)?)
        .bind(optional_json(&tender.pricing_strategy)?)
        .bind(optional_json(&tender.bid_response)?)
        .bind(tender.deleted)
        .bind(tender.deleted_at.map(|dt| dt.to_rfc3339()))
        .bind(tender.created_at.to_rfc3339())
        .bind(tender.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn permanent_delete(&self, id: &TenderId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM audit_event WHERE tender_id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM tender WHERE id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use tenderdesk_core::catalog::{InMemoryCatalog, SpecMatcher};
    use tenderdesk_core::domain::analysis::ExtractedSpecs;
    use tenderdesk_core::domain::product::{CableSpecification, Product, ProductSku};
    use tenderdesk_core::domain::tender::{TenderId, TenderPatch, TenderRecord, TenderStatus};
    use tenderdesk_core::pricing::{price_from_catalog, DeterministicPricingEngine, PricingInput};

    use super::SqlTenderRepository;
    use crate::repositories::{RepositoryError, TenderRepository};
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlTenderRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlTenderRepository::new(pool)
    }

    fn tender(id: &str, deadline: NaiveDate) -> TenderRecord {
        TenderRecord::new(
            TenderId(id.to_string()),
            "11kV XLPE cable supply",
            "Metro Power Distribution",
            "Supply of 5,000 meters 11kV 3C x 240 aluminium XLPE SWA cable",
            deadline,
            Utc::now(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn priced_product() -> Product {
        Product {
            sku: ProductSku("MV-11-240".to_string()),
            name: "11kV 3C x 240 Al XLPE SWA".to_string(),
            category: "Medium Voltage".to_string(),
            specifications: CableSpecification {
                voltage: "11kV".to_string(),
                conductor: "Aluminum".to_string(),
                armoring: "SWA".to_string(),
                ..CableSpecification::default()
            },
            price_per_meter: Some(Decimal::from(480)),
            test_costs: BTreeMap::from([("Routine Tests".to_string(), Decimal::from(30_000))]),
            service_costs: BTreeMap::new(),
            certifications: Vec::new(),
            available: true,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trip() {
        let repo = repository().await;
        let mut record = tender("TND-RT", date(2026, 12, 1));
        record.certifications = vec!["BIS Certification".to_string()];
        record.estimated_value = Some(Decimal::new(600_000_050, 2));

        repo.save(record.clone()).await.expect("save");
        let loaded = repo.find_by_id(&record.id).await.expect("find").expect("present");

        assert_eq!(loaded.title, record.title);
        assert_eq!(loaded.deadline, record.deadline);
        assert_eq!(loaded.certifications, record.certifications);
        assert_eq!(loaded.estimated_value, Some(Decimal::new(600_000_050, 2)));
        assert_eq!(loaded.status, TenderStatus::New);
        assert!(loaded.pricing_strategy.is_none());
    }

    #[tokio::test]
    async fn pricing_breakdown_survives_persistence_exactly() {
        let repo = repository().await;
        let product = priced_product();
        let catalog = InMemoryCatalog::new(vec![product.clone()], 70);
        let selected =
            SpecMatcher.match_product(&ExtractedSpecs::default(), &product).into_product_match(1, 70);
        let strategy = price_from_catalog(
            &catalog,
            &DeterministicPricingEngine::default(),
            &PricingInput {
                sku: selected.sku.clone(),
                match_score: selected.match_score,
                quantity: 5000,
                tests: vec!["Routine Tests".to_string()],
                services: vec!["Delivery".to_string()],
                estimated_value: None,
            },
        )
        .expect("priceable");

        let mut record = tender("TND-PRICED", date(2026, 11, 1));
        record.pricing_strategy = Some(strategy.clone());
        repo.save(record.clone()).await.expect("save");

        let loaded = repo.find_by_id(&record.id).await.expect("find").expect("present");
        let stored = loaded.pricing_strategy.expect("pricing persisted");
        assert_eq!(stored.pricing_breakdown, strategy.pricing_breakdown);
        assert_eq!(stored.pricing_breakdown.material_cost, Decimal::from(2_400_000));
        assert_eq!(stored.recommended_price, strategy.recommended_price);
        assert_eq!(stored, strategy);
    }

    #[tokio::test]
    async fn list_orders_by_deadline_and_hides_soft_deleted() {
        let repo = repository().await;
        repo.save(tender("TND-LATE", date(2027, 1, 1))).await.expect("save");
        repo.save(tender("TND-SOON", date(2026, 11, 1))).await.expect("save");
        repo.save(tender("TND-GONE", date(2026, 12, 1))).await.expect("save");

        let deleted = repo
            .soft_delete(&TenderId("TND-GONE".to_string()))
            .await
            .expect("soft delete")
            .expect("existed");
        assert!(deleted.deleted);
        assert!(deleted.deleted_at.is_some());

        let visible: Vec<String> =
            repo.list(false).await.expect("list").into_iter().map(|t| t.id.0).collect();
        assert_eq!(visible, vec!["TND-SOON", "TND-LATE"]);

        let all = repo.list(true).await.expect("list all");
        assert_eq!(all.len(), 3);

        let restored = repo
            .restore(&TenderId("TND-GONE".to_string()))
            .await
            .expect("restore")
            .expect("existed");
        assert!(!restored.deleted);
        assert_eq!(repo.list(false).await.expect("list").len(), 3);
    }

    #[tokio::test]
    async fn update_applies_patch_and_guards_status() {
        let repo = repository().await;
        let id = TenderId("TND-PATCH".to_string());
        repo.save(tender(&id.0, date(2026, 12, 1))).await.expect("save");

        let patched = repo
            .update(
                &id,
                TenderPatch {
                    title: Some("Revised scope".to_string()),
                    status: Some(TenderStatus::InProgress),
                    ..TenderPatch::default()
                },
            )
            .await
            .expect("update")
            .expect("existed");
        assert_eq!(patched.title, "Revised scope");
        assert_eq!(patched.status, TenderStatus::InProgress);

        let stored = repo.find_by_id(&id).await.expect("find").expect("present");
        assert_eq!(stored.title, "Revised scope");

        let missing = repo
            .update(&TenderId("TND-NONE".to_string()), TenderPatch::default())
            .await
            .expect("update");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn invalid_status_patch_is_a_domain_error() {
        let repo = repository().await;
        let id = TenderId("TND-DONE".to_string());
        let mut record = tender(&id.0, date(2026, 12, 1));
        record.status = TenderStatus::Completed;
        repo.save(record).await.expect("save");

        let error = repo
            .update(&id, TenderPatch { status: Some(TenderStatus::New), ..TenderPatch::default() })
            .await
            .expect_err("completed cannot go back to new");
        assert!(matches!(error, RepositoryError::Domain(_)));
    }

    #[tokio::test]
    async fn permanent_delete_removes_the_row() {
        let repo = repository().await;
        let id = TenderId("TND-PURGE".to_string());
        repo.save(tender(&id.0, date(2026, 12, 1))).await.expect("save");

        assert!(repo.permanent_delete(&id).await.expect("delete"));
        assert!(repo.find_by_id(&id).await.expect("find").is_none());
        assert!(!repo.permanent_delete(&id).await.expect("second delete"));
    }
}

use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tenderdesk_core::domain::product::{CableSpecification, Product, ProductSku};

use super::{decode_err, ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "sku, name, category, voltage, size, conductor, insulation, armoring,
    standard, price_per_meter, test_costs_json, service_costs_json, certifications_json, available";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let sku: String = row.try_get("sku").map_err(decode_err)?;
    let price: Option<String> = row.try_get("price_per_meter").map_err(decode_err)?;
    let test_costs: String = row.try_get("test_costs_json").map_err(decode_err)?;
    let service_costs: String = row.try_get("service_costs_json").map_err(decode_err)?;
    let certifications: String = row.try_get("certifications_json").map_err(decode_err)?;
    let available: i64 = row.try_get("available").map_err(decode_err)?;

    Ok(Product {
        sku: ProductSku(sku),
        name: row.try_get("name").map_err(decode_err)?,
        category: row.try_get("category").map_err(decode_err)?,
        specifications: CableSpecification {
            voltage: row.try_get("voltage").map_err(decode_err)?,
            size: row.try_get("size").map_err(decode_err)?,
            conductor: row.try_get("conductor").map_err(decode_err)?,
            insulation: row.try_get("insulation").map_err(decode_err)?,
            armoring: row.try_get("armoring").map_err(decode_err)?,
            standard: row.try_get("standard").map_err(decode_err)?,
        },
        price_per_meter: price.map(|raw| Decimal::from_str(&raw).map_err(decode_err)).transpose()?,
        test_costs: serde_json::from_str(&test_costs).map_err(decode_err)?,
        service_costs: serde_json::from_str(&service_costs).map_err(decode_err)?,
        certifications: serde_json::from_str(&certifications).map_err(decode_err)?,
        available: available != 0,
    })
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_sku(&self, sku: &ProductSku) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE sku = ?"))
            .bind(&sku.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_available(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE available = 1 ORDER BY sku ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let spec = &product.specifications;

        sqlx::query(
            "INSERT INTO product (sku, name, category, voltage, size, conductor, insulation,
                                  armoring, standard, price_per_meter, test_costs_json,
                                  service_costs_json, certifications_json, available,
                                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(sku) DO UPDATE SET
                 name = excluded.name,
                 category = excluded.category,
                 voltage = excluded.voltage,
                 size = excluded.size,
                 conductor = excluded.conductor,
                 insulation = excluded.insulation,
                 armoring = excluded.armoring,
                 standard = excluded.standard,
                 price_per_meter = excluded.price_per_meter,
                 test_costs_json = excluded.test_costs_json,
                 service_costs_json = excluded.service_costs_json,
                 certifications_json = excluded.certifications_json,
                 available = excluded.available,
                 updated_at = excluded.updated_at",
        )
        .bind(&product.sku.0)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&spec.voltage)
        .bind(&spec.size)
        .bind(&spec.conductor)
        .bind(&spec.insulation)
        .bind(&spec.armoring)
        .bind(&spec.standard)
        .bind(product.price_per_meter.map(|price| price.to_string()))
        .bind(serde_json::to_string(&product.test_costs)?)
        .bind(serde_json::to_string(&product.service_costs)?)
        .bind(serde_json::to_string(&product.certifications)?)
        .bind(product.available)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use tenderdesk_core::domain::product::{CableSpecification, Product, ProductSku};

    use super::SqlProductRepository;
    use crate::repositories::ProductRepository;
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlProductRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlProductRepository::new(pool)
    }

    fn product(sku: &str, available: bool) -> Product {
        Product {
            sku: ProductSku(sku.to_string()),
            name: "33kV 1C x 400 Cu XLPE".to_string(),
            category: "High Voltage".to_string(),
            specifications: CableSpecification {
                voltage: "33kV".to_string(),
                size: "1C x 400".to_string(),
                conductor: "Copper".to_string(),
                insulation: "XLPE".to_string(),
                armoring: "Unarmored".to_string(),
                standard: "IEC 60502-2".to_string(),
            },
            price_per_meter: Some(Decimal::new(70_025, 2)),
            test_costs: BTreeMap::from([("Type Tests".to_string(), Decimal::from(75_000))]),
            service_costs: BTreeMap::from([("Installation".to_string(), Decimal::from(50_000))]),
            certifications: vec!["IEC Certified".to_string()],
            available,
        }
    }

    #[tokio::test]
    async fn product_round_trip_keeps_exact_prices() {
        let repo = repository().await;
        repo.save(product("HV-33-400", true)).await.expect("save");

        let loaded = repo
            .find_by_sku(&ProductSku("HV-33-400".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(loaded, product("HV-33-400", true));
        assert_eq!(loaded.price_per_meter, Some(Decimal::new(70_025, 2)));
    }

    #[tokio::test]
    async fn list_available_skips_withdrawn_products() {
        let repo = repository().await;
        repo.save(product("HV-33-400", true)).await.expect("save");
        repo.save(product("HV-33-300", false)).await.expect("save");
        repo.save(product("HV-33-240", true)).await.expect("save");

        let skus: Vec<String> =
            repo.list_available().await.expect("list").into_iter().map(|p| p.sku.0).collect();
        assert_eq!(skus, vec!["HV-33-240", "HV-33-400"]);
    }

    #[tokio::test]
    async fn saving_again_updates_in_place() {
        let repo = repository().await;
        repo.save(product("HV-33-400", true)).await.expect("save");

        let mut unpriced = product("HV-33-400", true);
        unpriced.price_per_meter = None;
        repo.save(unpriced).await.expect("upsert");

        let loaded = repo
            .find_by_sku(&ProductSku("HV-33-400".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(loaded.price_per_meter, None);
    }
}

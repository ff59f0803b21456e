use std::collections::HashMap;

use tokio::sync::RwLock;

use tenderdesk_core::audit::AuditEvent;
use tenderdesk_core::domain::product::{Product, ProductSku};
use tenderdesk_core::domain::tender::{TenderId, TenderRecord};

use super::{AuditEventRepository, ProductRepository, RepositoryError, TenderRepository};

#[derive(Default)]
pub struct InMemoryTenderRepository {
    tenders: RwLock<HashMap<String, TenderRecord>>,
}

#[async_trait::async_trait]
impl TenderRepository for InMemoryTenderRepository {
    async fn find_by_id(&self, id: &TenderId) -> Result<Option<TenderRecord>, RepositoryError> {
        let tenders = self.tenders.read().await;
        Ok(tenders.get(&id.0).cloned())
    }

    async fn list(&self, include_deleted: bool) -> Result<Vec<TenderRecord>, RepositoryError> {
        let tenders = self.tenders.read().await;
        let mut listed: Vec<TenderRecord> = tenders
            .values()
            .filter(|tender| include_deleted || !tender.deleted)
            .cloned()
            .collect();
        listed.sort_by(|a, b| {
            (a.deadline, a.created_at, &a.id.0).cmp(&(b.deadline, b.created_at, &b.id.0))
        });
        Ok(listed)
    }

    async fn save(&self, tender: TenderRecord) -> Result<(), RepositoryError> {
        let mut tenders = self.tenders.write().await;
        tenders.insert(tender.id.0.clone(), tender);
        Ok(())
    }

    async fn permanent_delete(&self, id: &TenderId) -> Result<bool, RepositoryError> {
        let mut tenders = self.tenders.write().await;
        Ok(tenders.remove(&id.0).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_sku(&self, sku: &ProductSku) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&sku.0).cloned())
    }

    async fn list_available(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut available: Vec<Product> =
            products.values().filter(|product| product.available).cloned().collect();
        available.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(available)
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.sku.0.clone(), product);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuditEventRepository {
    events: RwLock<Vec<AuditEvent>>,
}

#[async_trait::async_trait]
impl AuditEventRepository for InMemoryAuditEventRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn list_for_tender(
        &self,
        tender_id: &TenderId,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|event| event.tender_id.as_ref() == Some(tender_id))
            .cloned()
            .collect())
    }
}

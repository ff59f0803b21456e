use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use tenderdesk_core::audit::AuditEvent;
use tenderdesk_core::domain::product::{Product, ProductSku};
use tenderdesk_core::domain::tender::{TenderId, TenderPatch, TenderRecord};
use tenderdesk_core::errors::DomainError;

pub mod audit;
pub mod memory;
pub mod product;
pub mod tender;

pub use audit::SqlAuditEventRepository;
pub use memory::{
    InMemoryAuditEventRepository, InMemoryProductRepository, InMemoryTenderRepository,
};
pub use product::SqlProductRepository;
pub use tender::SqlTenderRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub(crate) fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

#[async_trait]
pub trait TenderRepository: Send + Sync {
    /// Returns the tender whether or not it is soft-deleted.
    async fn find_by_id(&self, id: &TenderId) -> Result<Option<TenderRecord>, RepositoryError>;

    /// Tenders ordered by deadline, soonest first.
    async fn list(&self, include_deleted: bool) -> Result<Vec<TenderRecord>, RepositoryError>;

    async fn save(&self, tender: TenderRecord) -> Result<(), RepositoryError>;

    /// Returns `false` when no row existed.
    async fn permanent_delete(&self, id: &TenderId) -> Result<bool, RepositoryError>;

    async fn update(
        &self,
        id: &TenderId,
        patch: TenderPatch,
    ) -> Result<Option<TenderRecord>, RepositoryError> {
        let Some(mut tender) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        tender.apply_patch(patch, Utc::now())?;
        self.save(tender.clone()).await?;
        Ok(Some(tender))
    }

    async fn soft_delete(&self, id: &TenderId) -> Result<Option<TenderRecord>, RepositoryError> {
        let Some(mut tender) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        tender.soft_delete(Utc::now());
        self.save(tender.clone()).await?;
        Ok(Some(tender))
    }

    async fn restore(&self, id: &TenderId) -> Result<Option<TenderRecord>, RepositoryError> {
        let Some(mut tender) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        tender.restore(Utc::now());
        self.save(tender.clone()).await?;
        Ok(Some(tender))
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_sku(&self, sku: &ProductSku) -> Result<Option<Product>, RepositoryError>;
    /// Available products ordered by SKU.
    async fn list_available(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AuditEventRepository: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError>;
    async fn list_for_tender(&self, tender_id: &TenderId)
        -> Result<Vec<AuditEvent>, RepositoryError>;
}

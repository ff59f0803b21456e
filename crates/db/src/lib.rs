pub mod catalog;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use catalog::load_catalog;
pub use connection::{connect, connect_with_settings, ping, DbPool};
pub use fixtures::{SeedDataset, SeedResult, VerificationResult};
pub use repositories::{
    AuditEventRepository, ProductRepository, RepositoryError, SqlAuditEventRepository,
    SqlProductRepository, SqlTenderRepository, TenderRepository,
};

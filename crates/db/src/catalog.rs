use tenderdesk_core::catalog::InMemoryCatalog;

use crate::repositories::{ProductRepository, RepositoryError};

/// Snapshot of the available products, ready for matching and pricing.
pub async fn load_catalog(
    products: &dyn ProductRepository,
    compatibility_threshold: u8,
) -> Result<InMemoryCatalog, RepositoryError> {
    let available = products.list_available().await?;
    Ok(InMemoryCatalog::new(available, compatibility_threshold))
}

#[cfg(test)]
mod tests {
    use tenderdesk_core::catalog::Catalog;

    use super::load_catalog;
    use crate::fixtures::seed_products;
    use crate::repositories::{InMemoryProductRepository, ProductRepository};

    #[tokio::test]
    async fn withdrawn_products_are_left_out_of_the_catalog() {
        let repo = InMemoryProductRepository::default();
        let mut products = seed_products();
        products[0].available = false;
        let withdrawn = products[0].sku.clone();
        let total = products.len();
        for product in products {
            repo.save(product).await.expect("save");
        }

        let catalog = load_catalog(&repo, 70).await.expect("catalog");
        assert_eq!(catalog.len(), total - 1);
        assert!(catalog.find(&withdrawn).is_none());
        assert_eq!(catalog.compatibility_threshold(), 70);
    }
}

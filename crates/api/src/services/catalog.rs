//! Product catalog: CRUD and ratings.

use thiserror::Error;

use bazaar_core::{ProductId, UserId};

use crate::db::{ProductStore, RepositoryError};
use crate::models::{NewProduct, NewRating, Product, ProductChanges, RatingOutcome};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product not found: {0}")]
    NotFound(ProductId),

    /// Names already used by other products.
    #[error("duplicate product names: {}", .0.join(", "))]
    DuplicateNames(Vec<String>),

    #[error("product already rated by user {0}")]
    AlreadyRated(UserId),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Catalog operations over a [`ProductStore`].
pub struct CatalogService<'a> {
    products: &'a dyn ProductStore,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(products: &'a dyn ProductStore) -> Self {
        Self { products }
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn list(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.list().await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if there is no such product.
    pub async fn get(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.products
            .get_by_id(id)
            .await?
            .ok_or(CatalogError::NotFound(id))
    }

    /// Insert validated products, all or none.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateNames` if any name is already in the
    /// catalog.
    pub async fn create(&self, products: Vec<NewProduct>) -> Result<Vec<Product>, CatalogError> {
        let names: Vec<String> = products.iter().map(|p| p.name.clone()).collect();
        let existing = self.products.existing_names(&names).await?;
        if !existing.is_empty() {
            return Err(CatalogError::DuplicateNames(existing));
        }

        // A concurrent insert can still win the race; the unique constraint
        // reports it as a conflict.
        let created = self
            .products
            .create_many(products)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => CatalogError::DuplicateNames(names),
                other => CatalogError::Repository(other),
            })?;

        tracing::info!(count = created.len(), "Products created");
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound`, or `CatalogError::DuplicateNames`
    /// when renaming onto an existing name.
    pub async fn update(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> Result<Product, CatalogError> {
        let new_name = changes.name.clone();
        let product = self
            .products
            .update(id, changes)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => {
                    CatalogError::DuplicateNames(new_name.into_iter().collect())
                }
                other => CatalogError::Repository(other),
            })?
            .ok_or(CatalogError::NotFound(id))?;

        tracing::info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if there is no such product.
    pub async fn delete(&self, id: ProductId) -> Result<(), CatalogError> {
        if !self.products.delete(id).await? {
            return Err(CatalogError::NotFound(id));
        }
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Attach a rating, once per user per product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` or `CatalogError::AlreadyRated`.
    pub async fn rate(&self, id: ProductId, rating: NewRating) -> Result<Product, CatalogError> {
        let user = rating.user;
        match self.products.add_rating(id, rating).await? {
            RatingOutcome::Added(product) => {
                tracing::info!(
                    product_id = %id,
                    user_id = %user,
                    average_rating = product.average_rating,
                    "Product rated"
                );
                Ok(product)
            }
            RatingOutcome::AlreadyRated => Err(CatalogError::AlreadyRated(user)),
            RatingOutcome::NotFound => Err(CatalogError::NotFound(id)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use bazaar_core::{Category, Price};
    use rust_decimal::Decimal;

    fn product(name: &str) -> NewProduct {
        NewProduct {
            name: name.into(),
            description: "A thing for sale".into(),
            price: Price::new(Decimal::new(1999, 2)).unwrap(),
            category: Category::Electronics,
            stock: 10,
            created_by: UserId::new(1),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_existing_names() {
        let store = MemoryStore::default();
        let catalog = CatalogService::new(&store);

        catalog.create(vec![product("Laptop")]).await.unwrap();
        let err = catalog
            .create(vec![product("Mouse"), product("Laptop")])
            .await
            .unwrap_err();
        match err {
            CatalogError::DuplicateNames(names) => assert_eq!(names, vec!["Laptop".to_owned()]),
            other => panic!("unexpected error: {other}"),
        }

        // Nothing from the rejected batch was inserted.
        assert_eq!(catalog.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_product() {
        let store = MemoryStore::default();
        let catalog = CatalogService::new(&store);
        let missing = ProductId::new(42);

        let changes = ProductChanges {
            stock: Some(3),
            ..ProductChanges::default()
        };
        assert!(matches!(
            catalog.update(missing, changes).await.unwrap_err(),
            CatalogError::NotFound(_)
        ));
        assert!(matches!(
            catalog.delete(missing).await.unwrap_err(),
            CatalogError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_rate_once_per_user() {
        let store = MemoryStore::default();
        let catalog = CatalogService::new(&store);
        let created = catalog.create(vec![product("Keyboard")]).await.unwrap();
        let id = created[0].id;

        let rating = |user: i32, stars: u8| NewRating {
            user: UserId::new(user),
            rating: stars,
            review: None,
        };

        catalog.rate(id, rating(1, 5)).await.unwrap();
        let product = catalog.rate(id, rating(2, 2)).await.unwrap();
        assert!((product.average_rating - 3.5).abs() < f64::EPSILON);

        assert!(matches!(
            catalog.rate(id, rating(1, 1)).await.unwrap_err(),
            CatalogError::AlreadyRated(_)
        ));
    }
}

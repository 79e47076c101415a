//! In-process stores.
//!
//! All tables live behind one `RwLock`, so every trait method is atomic with
//! respect to every other. Revoked tokens go into a `moka` cache whose entries
//! expire on their own.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use tokio::sync::RwLock;
use uuid::Uuid;

use bazaar_core::{Email, OrderId, OrderStatus, ProductId, UserId};

use super::RepositoryError;
use super::store::{OrderStore, ProductStore, RevocationStore, UserStore};
use crate::models::product::average_rating;
use crate::models::{
    NewOrder, NewProduct, NewRating, NewUser, Order, OrderItem, Product,
    ProductChanges, ProfileChanges, Rating, RatingOutcome, StockReservation, StockUpdate, User,
};

/// Users, products and orders kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, UserRecord>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, OrderRecord>,
    last_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn resolve(&self, record: &OrderRecord) -> Order {
        let items = record
            .order
            .items
            .iter()
            .map(|item| OrderItem {
                product: item.product,
                quantity: item.quantity,
                price: item.price,
                product_info: self.products.get(&item.product).map(Product::summary),
            })
            .collect();
        Order {
            id: record.id,
            user: record.order.user,
            items,
            total_amount: record.order.total_amount,
            shipping_address: record.order.shipping_address.clone(),
            payment_method: record.order.payment_method,
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

struct UserRecord {
    user: User,
    password_hash: String,
    reset_token: Option<(String, DateTime<Utc>)>,
}

struct OrderRecord {
    id: OrderId,
    order: NewOrder,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).map(|r| r.user.clone()))
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|r| &r.user.email == email)
            .map(|r| r.user.clone()))
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().map(|r| r.user.clone()).collect())
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|r| r.user.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let now = Utc::now();
        let created = User {
            id: UserId::new(tables.next_id()),
            name: user.name,
            email: user.email,
            role: user.role,
            active: true,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(
            created.id,
            UserRecord {
                user: created.clone(),
                password_hash: user.password_hash,
                reset_token: None,
            },
        );
        Ok(created)
    }

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).map(|r| r.password_hash.clone()))
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let record = tables.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        hash.clone_into(&mut record.password_hash);
        record.user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_profile(
        &self,
        id: UserId,
        changes: ProfileChanges,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            record.user.name = name;
        }
        if let Some(role) = changes.role {
            record.user.role = role;
        }
        record.user.updated_at = Utc::now();
        Ok(Some(record.user.clone()))
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|record| {
            record.user.active = active;
            record.user.updated_at = Utc::now();
            record.user.clone()
        }))
    }

    async fn set_reset_token(
        &self,
        id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let record = tables.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.reset_token = Some((token_hash.to_owned(), expires_at));
        Ok(())
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.tables.write().await;
        let record = tables.users.values_mut().find(|r| {
            r.reset_token
                .as_ref()
                .is_some_and(|(hash, expires)| hash == token_hash && *expires > now)
        });
        Ok(record.map(|record| {
            record.reset_token = None;
            password_hash.clone_into(&mut record.password_hash);
            record.user.updated_at = now;
            record.user.clone()
        }))
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.products.values().cloned().collect())
    }

    async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.products.get(&id).cloned())
    }

    async fn existing_names(&self, names: &[String]) -> Result<Vec<String>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .values()
            .filter(|p| names.contains(&p.name))
            .map(|p| p.name.clone())
            .collect())
    }

    async fn create_many(&self, products: Vec<NewProduct>) -> Result<Vec<Product>, RepositoryError> {
        let mut tables = self.tables.write().await;
        for (i, product) in products.iter().enumerate() {
            let taken = tables.products.values().any(|p| p.name == product.name)
                || products.iter().take(i).any(|p| p.name == product.name);
            if taken {
                return Err(RepositoryError::Conflict(format!(
                    "product name '{}' already exists",
                    product.name
                )));
            }
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(products.len());
        for product in products {
            let product = Product {
                id: ProductId::new(tables.next_id()),
                name: product.name,
                description: product.description,
                price: product.price,
                category: product.category,
                stock: product.stock,
                created_by: product.created_by,
                ratings: Vec::new(),
                average_rating: 0.0,
                created_at: now,
                updated_at: now,
            };
            tables.products.insert(product.id, product.clone());
            created.push(product);
        }
        Ok(created)
    }

    async fn update(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut tables = self.tables.write().await;
        if let Some(name) = &changes.name
            && tables
                .products
                .values()
                .any(|p| p.id != id && &p.name == name)
        {
            return Err(RepositoryError::Conflict(format!(
                "product name '{name}' already exists"
            )));
        }

        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            product.name = name;
        }
        if let Some(description) = changes.description {
            product.description = description;
        }
        if let Some(price) = changes.price {
            product.price = price;
        }
        if let Some(category) = changes.category {
            product.category = category;
        }
        if let Some(stock) = changes.stock {
            product.stock = stock;
        }
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        Ok(tables.products.remove(&id).is_some())
    }

    async fn reserve_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<StockUpdate, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(StockUpdate::NotFound);
        };
        let Some(remaining) = product.stock.checked_sub(quantity) else {
            return Ok(StockUpdate::Insufficient {
                name: product.name.clone(),
                available: product.stock,
            });
        };

        product.stock = remaining;
        product.updated_at = Utc::now();
        Ok(StockUpdate::Reserved(StockReservation {
            product: id,
            name: product.name.clone(),
            price: product.price,
            remaining,
        }))
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(false);
        };
        product.stock = product
            .stock
            .checked_add(quantity)
            .ok_or_else(|| RepositoryError::DataCorruption(format!("stock overflow on {id}")))?;
        product.updated_at = Utc::now();
        Ok(true)
    }

    async fn add_rating(
        &self,
        id: ProductId,
        rating: NewRating,
    ) -> Result<RatingOutcome, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(RatingOutcome::NotFound);
        };
        if product.ratings.iter().any(|r| r.user == rating.user) {
            return Ok(RatingOutcome::AlreadyRated);
        }

        let now = Utc::now();
        product.ratings.push(Rating {
            user: rating.user,
            rating: rating.rating,
            review: rating.review,
            created_at: now,
        });
        product.average_rating = average_rating(&product.ratings);
        product.updated_at = now;
        Ok(RatingOutcome::Added(product.clone()))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let record = OrderRecord {
            id: OrderId::new(tables.next_id()),
            order,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let created = tables.resolve(&record);
        tables.orders.insert(record.id, record);
        Ok(created)
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&id).map(|r| tables.resolve(r)))
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|r| r.order.user == user)
            .map(|r| tables.resolve(r))
            .collect())
    }

    async fn mark_cancelled(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&id) {
            Some(record) if record.status.is_cancellable() => {
                record.status = OrderStatus::Cancelled;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Revoked token ids held in a TTL cache.
///
/// Entries are dropped by the cache after `max_ttl`; lookups also compare
/// against the token's own expiry.
pub struct MemoryRevocationStore {
    revoked: Cache<Uuid, DateTime<Utc>>,
}

impl MemoryRevocationStore {
    #[must_use]
    pub fn new(max_ttl: Duration) -> Self {
        let revoked = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(max_ttl)
            .build();
        Self { revoked }
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.revoked.insert(jti, expires_at).await;
        Ok(())
    }

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepositoryError> {
        Ok(self
            .revoked
            .get(&jti)
            .await
            .is_some_and(|expires_at| expires_at > Utc::now()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bazaar_core::{Category, Price, Role};
    use rust_decimal::Decimal;

    async fn seed_product(store: &MemoryStore, name: &str, stock: u32) -> Product {
        store
            .create_many(vec![NewProduct {
                name: name.to_owned(),
                description: "A test product".to_owned(),
                price: Price::new(Decimal::new(1999, 2)).unwrap(),
                category: Category::Electronics,
                stock,
                created_by: UserId::new(1),
            }])
            .await
            .unwrap()
            .remove(0)
    }

    #[tokio::test]
    async fn test_reserve_stock_is_conditional() {
        let store = MemoryStore::default();
        let product = seed_product(&store, "Keyboard", 5).await;

        let update = store.reserve_stock(product.id, 3).await.unwrap();
        assert!(matches!(update, StockUpdate::Reserved(ref r) if r.remaining == 2));

        let update = store.reserve_stock(product.id, 3).await.unwrap();
        assert_eq!(
            update,
            StockUpdate::Insufficient {
                name: "Keyboard".to_owned(),
                available: 2
            }
        );

        let update = store.reserve_stock(ProductId::new(999), 1).await.unwrap();
        assert_eq!(update, StockUpdate::NotFound);

        assert!(store.release_stock(product.id, 3).await.unwrap());
        let product = ProductStore::get_by_id(&store, product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn test_unique_names_and_emails() {
        let store = MemoryStore::default();
        seed_product(&store, "Monitor", 1).await;
        let err = store
            .create_many(vec![NewProduct {
                name: "Monitor".to_owned(),
                description: "Duplicate".to_owned(),
                price: Price::new(Decimal::ONE).unwrap(),
                category: Category::Electronics,
                stock: 1,
                created_by: UserId::new(1),
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let new_user = || NewUser {
            name: "Ada".to_owned(),
            email: Email::parse("ada@example.com").unwrap(),
            password_hash: "hash".to_owned(),
            role: Role::User,
        };
        UserStore::create(&store, new_user()).await.unwrap();
        let err = UserStore::create(&store, new_user()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_ratings_once_per_user() {
        let store = MemoryStore::default();
        let product = seed_product(&store, "Desk", 1).await;
        let rate = |user: i32, rating: u8| NewRating {
            user: UserId::new(user),
            rating,
            review: None,
        };

        assert!(matches!(
            store.add_rating(product.id, rate(1, 5)).await.unwrap(),
            RatingOutcome::Added(_)
        ));
        assert!(matches!(
            store.add_rating(product.id, rate(1, 1)).await.unwrap(),
            RatingOutcome::AlreadyRated
        ));
        let RatingOutcome::Added(rated) = store.add_rating(product.id, rate(2, 2)).await.unwrap()
        else {
            panic!("second user should be able to rate");
        };
        assert!((rated.average_rating - 3.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_revocation_respects_expiry() {
        let store = MemoryRevocationStore::new(Duration::from_secs(60));
        let live = Uuid::new_v4();
        let stale = Uuid::new_v4();
        store
            .revoke(live, Utc::now() + chrono::Duration::minutes(5))
            .await
            .unwrap();
        store
            .revoke(stale, Utc::now() - chrono::Duration::minutes(5))
            .await
            .unwrap();

        assert!(store.is_revoked(live).await.unwrap());
        assert!(!store.is_revoked(stale).await.unwrap());
        assert!(!store.is_revoked(Uuid::new_v4()).await.unwrap());
    }
}

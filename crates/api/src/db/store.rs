//! Store traits: the persistence boundary used by the services.
//!
//! Every method completes or fails atomically for the single entity it
//! touches. Cross-entity consistency (stock vs. orders) is the order
//! service's job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use bazaar_core::{Email, OrderId, ProductId, UserId};

use super::RepositoryError;
use crate::models::{
    NewOrder, NewProduct, NewRating, NewUser, Order, Product, ProductChanges, ProfileChanges,
    RatingOutcome, StockUpdate, User,
};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    async fn list(&self) -> Result<Vec<User>, RepositoryError>;

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError>;

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError>;

    async fn update_profile(
        &self,
        id: UserId,
        changes: ProfileChanges,
    ) -> Result<Option<User>, RepositoryError>;

    async fn set_active(&self, id: UserId, active: bool) -> Result<Option<User>, RepositoryError>;

    /// Store the hash of a password-reset token, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    async fn set_reset_token(
        &self,
        id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Atomically swap the password of the user holding an unexpired reset
    /// token with this hash, and clear the token.
    ///
    /// Returns `None` when no user holds a matching, unexpired token.
    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;

    async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Which of `names` already belong to a product.
    async fn existing_names(&self, names: &[String]) -> Result<Vec<String>, RepositoryError>;

    /// Insert all products or none.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a name is taken.
    async fn create_many(&self, products: Vec<NewProduct>) -> Result<Vec<Product>, RepositoryError>;

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    async fn update(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Returns `false` if there was no such product.
    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError>;

    /// Decrement stock by `quantity` only if at least that much is available.
    async fn reserve_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<StockUpdate, RepositoryError>;

    /// Increment stock by `quantity`. Returns `false` if the product is gone.
    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<bool, RepositoryError>;

    /// Attach a rating and recompute the average, at most once per user.
    async fn add_rating(
        &self,
        id: ProductId,
        rating: NewRating,
    ) -> Result<RatingOutcome, RepositoryError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Orders owned by `user`, oldest first.
    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Move a pending order to cancelled.
    ///
    /// Returns `false` if the order does not exist or is no longer pending,
    /// so of two concurrent calls only one sees `true`.
    async fn mark_cancelled(&self, id: OrderId) -> Result<bool, RepositoryError>;
}

/// Tokens revoked before their natural expiry, keyed by token id.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), RepositoryError>;

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepositoryError>;
}

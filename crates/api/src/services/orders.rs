//! Order placement and cancellation.
//!
//! Placing an order runs in two phases. The validation phase reads every
//! product and checks its stock against the total quantity the request asks
//! for, without writing anything. The reservation phase then takes stock with
//! a conditional decrement per line, remembering each reservation so that any
//! later failure (another request took the stock, a product vanished, or the
//! order insert failed) puts back everything already taken.
//!
//! Cancelling flips the order to `cancelled` first and only then returns the
//! stock, so two concurrent cancels restore it once.

use std::collections::HashMap;

use rust_decimal::Decimal;
use thiserror::Error;

use bazaar_core::{OrderId, ProductId, UserId};

use crate::db::{OrderStore, ProductStore, RepositoryError};
use crate::models::{
    NewOrder, NewOrderItem, Order, OrderDraft, Principal, StockReservation, StockUpdate,
};

/// Errors from the order workflow.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("product {0} does not exist")]
    ProductNotFound(ProductId),

    #[error("insufficient stock for {name}: {available} available")]
    InsufficientStock { name: String, available: u32 },

    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// The caller has no orders and empty lists are reported as not found.
    #[error("no orders found")]
    NoOrders,

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("order is not pending")]
    NotCancellable,

    /// The order total does not fit in a decimal.
    #[error("order total is too large")]
    TotalTooLarge,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// The order workflow over the product and order stores.
pub struct OrderService<'a> {
    products: &'a dyn ProductStore,
    orders: &'a dyn OrderStore,
    empty_list_not_found: bool,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(
        products: &'a dyn ProductStore,
        orders: &'a dyn OrderStore,
        empty_list_not_found: bool,
    ) -> Self {
        Self {
            products,
            orders,
            empty_list_not_found,
        }
    }

    // =========================================================================
    // Placement
    // =========================================================================

    /// Place an order for `user`.
    ///
    /// Either every line's stock is taken and the order is stored, or no
    /// stock changes at all.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::ProductNotFound` or
    /// `OrderError::InsufficientStock` for the first line that cannot be
    /// served, `OrderError::TotalTooLarge` if the total overflows, or
    /// `OrderError::Repository` if a store fails.
    pub async fn create_order(&self, user: UserId, draft: OrderDraft) -> Result<Order, OrderError> {
        self.check_stock(&draft).await?;

        let mut reservations: Vec<StockReservation> = Vec::with_capacity(draft.lines.len());
        let mut items = Vec::with_capacity(draft.lines.len());

        for line in &draft.lines {
            let outcome = match self.products.reserve_stock(line.product, line.quantity).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.release_all(&draft, &reservations).await;
                    return Err(e.into());
                }
            };

            let reservation = match outcome {
                StockUpdate::Reserved(reservation) => reservation,
                StockUpdate::Insufficient { name, available } => {
                    self.release_all(&draft, &reservations).await;
                    return Err(OrderError::InsufficientStock { name, available });
                }
                StockUpdate::NotFound => {
                    self.release_all(&draft, &reservations).await;
                    return Err(OrderError::ProductNotFound(line.product));
                }
            };

            items.push(NewOrderItem {
                product: line.product,
                quantity: line.quantity,
                price: reservation.price,
            });
            reservations.push(reservation);
        }

        let total_amount = items.iter().try_fold(Decimal::ZERO, |total, item| {
            item.price.line_total(item.quantity)?.checked_add(total)
        });
        let Some(total_amount) = total_amount else {
            self.release_all(&draft, &reservations).await;
            return Err(OrderError::TotalTooLarge);
        };

        let new_order = NewOrder {
            user,
            items,
            total_amount,
            shipping_address: draft.shipping_address.clone(),
            payment_method: draft.payment_method,
        };

        let order = match self.orders.create(new_order).await {
            Ok(order) => order,
            Err(e) => {
                self.release_all(&draft, &reservations).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            order_id = %order.id,
            user_id = %user,
            total = %order.total_amount,
            lines = order.items.len(),
            "Order placed"
        );
        Ok(order)
    }

    /// Check every line against current stock without mutating anything.
    ///
    /// Lines naming the same product are checked against their running sum.
    async fn check_stock(&self, draft: &OrderDraft) -> Result<(), OrderError> {
        let mut demand: HashMap<ProductId, u32> = HashMap::new();

        for line in &draft.lines {
            let product = self
                .products
                .get_by_id(line.product)
                .await?
                .ok_or(OrderError::ProductNotFound(line.product))?;

            let requested = demand.entry(line.product).or_insert(0);
            *requested = requested.saturating_add(line.quantity);

            if product.stock < *requested {
                return Err(OrderError::InsufficientStock {
                    name: product.name,
                    available: product.stock,
                });
            }
        }

        Ok(())
    }

    /// Put back every reservation, newest first.
    async fn release_all(&self, draft: &OrderDraft, reservations: &[StockReservation]) {
        for (line, reservation) in draft.lines.iter().zip(reservations).rev() {
            match self
                .products
                .release_stock(reservation.product, line.quantity)
                .await
            {
                Ok(true) => tracing::warn!(
                    product_id = %reservation.product,
                    quantity = line.quantity,
                    "Released stock reservation"
                ),
                Ok(false) => tracing::warn!(
                    product_id = %reservation.product,
                    quantity = line.quantity,
                    "Product vanished before its reservation could be released"
                ),
                Err(e) => tracing::error!(
                    product_id = %reservation.product,
                    quantity = line.quantity,
                    error = %e,
                    "Failed to release stock reservation"
                ),
            }
        }
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// Orders placed by `user`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NoOrders` for an empty list when configured to.
    pub async fn list_orders(&self, user: UserId) -> Result<Vec<Order>, OrderError> {
        let orders = self.orders.list_for_user(user).await?;
        if orders.is_empty() && self.empty_list_not_found {
            return Err(OrderError::NoOrders);
        }
        Ok(orders)
    }

    /// # Errors
    ///
    /// Returns `OrderError::NotFound`, or `OrderError::Forbidden` unless the
    /// caller owns the order or is an admin.
    pub async fn get_order(&self, caller: Principal, id: OrderId) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get_by_id(id)
            .await?
            .ok_or(OrderError::NotFound(id))?;

        if !caller.can_access(order.user) {
            return Err(OrderError::Forbidden(
                "You are not authorized to view this order.",
            ));
        }
        Ok(order)
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancel a pending order and return its stock.
    ///
    /// Lines whose product has since been deleted are skipped.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound`, `OrderError::Forbidden`, or
    /// `OrderError::NotCancellable` if the order is no longer pending.
    pub async fn cancel_order(&self, caller: Principal, id: OrderId) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get_by_id(id)
            .await?
            .ok_or(OrderError::NotFound(id))?;

        if !caller.can_access(order.user) {
            return Err(OrderError::Forbidden(
                "You are not authorized to cancel this order.",
            ));
        }
        if !order.status.is_cancellable() {
            return Err(OrderError::NotCancellable);
        }

        // Only the caller that wins the transition restores stock.
        if !self.orders.mark_cancelled(id).await? {
            return Err(OrderError::NotCancellable);
        }

        for item in &order.items {
            match self.products.release_stock(item.product, item.quantity).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    order_id = %id,
                    product_id = %item.product,
                    quantity = item.quantity,
                    "Skipped stock restoration for deleted product"
                ),
                Err(e) => tracing::error!(
                    order_id = %id,
                    product_id = %item.product,
                    quantity = item.quantity,
                    error = %e,
                    "Failed to restore stock"
                ),
            }
        }

        let cancelled = self
            .orders
            .get_by_id(id)
            .await?
            .ok_or(OrderError::NotFound(id))?;

        tracing::info!(
            order_id = %id,
            user_id = %order.user,
            cancelled_by = %caller.id,
            "Order cancelled"
        );
        Ok(cancelled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bazaar_core::{Category, OrderStatus, PaymentMethod, Price, Role};

    use crate::db::memory::MemoryStore;
    use crate::models::{
        NewProduct, NewRating, OrderLine, Product, ProductChanges, RatingOutcome,
        ShippingAddress,
    };

    const ALICE: Principal = Principal {
        id: UserId::new(100),
        role: Role::User,
    };
    const BOB: Principal = Principal {
        id: UserId::new(200),
        role: Role::User,
    };
    const ADMIN: Principal = Principal {
        id: UserId::new(300),
        role: Role::Admin,
    };

    async fn seed(store: &MemoryStore, name: &str, cents: i64, stock: u32) -> ProductId {
        store
            .create_many(vec![NewProduct {
                name: name.into(),
                description: "Seeded product".into(),
                price: Price::new(Decimal::new(cents, 2)).unwrap(),
                category: Category::Electronics,
                stock,
                created_by: ADMIN.id,
            }])
            .await
            .unwrap()
            .pop()
            .unwrap()
            .id
    }

    async fn stock(store: &MemoryStore, id: ProductId) -> u32 {
        ProductStore::get_by_id(store, id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    fn draft(lines: &[(ProductId, u32)]) -> OrderDraft {
        OrderDraft {
            lines: lines
                .iter()
                .map(|&(product, quantity)| OrderLine { product, quantity })
                .collect(),
            shipping_address: ShippingAddress {
                street: "1 Main St".into(),
                city: "Springfield".into(),
                state: "IL".into(),
                zip_code: "62701".into(),
                country: "USA".into(),
            },
            payment_method: PaymentMethod::CreditCard,
        }
    }

    #[tokio::test]
    async fn test_place_and_cancel_restores_stock() {
        let store = MemoryStore::default();
        let laptop = seed(&store, "Laptop", 25_000, 10).await;
        let service = OrderService::new(&store, &store, true);

        let order = service
            .create_order(ALICE.id, draft(&[(laptop, 4)]))
            .await
            .unwrap();
        assert_eq!(order.total_amount, Decimal::new(100_000, 2));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(stock(&store, laptop).await, 6);

        let cancelled = service.cancel_order(ALICE, order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock(&store, laptop).await, 10);

        assert!(matches!(
            service.cancel_order(ALICE, order.id).await.unwrap_err(),
            OrderError::NotCancellable
        ));
        assert_eq!(stock(&store, laptop).await, 10);
    }

    #[tokio::test]
    async fn test_total_uses_snapshot_prices() {
        let store = MemoryStore::default();
        let mouse = seed(&store, "Mouse", 1999, 5).await;
        let cable = seed(&store, "Cable", 550, 50).await;
        let service = OrderService::new(&store, &store, true);

        let order = service
            .create_order(ALICE.id, draft(&[(mouse, 2), (cable, 3)]))
            .await
            .unwrap();
        // 2 x 19.99 + 3 x 5.50
        assert_eq!(order.total_amount, Decimal::new(5648, 2));

        store
            .update(
                mouse,
                crate::models::ProductChanges {
                    price: Some(Price::new(Decimal::new(999, 2)).unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let reread = service.get_order(ALICE, order.id).await.unwrap();
        assert_eq!(reread.total_amount, Decimal::new(5648, 2));
        assert_eq!(reread.items[0].price.amount(), Decimal::new(1999, 2));
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let store = MemoryStore::default();
        let plenty = seed(&store, "Plenty", 100, 100).await;
        let scarce = seed(&store, "Scarce", 100, 5).await;
        let service = OrderService::new(&store, &store, true);

        let err = service
            .create_order(ALICE.id, draft(&[(plenty, 10), (scarce, 999)]))
            .await
            .unwrap_err();
        match err {
            OrderError::InsufficientStock { name, available } => {
                assert_eq!(name, "Scarce");
                assert_eq!(available, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(stock(&store, plenty).await, 100);
        assert_eq!(stock(&store, scarce).await, 5);
    }

    #[tokio::test]
    async fn test_repeated_product_checked_in_aggregate() {
        let store = MemoryStore::default();
        let widget = seed(&store, "Widget", 100, 5).await;
        let service = OrderService::new(&store, &store, true);

        let err = service
            .create_order(ALICE.id, draft(&[(widget, 3), (widget, 3)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InsufficientStock { available: 5, .. }
        ));
        assert_eq!(stock(&store, widget).await, 5);
    }

    #[tokio::test]
    async fn test_unknown_product_changes_nothing() {
        let store = MemoryStore::default();
        let laptop = seed(&store, "Laptop", 100, 3).await;
        let service = OrderService::new(&store, &store, true);

        let err = service
            .create_order(ALICE.id, draft(&[(laptop, 1), (ProductId::new(9999), 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::ProductNotFound(id) if id == ProductId::new(9999)));
        assert_eq!(stock(&store, laptop).await, 3);
    }

    #[tokio::test]
    async fn test_access_is_owner_or_admin() {
        let store = MemoryStore::default();
        let laptop = seed(&store, "Laptop", 100, 3).await;
        let service = OrderService::new(&store, &store, true);
        let order = service
            .create_order(ALICE.id, draft(&[(laptop, 1)]))
            .await
            .unwrap();

        assert!(matches!(
            service.get_order(BOB, order.id).await.unwrap_err(),
            OrderError::Forbidden(_)
        ));
        assert!(matches!(
            service.cancel_order(BOB, order.id).await.unwrap_err(),
            OrderError::Forbidden(_)
        ));
        assert_eq!(stock(&store, laptop).await, 2);

        assert!(service.get_order(ADMIN, order.id).await.is_ok());
        assert!(service.cancel_order(ADMIN, order.id).await.is_ok());
        assert_eq!(stock(&store, laptop).await, 3);

        assert!(matches!(
            service.get_order(ADMIN, OrderId::new(4242)).await.unwrap_err(),
            OrderError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_cancel_skips_deleted_products() {
        let store = MemoryStore::default();
        let kept = seed(&store, "Kept", 100, 4).await;
        let gone = seed(&store, "Gone", 100, 4).await;
        let service = OrderService::new(&store, &store, true);

        let order = service
            .create_order(ALICE.id, draft(&[(kept, 1), (gone, 2)]))
            .await
            .unwrap();
        assert!(store.delete(gone).await.unwrap());

        let cancelled = service.cancel_order(ALICE, order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.items.len(), 2);
        assert!(cancelled.items[1].product_info.is_none());
        assert_eq!(stock(&store, kept).await, 4);
    }

    #[tokio::test]
    async fn test_empty_order_list() {
        let store = MemoryStore::default();

        let strict = OrderService::new(&store, &store, true);
        assert!(matches!(
            strict.list_orders(ALICE.id).await.unwrap_err(),
            OrderError::NoOrders
        ));

        let lenient = OrderService::new(&store, &store, false);
        assert!(lenient.list_orders(ALICE.id).await.unwrap().is_empty());
    }

    /// An order store whose inserts always fail.
    struct BrokenOrders;

    #[async_trait]
    impl OrderStore for BrokenOrders {
        async fn create(&self, _order: NewOrder) -> Result<Order, RepositoryError> {
            Err(RepositoryError::DataCorruption("disk full".into()))
        }

        async fn get_by_id(&self, _id: OrderId) -> Result<Option<Order>, RepositoryError> {
            Ok(None)
        }

        async fn list_for_user(&self, _user: UserId) -> Result<Vec<Order>, RepositoryError> {
            Ok(Vec::new())
        }

        async fn mark_cancelled(&self, _id: OrderId) -> Result<bool, RepositoryError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_failed_insert_releases_reservations() {
        let store = MemoryStore::default();
        let first = seed(&store, "First", 100, 10).await;
        let second = seed(&store, "Second", 100, 10).await;
        let service = OrderService::new(&store, &BrokenOrders, true);

        let err = service
            .create_order(ALICE.id, draft(&[(first, 3), (second, 7)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Repository(_)));
        assert_eq!(stock(&store, first).await, 10);
        assert_eq!(stock(&store, second).await, 10);
    }

    #[tokio::test]
    async fn test_total_overflow_releases_reservations() {
        let store = MemoryStore::default();
        let huge = store
            .create_many(vec![NewProduct {
                name: "Priceless".into(),
                description: "Seeded product".into(),
                price: Price::new(Decimal::MAX).unwrap(),
                category: Category::Electronics,
                stock: 10,
                created_by: ADMIN.id,
            }])
            .await
            .unwrap()
            .pop()
            .unwrap()
            .id;
        let cheap = seed(&store, "Cheap", 100, 10).await;
        let service = OrderService::new(&store, &store, true);

        let err = service
            .create_order(ALICE.id, draft(&[(cheap, 1), (huge, 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::TotalTooLarge));
        assert_eq!(stock(&store, huge).await, 10);
        assert_eq!(stock(&store, cheap).await, 10);
        assert!(OrderStore::list_for_user(&store, ALICE.id).await.unwrap().is_empty());
    }

    /// Serves product reads from a snapshot taken at construction, so the
    /// validation phase sees stock that writes made since have used up.
    struct StaleReads<'a> {
        inner: &'a MemoryStore,
        snapshot: Vec<Product>,
    }

    impl<'a> StaleReads<'a> {
        async fn capture(inner: &'a MemoryStore) -> Self {
            let snapshot = ProductStore::list(inner).await.unwrap();
            Self { inner, snapshot }
        }
    }

    #[async_trait]
    impl ProductStore for StaleReads<'_> {
        async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
            Ok(self.snapshot.clone())
        }

        async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
            Ok(self.snapshot.iter().find(|p| p.id == id).cloned())
        }

        async fn existing_names(&self, names: &[String]) -> Result<Vec<String>, RepositoryError> {
            ProductStore::existing_names(self.inner, names).await
        }

        async fn create_many(
            &self,
            products: Vec<NewProduct>,
        ) -> Result<Vec<Product>, RepositoryError> {
            ProductStore::create_many(self.inner, products).await
        }

        async fn update(
            &self,
            id: ProductId,
            changes: ProductChanges,
        ) -> Result<Option<Product>, RepositoryError> {
            ProductStore::update(self.inner, id, changes).await
        }

        async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
            ProductStore::delete(self.inner, id).await
        }

        async fn reserve_stock(
            &self,
            id: ProductId,
            quantity: u32,
        ) -> Result<StockUpdate, RepositoryError> {
            ProductStore::reserve_stock(self.inner, id, quantity).await
        }

        async fn release_stock(
            &self,
            id: ProductId,
            quantity: u32,
        ) -> Result<bool, RepositoryError> {
            ProductStore::release_stock(self.inner, id, quantity).await
        }

        async fn add_rating(
            &self,
            id: ProductId,
            rating: NewRating,
        ) -> Result<RatingOutcome, RepositoryError> {
            ProductStore::add_rating(self.inner, id, rating).await
        }
    }

    #[tokio::test]
    async fn test_lost_reservation_race_releases_earlier_lines() {
        let store = MemoryStore::default();
        let first = seed(&store, "First", 100, 10).await;
        let second = seed(&store, "Second", 100, 5).await;
        let stale = StaleReads::capture(&store).await;

        // Another order takes most of the second product after validation read it.
        let taken = ProductStore::reserve_stock(&store, second, 4).await.unwrap();
        assert!(matches!(taken, StockUpdate::Reserved(_)));

        let service = OrderService::new(&stale, &store, true);
        let err = service
            .create_order(ALICE.id, draft(&[(first, 3), (second, 3)]))
            .await
            .unwrap_err();
        match err {
            OrderError::InsufficientStock { name, available } => {
                assert_eq!(name, "Second");
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stock(&store, first).await, 10);
        assert_eq!(stock(&store, second).await, 1);
        assert!(OrderStore::list_for_user(&store, ALICE.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_product_deleted_mid_order_releases_earlier_lines() {
        let store = MemoryStore::default();
        let first = seed(&store, "First", 100, 10).await;
        let second = seed(&store, "Second", 100, 5).await;
        let stale = StaleReads::capture(&store).await;
        assert!(ProductStore::delete(&store, second).await.unwrap());

        let service = OrderService::new(&stale, &store, true);
        let err = service
            .create_order(ALICE.id, draft(&[(first, 3), (second, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::ProductNotFound(id) if id == second));
        assert_eq!(stock(&store, first).await, 10);
    }
}

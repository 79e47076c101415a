use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use bazaar_core::{OrderId, OrderStatus, PaymentMethod, Price, ProductId, UserId};

use super::{to_count, to_db_int};
use crate::db::RepositoryError;
use crate::db::store::OrderStore;
use crate::models::{NewOrder, Order, OrderItem, ProductSummary, ShippingAddress};

/// Repository for orders and their line items.
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    total_amount: Decimal,
    street: String,
    city: String,
    state: String,
    zip_code: String,
    country: String,
    payment_method: PaymentMethod,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A line item joined with the product's current name and price.
#[derive(sqlx::FromRow)]
struct ItemRow {
    order_id: i32,
    product_id: i32,
    quantity: i32,
    price: Price,
    product_name: Option<String>,
    product_price: Option<Price>,
}

impl ItemRow {
    fn into_item(self) -> Result<OrderItem, RepositoryError> {
        let product = ProductId::new(self.product_id);
        let product_info = match (self.product_name, self.product_price) {
            (Some(name), Some(price)) => Some(ProductSummary {
                id: product,
                name,
                price,
            }),
            _ => None,
        };
        Ok(OrderItem {
            product,
            quantity: to_count(self.quantity, "quantity")?,
            price: self.price,
            product_info,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            user: UserId::new(self.user_id),
            items,
            total_amount: self.total_amount,
            shipping_address: ShippingAddress {
                street: self.street,
                city: self.city,
                state: self.state,
                zip_code: self.zip_code,
                country: self.country,
            },
            payment_method: self.payment_method,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Load the items for `rows` and assemble orders in row order.
async fn with_items(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, RepositoryError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let item_rows = sqlx::query_as::<_, ItemRow>(
        r"
        SELECT i.order_id, i.product_id, i.quantity, i.price,
               p.name AS product_name, p.price AS product_price
        FROM shop.order_item i
        LEFT JOIN shop.product p ON p.id = i.product_id
        WHERE i.order_id = ANY($1)
        ORDER BY i.order_id, i.position
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<i32, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        items.entry(row.order_id).or_default().push(row.into_item()?);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let order_items = items.remove(&row.id).unwrap_or_default();
            row.into_order(order_items)
        })
        .collect())
}

async fn fetch_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r"
        SELECT id, user_id, total_amount, street, city, state, zip_code, country,
               payment_method, status, created_at, updated_at
        FROM shop.orders
        WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(with_items(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order_id = sqlx::query_scalar::<_, i32>(
            r"
            INSERT INTO shop.orders
                (user_id, total_amount, street, city, state, zip_code, country, payment_method)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(order.user)
        .bind(order.total_amount)
        .bind(&order.shipping_address.street)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.state)
        .bind(&order.shipping_address.zip_code)
        .bind(&order.shipping_address.country)
        .bind(order.payment_method)
        .fetch_one(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| {
                RepositoryError::DataCorruption(format!("too many order items: {position}"))
            })?;
            sqlx::query(
                r"
                INSERT INTO shop.order_item (order_id, position, product_id, quantity, price)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(order_id)
            .bind(position)
            .bind(item.product)
            .bind(to_db_int(item.quantity, "quantity")?)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        let created = fetch_order(&mut tx, OrderId::new(order_id))
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        Ok(created)
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, total_amount, street, city, state, zip_code, country,
                   payment_method, status, created_at, updated_at
            FROM shop.orders
            WHERE user_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(user)
        .fetch_all(&mut *conn)
        .await?;

        with_items(&mut conn, rows).await
    }

    async fn mark_cancelled(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.orders
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use bazaar_core::{Category, Price, ProductId, UserId};

use super::{to_count, to_db_int};
use crate::db::RepositoryError;
use crate::db::store::ProductStore;
use crate::models::{
    NewProduct, NewRating, Product, ProductChanges, Rating, RatingOutcome, StockReservation,
    StockUpdate,
};

/// Repository for products, their stock, and their ratings.
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: Price,
    category: Category,
    stock: i32,
    created_by: i32,
    average_rating: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RatingRow {
    product_id: i32,
    user_id: i32,
    rating: i16,
    review: Option<String>,
    created_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self, ratings: Vec<Rating>) -> Result<Product, RepositoryError> {
        Ok(Product {
            id: ProductId::new(self.id),
            name: self.name,
            description: self.description,
            price: self.price,
            category: self.category,
            stock: to_count(self.stock, "stock")?,
            created_by: UserId::new(self.created_by),
            ratings,
            average_rating: self.average_rating,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<RatingRow> for Rating {
    type Error = RepositoryError;

    fn try_from(row: RatingRow) -> Result<Self, Self::Error> {
        let rating = u8::try_from(row.rating).map_err(|_| {
            RepositoryError::DataCorruption(format!("rating out of range: {}", row.rating))
        })?;
        Ok(Self {
            user: UserId::new(row.user_id),
            rating,
            review: row.review,
            created_at: row.created_at,
        })
    }
}

/// Load ratings for `rows` and assemble products in row order.
async fn with_ratings(
    conn: &mut PgConnection,
    rows: Vec<ProductRow>,
) -> Result<Vec<Product>, RepositoryError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let rating_rows = sqlx::query_as::<_, RatingRow>(
        r"
        SELECT product_id, user_id, rating, review, created_at
        FROM shop.product_rating
        WHERE product_id = ANY($1)
        ORDER BY created_at, user_id
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut ratings: HashMap<i32, Vec<Rating>> = HashMap::new();
    for row in rating_rows {
        ratings
            .entry(row.product_id)
            .or_default()
            .push(Rating::try_from(row)?);
    }

    rows.into_iter()
        .map(|row| {
            let product_ratings = ratings.remove(&row.id).unwrap_or_default();
            row.into_product(product_ratings)
        })
        .collect()
}

async fn with_ratings_one(
    conn: &mut PgConnection,
    row: Option<ProductRow>,
) -> Result<Option<Product>, RepositoryError> {
    match row {
        Some(row) => Ok(with_ratings(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn fetch_product(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(
        r"
        SELECT id, name, description, price, category, stock, created_by,
               average_rating, created_at, updated_at
        FROM shop.product
        WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    with_ratings_one(conn, row).await
}

#[async_trait]
impl ProductStore for ProductRepository {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, category, stock, created_by,
                   average_rating, created_at, updated_at
            FROM shop.product
            ORDER BY id
            ",
        )
        .fetch_all(&mut *conn)
        .await?;

        with_ratings(&mut conn, rows).await
    }

    async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    async fn existing_names(&self, names: &[String]) -> Result<Vec<String>, RepositoryError> {
        let existing = sqlx::query_scalar::<_, String>(
            "SELECT name FROM shop.product WHERE name = ANY($1) ORDER BY name",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await?;

        Ok(existing)
    }

    async fn create_many(&self, products: Vec<NewProduct>) -> Result<Vec<Product>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(products.len());

        for product in products {
            let row = sqlx::query_as::<_, ProductRow>(
                r"
                INSERT INTO shop.product (name, description, price, category, stock, created_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, name, description, price, category, stock, created_by,
                          average_rating, created_at, updated_at
                ",
            )
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.category)
            .bind(to_db_int(product.stock, "stock")?)
            .bind(product.created_by)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "product name"))?;

            created.push(row.into_product(Vec::new())?);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn update(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> Result<Option<Product>, RepositoryError> {
        let stock = changes
            .stock
            .map(|s| to_db_int(s, "stock"))
            .transpose()?;

        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE shop.product
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                category = COALESCE($5, category),
                stock = COALESCE($6, stock),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, price, category, stock, created_by,
                      average_rating, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.price)
        .bind(changes.category)
        .bind(stock)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "product name"))?;

        with_ratings_one(&mut conn, row).await
    }

    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reserve_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<StockUpdate, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Reserved {
            name: String,
            price: Price,
            stock: i32,
        }

        let quantity = to_db_int(quantity, "quantity")?;

        // The WHERE clause makes check and decrement a single atomic step.
        let reserved = sqlx::query_as::<_, Reserved>(
            r"
            UPDATE shop.product
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING name, price, stock
            ",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = reserved {
            return Ok(StockUpdate::Reserved(StockReservation {
                product: id,
                name: row.name,
                price: row.price,
                remaining: to_count(row.stock, "stock")?,
            }));
        }

        let current = sqlx::query_as::<_, (String, i32)>(
            "SELECT name, stock FROM shop.product WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match current {
            Some((name, stock)) => Ok(StockUpdate::Insufficient {
                name,
                available: to_count(stock, "stock")?,
            }),
            None => Ok(StockUpdate::NotFound),
        }
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.product
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(to_db_int(quantity, "quantity")?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_rating(
        &self,
        id: ProductId,
        rating: NewRating,
    ) -> Result<RatingOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM shop.product WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Ok(RatingOutcome::NotFound);
        }

        let inserted = sqlx::query(
            r"
            INSERT INTO shop.product_rating (product_id, user_id, rating, review)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id, user_id) DO NOTHING
            ",
        )
        .bind(id)
        .bind(rating.user)
        .bind(i16::from(rating.rating))
        .bind(rating.review)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(RatingOutcome::AlreadyRated);
        }

        sqlx::query(
            r"
            UPDATE shop.product
            SET average_rating = (
                    SELECT AVG(rating)::float8 FROM shop.product_rating WHERE product_id = $1
                ),
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let product = fetch_product(&mut tx, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        Ok(RatingOutcome::Added(product))
    }
}

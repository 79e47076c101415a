//! Catalog types: products, ratings, stock reservations, and the product
//! request bodies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bazaar_core::{Category, Price, ProductId, UserId};

use super::{ValidationError, non_blank};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;
const DESCRIPTION_MAX_CHARS: usize = 1000;
const PRICE_MAX: u32 = 1_000_000_000;
const REVIEW_MIN_CHARS: usize = 5;

/// A catalog product with its ratings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: Category,
    pub stock: u32,
    pub created_by: UserId,
    pub ratings: Vec<Rating>,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
        }
    }
}

/// One user's rating of a product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub user: UserId,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Arithmetic mean of all ratings, `0.0` when there are none.
#[must_use]
pub fn average_rating(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: u32 = ratings.iter().map(|r| u32::from(r.rating)).sum();
    #[allow(clippy::cast_precision_loss)] // rating counts stay far below 2^52
    let count = ratings.len() as f64;
    f64::from(sum) / count
}

/// Name and price of a product, attached to order lines for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
}

/// A product about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: Category,
    pub stock: u32,
    pub created_by: UserId,
}

/// A partial product update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub category: Option<Category>,
    pub stock: Option<u32>,
}

impl ProductChanges {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.category.is_none()
            && self.stock.is_none()
    }
}

/// A rating about to be attached to a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRating {
    pub user: UserId,
    pub rating: u8,
    pub review: Option<String>,
}

/// Result of adding a rating.
#[derive(Debug, Clone)]
pub enum RatingOutcome {
    Added(Product),
    AlreadyRated,
    NotFound,
}

/// Stock taken from a product by a successful reservation.
///
/// Carries the row as it was after the decrement, so the unit price snapshot
/// comes from the same write that moved the stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockReservation {
    pub product: ProductId,
    pub name: String,
    pub price: Price,
    pub remaining: u32,
}

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockUpdate {
    Reserved(StockReservation),
    Insufficient { name: String, available: u32 },
    NotFound,
}

// =============================================================================
// Request bodies
// =============================================================================

/// Product fields as they arrive in a create or update body.
#[derive(Debug, Default, Deserialize)]
pub struct ProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub stock: Option<i64>,
}

/// Body of `POST /products`: `{products: {...}}` or `{products: [...]}`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateProductsRequest {
    pub products: Option<Value>,
}

impl CreateProductsRequest {
    /// Validate every product in the body, collecting all problems into one
    /// message.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when `products` has the wrong shape or any
    /// item fails validation.
    pub fn validate(self, created_by: UserId) -> Result<Vec<NewProduct>, ValidationError> {
        let items = match self.products {
            Some(Value::Array(items)) if !items.is_empty() => items,
            Some(item @ Value::Object(_)) => vec![item],
            _ => {
                return Err(ValidationError::new(
                    "Invalid input: 'products' must be an object or an array of product objects.",
                ));
            }
        };

        let mut errors = Vec::new();
        let mut products: Vec<NewProduct> = Vec::with_capacity(items.len());

        for (i, item) in items.into_iter().enumerate() {
            let input = match serde_json::from_value::<ProductInput>(item) {
                Ok(input) => input,
                Err(e) => {
                    errors.push(format!("Product at index {i} is malformed: {e}."));
                    continue;
                }
            };

            match input.into_new_product(created_by) {
                Ok(product) => {
                    if products.iter().any(|p| p.name == product.name) {
                        errors.push(format!(
                            "Product at index {i} has a duplicate name within the request body."
                        ));
                    } else {
                        products.push(product);
                    }
                }
                Err(item_errors) => {
                    errors.extend(
                        item_errors
                            .into_iter()
                            .map(|e| format!("Product at index {i}: {e}.")),
                    );
                }
            }
        }

        if !errors.is_empty() {
            return Err(ValidationError(format!(
                "Validation errors: {}",
                errors.join(" ")
            )));
        }
        Ok(products)
    }
}

impl ProductInput {
    fn into_new_product(self, created_by: UserId) -> Result<NewProduct, Vec<String>> {
        let mut errors = Vec::new();

        let name = match non_blank(self.name) {
            Some(name) => check(validate_product_name(&name), &mut errors),
            None => {
                errors.push("Please add a product name".to_owned());
                None
            }
        };
        let description = match non_blank(self.description) {
            Some(d) => check(validate_description(d), &mut errors),
            None => {
                errors.push("Please add a description".to_owned());
                None
            }
        };
        let price = match self.price {
            Some(p) => check(validate_price(p), &mut errors),
            None => {
                errors.push("Please add a price".to_owned());
                None
            }
        };
        let category = match non_blank(self.category) {
            Some(c) => check(validate_category(&c), &mut errors),
            None => {
                errors.push("Please add a category".to_owned());
                None
            }
        };
        let stock = match self.stock {
            Some(s) => check(validate_stock(s), &mut errors),
            None => {
                errors.push("Please add stock quantity".to_owned());
                None
            }
        };

        match (name, description, price, category, stock) {
            (Some(name), Some(description), Some(price), Some(category), Some(stock))
                if errors.is_empty() =>
            {
                Ok(NewProduct {
                    name,
                    description,
                    price,
                    category,
                    stock,
                    created_by,
                })
            }
            _ => Err(errors),
        }
    }
}

fn check<T>(result: Result<T, String>, errors: &mut Vec<String>) -> Option<T> {
    result.map_err(|e| errors.push(e)).ok()
}

fn validate_product_name(name: &str) -> Result<String, String> {
    let len = name.chars().count();
    if len < NAME_MIN_CHARS {
        return Err(format!(
            "Name must be at least {NAME_MIN_CHARS} characters"
        ));
    }
    if len > NAME_MAX_CHARS {
        return Err(format!(
            "Name cannot be more than {NAME_MAX_CHARS} characters"
        ));
    }
    Ok(name.to_owned())
}

fn validate_description(description: String) -> Result<String, String> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(format!(
            "Description cannot be more than {DESCRIPTION_MAX_CHARS} characters"
        ));
    }
    Ok(description)
}

fn validate_price(price: Decimal) -> Result<Price, String> {
    if price > Decimal::from(PRICE_MAX) {
        return Err(format!("Price cannot be more than {PRICE_MAX}"));
    }
    Price::new(price).map_err(|_| "Price must be greater than 0".to_owned())
}

fn validate_category(category: &str) -> Result<Category, String> {
    category.parse().map_err(|_| {
        let allowed: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
        format!("Invalid category (must be one of: {})", allowed.join(", "))
    })
}

fn validate_stock(stock: i64) -> Result<u32, String> {
    if stock < 0 {
        return Err("Stock cannot be negative".to_owned());
    }
    // Stored in a signed 32-bit column.
    i32::try_from(stock)
        .ok()
        .and_then(|stock| u32::try_from(stock).ok())
        .ok_or_else(|| format!("Stock cannot be more than {}", i32::MAX))
}

/// Body of `PUT /products/{id}`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct UpdateProductRequest(pub ProductInput);

impl UpdateProductRequest {
    /// # Errors
    ///
    /// Returns the first failing field's message, or a message for an empty
    /// body.
    pub fn validate(self) -> Result<ProductChanges, ValidationError> {
        let input = self.0;
        let changes = ProductChanges {
            name: input
                .name
                .map(|n| validate_product_name(n.trim()))
                .transpose()
                .map_err(ValidationError)?,
            description: input
                .description
                .map(|d| match non_blank(Some(d)) {
                    Some(d) => validate_description(d),
                    None => Err("Please add a description".to_owned()),
                })
                .transpose()
                .map_err(ValidationError)?,
            price: input
                .price
                .map(validate_price)
                .transpose()
                .map_err(ValidationError)?,
            category: input
                .category
                .map(|c| validate_category(c.trim()))
                .transpose()
                .map_err(ValidationError)?,
            stock: input
                .stock
                .map(validate_stock)
                .transpose()
                .map_err(ValidationError)?,
        };

        if changes.is_empty() {
            return Err(ValidationError::new(
                "Please provide at least one field to update",
            ));
        }
        Ok(changes)
    }
}

/// Body of `POST /products/{id}/ratings`.
#[derive(Debug, Default, Deserialize)]
pub struct RatingRequest {
    pub rating: Option<f64>,
    pub review: Option<String>,
}

impl RatingRequest {
    /// # Errors
    ///
    /// Returns `ValidationError` if the rating is not a whole number from 1 to
    /// 5, or a review is given but shorter than 5 characters.
    pub fn validate(self, user: UserId) -> Result<NewRating, ValidationError> {
        let rating = self
            .rating
            .filter(|r| r.fract() == 0.0 && (1.0..=5.0).contains(r))
            .ok_or_else(|| ValidationError::new("Rating must be a number between 1 and 5"))?;

        let review = match self.review {
            Some(review) => {
                let review = review.trim();
                if review.chars().count() < REVIEW_MIN_CHARS {
                    return Err(ValidationError(format!(
                        "Review must be at least {REVIEW_MIN_CHARS} characters long"
                    )));
                }
                Some(review.to_owned())
            }
            None => None,
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range-checked above
        let rating = rating as u8;

        Ok(NewRating {
            user,
            rating,
            review,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(products: Value) -> CreateProductsRequest {
        CreateProductsRequest {
            products: Some(products),
        }
    }

    fn laptop() -> Value {
        json!({
            "name": "Laptop",
            "description": "A portable computer",
            "price": 999.99,
            "category": "electronics",
            "stock": 10
        })
    }

    #[test]
    fn test_create_accepts_single_object_and_array() {
        let one = request(laptop()).validate(UserId::new(1)).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].price.amount(), Decimal::new(99999, 2));
        assert_eq!(one[0].created_by, UserId::new(1));

        let mut mouse = laptop();
        mouse["name"] = json!("Mouse");
        let many = request(json!([laptop(), mouse])).validate(UserId::new(1)).unwrap();
        assert_eq!(many.len(), 2);
    }

    #[test]
    fn test_create_rejects_wrong_shape() {
        for products in [json!("laptop"), json!([]), json!(42)] {
            let err = request(products).validate(UserId::new(1)).unwrap_err();
            assert!(err.to_string().starts_with("Invalid input"));
        }
        let err = CreateProductsRequest::default()
            .validate(UserId::new(1))
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid input"));
    }

    #[test]
    fn test_create_aggregates_errors() {
        let mut bad = laptop();
        bad["price"] = json!(0);
        bad["stock"] = json!(-1);
        let err = request(json!([laptop(), laptop(), bad]))
            .validate(UserId::new(1))
            .unwrap_err()
            .to_string();

        assert!(err.starts_with("Validation errors: "));
        assert!(err.contains("Product at index 1 has a duplicate name within the request body."));
        assert!(err.contains("Product at index 2: Price must be greater than 0."));
        assert!(err.contains("Product at index 2: Stock cannot be negative."));
    }

    #[test]
    fn test_create_rejects_unknown_category() {
        let mut bad = laptop();
        bad["category"] = json!("toys");
        let err = request(bad).validate(UserId::new(1)).unwrap_err().to_string();
        assert!(err.contains("Invalid category"));
    }

    #[test]
    fn test_create_rejects_out_of_range_price_and_stock() {
        let mut bad = laptop();
        bad["price"] = json!(1_000_000_000.01);
        bad["stock"] = json!(2_147_483_648_i64);
        let err = request(bad).validate(UserId::new(1)).unwrap_err().to_string();
        assert!(err.contains("Price cannot be more than 1000000000"));
        assert!(err.contains("Stock cannot be more than 2147483647"));

        let mut edge = laptop();
        edge["price"] = json!(1_000_000_000);
        edge["stock"] = json!(i32::MAX);
        let ok = request(edge).validate(UserId::new(1)).unwrap();
        assert_eq!(ok[0].stock, 2_147_483_647);
    }

    #[test]
    fn test_update_validation() {
        let changes = UpdateProductRequest(ProductInput {
            stock: Some(3),
            ..ProductInput::default()
        })
        .validate()
        .unwrap();
        assert_eq!(changes.stock, Some(3));
        assert!(changes.name.is_none());

        let err = UpdateProductRequest(ProductInput {
            stock: Some(-5),
            ..ProductInput::default()
        })
        .validate()
        .unwrap_err();
        assert_eq!(err.to_string(), "Stock cannot be negative");

        let err = UpdateProductRequest(ProductInput {
            stock: Some(i64::from(u32::MAX)),
            ..ProductInput::default()
        })
        .validate()
        .unwrap_err();
        assert_eq!(err.to_string(), "Stock cannot be more than 2147483647");

        assert!(UpdateProductRequest::default().validate().is_err());
    }

    #[test]
    fn test_rating_validation() {
        let ok = RatingRequest {
            rating: Some(4.0),
            review: Some("  Great value  ".into()),
        }
        .validate(UserId::new(9))
        .unwrap();
        assert_eq!(ok.rating, 4);
        assert_eq!(ok.review.as_deref(), Some("Great value"));

        for rating in [None, Some(0.0), Some(6.0), Some(2.5)] {
            let err = RatingRequest {
                rating,
                review: None,
            }
            .validate(UserId::new(9))
            .unwrap_err();
            assert_eq!(err.to_string(), "Rating must be a number between 1 and 5");
        }

        let short = RatingRequest {
            rating: Some(5.0),
            review: Some("ok".into()),
        }
        .validate(UserId::new(9));
        assert!(short.is_err());
    }

    #[test]
    fn test_average_rating_is_mean() {
        let now = Utc::now();
        let ratings: Vec<Rating> = [5, 4, 3]
            .into_iter()
            .enumerate()
            .map(|(i, r)| Rating {
                user: UserId::new(i32::try_from(i).unwrap()),
                rating: r,
                review: None,
                created_at: now,
            })
            .collect();
        assert!((average_rating(&ratings) - 4.0).abs() < f64::EPSILON);
        assert!(average_rating(&[]).abs() < f64::EPSILON);
    }
}

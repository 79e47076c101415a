//! Orders, their line items, and the order-placement request body.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bazaar_core::{OrderId, OrderStatus, PaymentMethod, Price, ProductId, UserId};

use super::{ProductSummary, ValidationError, non_blank};

/// A placed order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of an order with the unit price captured when it was placed.
///
/// `product` stays set after the product is deleted; `product_info` is
/// resolved at read time and absent in that case.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product: ProductId,
    pub quantity: u32,
    pub price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_info: Option<ProductSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// An order ready to be persisted: stock is already reserved and the total
/// is computed.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user: UserId,
    pub items: Vec<NewOrderItem>,
    pub total_amount: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product: ProductId,
    pub quantity: u32,
    pub price: Price,
}

// =============================================================================
// Request body
// =============================================================================

/// Body of `POST /orders`, before validation.
///
/// `items` and `shippingAddress` stay loosely typed so that a wrong shape
/// produces the same message as a missing value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Option<Value>,
    pub shipping_address: Option<Value>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderItemInput {
    pub product: Option<ProductId>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressInput {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

/// A requested quantity of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product: ProductId,
    pub quantity: u32,
}

/// A well-formed order request. Product existence and stock are checked by
/// the order service.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

impl CreateOrderRequest {
    /// Check the request shape in a fixed order: items, address, payment
    /// method, then each line.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(self) -> Result<OrderDraft, ValidationError> {
        let items = match self.items {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => {
                return Err(ValidationError::new(
                    "Order must include at least one product item.",
                ));
            }
        };

        let shipping_address = match self.shipping_address {
            Some(address @ Value::Object(_)) => {
                serde_json::from_value::<ShippingAddressInput>(address)
                    .map_err(|_| ValidationError::new("Shipping address is invalid or missing."))?
            }
            _ => {
                return Err(ValidationError::new(
                    "Shipping address is invalid or missing.",
                ));
            }
        }
        .validate()?;

        let payment_method = non_blank(self.payment_method)
            .ok_or_else(|| ValidationError::new("Payment method is required."))?
            .parse::<PaymentMethod>()
            .map_err(|_| {
                ValidationError::new(
                    "Payment method must be one of: creditCard, debitCard, or paypal",
                )
            })?;

        let lines = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value::<OrderItemInput>(item)
                    .map_err(|_| {
                        ValidationError::new("Each item must have a valid product ID and quantity.")
                    })?
                    .validate(i)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderDraft {
            lines,
            shipping_address,
            payment_method,
        })
    }
}

impl OrderItemInput {
    fn validate(self, index: usize) -> Result<OrderLine, ValidationError> {
        let (Some(product), Some(quantity)) = (self.product, self.quantity) else {
            return Err(ValidationError::new(
                "Each item must have a valid product ID and quantity.",
            ));
        };
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0 && i32::try_from(*q).is_ok())
            .ok_or_else(|| {
                ValidationError(format!(
                    "Quantity must be greater than 0 for item at index {index}"
                ))
            })?;
        Ok(OrderLine { product, quantity })
    }
}

impl ShippingAddressInput {
    fn validate(self) -> Result<ShippingAddress, ValidationError> {
        let field = |value: Option<String>, name: &str| {
            non_blank(value)
                .ok_or_else(|| ValidationError(format!("Shipping address must contain {name}")))
        };
        Ok(ShippingAddress {
            street: field(self.street, "street")?,
            city: field(self.city, "city")?,
            state: field(self.state, "state")?,
            zip_code: field(self.zip_code, "zipCode")?,
            country: field(self.country, "country")?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: serde_json::Value) -> Result<OrderDraft, ValidationError> {
        serde_json::from_value::<CreateOrderRequest>(body)
            .unwrap()
            .validate()
    }

    fn address() -> serde_json::Value {
        json!({
            "street": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "zipCode": "62701",
            "country": "USA"
        })
    }

    #[test]
    fn test_valid_request() {
        let draft = parse(json!({
            "items": [{"product": 1, "quantity": 2}, {"product": 3, "quantity": 1}],
            "shippingAddress": address(),
            "paymentMethod": "paypal"
        }))
        .unwrap();

        assert_eq!(draft.lines.len(), 2);
        assert_eq!(
            draft.lines[0],
            OrderLine {
                product: ProductId::new(1),
                quantity: 2
            }
        );
        assert_eq!(draft.payment_method, PaymentMethod::Paypal);
        assert_eq!(draft.shipping_address.zip_code, "62701");
    }

    #[test]
    fn test_checks_run_in_order() {
        let err = parse(json!({"items": []})).unwrap_err();
        assert_eq!(err.to_string(), "Order must include at least one product item.");

        let err = parse(json!({"items": [{"product": 1, "quantity": 1}]})).unwrap_err();
        assert_eq!(err.to_string(), "Shipping address is invalid or missing.");

        let err = parse(json!({
            "items": [{"product": 1, "quantity": 1}],
            "shippingAddress": address()
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "Payment method is required.");

        let err = parse(json!({
            "items": [{"product": 1}],
            "shippingAddress": address(),
            "paymentMethod": "creditCard"
        }))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Each item must have a valid product ID and quantity."
        );
    }

    #[test]
    fn test_wrong_shapes_read_as_missing() {
        let err = parse(json!({"items": "laptop"})).unwrap_err();
        assert_eq!(err.to_string(), "Order must include at least one product item.");

        let err = parse(json!({
            "items": [{"product": 1, "quantity": 1}],
            "shippingAddress": "1 Main St"
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "Shipping address is invalid or missing.");

        let err = parse(json!({
            "items": [{"product": "abc", "quantity": 1}],
            "shippingAddress": address(),
            "paymentMethod": "paypal"
        }))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Each item must have a valid product ID and quantity."
        );
    }

    #[test]
    fn test_rejects_incomplete_address() {
        let mut partial = address();
        partial["zipCode"] = json!("  ");
        let err = parse(json!({
            "items": [{"product": 1, "quantity": 1}],
            "shippingAddress": partial,
            "paymentMethod": "creditCard"
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "Shipping address must contain zipCode");
    }

    #[test]
    fn test_rejects_unknown_payment_method() {
        let err = parse(json!({
            "items": [{"product": 1, "quantity": 1}],
            "shippingAddress": address(),
            "paymentMethod": "cash"
        }))
        .unwrap_err();
        assert!(err.to_string().starts_with("Payment method must be one of"));
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        for quantity in [0, -3] {
            let err = parse(json!({
                "items": [{"product": 1, "quantity": 1}, {"product": 2, "quantity": quantity}],
                "shippingAddress": address(),
                "paymentMethod": "debitCard"
            }))
            .unwrap_err();
            assert_eq!(
                err.to_string(),
                "Quantity must be greater than 0 for item at index 1"
            );
        }
    }
}

//! Domain models and request DTOs.
//!
//! Domain types (`User`, `Product`, `Order`) are what the stores return and the
//! handlers serialize. Request DTOs are deserialized from JSON bodies and then
//! validated into typed drafts before any service runs.

pub mod order;
pub mod product;
pub mod user;

use thiserror::Error;

pub use order::{
    CreateOrderRequest, NewOrder, NewOrderItem, Order, OrderDraft, OrderItem, OrderLine,
    ShippingAddress,
};
pub use product::{
    CreateProductsRequest, NewProduct, NewRating, Product, ProductChanges, ProductSummary,
    Rating, RatingOutcome, RatingRequest, StockReservation, StockUpdate, UpdateProductRequest,
};
pub use user::{
    ChangePasswordRequest, CreateUserRequest, ForgotPasswordRequest, LoginRequest, NewUser,
    Principal, ProfileChanges, RegisterRequest, Registration, ResetPasswordRequest, User,
    UserProfile, UserStatusRequest,
};

/// A request body failed validation.
///
/// The message is shown to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Trim a string and reject it when nothing is left.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

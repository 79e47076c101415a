//! Fixed enumerations: user roles, order status, payment methods and
//! product categories.
//!
//! Each enum serializes to the exact string used on the wire and, with the
//! `postgres` feature, maps onto a Postgres enum type in the `shop` schema.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when parsing one of the fixed enums from a string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Authorization role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.user_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular customer.
    #[default]
    User,
    /// Store administrator.
    Admin,
}

string_enum!(Role, "role", { User => "user", Admin => "admin" });

impl Role {
    /// Whether this role grants administrative access.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Lifecycle status of an order.
///
/// The only transition is `Pending -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Cancelled,
}

string_enum!(OrderStatus, "order status", { Pending => "pending", Cancelled => "cancelled" });

impl OrderStatus {
    /// Whether an order in this status may be cancelled.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Accepted payment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.payment_method", rename_all = "camelCase")
)]
#[serde(rename_all = "camelCase")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
}

string_enum!(PaymentMethod, "payment method", {
    CreditCard => "creditCard",
    DebitCard => "debitCard",
    Paypal => "paypal",
});

/// Product catalog category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.product_category", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Clothing,
    Books,
    Home,
    Other,
    Accessories,
    Storage,
    Furniture,
}

string_enum!(Category, "category", {
    Electronics => "electronics",
    Clothing => "clothing",
    Books => "books",
    Home => "home",
    Other => "other",
    Accessories => "accessories",
    Storage => "storage",
    Furniture => "furniture",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_wire_format() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CreditCard).unwrap(),
            "\"creditCard\""
        );
        assert_eq!(
            "debitCard".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::DebitCard
        );
        assert!("cash".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_serde_and_as_str_agree() {
        for category in Category::ALL {
            let json = serde_json::to_string(category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
        for method in PaymentMethod::ALL {
            let json = serde_json::to_string(method).unwrap();
            assert_eq!(json, format!("\"{method}\""));
        }
    }

    #[test]
    fn test_only_pending_is_cancellable() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(!OrderStatus::Cancelled.is_cancellable());
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        let err = "root".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "invalid role: root");
        assert!(!Role::default().is_admin());
    }
}

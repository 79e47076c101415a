//! User domain types and auth request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use bazaar_core::{Email, Role, UserId};

use super::{ValidationError, non_blank};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 50;

/// A registered user.
///
/// The password hash is never part of this type; stores hand it out
/// separately so it cannot be serialized by accident.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The identity attached to requests made by this user.
    #[must_use]
    pub const fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            role: self.role,
        }
    }

    /// Compact representation returned alongside tokens.
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// `{id, name, email, role}` as returned by the auth endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
}

/// The authenticated identity of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Owners and admins may act on a resource.
    #[must_use]
    pub fn can_access(&self, owner: UserId) -> bool {
        self.id == owner || self.is_admin()
    }
}

/// A user about to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub role: Role,
}

/// Fields a profile update may change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub role: Option<Role>,
}

impl ProfileChanges {
    const ALLOWED: [&'static str; 2] = ["name", "role"];
    const PROTECTED: [&'static str; 2] = ["email", "password"];

    /// Validate a raw profile-update body.
    ///
    /// Protected fields are reported before unknown ones so that clients get
    /// the more specific message.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for protected or unknown keys, an empty body,
    /// or invalid values.
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, ValidationError> {
        if body.keys().any(|k| Self::PROTECTED.contains(&k.as_str())) {
            return Err(ValidationError::new("Cannot update protected fields"));
        }

        let invalid: Vec<&str> = body
            .keys()
            .map(String::as_str)
            .filter(|k| !Self::ALLOWED.contains(k))
            .collect();
        if !invalid.is_empty() {
            return Err(ValidationError(format!(
                "Invalid field(s): {}",
                invalid.join(", ")
            )));
        }

        let name = match body.get("name") {
            None => None,
            Some(Value::String(name)) => Some(validate_name(name)?),
            Some(_) => return Err(ValidationError::new("Name must be a string")),
        };
        let role = match body.get("role") {
            None => None,
            Some(Value::String(role)) => Some(parse_role(role)?),
            Some(_) => return Err(ValidationError::new(ROLE_MESSAGE)),
        };

        if name.is_none() && role.is_none() {
            return Err(ValidationError::new(
                "Please provide at least one field to update",
            ));
        }

        Ok(Self { name, role })
    }
}

const ROLE_MESSAGE: &str = "Role must be either 'user' or 'admin'";

fn parse_role(role: &str) -> Result<Role, ValidationError> {
    role.parse().map_err(|_| ValidationError::new(ROLE_MESSAGE))
}

/// Trim a display name and check its length.
///
/// # Errors
///
/// Returns `ValidationError` if the trimmed name is not 2 to 50 characters.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(ValidationError(format!(
            "Name must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"
        )));
    }
    Ok(name.to_owned())
}

/// Body of `POST /auth/register` and `POST /users`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
    pub role: Option<String>,
}

/// Admin-side user creation takes the same shape as registration.
pub type CreateUserRequest = RegisterRequest;

/// A registration that passed shape validation.
///
/// The password still has to pass the strength policy.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: Email,
    pub password: String,
    pub role: Role,
}

impl RegisterRequest {
    /// # Errors
    ///
    /// Returns `ValidationError` for missing fields, mismatched passwords, an
    /// invalid name, email, or role.
    pub fn validate(self) -> Result<Registration, ValidationError> {
        let (Some(name), Some(email), Some(password), Some(confirm)) = (
            non_blank(self.name),
            non_blank(self.email),
            self.password.filter(|p| !p.is_empty()),
            self.password_confirm.filter(|p| !p.is_empty()),
        ) else {
            return Err(ValidationError::new("All fields are required"));
        };

        if password != confirm {
            return Err(ValidationError::new("Passwords do not match"));
        }

        let name = validate_name(&name)?;
        let email =
            Email::parse(&email).map_err(|_| ValidationError::new("Please enter a valid email"))?;
        let role = match non_blank(self.role) {
            Some(role) => parse_role(&role)?,
            None => Role::default(),
        };

        Ok(Registration {
            name,
            email,
            password,
            role,
        })
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of `POST /auth/forgot-password`.
#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// Body of `PUT /auth/reset-password/{token}`.
#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
}

/// Body of `PUT /users/password`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub new_password_confirm: Option<String>,
}

/// Body of `PUT /users/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct UserStatusRequest {
    pub active: bool,
}

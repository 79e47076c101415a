//! Authentication service.
//!
//! Provides password registration and login, bearer-token sessions with
//! revocation, and password reset and change.

mod error;
mod password;
pub mod token;

pub use error::AuthError;
pub use password::{hash_password, validate_password, verify_password};
pub use token::{Claims, IssuedToken, TokenError, TokenIssuer};

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use bazaar_core::Email;

use crate::db::{RepositoryError, RevocationStore, Storage, UserStore};
use crate::models::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, NewUser, RegisterRequest,
    Registration, ResetPasswordRequest, User, ValidationError,
};

/// Length of a password-reset token before hex encoding.
const RESET_TOKEN_BYTES: usize = 20;

/// A user together with a token for them.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// Authentication service.
///
/// Handles user registration, login, token verification and revocation, and
/// password recovery.
pub struct AuthService<'a> {
    users: &'a dyn UserStore,
    revocations: &'a dyn RevocationStore,
    tokens: &'a TokenIssuer,
    reset_token_ttl: TimeDelta,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(storage: &'a Storage, tokens: &'a TokenIssuer, reset_token_ttl: Duration) -> Self {
        Self {
            users: storage.users.as_ref(),
            revocations: storage.revocations.as_ref(),
            tokens,
            reset_token_ttl: TimeDelta::from_std(reset_token_ttl)
                .unwrap_or_else(|_| TimeDelta::minutes(10)),
        }
    }

    // =========================================================================
    // Registration and login
    // =========================================================================

    /// Register a new account and start a session for it.
    ///
    /// Self-registration always yields a regular user; asking for the admin
    /// role is refused.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a malformed body,
    /// `AuthError::Forbidden` when the admin role is requested,
    /// `AuthError::WeakPassword` or `AuthError::UserAlreadyExists`.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, AuthError> {
        let registration = request.validate()?;
        if registration.role.is_admin() {
            return Err(AuthError::Forbidden(
                "Only an admin can create admin accounts".to_owned(),
            ));
        }

        let user = self.create_user(registration).await?;
        tracing::info!(user_id = %user.id, "User registered");
        self.start_session(user)
    }

    /// Create an account with the requested role.
    ///
    /// Callers decide whether the role is allowed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` or `AuthError::UserAlreadyExists`.
    pub async fn create_user(&self, registration: Registration) -> Result<User, AuthError> {
        validate_password(&registration.password)?;

        if self
            .users
            .get_by_email(&registration.email)
            .await?
            .is_some()
        {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(&registration.password)?;
        self.users
            .create(NewUser {
                name: registration.name,
                email: registration.email,
                password_hash,
                role: registration.role,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// and `AuthError::AccountDisabled` for deactivated accounts.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, AuthError> {
        let (Some(email), Some(password)) = (request.email, request.password) else {
            return Err(ValidationError::new("Please provide email and password").into());
        };

        let email = Email::parse(&email).map_err(|_| AuthError::InvalidCredentials)?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let password_hash = self
            .users
            .get_password_hash(user.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&password, &password_hash)?;

        if !user.active {
            return Err(AuthError::AccountDisabled);
        }

        tracing::info!(user_id = %user.id, "User logged in");
        self.start_session(user)
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Issue a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the token cannot be signed.
    pub fn start_session(&self, user: User) -> Result<AuthSession, AuthError> {
        let issued = self
            .tokens
            .issue(user.id, user.role)
            .map_err(AuthError::Signing)?;
        Ok(AuthSession {
            user,
            token: issued.token,
        })
    }

    /// Resolve a bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken`, `TokenRevoked`,
    /// `TokenUserNotFound` or `AccountDisabled`.
    pub async fn authenticate(&self, token: &str) -> Result<(User, Claims), AuthError> {
        let claims = self.tokens.verify(token)?;

        if self.revocations.is_revoked(claims.jti).await? {
            return Err(AuthError::TokenRevoked);
        }

        let user = self
            .users
            .get_by_id(claims.sub)
            .await?
            .ok_or(AuthError::TokenUserNotFound)?;
        if !user.active {
            return Err(AuthError::AccountDisabled);
        }

        Ok((user, claims))
    }

    /// Revoke the token with these claims until it would have expired anyway.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the revocation cannot be stored.
    pub async fn logout(&self, claims: &Claims) -> Result<(), AuthError> {
        self.revocations
            .revoke(claims.jti, claims.expires_at())
            .await?;
        tracing::info!(user_id = %claims.sub, jti = %claims.jti, "Token revoked");
        Ok(())
    }

    // =========================================================================
    // Passwords
    // =========================================================================

    /// Generate a password-reset token for the account with this email.
    ///
    /// Only the SHA-256 of the token is stored. The raw token is returned so
    /// that it can be delivered to the user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` for an unknown email.
    pub async fn forgot_password(
        &self,
        request: ForgotPasswordRequest,
    ) -> Result<String, AuthError> {
        let email = request
            .email
            .ok_or_else(|| ValidationError::new("Please provide an email"))?;
        let email = Email::parse(&email).map_err(|_| AuthError::UserNotFound(None))?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound(None))?;

        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let raw_token = hex::encode(bytes);

        let expires_at = Utc::now() + self.reset_token_ttl;
        self.users
            .set_reset_token(user.id, &hash_reset_token(&raw_token), expires_at)
            .await?;

        // Delivery is out of band; the token only appears in debug logs.
        tracing::debug!(user_id = %user.id, reset_token = %raw_token, %expires_at, "Password reset token issued");
        Ok(raw_token)
    }

    /// Set a new password using a reset token and start a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` if no unexpired token matches,
    /// or `AuthError::WeakPassword`.
    pub async fn reset_password(
        &self,
        raw_token: &str,
        request: ResetPasswordRequest,
    ) -> Result<AuthSession, AuthError> {
        let password = request
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ValidationError::new("Please provide a new password"))?;
        validate_password(&password)?;

        let password_hash = hash_password(&password)?;
        let user = self
            .users
            .redeem_reset_token(&hash_reset_token(raw_token), Utc::now(), &password_hash)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        tracing::info!(user_id = %user.id, "Password reset");
        self.start_session(user)
    }

    /// Change the password of `user` after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IncorrectPassword`, `AuthError::Validation` for
    /// mismatched new passwords, or `AuthError::WeakPassword`.
    pub async fn change_password(
        &self,
        user: &User,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let (Some(current), Some(new), Some(confirm)) = (
            request.current_password,
            request.new_password,
            request.new_password_confirm,
        ) else {
            return Err(ValidationError::new(
                "Please provide currentPassword, newPassword and newPasswordConfirm",
            )
            .into());
        };

        let password_hash = self
            .users
            .get_password_hash(user.id)
            .await?
            .ok_or(AuthError::UserNotFound(Some(user.id)))?;
        verify_password(&current, &password_hash).map_err(|_| AuthError::IncorrectPassword)?;

        if new != confirm {
            return Err(ValidationError::new("Passwords do not match").into());
        }
        validate_password(&new)?;

        let new_hash = hash_password(&new)?;
        self.users.set_password_hash(user.id, &new_hash).await?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }
}

fn hash_reset_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bazaar_core::Role;
    use secrecy::SecretString;

    struct Fixture {
        storage: Storage,
        tokens: TokenIssuer,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                storage: Storage::memory(Duration::from_secs(3600)),
                tokens: TokenIssuer::new(
                    SecretString::from("unit-test-key-Hq7#Zr2!Lp9$Wm4@Xc6%"),
                    Duration::from_secs(3600),
                ),
            }
        }

        fn service(&self) -> AuthService<'_> {
            AuthService::new(&self.storage, &self.tokens, Duration::from_secs(600))
        }
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some("Grace Hopper".into()),
            email: Some(email.into()),
            password: Some("Passw0rd!".into()),
            password_confirm: Some("Passw0rd!".into()),
            role: None,
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[tokio::test]
    async fn test_register_login_and_authenticate() {
        let fixture = Fixture::new();
        let auth = fixture.service();

        let session = auth.register(register_request("Grace@Example.com")).await.unwrap();
        assert_eq!(session.user.email.as_str(), "grace@example.com");
        assert_eq!(session.user.role, Role::User);

        let (user, _) = auth.authenticate(&session.token).await.unwrap();
        assert_eq!(user.id, session.user.id);

        let login = auth
            .login(login_request("grace@example.com", "Passw0rd!"))
            .await
            .unwrap();
        assert_eq!(login.user.id, session.user.id);

        let err = auth
            .login(login_request("grace@example.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_admin_role() {
        let fixture = Fixture::new();
        let auth = fixture.service();

        auth.register(register_request("a@example.com")).await.unwrap();
        let err = auth
            .register(register_request("A@EXAMPLE.COM"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));

        let mut admin = register_request("b@example.com");
        admin.role = Some("admin".into());
        assert!(matches!(
            auth.register(admin).await.unwrap_err(),
            AuthError::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_only_that_token() {
        let fixture = Fixture::new();
        let auth = fixture.service();

        let first = auth.register(register_request("c@example.com")).await.unwrap();
        let second = auth.start_session(first.user.clone()).unwrap();

        let (_, claims) = auth.authenticate(&first.token).await.unwrap();
        auth.logout(&claims).await.unwrap();

        assert!(matches!(
            auth.authenticate(&first.token).await.unwrap_err(),
            AuthError::TokenRevoked
        ));
        assert!(auth.authenticate(&second.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_deactivated_user_is_rejected() {
        let fixture = Fixture::new();
        let auth = fixture.service();
        let session = auth.register(register_request("d@example.com")).await.unwrap();

        fixture
            .storage
            .users
            .set_active(session.user.id, false)
            .await
            .unwrap();

        assert!(matches!(
            auth.authenticate(&session.token).await.unwrap_err(),
            AuthError::AccountDisabled
        ));
        assert!(matches!(
            auth.login(login_request("d@example.com", "Passw0rd!"))
                .await
                .unwrap_err(),
            AuthError::AccountDisabled
        ));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let fixture = Fixture::new();
        let auth = fixture.service();
        auth.register(register_request("e@example.com")).await.unwrap();

        let token = auth
            .forgot_password(ForgotPasswordRequest {
                email: Some("e@example.com".into()),
            })
            .await
            .unwrap();

        let reset = |password: &str| ResetPasswordRequest {
            password: Some(password.into()),
        };
        let session = auth.reset_password(&token, reset("N3w-Passw0rd")).await.unwrap();
        assert_eq!(session.user.email.as_str(), "e@example.com");

        // A token works once.
        assert!(matches!(
            auth.reset_password(&token, reset("An0ther-one")).await.unwrap_err(),
            AuthError::InvalidResetToken
        ));

        auth.login(login_request("e@example.com", "N3w-Passw0rd"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_change_password_checks_current() {
        let fixture = Fixture::new();
        let auth = fixture.service();
        let session = auth.register(register_request("f@example.com")).await.unwrap();

        let change = |current: &str| ChangePasswordRequest {
            current_password: Some(current.into()),
            new_password: Some("Different1!".into()),
            new_password_confirm: Some("Different1!".into()),
        };

        assert!(matches!(
            auth.change_password(&session.user, change("nope"))
                .await
                .unwrap_err(),
            AuthError::IncorrectPassword
        ));
        auth.change_password(&session.user, change("Passw0rd!"))
            .await
            .unwrap();
        auth.login(login_request("f@example.com", "Different1!"))
            .await
            .unwrap();
    }
}

//! Password policy and Argon2id hashing.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::AuthError;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Validate password meets requirements.
///
/// At least 8 characters with a lowercase letter, an uppercase letter, a
/// digit and a character that is none of those.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }

    let has_lower = password.chars().any(char::is_lowercase);
    let has_upper = password.chars().any(char::is_uppercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if !(has_lower && has_upper && has_digit && has_special) {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one uppercase letter, one lowercase letter, \
             one number and one special character"
                .to_owned(),
        ));
    }

    Ok(())
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_policy() {
        assert!(validate_password("Passw0rd!").is_ok());

        for weak in ["Pa0!", "password1!", "PASSWORD1!", "Password!!", "Password11"] {
            assert!(
                matches!(validate_password(weak), Err(AuthError::WeakPassword(_))),
                "{weak} should be rejected"
            );
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Passw0rd!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Passw0rd!", &hash).is_ok());
        assert!(matches!(
            verify_password("Passw0rd?", &hash),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(verify_password("Passw0rd!", "not-a-hash").is_err());
    }
}

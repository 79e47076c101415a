//! Signed bearer tokens.
//!
//! A token is `base64url(claims_json) "." base64url(hmac_sha256(payload))`,
//! both parts unpadded. Tokens carry a random `jti` so that a single token can
//! be revoked without affecting the user's other sessions.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use bazaar_core::{Role, UserId};

type HmacSha256 = Hmac<Sha256>;

/// Lifetime used when the configured one does not fit a `TimeDelta`.
const FALLBACK_TTL_DAYS: i64 = 30;

/// Reasons a token can be rejected.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("invalid signing key: {0}")]
    Key(String),

    #[error("failed to encode claims: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User the token was issued to.
    pub sub: UserId,
    /// Role at issue time. Authorization uses the stored role, not this one.
    pub role: Role,
    /// Unique token id, the revocation key.
    pub jti: Uuid,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expires at, Unix seconds.
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// A freshly signed token with its claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Issues and verifies tokens with one HMAC key.
pub struct TokenIssuer {
    secret: SecretString,
    ttl: TimeDelta,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: SecretString, ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::days(FALLBACK_TTL_DAYS));
        Self { secret, ttl }
    }

    /// Sign a new token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the claims cannot be encoded or the key is
    /// rejected.
    pub fn issue(&self, user: UserId, role: Role) -> Result<IssuedToken, TokenError> {
        self.issue_at(user, role, Utc::now())
    }

    fn issue_at(
        &self,
        user: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let claims = Claims {
            sub: user,
            role,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(IssuedToken {
            token: format!("{payload}.{signature}"),
            claims,
        })
    }

    /// Check a token's signature and expiry and return its claims.
    ///
    /// Revocation is checked by the caller.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Malformed`, `BadSignature` or `Expired`.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        // verify_slice compares in constant time
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| TokenError::Key(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(SecretString::from(secret), Duration::from_secs(3600))
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = issuer("k3y-for-tests-9fQ2@xL7#mP4!vR8$wZ1");
        let issued = tokens.issue(UserId::new(7), Role::Admin).unwrap();
        let claims = tokens.verify(&issued.token).unwrap();

        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sub, UserId::new(7));
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_each_token_has_its_own_id() {
        let tokens = issuer("k3y-for-tests-9fQ2@xL7#mP4!vR8$wZ1");
        let a = tokens.issue(UserId::new(1), Role::User).unwrap();
        let b = tokens.issue(UserId::new(1), Role::User).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_rejects_other_key() {
        let issued = issuer("first-key-Qw8#Lm2!Zx6$Rt4@Vb9%Np3^")
            .issue(UserId::new(1), Role::User)
            .unwrap();
        let err = issuer("second-key-Hk5&Jd1*Fs7(Ga3)Wq0+Ey2=")
            .verify(&issued.token)
            .unwrap_err();
        assert!(matches!(err, TokenError::BadSignature));
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let tokens = issuer("k3y-for-tests-9fQ2@xL7#mP4!vR8$wZ1");
        let issued = tokens.issue(UserId::new(1), Role::User).unwrap();
        let (_, signature) = issued.token.split_once('.').unwrap();

        let mut forged = issued.claims.clone();
        forged.role = Role::Admin;
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());

        let err = tokens.verify(&format!("{payload}.{signature}")).unwrap_err();
        assert!(matches!(err, TokenError::BadSignature));
    }

    #[test]
    fn test_rejects_expired_and_malformed() {
        let tokens = issuer("k3y-for-tests-9fQ2@xL7#mP4!vR8$wZ1");
        let past = Utc::now() - TimeDelta::hours(2);
        let issued = tokens.issue_at(UserId::new(1), Role::User, past).unwrap();
        assert!(matches!(
            tokens.verify(&issued.token).unwrap_err(),
            TokenError::Expired
        ));

        for token in ["", "no-dot", "a.b.c", "!!!.???"] {
            assert!(tokens.verify(token).is_err());
        }
    }
}

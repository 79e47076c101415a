//! Account email addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a string was rejected as an account email.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,

    #[error("email must be at most {} characters", Email::MAX_LEN)]
    TooLong,

    #[error("email must look like name@domain.tld")]
    Malformed,
}

/// A normalized account email: trimmed and ASCII lower-cased, so that login
/// and registration compare addresses case-insensitively.
///
/// ```
/// use bazaar_core::Email;
///
/// let email = Email::parse(" Grace@Example.COM ").unwrap();
/// assert_eq!(email.as_str(), "grace@example.com");
/// assert!(Email::parse("grace@localhost").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    const MAX_LEN: usize = 254;

    /// Accepts `local@domain` where the local part is non-empty, the domain
    /// has at least two non-empty dot-separated labels, and nothing contains
    /// whitespace.
    ///
    /// # Errors
    ///
    /// Returns the first rule the trimmed input breaks.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(EmailError::TooLong);
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::Malformed)?;
        let domain_ok = domain.contains('.') && domain.split('.').all(|label| !label.is_empty());
        if local.is_empty()
            || !domain_ok
            || domain.contains('@')
            || s.chars().any(char::is_whitespace)
        {
            return Err(EmailError::Malformed);
        }

        Ok(Self(s.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_addresses() {
        for ok in [
            "grace@example.com",
            "grace.hopper+orders@mail.example.co.uk",
            "a@b.c",
        ] {
            assert!(Email::parse(ok).is_ok(), "{ok}");
        }
    }

    #[test]
    fn test_normalizes_before_comparing() {
        let email = Email::parse("\tGrace@Example.COM\n").unwrap();
        assert_eq!(email.to_string(), "grace@example.com");
        assert_eq!(email, "grace@example.com".parse::<Email>().unwrap());
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        for bad in [
            "grace",
            "@example.com",
            "grace@",
            "grace@localhost",
            "grace@example.",
            "grace@.com",
            "grace@@example.com",
            "grace@shop@example.com",
            "grace hopper@example.com",
        ] {
            assert_eq!(Email::parse(bad), Err(EmailError::Malformed), "{bad}");
        }
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));

        let long = format!("{}@example.com", "g".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let email = Email::parse("grace@example.com").unwrap();
        assert_eq!(
            serde_json::to_value(&email).unwrap(),
            serde_json::json!("grace@example.com")
        );
    }
}

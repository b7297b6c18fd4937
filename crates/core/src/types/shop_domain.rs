//! Normalized Shopify shop domains.

use core::fmt;

use serde::{Deserialize, Serialize};

const MYSHOPIFY_SUFFIX: &str = ".myshopify.com";

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopDomainError {
    /// Nothing left after stripping scheme and slashes.
    #[error("shop domain cannot be empty")]
    Empty,
    /// The domain is neither a bare handle nor `<handle>.myshopify.com`.
    #[error("shop domain must be a shop handle or <handle>.myshopify.com")]
    NotMyshopify,
    /// The handle contains characters outside `[a-z0-9-]` or starts/ends with `-`.
    #[error("shop handle '{0}' is invalid")]
    InvalidHandle(String),
}

/// A `<handle>.myshopify.com` domain.
///
/// Store records are entered by hand, so the parser accepts a handful of
/// common spellings and always yields the canonical form the Admin API
/// expects.
///
/// ```
/// use stockmirror_core::ShopDomain;
///
/// let d = ShopDomain::parse("https://Acme-Goods.myshopify.com/").unwrap();
/// assert_eq!(d.as_str(), "acme-goods.myshopify.com");
/// assert_eq!(ShopDomain::parse("acme-goods").unwrap(), d);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Parse and normalize a shop domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty, points at a non-myshopify
    /// host, or the shop handle is malformed.
    pub fn parse(s: &str) -> Result<Self, ShopDomainError> {
        let lower = s.trim().to_lowercase();
        let without_scheme = lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"))
            .unwrap_or(&lower);
        let host = without_scheme.trim_end_matches('/');
        if host.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        let handle = match host.strip_suffix(MYSHOPIFY_SUFFIX) {
            Some(handle) => handle,
            None if host.contains('.') => return Err(ShopDomainError::NotMyshopify),
            None => host,
        };

        let valid = !handle.is_empty()
            && !handle.starts_with('-')
            && !handle.ends_with('-')
            && handle
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(ShopDomainError::InvalidHandle(handle.to_owned()));
        }

        Ok(Self(format!("{handle}{MYSHOPIFY_SUFFIX}")))
    }

    /// The full `<handle>.myshopify.com` domain.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The shop handle without the `.myshopify.com` suffix.
    #[must_use]
    pub fn handle(&self) -> &str {
        self.0.strip_suffix(MYSHOPIFY_SUFFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ShopDomain {
    type Error = ShopDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShopDomain> for String {
    fn from(domain: ShopDomain) -> Self {
        domain.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants_normalize() {
        for input in [
            "acme",
            "ACME",
            "acme.myshopify.com",
            "http://acme.myshopify.com",
            "https://acme.myshopify.com//",
            "  acme.MyShopify.com ",
        ] {
            assert_eq!(
                ShopDomain::parse(input).unwrap().as_str(),
                "acme.myshopify.com",
                "input: {input:?}"
            );
        }
    }

    #[test]
    fn test_handle() {
        let d = ShopDomain::parse("north-shop-2").unwrap();
        assert_eq!(d.handle(), "north-shop-2");
    }

    #[test]
    fn test_rejects_custom_domains() {
        assert_eq!(
            ShopDomain::parse("shop.example.com"),
            Err(ShopDomainError::NotMyshopify)
        );
    }

    #[test]
    fn test_rejects_bad_handles() {
        assert_eq!(ShopDomain::parse("https://"), Err(ShopDomainError::Empty));
        assert!(matches!(
            ShopDomain::parse("-acme"),
            Err(ShopDomainError::InvalidHandle(_))
        ));
        assert!(matches!(
            ShopDomain::parse("ac_me.myshopify.com"),
            Err(ShopDomainError::InvalidHandle(_))
        ));
        assert!(matches!(
            ShopDomain::parse(".myshopify.com"),
            Err(ShopDomainError::InvalidHandle(_))
        ));
    }
}

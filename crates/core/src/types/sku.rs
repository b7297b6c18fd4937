//! Stock Keeping Unit identifiers.
//!
//! The SKU is the only key shared between the local catalog and Shopify.
//! Shopify does not enforce SKU casing, so every comparison is
//! case-insensitive on the trimmed value.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Sku`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SkuError {
    /// The SKU is empty after trimming.
    #[error("sku cannot be empty")]
    Empty,
    /// The SKU is longer than [`Sku::MAX_LENGTH`].
    #[error("sku must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The SKU contains whitespace or a control character.
    #[error("sku cannot contain whitespace or control characters")]
    InvalidCharacter,
}

/// A validated SKU.
///
/// The original casing is preserved for display and for writing to the
/// database; [`Sku::key`] gives the lowercase form used for lookups.
///
/// ```
/// use stockmirror_core::Sku;
///
/// let sku = Sku::parse(" TEE-BLK-M ").unwrap();
/// assert_eq!(sku.as_str(), "TEE-BLK-M");
/// assert!(sku.matches("tee-blk-m"));
/// assert!(!sku.matches("TEE-BLK-L"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    /// Maximum SKU length accepted.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a SKU, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, too long, or contains
    /// inner whitespace or control characters.
    pub fn parse(s: &str) -> Result<Self, SkuError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SkuError::Empty);
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(SkuError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(SkuError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the SKU as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase lookup key.
    #[must_use]
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Whether a raw SKU (e.g. from a Shopify variant) refers to this SKU.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.key() == other.trim().to_lowercase()
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self {
        sku.0
    }
}

impl AsRef<str> for Sku {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_trims_and_preserves_case() {
        let sku = Sku::parse("\tAbc-123\n").unwrap();
        assert_eq!(sku.as_str(), "Abc-123");
        assert_eq!(sku.key(), "abc-123");
    }

    #[test]
    fn test_sku_matches_case_insensitively() {
        let sku = Sku::parse("MUG-01").unwrap();
        assert!(sku.matches("mug-01"));
        assert!(sku.matches("  Mug-01 "));
        assert!(!sku.matches("MUG-011"));
        assert!(!sku.matches(""));
    }

    #[test]
    fn test_sku_matches_non_ascii() {
        let sku = Sku::parse("ÄPFEL-1").unwrap();
        assert!(sku.matches("äpfel-1"));
    }

    #[test]
    fn test_sku_rejects_invalid() {
        assert_eq!(Sku::parse("   "), Err(SkuError::Empty));
        assert_eq!(Sku::parse("A B"), Err(SkuError::InvalidCharacter));
        assert!(matches!(
            Sku::parse(&"X".repeat(65)),
            Err(SkuError::TooLong { max: 64 })
        ));
    }

    #[test]
    fn test_sku_deserialize_validates() {
        let sku: Sku = serde_json::from_str("\" SKU-9 \"").unwrap();
        assert_eq!(sku.as_str(), "SKU-9");
        assert!(serde_json::from_str::<Sku>("\"\"").is_err());
    }
}

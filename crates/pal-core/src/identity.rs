//! # Identifier Newtypes
//!
//! Validated wrappers for product identifiers, batch numbers, and actor
//! identities. You cannot pass a `BatchNumber` where a `ProductId` is
//! expected, and none of them can be constructed empty.
//!
//! Deserialization goes through the same validating constructor, so a
//! tampered snapshot cannot smuggle in an empty or oversized identifier.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum length of a product identifier (store primary key width).
pub const PRODUCT_ID_MAX_LEN: usize = 128;

/// Maximum length of a batch number (store column width).
pub const BATCH_NUMBER_MAX_LEN: usize = 64;

/// Maximum length of an actor identity.
pub const IDENTITY_MAX_LEN: usize = 128;

/// Opaque, immutable product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

/// Manufacturing batch number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchNumber(String);

/// Identity of an actor on the ledger (an account address or principal name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl ProductId {
    /// Validate and wrap a product identifier.
    ///
    /// Leading/trailing whitespace is significant: `" P1"` and `"P1"` are
    /// different products. Only all-whitespace input is rejected as empty.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        require_non_blank("product_id", &s)?;
        require_max_len("product_id", &s, PRODUCT_ID_MAX_LEN)?;
        reject_control("product_id", &s)?;
        Ok(Self(s))
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl BatchNumber {
    /// Validate and wrap a batch number.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        require_non_blank("batch_number", &s)?;
        require_max_len("batch_number", &s, BATCH_NUMBER_MAX_LEN)?;
        reject_control("batch_number", &s)?;
        Ok(Self(s))
    }

    /// Borrow the batch number.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Identity {
    /// Validate and wrap an actor identity.
    ///
    /// Identities may not contain whitespace; they are compared exactly.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "identity" });
        }
        require_max_len("identity", &s, IDENTITY_MAX_LEN)?;
        if let Some(found) = s.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::ForbiddenCharacter {
                field: "identity",
                found,
            });
        }
        Ok(Self(s))
    }

    /// Borrow the identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn require_non_blank(field: &'static str, s: &str) -> Result<(), ValidationError> {
    if s.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

fn require_max_len(field: &'static str, s: &str, max: usize) -> Result<(), ValidationError> {
    let actual = s.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

fn reject_control(field: &'static str, s: &str) -> Result<(), ValidationError> {
    match s.chars().find(|c| c.is_control()) {
        Some(found) => Err(ValidationError::ForbiddenCharacter { field, found }),
        None => Ok(()),
    }
}

macro_rules! string_newtype_impls {
    ($ty:ident) => {
        impl TryFrom<String> for $ty {
            type Error = ValidationError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$ty> for String {
            fn from(v: $ty) -> String {
                v.0
            }
        }

        impl std::str::FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_newtype_impls!(ProductId);
string_newtype_impls!(BatchNumber);
string_newtype_impls!(Identity);

//! # Product Fingerprint Codec
//!
//! `fingerprint()` binds a product's identity fields together:
//!
//! ```text
//! fingerprint = "0x" || hex(SHA-256(from_fields([
//!     Text(product_id), Text(product_type), Text(batch_number),
//!     Instant(manufactured_at), Instant(expires_at),
//! ])))
//! ```
//!
//! The function is pure and total. Field order is fixed; changing any value,
//! swapping two values, or changing an instant by one second changes the
//! output.
//!
//! The rendered form is exactly 66 characters (`0x` + 64 lowercase hex),
//! which is the width of the store's fingerprint column. Comparison between a
//! ledger fingerprint and a recomputed one is byte-exact on this string.

use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalBytes, CanonicalField};
use crate::digest::{sha256_digest, ContentDigest};
use crate::error::ValidationError;
use crate::temporal::Timestamp;

/// Prefix of the rendered fingerprint.
pub const FINGERPRINT_PREFIX: &str = "0x";

/// Rendered fingerprint width in characters.
pub const FINGERPRINT_LEN: usize = 66;

/// The ordered tuple that a fingerprint commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductFields<'a> {
    /// Product identifier.
    pub product_id: &'a str,
    /// Product type (e.g. "Aspirin").
    pub product_type: &'a str,
    /// Manufacturing batch number.
    pub batch_number: &'a str,
    /// Manufacturing instant.
    pub manufactured_at: Timestamp,
    /// Expiry instant.
    pub expires_at: Timestamp,
}

impl ProductFields<'_> {
    /// Canonical encoding of the tuple, in fixed field order.
    pub fn canonical_bytes(&self) -> CanonicalBytes {
        CanonicalBytes::from_fields(&[
            CanonicalField::Text(self.product_id),
            CanonicalField::Text(self.product_type),
            CanonicalField::Text(self.batch_number),
            CanonicalField::Instant(self.manufactured_at),
            CanonicalField::Instant(self.expires_at),
        ])
    }
}

/// A rendered product fingerprint: `0x` followed by 64 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Render a SHA-256 digest as a fingerprint.
    pub fn from_digest(digest: &ContentDigest) -> Self {
        Self(format!("{FINGERPRINT_PREFIX}{}", digest.to_hex()))
    }

    /// Parse a stored fingerprint, validating width, prefix and alphabet.
    ///
    /// Uppercase hex is rejected rather than normalized: the ledger and the
    /// verifier compare rendered strings byte-for-byte.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty {
                field: "fingerprint",
            });
        }
        if s.len() != FINGERPRINT_LEN {
            return Err(ValidationError::Malformed {
                field: "fingerprint",
                reason: format!("expected {FINGERPRINT_LEN} characters, got {}", s.len()),
            });
        }
        let Some(hex) = s.strip_prefix(FINGERPRINT_PREFIX) else {
            return Err(ValidationError::Malformed {
                field: "fingerprint",
                reason: format!("missing {FINGERPRINT_PREFIX:?} prefix"),
            });
        };
        if let Some(found) = hex
            .chars()
            .find(|c| !matches!(c, '0'..='9' | 'a'..='f'))
        {
            return Err(ValidationError::ForbiddenCharacter {
                field: "fingerprint",
                found,
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Borrow the rendered fingerprint.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Fingerprint> for String {
    fn from(f: Fingerprint) -> String {
        f.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of a product tuple.
pub fn fingerprint(fields: &ProductFields<'_>) -> Fingerprint {
    Fingerprint::from_digest(&sha256_digest(&fields.canonical_bytes()))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn instant() -> impl Strategy<Value = Timestamp> {
        (0i64..4_102_444_800).prop_map(|s| Timestamp::from_epoch_secs(s).unwrap())
    }

    proptest! {
        #[test]
        fn deterministic_over_arbitrary_inputs(
            id in "[A-Za-z0-9-]{1,32}",
            ty in ".{1,32}",
            batch in "[A-Z0-9]{1,16}",
            m in instant(),
            e in instant(),
        ) {
            let f = ProductFields {
                product_id: &id, product_type: &ty, batch_number: &batch,
                manufactured_at: m, expires_at: e,
            };
            prop_assert_eq!(fingerprint(&f), fingerprint(&f));
        }

        #[test]
        fn split_point_is_significant(s in "[a-z]{2,16}", cut in 1usize..16) {
            let cut = cut.min(s.len() - 1);
            let (left, right) = s.split_at(cut);
            let t = Timestamp::from_epoch_secs(0).unwrap();
            let a = ProductFields {
                product_id: left, product_type: right, batch_number: "B",
                manufactured_at: t, expires_at: t,
            };
            let b = ProductFields {
                product_id: &s, product_type: "", batch_number: "B",
                manufactured_at: t, expires_at: t,
            };
            prop_assert_ne!(fingerprint(&a), fingerprint(&b));
        }
    }
}

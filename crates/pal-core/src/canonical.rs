//! # Canonical Encoding — The Only Path Into a Digest
//!
//! This module defines `CanonicalBytes`, the sole construction path for bytes
//! used in digest computation across the workspace.
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. It can only be
//! produced by one of two constructors:
//!
//! - [`CanonicalBytes::from_fields`] — an ordered, type-tagged, length-prefixed
//!   tuple encoding. This is what product fingerprints hash. Field order is
//!   significant and field boundaries are explicit, so `("ab", "c")` and
//!   `("a", "bc")` can never encode to the same bytes.
//! - [`CanonicalBytes::new`] — RFC 8785 (JCS) canonical JSON for structured
//!   payloads such as ledger events. Floats are rejected.
//!
//! Any function that computes a digest accepts `&CanonicalBytes`, so there is
//! no way to hash an ad-hoc serialization by accident.
//!
//! ## Field Encoding
//!
//! ```text
//! "PAL-FIELDS-V1" || count(u32 BE) || field_1 || ... || field_n
//! field = tag(u8) || len(u64 BE) || utf8 bytes
//! ```
//!
//! Instants are rendered as `YYYY-MM-DDTHH:MM:SSZ` before encoding, so the
//! producer and the verifier agree bit-for-bit on timestamp formatting.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;
use crate::temporal::Timestamp;

/// Domain-separation header for the field-tuple encoding.
const FIELDS_HEADER: &[u8] = b"PAL-FIELDS-V1";

/// Bytes produced exclusively by one of the canonical encoders.
///
/// # Invariants
///
/// - The only constructors are `CanonicalBytes::new()` and
///   `CanonicalBytes::from_fields()`.
/// - Identical logical input always yields identical bytes.
/// - The inner `Vec<u8>` is private and never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

/// One element of an ordered canonical tuple.
///
/// The variant determines the type tag written ahead of the value, so a
/// text field and an instant field with the same rendering still encode
/// differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField<'a> {
    /// Free-form UTF-8 text.
    Text(&'a str),
    /// A UTC instant, encoded as its ISO-8601 `Z` rendering.
    Instant(Timestamp),
}

impl CanonicalField<'_> {
    fn tag(&self) -> u8 {
        match self {
            Self::Text(_) => 0x01,
            Self::Instant(_) => 0x02,
        }
    }
}

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value using JCS.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::FloatRejected` if the value contains
    /// float numbers, or `CanonicalizationError::SerializationFailed` if JCS
    /// serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let coerced = reject_floats(value)?;
        let s = serde_jcs::to_string(&coerced)?;
        Ok(Self(s.into_bytes()))
    }

    /// Encode an ordered tuple of typed fields.
    ///
    /// Total over its input: every slice of fields has exactly one encoding.
    pub fn from_fields(fields: &[CanonicalField<'_>]) -> Self {
        let mut out = Vec::with_capacity(FIELDS_HEADER.len() + 4 + fields.len() * 32);
        out.extend_from_slice(FIELDS_HEADER);
        out.extend_from_slice(&(fields.len() as u32).to_be_bytes());
        for field in fields {
            out.push(field.tag());
            match field {
                CanonicalField::Text(s) => push_len_prefixed(&mut out, s.as_bytes()),
                CanonicalField::Instant(ts) => {
                    push_len_prefixed(&mut out, ts.to_iso8601().as_bytes())
                }
            }
        }
        Self(out)
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn push_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Recursively reject non-integer numbers.
///
/// Float serialization has non-deterministic edge cases under JCS, so
/// canonical payloads carry amounts and counters as integers or strings.
fn reject_floats(value: Value) -> Result<Value, CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(value),
        Value::Number(ref n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(value)
        }
        Value::Object(map) => {
            let mut coerced = serde_json::Map::new();
            for (k, v) in map {
                coerced.insert(k, reject_floats(v)?);
            }
            Ok(Value::Object(coerced))
        }
        Value::Array(arr) => {
            let coerced: Result<Vec<_>, _> = arr.into_iter().map(reject_floats).collect();
            Ok(Value::Array(coerced?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    // ---- JCS ----

    #[test]
    fn test_jcs_sorted_keys() {
        let data = serde_json::json!({"z": 1, "m": 2, "a": 3});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"a":3,"m":2,"z":1}"#);
    }

    #[test]
    fn test_jcs_nested_sorted() {
        let data = serde_json::json!({"outer": {"b": 2, "a": 1}, "list": [3, 2, 1]});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"list":[3,2,1],"outer":{"a":1,"b":2}}"#);
    }

    #[test]
    fn test_jcs_float_rejected() {
        let data = serde_json::json!({"a": {"b": [{"c": 3.14}]}});
        match CanonicalBytes::new(&data) {
            Err(CanonicalizationError::FloatRejected(f)) => assert_eq!(f, 3.14),
            other => panic!("expected FloatRejected, got: {other:?}"),
        }
    }

    #[test]
    fn test_jcs_empty_object() {
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        assert_eq!(cb.as_bytes(), b"{}");
    }

    // ---- field tuples ----

    #[test]
    fn test_fields_header_and_count() {
        let cb = CanonicalBytes::from_fields(&[CanonicalField::Text("x")]);
        let bytes = cb.as_bytes();
        assert!(bytes.starts_with(FIELDS_HEADER));
        let count = &bytes[FIELDS_HEADER.len()..FIELDS_HEADER.len() + 4];
        assert_eq!(count, &1u32.to_be_bytes());
    }

    #[test]
    fn test_fields_exact_layout() {
        let cb = CanonicalBytes::from_fields(&[CanonicalField::Text("ab")]);
        let mut expected = FIELDS_HEADER.to_vec();
        expected.extend_from_slice(&1u32.to_be_bytes());
        expected.push(0x01);
        expected.extend_from_slice(&2u64.to_be_bytes());
        expected.extend_from_slice(b"ab");
        assert_eq!(cb.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let a = CanonicalBytes::from_fields(&[
            CanonicalField::Text("ab"),
            CanonicalField::Text("c"),
        ]);
        let b = CanonicalBytes::from_fields(&[
            CanonicalField::Text("a"),
            CanonicalField::Text("bc"),
        ]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_field_order_matters() {
        let a = CanonicalBytes::from_fields(&[
            CanonicalField::Text("x"),
            CanonicalField::Text("y"),
        ]);
        let b = CanonicalBytes::from_fields(&[
            CanonicalField::Text("y"),
            CanonicalField::Text("x"),
        ]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_type_tag_distinguishes_text_from_instant() {
        let instant = ts("2026-01-15T12:00:00Z");
        let as_text = CanonicalBytes::from_fields(&[CanonicalField::Text("2026-01-15T12:00:00Z")]);
        let as_instant = CanonicalBytes::from_fields(&[CanonicalField::Instant(instant)]);
        assert_ne!(as_text, as_instant);
    }

    #[test]
    fn test_empty_tuple_is_not_empty_bytes() {
        let cb = CanonicalBytes::from_fields(&[]);
        assert!(!cb.is_empty());
        assert_eq!(cb.len(), FIELDS_HEADER.len() + 4);
    }

    #[test]
    fn test_trailing_empty_field_changes_encoding() {
        let a = CanonicalBytes::from_fields(&[CanonicalField::Text("a")]);
        let b = CanonicalBytes::from_fields(&[CanonicalField::Text("a"), CanonicalField::Text("")]);
        assert_ne!(a, b);
    }
}

//! KeyHash - JobKey から導出する固定長の dedup token
//!
//! The hash is a pure function of the key: field values are fed into a
//! SHA-256 accumulator in field-name order, and the first 128 bits are
//! rendered as 32 lowercase hex characters.
//!
//! Each value is length-prefixed, so `("1", "11")` and `("11", "1")` feed
//! different bytes into the digest.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::ReservationError;
use super::key::JobKey;

/// Length of a rendered key hash, in hex characters.
pub const KEY_HASH_LEN: usize = 32;

/// Fixed-length lowercase hex digest of a [`JobKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyHash(String);

impl KeyHash {
    /// Wrap an already-rendered hash (e.g. read back from storage).
    ///
    /// Returns `None` unless `value` is exactly 32 lowercase hex characters.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = value.len() == KEY_HASH_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the key hash of `key`.
///
/// Only the values are hashed, in ascending field-name order, each as a
/// little-endian `u64` byte length followed by its string form. Fails with
/// [`ReservationError::MalformedKey`] for empty field names or values that
/// have no deterministic string form.
pub fn compute_key_hash(key: &JobKey) -> Result<KeyHash, ReservationError> {
    let mut hasher = Sha256::new();
    for (field, value) in key.iter() {
        if field.is_empty() {
            return Err(ReservationError::MalformedKey(
                "empty field name".to_string(),
            ));
        }
        let s = value.canonical_string().map_err(|e| match e {
            ReservationError::MalformedKey(msg) => {
                ReservationError::MalformedKey(format!("field '{field}': {msg}"))
            }
            other => other,
        })?;
        hasher.update((s.len() as u64).to_le_bytes());
        hasher.update(s.as_bytes());
    }
    let digest = hasher.finalize();
    Ok(KeyHash(hex::encode(&digest[..KEY_HASH_LEN / 2])))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::domain::key::KeyValue;

    #[test]
    fn hash_is_fixed_length_lowercase_hex() {
        let hash = compute_key_hash(&JobKey::new().with("id", 1)).unwrap();
        assert_eq!(hash.as_str().len(), KEY_HASH_LEN);
        assert!(KeyHash::parse(hash.as_str()).is_some());
    }

    #[test]
    fn empty_key_hashes_empty_input() {
        // sha256("") = e3b0c44298fc1c149afbf4c8996fb924...
        let hash = compute_key_hash(&JobKey::new()).unwrap();
        assert_eq!(hash.as_str(), "e3b0c44298fc1c149afbf4c8996fb924");
    }

    #[test]
    fn known_vector() {
        // field order: a="1", b="x"
        let key = JobKey::new().with("b", "x").with("a", 1);
        let mut input = Vec::new();
        input.extend_from_slice(&1u64.to_le_bytes());
        input.extend_from_slice(b"1");
        input.extend_from_slice(&1u64.to_le_bytes());
        input.extend_from_slice(b"x");
        let expected = hex::encode(&Sha256::digest(&input)[..16]);
        assert_eq!(compute_key_hash(&key).unwrap().as_str(), expected);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let fields: Vec<(&str, KeyValue)> = vec![
            ("subject", KeyValue::from(7)),
            ("session", KeyValue::from("morning")),
            ("ratio", KeyValue::from(0.25)),
            ("valid", KeyValue::from(true)),
        ];

        let forward: JobKey = fields.iter().cloned().collect();
        let backward: JobKey = fields.iter().rev().cloned().collect();
        let rotated: JobKey = fields
            .iter()
            .cycle()
            .skip(2)
            .take(fields.len())
            .cloned()
            .collect();

        let h = compute_key_hash(&forward).unwrap();
        assert_eq!(h, compute_key_hash(&backward).unwrap());
        assert_eq!(h, compute_key_hash(&rotated).unwrap());
    }

    #[test]
    fn distinct_keys_do_not_collide() {
        let mut seen = HashSet::new();
        for subject in 0..100 {
            for session in 0..100 {
                let key = JobKey::new()
                    .with("subject", subject)
                    .with("session", format!("s{session}"));
                assert!(seen.insert(compute_key_hash(&key).unwrap()));
            }
        }
        assert_eq!(seen.len(), 10_000);
    }

    #[test]
    fn value_boundaries_are_preserved() {
        let a = JobKey::new().with("a", "1").with("b", "11");
        let b = JobKey::new().with("a", "11").with("b", "1");
        assert_ne!(compute_key_hash(&a).unwrap(), compute_key_hash(&b).unwrap());
    }

    #[test]
    fn int_and_float_keys_differ() {
        let a = compute_key_hash(&JobKey::new().with("id", 1)).unwrap();
        let b = compute_key_hash(&JobKey::new().with("id", 1.0)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_values_fail_before_hashing() {
        let key = JobKey::new().with("id", f64::NAN);
        assert!(matches!(
            compute_key_hash(&key),
            Err(ReservationError::MalformedKey(_))
        ));

        let key = JobKey::new().with("", 1);
        assert!(matches!(
            compute_key_hash(&key),
            Err(ReservationError::MalformedKey(_))
        ));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(KeyHash::parse("ABC").is_none());
        assert!(KeyHash::parse(&"G".repeat(KEY_HASH_LEN)).is_none());
        assert!(KeyHash::parse(&"a".repeat(KEY_HASH_LEN)).is_some());
    }
}

//! JobKey - unit of work の識別キー
//!
//! A key is a mapping from field name to a scalar value, i.e. the primary
//! key of the unit of work in the surrounding framework.
//!
//! # 設計
//! - `BTreeMap` で保持するため、挿入順序に関係なく常にフィールド名順に走査される
//! - 値はスカラーのみ（配列・オブジェクト・null は受け付けない）

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::errors::ReservationError;

/// A scalar value inside a [`JobKey`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KeyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl KeyValue {
    /// Deterministic string form fed into the key hash.
    ///
    /// Integral floats keep a trailing `.0` so that `1` and `1.0` hash
    /// differently. Non-finite floats are rejected.
    pub fn canonical_string(&self) -> Result<String, ReservationError> {
        match self {
            KeyValue::Bool(true) => Ok("True".to_string()),
            KeyValue::Bool(false) => Ok("False".to_string()),
            KeyValue::Int(v) => Ok(v.to_string()),
            KeyValue::Float(v) => {
                if !v.is_finite() {
                    return Err(ReservationError::MalformedKey(format!(
                        "non-finite float {v} cannot be hashed"
                    )));
                }
                let s = v.to_string();
                if s.contains('.') {
                    Ok(s)
                } else {
                    Ok(format!("{s}.0"))
                }
            }
            KeyValue::Text(v) => Ok(v.clone()),
            KeyValue::Date(v) => Ok(v.format("%Y-%m-%d").to_string()),
            KeyValue::DateTime(v) => Ok(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            KeyValue::Bool(v) => serde_json::Value::Bool(*v),
            KeyValue::Int(v) => serde_json::Value::from(*v),
            // NaN / inf become null; such keys never reach storage anyway
            KeyValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            KeyValue::Text(v) => serde_json::Value::String(v.clone()),
            KeyValue::Date(_) | KeyValue::DateTime(_) => {
                serde_json::Value::String(self.canonical_string().unwrap_or_default())
            }
        }
    }
}

impl From<bool> for KeyValue {
    fn from(v: bool) -> Self {
        KeyValue::Bool(v)
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        KeyValue::Int(i64::from(v))
    }
}

impl From<u32> for KeyValue {
    fn from(v: u32) -> Self {
        KeyValue::Int(i64::from(v))
    }
}

impl From<f64> for KeyValue {
    fn from(v: f64) -> Self {
        KeyValue::Float(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Text(v.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::Text(v)
    }
}

impl From<NaiveDate> for KeyValue {
    fn from(v: NaiveDate) -> Self {
        KeyValue::Date(v)
    }
}

impl From<NaiveDateTime> for KeyValue {
    fn from(v: NaiveDateTime) -> Self {
        KeyValue::DateTime(v)
    }
}

/// Identifying key of a unit of work (field name -> value).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobKey(BTreeMap<String, KeyValue>);

impl JobKey {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    ///
    /// # Example
    /// ```ignore
    /// let key = JobKey::new().with("subject_id", 7).with("session", "a");
    /// ```
    pub fn with(mut self, field: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<KeyValue>) {
        self.0.insert(field.into(), value.into());
    }

    /// Entries in canonical (field name) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a JSON object such as `{"id": 1, "name": "x"}`.
    ///
    /// Only scalar values are accepted; `null`, arrays and nested objects
    /// are reported as [`ReservationError::MalformedKey`].
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ReservationError> {
        let object = value.as_object().ok_or_else(|| {
            ReservationError::MalformedKey(format!("expected a JSON object, got {value}"))
        })?;

        let mut key = JobKey::new();
        for (field, v) in object {
            let v = match v {
                serde_json::Value::Bool(b) => KeyValue::Bool(*b),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => KeyValue::Int(i),
                    None => match n.as_f64() {
                        Some(f) => KeyValue::Float(f),
                        None => {
                            return Err(ReservationError::MalformedKey(format!(
                                "field '{field}': number {n} is out of range"
                            )));
                        }
                    },
                },
                serde_json::Value::String(s) => KeyValue::Text(s.clone()),
                other => {
                    return Err(ReservationError::MalformedKey(format!(
                        "field '{field}': unsupported value {other}"
                    )));
                }
            };
            key.insert(field.clone(), v);
        }
        Ok(key)
    }

    /// JSON copy of the key, persisted on error records for diagnostics.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl<K: Into<String>, V: Into<KeyValue>> FromIterator<(K, V)> for JobKey {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut key = JobKey::new();
        for (k, v) in iter {
            key.insert(k, v);
        }
        key
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

//! Typed field values.
//!
//! A [`FieldValue`] is anything that can sit in a document field. Besides the
//! JSON-like scalars and containers there are two time-related variants:
//!
//! - [`FieldValue::Timestamp`] - a literal instant supplied by the client
//! - [`FieldValue::ServerTimestamp`] - the placeholder meaning "the commit time
//!   the server will assign to this write"
//!
//! Equality is structural. The sentinel equals only itself, so a write that
//! hand-builds a timestamp (or a string spelling one) is always distinguishable
//! from a write that asks for the server commit time.
//!
//! # JSON form
//!
//! ```text
//! null, true, 42, 1.5, "text", [..], {..}   plain values
//! {"$timestamp": "2020-01-30T09:15:00Z"}     literal timestamp
//! {"$serverTimestamp": true}                 server-timestamp sentinel
//! ```
//!
//! TOML sources may also use a native offset datetime for a literal timestamp.

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::error::{CoreError, Result};
use crate::time::Timestamp;

const TIMESTAMP_KEY: &str = "$timestamp";
const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";
/// Key under which the toml crate hands a native datetime to serde.
const TOML_DATETIME_KEY: &str = "$__toml_private_datetime";

/// 2^63, the first `f64` above `i64::MAX`.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Exact ordering of an integer against a double.
///
/// Never casts the integer to `f64`, which would merge distinct values
/// above 2^53.
fn cmp_integer_double(i: i64, d: f64) -> Option<Ordering> {
    if d.is_nan() {
        return None;
    }
    if d >= I64_UPPER_BOUND {
        return Some(Ordering::Less);
    }
    if d < -I64_UPPER_BOUND {
        return Some(Ordering::Greater);
    }

    let whole = d.trunc();
    // In range, so the cast is exact.
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&d),
        unequal => Some(unequal),
    }
}

/// A value stored in a document field.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(Timestamp),
    /// Placeholder resolved to the commit time by the store.
    ServerTimestamp,
    Array(Vec<FieldValue>),
    Map(IndexMap<String, FieldValue>),
}

/// The runtime kind of a [`FieldValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Double,
    String,
    Timestamp,
    ServerTimestamp,
    Array,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Boolean => "bool",
            Self::Integer => "int",
            Self::Double => "float",
            Self::String => "string",
            Self::Timestamp => "timestamp",
            Self::ServerTimestamp => "serverTimestamp",
            Self::Array => "list",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

impl FieldValue {
    /// The server-timestamp sentinel.
    #[must_use]
    pub fn server_timestamp() -> Self {
        Self::ServerTimestamp
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) => ValueKind::String,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::ServerTimestamp => ValueKind::ServerTimestamp,
            Self::Array(_) => ValueKind::Array,
            Self::Map(_) => ValueKind::Map,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_server_timestamp(&self) -> bool {
        matches!(self, Self::ServerTimestamp)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, FieldValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Order two values.
    ///
    /// Only numbers, strings and literal timestamps are ordered, and only
    /// against a value of the same family. Everything else is incomparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Double(a), Self::Double(b)) => a.partial_cmp(b),
            (Self::Integer(i), Self::Double(d)) => cmp_integer_double(*i, *d),
            (Self::Double(d), Self::Integer(i)) => {
                cmp_integer_double(*i, *d).map(Ordering::reverse)
            }
            _ => None,
        }
    }

    /// Convert from the JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns an error for numbers outside the `f64` range, for unknown
    /// `$`-prefixed markers, and for markers with a malformed payload.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Boolean(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Double(f))
                } else {
                    Err(CoreError::invalid_value(format!("unrepresentable number {n}")))
                }
            }
            Value::String(s) => Ok(Self::String(s)),
            Value::Array(items) => items
                .into_iter()
                .map(Self::from_json)
                .collect::<Result<Vec<_>>>()
                .map(Self::Array),
            Value::Object(object) => Self::from_json_object(object),
        }
    }

    fn from_json_object(object: Map<String, Value>) -> Result<Self> {
        if object.len() == 1
            && let Some((key, payload)) = object.iter().next()
            && key.starts_with('$')
        {
            return match key.as_str() {
                TIMESTAMP_KEY => {
                    let raw = payload.as_str().ok_or_else(|| {
                        CoreError::invalid_value("$timestamp must be an RFC 3339 string")
                    })?;
                    Ok(Self::Timestamp(raw.parse()?))
                }
                TOML_DATETIME_KEY => {
                    let raw = payload.as_str().unwrap_or_default();
                    raw.parse().map(Self::Timestamp).map_err(|_| {
                        CoreError::invalid_value(format!(
                            "TOML datetime {raw} must carry a date, time and UTC offset \
                             (or write {{ \"$timestamp\" = \"...\" }})"
                        ))
                    })
                }
                SERVER_TIMESTAMP_KEY => match payload {
                    Value::Bool(true) => Ok(Self::ServerTimestamp),
                    _ => Err(CoreError::invalid_value("$serverTimestamp must be true")),
                },
                other => Err(CoreError::invalid_value(format!("unknown value marker {other}"))),
            };
        }

        let mut fields = IndexMap::with_capacity(object.len());
        for (key, value) in object {
            fields.insert(key, Self::from_json(value)?);
        }
        Ok(Self::Map(fields))
    }

    /// Convert to the JSON wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::Number((*i).into()),
            Self::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
            Self::String(s) => Value::String(s.clone()),
            Self::Timestamp(ts) => {
                let mut marker = Map::new();
                marker.insert(TIMESTAMP_KEY.to_string(), Value::String(ts.to_string()));
                Value::Object(marker)
            }
            Self::ServerTimestamp => {
                let mut marker = Map::new();
                marker.insert(SERVER_TIMESTAMP_KEY.to_string(), Value::Bool(true));
                Value::Object(marker)
            }
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) | (Self::ServerTimestamp, Self::ServerTimestamp) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Integer(i), Self::Double(d)) | (Self::Double(d), Self::Integer(i)) => {
                cmp_integer_double(*i, *d) == Some(Ordering::Equal)
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            // IndexMap equality ignores insertion order
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerTimestamp => f.write_str("request.time"),
            Self::Timestamp(ts) => write!(f, "timestamp({ts})"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        FieldValue::from_json(raw).map_err(serde::de::Error::custom)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(value: Timestamp) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(value: Vec<FieldValue>) -> Self {
        Self::Array(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sentinel_equals_only_itself() {
        let sentinel = FieldValue::server_timestamp();
        assert_eq!(sentinel, FieldValue::ServerTimestamp);

        let literal: Timestamp = "2020-01-30T09:15:00Z".parse().unwrap();
        assert_ne!(sentinel, FieldValue::Timestamp(literal));
        assert_ne!(sentinel, FieldValue::from("2020-01-30T09:15:00Z"));
        assert_ne!(sentinel, FieldValue::Null);
    }

    #[test]
    fn test_timestamp_never_equals_string() {
        let literal: Timestamp = "2020-01-30T09:15:00Z".parse().unwrap();
        assert_ne!(
            FieldValue::Timestamp(literal),
            FieldValue::from("2020-01-30T09:15:00Z")
        );
    }

    #[test]
    fn test_numeric_equality_across_int_and_double() {
        assert_eq!(FieldValue::Integer(1), FieldValue::Double(1.0));
        assert_ne!(FieldValue::Integer(1), FieldValue::Double(1.5));
        assert_ne!(FieldValue::Integer(1), FieldValue::from("1"));
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let a = FieldValue::from_json(json!({"x": 1, "y": "two"})).unwrap();
        let b = FieldValue::from_json(json!({"y": "two", "x": 1})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_json_markers() {
        let ts = FieldValue::from_json(json!({"$timestamp": "2020-01-30T09:15:00Z"})).unwrap();
        assert_eq!(ts.kind(), ValueKind::Timestamp);

        let sentinel = FieldValue::from_json(json!({"$serverTimestamp": true})).unwrap();
        assert!(sentinel.is_server_timestamp());
    }

    #[test]
    fn test_from_json_rejects_bad_markers() {
        assert!(FieldValue::from_json(json!({"$serverTimestamp": false})).is_err());
        assert!(FieldValue::from_json(json!({"$timestamp": 12})).is_err());
        assert!(FieldValue::from_json(json!({"$increment": 1})).is_err());
    }

    #[test]
    fn test_dollar_keys_inside_larger_maps_are_plain_fields() {
        let value = FieldValue::from_json(json!({"$price": 3, "name": "x"})).unwrap();
        assert_eq!(value.kind(), ValueKind::Map);
    }

    #[test]
    fn test_to_json_markers() {
        assert_eq!(
            FieldValue::ServerTimestamp.to_json(),
            json!({"$serverTimestamp": true})
        );
        let ts: Timestamp = "2020-01-30T09:15:00Z".parse().unwrap();
        assert_eq!(
            FieldValue::Timestamp(ts).to_json(),
            json!({"$timestamp": "2020-01-30T09:15:00Z"})
        );
    }

    #[test]
    fn test_deserialize_nested() {
        let value: FieldValue = serde_json::from_value(json!({
            "profile": {"name": "moga", "since": {"$timestamp": "2020-01-01T00:00:00Z"}},
            "tags": ["a", "b"],
        }))
        .unwrap();
        let profile = value.as_map().unwrap().get("profile").unwrap();
        let since = profile.as_map().unwrap().get("since").unwrap();
        assert_eq!(since.kind(), ValueKind::Timestamp);
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            FieldValue::Integer(1).compare(&FieldValue::Double(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            FieldValue::from("b").compare(&FieldValue::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(FieldValue::from("1").compare(&FieldValue::Integer(1)), None);
        assert_eq!(
            FieldValue::ServerTimestamp.compare(&FieldValue::ServerTimestamp),
            None
        );
    }

    #[test]
    fn test_mixed_numbers_compare_exactly() {
        let two_53 = 9_007_199_254_740_992_i64;
        let above = FieldValue::Integer(two_53 + 1);
        let double = FieldValue::Double(two_53 as f64);

        assert_ne!(above, double);
        assert_ne!(double, above);
        assert_eq!(FieldValue::Integer(two_53), double);
        assert_eq!(above.compare(&double), Some(Ordering::Greater));
        assert_eq!(double.compare(&above), Some(Ordering::Less));
    }

    #[test]
    fn test_mixed_numbers_edges() {
        assert_eq!(FieldValue::Integer(3), FieldValue::Double(3.0));
        assert_ne!(FieldValue::Integer(3), FieldValue::Double(3.5));
        assert_eq!(
            FieldValue::Integer(-1).compare(&FieldValue::Double(-1.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            FieldValue::Integer(i64::MAX).compare(&FieldValue::Double(9.3e18)),
            Some(Ordering::Less)
        );
        assert_eq!(
            FieldValue::Integer(i64::MIN).compare(&FieldValue::Double(f64::NEG_INFINITY)),
            Some(Ordering::Greater)
        );
        assert_ne!(FieldValue::Integer(i64::MAX), FieldValue::Double(i64::MAX as f64));
        assert_eq!(FieldValue::Integer(0).compare(&FieldValue::Double(f64::NAN)), None);
    }

    #[test]
    fn test_toml_datetime_is_a_timestamp() {
        #[derive(Deserialize)]
        struct Row {
            value: FieldValue,
        }

        let row: Row = toml::from_str("value = 2020-01-30T09:15:00Z").unwrap();
        assert_eq!(row.value.kind(), ValueKind::Timestamp);
        assert_eq!(row.value.to_string(), "timestamp(2020-01-30T09:15:00Z)");

        let err = toml::from_str::<Row>("value = 2020-01-30").err().unwrap();
        assert!(err.to_string().contains("$timestamp"));
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::ServerTimestamp.to_string(), "request.time");
        assert_eq!(FieldValue::from("moga").to_string(), "\"moga\"");
        assert_eq!(FieldValue::Null.to_string(), "null");
    }
}

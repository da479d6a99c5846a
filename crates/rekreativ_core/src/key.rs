//! Record keys and key paths.
//!
//! A key is an integer or a string. Integers sort before strings, so a
//! collection mixing both still has a total order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A primary key or secondary index value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    /// Integer key (client ids).
    Int(i64),
    /// String key (machine ids, timestamps, usernames).
    Text(String),
}

impl Key {
    /// Converts a JSON value into a key.
    ///
    /// Integral numbers and strings qualify; everything else does not.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Some(Self::Int(i));
                }
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Some(Self::Int(f as i64))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Extracts the key stored at `path` in `record`.
    #[must_use]
    pub fn at_path(record: &Value, path: &str) -> Option<Self> {
        resolve_path(record, path).and_then(Self::from_value)
    }

    /// The key as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }

    /// The string payload, if this is a text key.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Follows a dotted key path (`installationData.location`) into a record.
#[must_use]
pub fn resolve_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |value, segment| value.as_object()?.get(segment))
}

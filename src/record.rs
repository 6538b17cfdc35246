//! Record and key types.
//!
//! A [`Record`] is the unit that flows between the cache table and the
//! document store: a validated [`Key`] plus an arbitrary JSON value.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error returned when a key fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key must be a non-empty string")]
    Empty,
    #[error("key is {len} characters, the limit is {max}", max = Key::MAX_LEN)]
    TooLong { len: usize },
}

/// A non-empty record key of at most [`Key::MAX_LEN`] characters.
///
/// The limit matches the width of the SQL key column, so every key the
/// cache accepts can be stored by every backend.
///
/// # Example
///
/// ```
/// use recondb::Key;
///
/// let key = Key::new("guild.settings").unwrap();
/// assert_eq!(key.as_str(), "guild.settings");
/// assert!(Key::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key(String);

impl Key {
    /// Longest accepted key, in characters.
    pub const MAX_LEN: usize = 255;

    /// Validate and wrap a key.
    pub fn new(key: impl Into<String>) -> Result<Self, KeyError> {
        let key = key.into();
        if key.is_empty() {
            return Err(KeyError::Empty);
        }
        let len = key.chars().count();
        if len > Self::MAX_LEN {
            return Err(KeyError::TooLong { len });
        }
        Ok(Self(key))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Key {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Key {
    type Error = KeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Key {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted key/value pair.
///
/// # Example
///
/// ```
/// use recondb::{Key, Record};
/// use serde_json::json;
///
/// let record = Record::new(Key::new("prefix").unwrap(), json!("!"));
/// assert_eq!(record.key.as_str(), "prefix");
/// assert!(record.has_value());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Key,
    pub value: Value,
}

impl Record {
    #[must_use]
    pub fn new(key: Key, value: Value) -> Self {
        Self { key, value }
    }

    /// A value is present unless it is JSON `null`.
    #[must_use]
    pub fn has_value(&self) -> bool {
        !self.value.is_null()
    }

    /// Approximate in-memory footprint, used for byte metrics.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.key.as_str().len() + value_size(&self.value)
    }
}

/// Serialized length of a value (0 if it cannot be serialized).
pub(crate) fn value_size(value: &Value) -> usize {
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_rejects_empty() {
        assert_eq!(Key::new(""), Err(KeyError::Empty));
        assert!("".parse::<Key>().is_err());
        assert!(Key::try_from(String::new()).is_err());
    }

    #[test]
    fn test_key_length_limit_counts_characters() {
        assert!(Key::new("k".repeat(Key::MAX_LEN)).is_ok());
        assert_eq!(
            Key::new("k".repeat(Key::MAX_LEN + 1)),
            Err(KeyError::TooLong { len: Key::MAX_LEN + 1 })
        );
        // Multi-byte characters count once each
        assert!(Key::new("é".repeat(Key::MAX_LEN)).is_ok());
    }

    #[test]
    fn test_key_accepts_whitespace() {
        // Only emptiness is rejected; whitespace keys are legal
        let key = Key::new(" ").unwrap();
        assert_eq!(key.as_str(), " ");
    }

    #[test]
    fn test_key_display_and_into() {
        let key: Key = "a.b.c".parse().unwrap();
        assert_eq!(format!("{}", key), "a.b.c");
        let s: String = key.into();
        assert_eq!(s, "a.b.c");
    }

    #[test]
    fn test_key_deserialize_rejects_empty() {
        let ok: Result<Key, _> = serde_json::from_str("\"k\"");
        assert!(ok.is_ok());
        let err: Result<Key, _> = serde_json::from_str("\"\"");
        assert!(err.is_err());
    }

    #[test]
    fn test_record_has_value() {
        let key = Key::new("k").unwrap();
        assert!(Record::new(key.clone(), json!(0)).has_value());
        assert!(Record::new(key.clone(), json!(false)).has_value());
        assert!(Record::new(key.clone(), json!("")).has_value());
        assert!(!Record::new(key, Value::Null).has_value());
    }

    #[test]
    fn test_record_deserialize_with_empty_key_fails() {
        let result: Result<Record, _> = serde_json::from_value(json!({"key": "", "value": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_size_bytes() {
        let record = Record::new(Key::new("ab").unwrap(), json!("xyz"));
        // "xyz" serializes with quotes
        assert_eq!(record.size_bytes(), 2 + 5);
    }
}

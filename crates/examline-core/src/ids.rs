//! Identifier and credential newtypes.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of an assessment, question, or choice.
///
/// Backends hand out ids as JSON numbers in some payloads and as strings in
/// others. The original scalar form is kept so it can be echoed back to the
/// grading service unchanged, but equality and hashing go through the
/// canonical text, so `42` and `"42"` name the same entity.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Number(i64),
    Text(String),
}

impl EntityId {
    /// Read an id out of a JSON scalar.
    ///
    /// Integral floats are accepted; blank strings, fractions, booleans and
    /// containers are not ids.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(EntityId::Number(i))
                } else {
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .filter(|f| f.abs() < i64::MAX as f64)
                        .map(|f| EntityId::Number(f as i64))
                }
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(EntityId::Text(trimmed.to_string()))
                }
            }
            _ => None,
        }
    }

    /// Canonical text used for comparison.
    pub fn key(&self) -> Cow<'_, str> {
        match self {
            EntityId::Number(n) => Cow::Owned(n.to_string()),
            EntityId::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    /// Whether a raw JSON value denotes this id.
    pub fn matches_json(&self, value: &Value) -> bool {
        EntityId::from_json(value).is_some_and(|other| other == *self)
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Number(n) => write!(f, "{n}"),
            EntityId::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        EntityId::Number(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::Text(value.trim().to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId::from(value.as_str())
    }
}

/// Bearer credential threaded explicitly into every backend call.
///
/// Note: Debug output is masked so the token never shows up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// A credential made of whitespace only is treated as missing.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"***").finish()
    }
}

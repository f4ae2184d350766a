// ── Structural query keys ──
//
// A `QueryKey` identifies one fetchable resource-with-parameters. Keys
// compare, order, and hash by structure: two keys built from the same
// parts are the same cache entry, no matter how they were assembled.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Filter state: filter name -> value. Backed by a `BTreeMap` so insertion
/// order never leaks into key equality.
pub type Filters = BTreeMap<String, KeyPart>;

/// One component of a [`QueryKey`].
///
/// Floats are deliberately absent: they are neither `Eq` nor `Hash`, so
/// fractional parameters travel as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<KeyPart>),
    Map(BTreeMap<String, KeyPart>),
}

impl KeyPart {
    /// Convert a JSON value into a key part.
    ///
    /// Integers that fit `i64` stay numeric; any other number is kept as
    /// its decimal string.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Str(n.to_string()), Self::Int),
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render as a single query-string value. `Null` has no representation.
    pub fn to_param_string(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Str(s) => Some(s.clone()),
            Self::List(items) => Some(
                items
                    .iter()
                    .filter_map(Self::to_param_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Self::Map(_) => serde_json::to_string(self).ok(),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

// ── Conversions ─────────────────────────────────────────────────────

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for KeyPart {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Int)
    }
}

impl From<usize> for KeyPart {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Int)
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<KeyPart>> From<Vec<T>> for KeyPart {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, KeyPart>> for KeyPart {
    fn from(value: BTreeMap<String, KeyPart>) -> Self {
        Self::Map(value)
    }
}

// ── QueryKey ────────────────────────────────────────────────────────

/// Ordered, structurally compared cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_parts(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// Append a part, builder style.
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    /// Whether `prefix` matches the leading parts of this key.
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", KeyPart::List(self.0.clone()))
    }
}

impl From<&str> for QueryKey {
    fn from(value: &str) -> Self {
        Self(vec![KeyPart::from(value)])
    }
}

impl From<Vec<KeyPart>> for QueryKey {
    fn from(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }
}

impl FromIterator<KeyPart> for QueryKey {
    fn from_iter<I: IntoIterator<Item = KeyPart>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Build a [`QueryKey`] from a list of values convertible into [`KeyPart`].
///
/// ```
/// use perfdesk_core::query_key;
/// let key = query_key!["employees", 42_i64, "qualifications"];
/// assert_eq!(key.len(), 3);
/// ```
#[macro_export]
macro_rules! query_key {
    ($($part:expr),* $(,)?) => {
        $crate::QueryKey::from_parts(vec![$($crate::KeyPart::from($part)),*])
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use pretty_assertions::assert_eq;

    use super::*;

    fn hash_of(key: &QueryKey) -> u64 {
        let mut h = DefaultHasher::new();
        key.hash(&mut h);
        h.finish()
    }

    #[test]
    fn map_insertion_order_does_not_affect_equality() {
        let mut a = BTreeMap::new();
        a.insert("status".to_owned(), KeyPart::from("active"));
        a.insert("dept".to_owned(), KeyPart::from(3_i64));

        let mut b = BTreeMap::new();
        b.insert("dept".to_owned(), KeyPart::from(3_i64));
        b.insert("status".to_owned(), KeyPart::from("active"));

        let ka = query_key!["projects", a];
        let kb = query_key!["projects", b];
        assert_eq!(ka, kb);
        assert_eq!(hash_of(&ka), hash_of(&kb));
    }

    #[test]
    fn nested_difference_changes_key() {
        let mut a = BTreeMap::new();
        a.insert("page".to_owned(), KeyPart::from(1_u32));
        let mut b = a.clone();
        b.insert("page".to_owned(), KeyPart::from(2_u32));

        assert_ne!(query_key!["projects", a], query_key!["projects", b]);
    }

    #[test]
    fn starts_with_matches_prefix_only() {
        let key = query_key!["employees", 7_i64, "evaluations"];
        assert!(key.starts_with(&query_key!["employees"]));
        assert!(key.starts_with(&query_key!["employees", 7_i64]));
        assert!(!key.starts_with(&query_key!["employees", 8_i64]));
        assert!(!query_key!["employees"].starts_with(&key));
    }

    #[test]
    fn from_json_keeps_integers_numeric() {
        let value = serde_json::json!({ "id": 5, "score": 4.5, "tags": ["a", null] });
        let part = KeyPart::from_json(&value);
        let KeyPart::Map(map) = part else {
            panic!("expected map, got {part:?}");
        };
        assert_eq!(map["id"], KeyPart::Int(5));
        assert_eq!(map["score"], KeyPart::Str("4.5".into()));
        assert_eq!(
            map["tags"],
            KeyPart::List(vec![KeyPart::Str("a".into()), KeyPart::Null])
        );
    }

    #[test]
    fn param_string_rendering() {
        assert_eq!(KeyPart::Null.to_param_string(), None);
        assert_eq!(KeyPart::from(12_i64).to_param_string().as_deref(), Some("12"));
        assert_eq!(
            KeyPart::from(vec!["a", "b"]).to_param_string().as_deref(),
            Some("a,b")
        );
    }

    #[test]
    fn display_is_compact() {
        let mut params = BTreeMap::new();
        params.insert("page".to_owned(), KeyPart::from(1_u32));
        let key = query_key!["projects", params];
        assert_eq!(key.to_string(), "[projects,{page:1}]");
    }

    #[test]
    fn serializes_as_plain_json_array() {
        let key = query_key!["projects", 3_i64, true];
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json, serde_json::json!(["projects", 3, true]));
    }
}

//! Opaque row identifier.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Identifier of a chat or message row.
///
/// Tables may use UUID or bigint identity keys. The id is kept as text
/// either way; integer ids serialize back as JSON numbers so filters and
/// inserts round-trip with the column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_integer(&self) -> Option<i64> {
        if self.0.starts_with('0') && self.0.len() > 1 {
            return None;
        }
        self.0.parse().ok()
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for RowId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl Serialize for RowId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_integer() {
            Some(n) => serializer.serialize_i64(n),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RowId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowIdVisitor;

        impl de::Visitor<'_> for RowIdVisitor {
            type Value = RowId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer row id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RowId, E> {
                Ok(RowId(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<RowId, E> {
                Ok(RowId(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RowId, E> {
                Ok(RowId(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RowId, E> {
                Ok(RowId(v.to_string()))
            }
        }

        deserializer.deserialize_any(RowIdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_string_and_integer() {
        let a: RowId = serde_json::from_value(json!("7b1c0f4e-0000-4000-8000-000000000001")).unwrap();
        assert_eq!(a.as_str(), "7b1c0f4e-0000-4000-8000-000000000001");

        let b: RowId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(b.as_str(), "42");
    }

    #[test]
    fn test_integer_ids_serialize_as_numbers() {
        assert_eq!(serde_json::to_value(RowId::from(42)).unwrap(), json!(42));
        assert_eq!(serde_json::to_value(RowId::from("abc")).unwrap(), json!("abc"));
        assert_eq!(serde_json::to_value(RowId::from("007")).unwrap(), json!("007"));
    }
}

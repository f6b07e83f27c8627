use std::collections::BTreeMap;

/// Loosely-typed property tree handed back by host accessors.
///
/// Hosts report runtime state as scalars at leaf paths and string-keyed
/// trees for structured lookups; `Value` covers both without committing to
/// a schema. Uses `BTreeMap` for deterministic iteration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent or explicitly null value.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Signed 64-bit integer scalar.
    Int(i64),
    /// 64-bit IEEE 754 floating-point scalar.
    Float(f64),
    /// UTF-8 string scalar.
    String(String),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// String-keyed subtree.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the string slice if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer value.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the integer as unsigned if this is a non-negative integer.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Returns the boolean if this is a boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the underlying map if this is a subtree.
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Converts the tree into a `serde_json::Value`.
    ///
    /// Non-finite floats have no JSON representation and become null.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::Number((*i).into()),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from(7i64).as_i64(), Some(7));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert!(Value::Null.as_str().is_none());
        assert!(Value::from("x").as_i64().is_none());
    }

    #[test]
    fn as_u64_rejects_negative() {
        assert_eq!(Value::Int(42).as_u64(), Some(42));
        assert_eq!(Value::Int(-1).as_u64(), None);
    }

    #[test]
    fn to_json_preserves_structure() {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), Value::from("reviews"));
        let mut tree = BTreeMap::new();
        tree.insert("NAME".to_string(), Value::from("reviews-v1"));
        tree.insert("LABELS".to_string(), Value::Map(labels));
        tree.insert("PORT".to_string(), Value::from(9080i64));

        let json = Value::Map(tree).to_json();
        assert_eq!(json["NAME"], "reviews-v1");
        assert_eq!(json["LABELS"]["app"], "reviews");
        assert_eq!(json["PORT"], 9080);
    }

    #[test]
    fn to_json_maps_non_finite_float_to_null() {
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
    }
}

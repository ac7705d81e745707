use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{IndexError, Metadata};

const EQ_OPERATOR: &str = "$eq";

/// Conjunction of per-field equality conditions.
///
/// An empty filter matches every entry. Keys are kept sorted so the
/// rendered wire form is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, Value>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.conditions.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }

    /// Every condition must be present in `metadata` with an equal value.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions.iter().all(|(key, expected)| {
            metadata
                .get(key)
                .is_some_and(|actual| values_equal(actual, expected))
        })
    }

    /// Parse `{"field": value}` or `{"field": {"$eq": value}}`.
    pub fn from_json(value: &Value) -> Result<Self, IndexError> {
        let object = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(object) => object,
            _ => {
                return Err(IndexError::InvalidFilter(
                    "filter must be an object".to_string(),
                ))
            }
        };

        let mut filter = Self::new();
        for (key, condition) in object {
            let expected = match condition {
                Value::Object(ops) => parse_operator(key, ops)?,
                Value::Array(_) | Value::Null => {
                    return Err(IndexError::InvalidFilter(format!(
                        "unsupported value for '{}'",
                        key
                    )))
                }
                other => other.clone(),
            };
            filter.conditions.insert(key.clone(), expected);
        }
        Ok(filter)
    }

    /// Render in the `$eq` form used on the wire.
    pub fn to_json(&self) -> Value {
        let rendered: Map<String, Value> = self
            .conditions
            .iter()
            .map(|(key, value)| {
                let mut condition = Map::new();
                condition.insert(EQ_OPERATOR.to_string(), value.clone());
                (key.clone(), Value::Object(condition))
            })
            .collect();
        Value::Object(rendered)
    }
}

fn parse_operator(key: &str, ops: &Map<String, Value>) -> Result<Value, IndexError> {
    if ops.len() != 1 {
        return Err(IndexError::InvalidFilter(format!(
            "'{}' must have exactly one operator",
            key
        )));
    }
    match ops.get(EQ_OPERATOR) {
        Some(value) if !value.is_object() && !value.is_array() && !value.is_null() => {
            Ok(value.clone())
        }
        Some(_) => Err(IndexError::InvalidFilter(format!(
            "unsupported $eq operand for '{}'",
            key
        ))),
        None => Err(IndexError::InvalidFilter(format!(
            "unsupported operator for '{}': only $eq is allowed",
            key
        ))),
    }
}

/// Numbers compare by value so `0` and `0.0` agree, matching how a
/// JSON-backed remote store treats them.
fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

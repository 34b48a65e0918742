//! Row and value types for query results.
//!
//! The engine boundary speaks a small sum type instead of dynamic JSON:
//! converters pattern-match [`Value`] rather than inspecting field shapes at
//! runtime. Timestamps normalize to epoch-nanosecond integers at this
//! boundary; the typed extractors turn them back into `chrono` types.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value as JsonValue;

use crate::error::MemoryError;

/// Parameters for Cypher queries, bound by name.
pub type Params = HashMap<String, Value>;

/// A single value returned by (or bound into) the graph engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Calendar date without a time component.
    Date(NaiveDate),
    /// Epoch nanoseconds, UTC.
    Timestamp(i64),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Node(Node),
    Rel(Rel),
    Path(Path),
}

/// A graph node (vertex) with its label and properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    pub label: String,
    pub properties: BTreeMap<String, Value>,
}

impl Node {
    /// Gets a property value by name, converting to the requested type.
    pub fn get<T: FromValue>(&self, key: &str) -> Result<T, MemoryError> {
        match self.properties.get(key) {
            Some(v) => T::from_value(v)
                .map_err(|e| MemoryError::Internal(format!("property '{key}': {e}"))),
            None => Err(MemoryError::Internal(format!("property not found: {key}"))),
        }
    }

    /// Gets a property value, returning `None` when absent or null.
    pub fn get_opt<T: FromValue>(&self, key: &str) -> Result<Option<T>, MemoryError> {
        match self.properties.get(key) {
            Some(Value::Null) | None => Ok(None),
            Some(v) => T::from_value(v)
                .map(Some)
                .map_err(|e| MemoryError::Internal(format!("property '{key}': {e}"))),
        }
    }
}

/// A directed relationship (edge) between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Rel {
    pub label: String,
    /// Engine-internal id of the source node, formatted `table:offset`.
    pub from: String,
    /// Engine-internal id of the destination node.
    pub to: String,
    pub properties: BTreeMap<String, Value>,
}

/// A path through the graph: nodes in traversal order plus the edges between them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub rels: Vec<Rel>,
}

impl Path {
    /// Number of relationships in the path (path length).
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }
}

impl Value {
    /// Lossy conversion to JSON for heterogeneous tool results.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int64(i) => JsonValue::Number((*i).into()),
            Value::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Bytes(b) => JsonValue::String(format!("0x{}", hex_encode(b))),
            Value::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(nanos) => JsonValue::String(
                timestamp_from_nanos(*nanos)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| nanos.to_string()),
            ),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Node(node) => {
                let mut obj = serde_json::Map::new();
                obj.insert("label".into(), JsonValue::String(node.label.clone()));
                obj.insert(
                    "properties".into(),
                    JsonValue::Object(
                        node.properties
                            .iter()
                            .map(|(k, v)| (k.clone(), v.to_json()))
                            .collect(),
                    ),
                );
                JsonValue::Object(obj)
            }
            Value::Rel(rel) => {
                let mut obj = serde_json::Map::new();
                obj.insert("label".into(), JsonValue::String(rel.label.clone()));
                obj.insert("from".into(), JsonValue::String(rel.from.clone()));
                obj.insert("to".into(), JsonValue::String(rel.to.clone()));
                JsonValue::Object(obj)
            }
            Value::Path(path) => {
                let mut obj = serde_json::Map::new();
                obj.insert(
                    "nodes".into(),
                    JsonValue::Array(
                        path.nodes
                            .iter()
                            .map(|n| Value::Node(n.clone()).to_json())
                            .collect(),
                    ),
                );
                obj.insert("length".into(), JsonValue::Number(path.len().into()));
                JsonValue::Object(obj)
            }
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Builds a UTC datetime from epoch nanoseconds.
pub fn timestamp_from_nanos(nanos: i64) -> Option<DateTime<Utc>> {
    let secs = nanos.div_euclid(1_000_000_000);
    let subsec = nanos.rem_euclid(1_000_000_000) as u32;
    Utc.timestamp_opt(secs, subsec).single()
}

/// Conversion from an engine [`Value`] into a typed domain value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, MemoryError>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, MemoryError> {
        Ok(value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, MemoryError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Int64(i) => Ok(i.to_string()),
            Value::Float64(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Date(d) => Ok(d.format("%Y-%m-%d").to_string()),
            other => Err(MemoryError::Internal(format!(
                "expected string, got {other:?}"
            ))),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, MemoryError> {
        match value {
            Value::Int64(i) => Ok(*i),
            Value::Float64(f) => Ok(*f as i64),
            Value::String(s) => s
                .parse()
                .map_err(|_| MemoryError::Internal(format!("expected integer, got '{s}'"))),
            other => Err(MemoryError::Internal(format!(
                "expected integer, got {other:?}"
            ))),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, MemoryError> {
        match value {
            Value::Float64(f) => Ok(*f),
            Value::Int64(i) => Ok(*i as f64),
            other => Err(MemoryError::Internal(format!(
                "expected float, got {other:?}"
            ))),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, MemoryError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(MemoryError::Internal(format!(
                "expected bool, got {other:?}"
            ))),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, MemoryError> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::Timestamp(nanos) => timestamp_from_nanos(*nanos)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| MemoryError::Internal("timestamp out of range".into())),
            Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| MemoryError::Internal(format!("expected date, got '{s}'"))),
            other => Err(MemoryError::Internal(format!(
                "expected date, got {other:?}"
            ))),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, MemoryError> {
        match value {
            Value::Timestamp(nanos) => timestamp_from_nanos(*nanos)
                .ok_or_else(|| MemoryError::Internal("timestamp out of range".into())),
            // Bare integers from the engine are epoch microseconds.
            Value::Int64(micros) => timestamp_from_nanos(micros.saturating_mul(1_000))
                .ok_or_else(|| MemoryError::Internal("timestamp out of range".into())),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| MemoryError::Internal(format!("expected timestamp, got '{s}'"))),
            Value::Date(d) => Ok(Utc.from_utc_datetime(
                &d.and_hms_opt(0, 0, 0)
                    .ok_or_else(|| MemoryError::Internal("invalid date".into()))?,
            )),
            other => Err(MemoryError::Internal(format!(
                "expected timestamp, got {other:?}"
            ))),
        }
    }
}

/// List fields read as arrays-of-string; single scalars promote to
/// one-element arrays.
impl FromValue for Vec<String> {
    fn from_value(value: &Value) -> Result<Self, MemoryError> {
        match value {
            Value::List(items) => items.iter().map(String::from_value).collect(),
            Value::Null => Ok(Vec::new()),
            scalar => Ok(vec![String::from_value(scalar)?]),
        }
    }
}

impl FromValue for Node {
    fn from_value(value: &Value) -> Result<Self, MemoryError> {
        match value {
            Value::Node(node) => Ok(node.clone()),
            other => Err(MemoryError::Internal(format!(
                "expected node, got {other:?}"
            ))),
        }
    }
}

impl FromValue for Path {
    fn from_value(value: &Value) -> Result<Self, MemoryError> {
        match value {
            Value::Path(path) => Ok(path.clone()),
            other => Err(MemoryError::Internal(format!(
                "expected path, got {other:?}"
            ))),
        }
    }
}

/// A single row from a query result.
///
/// Rows are always fully materialized; callers never see an engine cursor.
#[derive(Debug, Clone, Default)]
pub struct Row {
    data: HashMap<String, Value>,
}

impl Row {
    pub fn new(data: HashMap<String, Value>) -> Self {
        Self { data }
    }

    /// Gets a value from the row by column name, converting to the requested type.
    pub fn get<T: FromValue>(&self, key: &str) -> Result<T, MemoryError> {
        match self.data.get(key) {
            Some(v) => {
                T::from_value(v).map_err(|e| MemoryError::Internal(format!("column '{key}': {e}")))
            }
            None => Err(MemoryError::Internal(format!("column not found: {key}"))),
        }
    }

    /// Gets a value from the row, returning `None` when absent or null.
    pub fn get_opt<T: FromValue>(&self, key: &str) -> Result<Option<T>, MemoryError> {
        match self.data.get(key) {
            Some(Value::Null) | None => Ok(None),
            Some(v) => T::from_value(v)
                .map(Some)
                .map_err(|e| MemoryError::Internal(format!("column '{key}': {e}"))),
        }
    }

    /// Returns the raw value for a column, if present.
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Lossy conversion of the whole row to a JSON object.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl From<HashMap<String, Value>> for Row {
    fn from(data: HashMap<String, Value>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_of(pairs: Vec<(&str, Value)>) -> Row {
        Row::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    #[test]
    fn test_row_get_string() {
        let row = row_of(vec![("name", Value::String("test".into()))]);
        let name: String = row.get("name").unwrap();
        assert_eq!(name, "test");
    }

    #[test]
    fn test_row_get_missing_key() {
        let row = Row::default();
        let result: Result<String, _> = row.get("missing");
        assert!(result.is_err());
    }

    #[test]
    fn test_row_get_opt_null() {
        let row = row_of(vec![("name", Value::Null)]);
        let name: Option<String> = row.get_opt("name").unwrap();
        assert_eq!(name, None);
    }

    #[test]
    fn test_timestamp_from_nanos_roundtrip() {
        let dt: DateTime<Utc> = "2025-06-01T12:30:00Z".parse().unwrap();
        let nanos = dt.timestamp_nanos_opt().unwrap();
        let back: DateTime<Utc> = DateTime::from_value(&Value::Timestamp(nanos)).unwrap();
        assert_eq!(back, dt);
    }

    #[test]
    fn test_timestamp_from_microsecond_integer() {
        // Engines sometimes hand back bare microsecond integers.
        let dt: DateTime<Utc> = "2025-06-01T12:30:00Z".parse().unwrap();
        let micros = dt.timestamp_nanos_opt().unwrap() / 1_000;
        let back: DateTime<Utc> = DateTime::from_value(&Value::Int64(micros)).unwrap();
        assert_eq!(back, dt);
    }

    #[test]
    fn test_timestamp_from_string() {
        let back: DateTime<Utc> =
            DateTime::from_value(&Value::String("2025-06-01T12:30:00+00:00".into())).unwrap();
        assert_eq!(back.to_rfc3339(), "2025-06-01T12:30:00+00:00");
    }

    #[test]
    fn test_date_normalizes_to_iso_string() {
        let d = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let s: String = String::from_value(&Value::Date(d)).unwrap();
        assert_eq!(s, "2025-06-01");
    }

    #[test]
    fn test_scalar_promotes_to_single_element_list() {
        let list: Vec<String> = Vec::from_value(&Value::String("only".into())).unwrap();
        assert_eq!(list, vec!["only".to_string()]);
    }

    #[test]
    fn test_null_list_is_empty() {
        let list: Vec<String> = Vec::from_value(&Value::Null).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_list_of_strings() {
        let list: Vec<String> = Vec::from_value(&Value::List(vec![
            Value::String("a".into()),
            Value::String("b".into()),
        ]))
        .unwrap();
        assert_eq!(list, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_node_property_extraction() {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Value::String("comp-1".into()));
        properties.insert("count".to_string(), Value::Int64(42));
        let node = Node {
            label: "Component".into(),
            properties,
        };

        let row = row_of(vec![("n", Value::Node(node))]);
        let node: Node = row.get("n").unwrap();
        assert_eq!(node.label, "Component");
        let id: String = node.get("id").unwrap();
        assert_eq!(id, "comp-1");
        let count: i64 = node.get("count").unwrap();
        assert_eq!(count, 42);
    }

    #[test]
    fn test_path_length() {
        let path = Path {
            nodes: vec![Node::default(), Node::default()],
            rels: vec![Rel {
                label: "DEPENDS_ON".into(),
                from: "0:0".into(),
                to: "0:1".into(),
                properties: BTreeMap::new(),
            }],
        };
        assert_eq!(path.len(), 1);
        assert!(!path.is_empty());
    }

    #[test]
    fn test_to_json_shapes() {
        let row = row_of(vec![
            ("n", Value::Int64(1)),
            ("s", Value::String("x".into())),
        ]);
        let json = row.to_json();
        assert_eq!(json["n"], 1);
        assert_eq!(json["s"], "x");
    }
}

//! Dynamic values of a bound object graph.
//!
//! Composite values share their storage: cloning a [`Value::Map`] clones a
//! handle, so a mutation through any pointer is visible to every holder of
//! the graph.
use core::fmt;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::document::DocNode;
use crate::error::EvalError;

/// Interior-mutable shared storage.
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Shared(Arc::new(RwLock::new(value)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read().fmt(f)
    }
}

/// A bean-like object with a fixed set of named properties.
pub trait Record: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &str;

    /// Property names in declaration order.
    fn property_names(&self) -> Vec<String>;

    fn get(&self, name: &str) -> Option<Value>;

    fn set(&self, name: &str, value: Value) -> Result<(), EvalError>;
}

/// [`Record`] with a fixed property list backed by a lock.
#[derive(Debug)]
pub struct FieldRecord {
    type_name: String,
    fields: RwLock<Vec<(String, Value)>>,
}

impl FieldRecord {
    pub fn new<I, K>(type_name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        FieldRecord {
            type_name: type_name.to_string(),
            fields: RwLock::new(fields.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Record(Arc::new(self))
    }
}

impl Record for FieldRecord {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn property_names(&self) -> Vec<String> {
        let fields = self.fields.read().unwrap_or_else(PoisonError::into_inner);
        fields.iter().map(|(name, _)| name.clone()).collect()
    }

    fn get(&self, name: &str) -> Option<Value> {
        let fields = self.fields.read().unwrap_or_else(PoisonError::into_inner);
        fields.iter().find(|(field, _)| field == name).map(|(_, value)| value.clone())
    }

    fn set(&self, name: &str, value: Value) -> Result<(), EvalError> {
        let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
        match fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, slot)) => {
                *slot = value;
                Ok(())
            }
            None => Err(EvalError::ReadOnly(format!(
                "{} has no property '{name}'",
                self.type_name
            ))),
        }
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Shared<Vec<Value>>),
    Map(Shared<BTreeMap<String, Value>>),
    Record(Arc<dyn Record>),
    Node(DocNode),
    /// Mutable single-value container.
    Cell(Shared<Value>),
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Shared::new(items.into_iter().collect()))
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Shared::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()))
    }

    pub fn empty_map() -> Self {
        Value::Map(Shared::new(BTreeMap::new()))
    }

    pub fn cell(value: Value) -> Self {
        Value::Cell(Shared::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Address of shared storage, `0` for scalars.
    pub fn identity(&self) -> usize {
        match self {
            Value::List(list) => list.identity(),
            Value::Map(map) => map.identity(),
            Value::Record(record) => Arc::as_ptr(record).cast::<()>() as usize,
            Value::Node(node) => node.identity(),
            Value::Cell(cell) => cell.identity(),
            Value::Opaque(any) => Arc::as_ptr(any).cast::<()>() as usize,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => 0,
        }
    }

    /// Short type description used in conversion errors.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(_) => "boolean".into(),
            Value::Number(_) => "number".into(),
            Value::String(_) => "string".into(),
            Value::List(_) => "list".into(),
            Value::Map(_) => "map".into(),
            Value::Record(record) => format!("record {}", record.type_name()),
            Value::Node(_) => "node".into(),
            Value::Cell(_) => "cell".into(),
            Value::Opaque(_) => "opaque".into(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String coercion: numbers print without a trailing `.0`, sequences use
    /// their first item, nodes their text content.
    pub fn string_value(&self) -> String {
        match self {
            Value::Null | Value::Map(_) | Value::Record(_) | Value::Opaque(_) => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::List(list) => list.read().first().map(Value::string_value).unwrap_or_default(),
            Value::Node(node) => node.string_value(),
            Value::Cell(cell) => cell.read().string_value(),
        }
    }

    pub fn number_value(&self) -> f64 {
        match self {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::List(list) => list.read().first().map_or(f64::NAN, Value::number_value),
            Value::Node(node) => parse_number(&node.string_value()),
            Value::Cell(cell) => cell.read().number_value(),
            Value::Null | Value::Map(_) | Value::Record(_) | Value::Opaque(_) => f64::NAN,
        }
    }

    pub fn boolean_value(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(list) => !list.read().is_empty(),
            Value::Cell(cell) => cell.read().boolean_value(),
            Value::Map(_) | Value::Record(_) | Value::Node(_) | Value::Opaque(_) => true,
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::list(items.iter().map(Value::from_json)),
            serde_json::Value::Object(entries) => {
                Value::map(entries.iter().map(|(k, v)| (k.clone(), Value::from_json(v))))
            }
        }
    }

    /// Snapshot as JSON. Records become objects, nodes their text content,
    /// opaque values `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Opaque(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => json_number(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(list) => {
                serde_json::Value::Array(list.read().iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.read().iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Record(record) => serde_json::Value::Object(
                record
                    .property_names()
                    .into_iter()
                    .map(|name| {
                        let value = record.get(&name).unwrap_or_default().to_json();
                        (name, value)
                    })
                    .collect(),
            ),
            Value::Node(node) => serde_json::Value::String(node.string_value()),
            Value::Cell(cell) => cell.read().to_json(),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn json_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// XPath 1.0 number formatting.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == 0.0 {
        "0".into()
    } else if n.fract() == 0.0 && n.abs() < 1.0e15 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

/// XPath 1.0 string-to-number: optional minus, digits, optional fraction.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let well_formed = !digits.is_empty()
        && digits != "."
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1;
    if well_formed { trimmed.parse().unwrap_or(f64::NAN) } else { f64::NAN }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.ptr_eq(b) || *a.read() == *b.read(),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b) || *a.read() == *b.read(),
            (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b),
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Cell(a), Value::Cell(b)) => a.ptr_eq(b) || *a.read() == *b.read(),
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::List(list) => f.debug_tuple("List").field(list).finish(),
            Value::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Value::Record(record) => f.debug_tuple("Record").field(record).finish(),
            Value::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Value::Cell(cell) => f.debug_tuple("Cell").field(cell).finish(),
            Value::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Number(n) => f.write_str(&format_number(*n)),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DocNode> for Value {
    fn from(node: DocNode) -> Self {
        Value::Node(node)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items.into_iter().map(Into::into))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_format_like_xpath() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn string_to_number_rejects_exponents() {
        assert_eq!(parse_number(" 12.5 "), 12.5);
        assert_eq!(parse_number("-3"), -3.0);
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("").is_nan());
    }

    #[test]
    fn composite_clones_share_storage() {
        let map = Value::map([("a", Value::from(1))]);
        let alias = map.clone();
        if let Value::Map(shared) = &alias {
            shared.write().insert("b".into(), Value::from(2));
        }
        assert_eq!(map.identity(), alias.identity());
        assert_eq!(map.to_json(), serde_json::json!({"a": 1, "b": 2}));
    }
}

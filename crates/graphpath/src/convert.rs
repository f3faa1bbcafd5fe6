//! Conversion of query results to caller-requested types.
use core::fmt;

use crate::error::EvalError;
use crate::value::{Value, parse_number};

/// Type a caller asks a result to be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    Bool,
    Number,
    /// A number without fractional part.
    Integer,
    String,
    List,
    Map,
    /// A detached deep copy in JSON shape.
    Json,
    Any,
}

impl TargetType {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetType::Bool => "boolean",
            TargetType::Number => "number",
            TargetType::Integer => "integer",
            TargetType::String => "string",
            TargetType::List => "list",
            TargetType::Map => "map",
            TargetType::Json => "json",
            TargetType::Any => "any",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait TypeConverter: Send + Sync + fmt::Debug {
    fn can_convert(&self, value: &Value, target: TargetType) -> bool;

    fn convert(&self, value: &Value, target: TargetType) -> Result<Value, EvalError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConverter;

impl TypeConverter for DefaultConverter {
    fn can_convert(&self, value: &Value, target: TargetType) -> bool {
        let value = unwrap_cell(value);
        match target {
            TargetType::Any | TargetType::Json => true,
            TargetType::Bool => match &value {
                Value::Bool(_) | Value::Number(_) => true,
                Value::String(s) => matches!(s.as_str(), "true" | "false"),
                _ => false,
            },
            TargetType::Number => match &value {
                Value::Bool(_) | Value::Number(_) => true,
                Value::String(s) => !parse_number(s).is_nan(),
                Value::Node(node) => !parse_number(&node.string_value()).is_nan(),
                _ => false,
            },
            TargetType::Integer => self.can_convert(&value, TargetType::Number)
                && value.number_value().fract() == 0.0,
            TargetType::String => matches!(
                value,
                Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Node(_)
            ),
            TargetType::List => !matches!(value, Value::Map(_) | Value::Record(_)),
            TargetType::Map => matches!(value, Value::Map(_) | Value::Record(_)),
        }
    }

    fn convert(&self, value: &Value, target: TargetType) -> Result<Value, EvalError> {
        if !self.can_convert(value, target) {
            return Err(EvalError::Type(format!("cannot convert {} to {target}", value.type_name())));
        }
        let value = unwrap_cell(value);
        Ok(match target {
            TargetType::Any => value,
            TargetType::Bool => match &value {
                Value::String(s) => Value::Bool(s == "true"),
                other => Value::Bool(other.boolean_value()),
            },
            TargetType::Number | TargetType::Integer => Value::Number(value.number_value()),
            TargetType::String => Value::String(value.string_value()),
            TargetType::List => match value {
                Value::List(_) => value,
                Value::Null => Value::list(Vec::new()),
                other => Value::list([other]),
            },
            TargetType::Map => match &value {
                Value::Record(_) => Value::from_json(&value.to_json()),
                _ => value,
            },
            TargetType::Json => Value::from_json(&value.to_json()),
        })
    }
}

fn unwrap_cell(value: &Value) -> Value {
    match value {
        Value::Cell(cell) => cell.read().clone(),
        other => other.clone(),
    }
}

/// Rust types a query result can be read as.
pub trait FromValue: Sized {
    const TARGET: TargetType;

    fn from_value(value: Value) -> Result<Self, EvalError>;
}

fn mismatch(value: &Value, target: TargetType) -> EvalError {
    EvalError::Type(format!("expected {target}, found {}", value.type_name()))
}

impl FromValue for Value {
    const TARGET: TargetType = TargetType::Any;

    fn from_value(value: Value) -> Result<Self, EvalError> {
        Ok(value)
    }
}

impl FromValue for bool {
    const TARGET: TargetType = TargetType::Bool;

    fn from_value(value: Value) -> Result<Self, EvalError> {
        value.as_bool().ok_or_else(|| mismatch(&value, Self::TARGET))
    }
}

impl FromValue for f64 {
    const TARGET: TargetType = TargetType::Number;

    fn from_value(value: Value) -> Result<Self, EvalError> {
        value.as_f64().ok_or_else(|| mismatch(&value, Self::TARGET))
    }
}

impl FromValue for i64 {
    const TARGET: TargetType = TargetType::Integer;

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> Result<Self, EvalError> {
        match value.as_f64() {
            Some(n) if n.fract() == 0.0 && n.abs() < 9.0e18 => Ok(n as i64),
            _ => Err(mismatch(&value, Self::TARGET)),
        }
    }
}

impl FromValue for String {
    const TARGET: TargetType = TargetType::String;

    fn from_value(value: Value) -> Result<Self, EvalError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch(&other, Self::TARGET)),
        }
    }
}

impl FromValue for Vec<Value> {
    const TARGET: TargetType = TargetType::List;

    fn from_value(value: Value) -> Result<Self, EvalError> {
        match &value {
            Value::List(list) => Ok(list.read().clone()),
            _ => Err(mismatch(&value, Self::TARGET)),
        }
    }
}

impl FromValue for serde_json::Value {
    const TARGET: TargetType = TargetType::Json;

    fn from_value(value: Value) -> Result<Self, EvalError> {
        Ok(value.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_convert_to_bool_only_when_literal() {
        let conv = DefaultConverter;
        assert!(conv.can_convert(&Value::from("true"), TargetType::Bool));
        assert!(!conv.can_convert(&Value::from("yes"), TargetType::Bool));
        assert_eq!(conv.convert(&Value::from("false"), TargetType::Bool).expect("bool"), Value::Bool(false));
    }

    #[test]
    fn integers_reject_fractions() {
        let conv = DefaultConverter;
        assert!(conv.can_convert(&Value::from("12"), TargetType::Integer));
        assert!(!conv.can_convert(&Value::from(1.5), TargetType::Integer));
        assert!(i64::from_value(Value::from(1.5)).is_err());
        assert_eq!(i64::from_value(Value::from(-4)).expect("int"), -4);
    }

    #[test]
    fn json_copies_are_detached() {
        let original = Value::map([("a", Value::from(1))]);
        let copy = DefaultConverter.convert(&original, TargetType::Json).expect("json");
        if let Value::Map(map) = &copy {
            map.write().insert("b".into(), Value::from(2));
        }
        assert_eq!(original.to_json(), serde_json::json!({ "a": 1 }));
    }
}

//! Values
//!
//! Wrapped functions may return arbitrary data, so the graph stores results
//! in a single tagged [`Value`] type. This keeps every node homogeneous
//! regardless of which function it wraps.
//!
//! Functions receive their resolved arguments as an [`Args`] view. Because no
//! signature checking happens when a node is built, the typed accessors on
//! [`Args`] are where argument mismatches surface, as an [`ArgError`].

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A dynamically typed value flowing through the graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// No value (the result of a function run purely for its side effects).
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Short name of the variant, used in mismatch diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value. Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    /// Render the value as it appears nested inside a list or map, where
    /// strings are quoted.
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            other => fmt::Display::fmt(other, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?}: ")?;
                    item.fmt_nested(f)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::List(iter.into_iter().collect())
    }
}

/// Identifies one argument slot of a wrapped function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Position(usize),
    Name(String),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Position(i) => write!(f, "argument {i}"),
            Slot::Name(name) => write!(f, "argument `{name}`"),
        }
    }
}

/// An argument could not be read with the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    #[error("{slot} is missing")]
    Missing { slot: Slot },

    #[error("{slot} has type {found}, expected {expected}")]
    TypeMismatch {
        slot: Slot,
        expected: &'static str,
        found: &'static str,
    },
}

/// Fully resolved arguments handed to a wrapped function.
///
/// Every `Reference` binding has already been replaced by the value of the
/// node it points at, so a function only ever sees plain values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    named: IndexMap<String, Value>,
}

impl Args {
    pub fn new(positional: Vec<Value>, named: IndexMap<String, Value>) -> Self {
        Self { positional, named }
    }

    /// Number of positional arguments.
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named(&self) -> &IndexMap<String, Value> {
        &self.named
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// The positional argument at `index`, or [`ArgError::Missing`].
    pub fn value(&self, index: usize) -> Result<&Value, ArgError> {
        self.positional.get(index).ok_or(ArgError::Missing {
            slot: Slot::Position(index),
        })
    }

    /// The named argument `name`, or [`ArgError::Missing`].
    pub fn named_value(&self, name: &str) -> Result<&Value, ArgError> {
        self.named.get(name).ok_or_else(|| ArgError::Missing {
            slot: Slot::Name(name.to_string()),
        })
    }

    pub fn int(&self, index: usize) -> Result<i64, ArgError> {
        let value = self.value(index)?;
        value
            .as_int()
            .ok_or_else(|| mismatch(Slot::Position(index), "int", value))
    }

    pub fn float(&self, index: usize) -> Result<f64, ArgError> {
        let value = self.value(index)?;
        value
            .as_float()
            .ok_or_else(|| mismatch(Slot::Position(index), "float", value))
    }

    pub fn bool(&self, index: usize) -> Result<bool, ArgError> {
        let value = self.value(index)?;
        value
            .as_bool()
            .ok_or_else(|| mismatch(Slot::Position(index), "bool", value))
    }

    pub fn str(&self, index: usize) -> Result<&str, ArgError> {
        let value = self.value(index)?;
        value
            .as_str()
            .ok_or_else(|| mismatch(Slot::Position(index), "str", value))
    }

    pub fn list(&self, index: usize) -> Result<&[Value], ArgError> {
        let value = self.value(index)?;
        value
            .as_list()
            .ok_or_else(|| mismatch(Slot::Position(index), "list", value))
    }

    pub fn named_int(&self, name: &str) -> Result<i64, ArgError> {
        let value = self.named_value(name)?;
        value
            .as_int()
            .ok_or_else(|| mismatch(Slot::Name(name.to_string()), "int", value))
    }

    pub fn named_float(&self, name: &str) -> Result<f64, ArgError> {
        let value = self.named_value(name)?;
        value
            .as_float()
            .ok_or_else(|| mismatch(Slot::Name(name.to_string()), "float", value))
    }

    pub fn named_str(&self, name: &str) -> Result<&str, ArgError> {
        let value = self.named_value(name)?;
        value
            .as_str()
            .ok_or_else(|| mismatch(Slot::Name(name.to_string()), "str", value))
    }
}

fn mismatch(slot: Slot, expected: &'static str, found: &Value) -> ArgError {
    ArgError::TypeMismatch {
        slot,
        expected,
        found: found.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_display_matches_literal_syntax() {
        let value = Value::from(vec![3, 6, 10, 10]);
        assert_eq!(value.to_string(), "[3, 6, 10, 10]");

        let mixed = Value::List(vec![Value::from("a"), Value::Float(1.0), Value::Unit]);
        assert_eq!(mixed.to_string(), "[\"a\", 1.0, ()]");
    }

    #[test]
    fn map_display_quotes_keys() {
        let mut map = IndexMap::new();
        map.insert("total".to_string(), Value::Int(11));
        map.insert("label".to_string(), Value::from("sum"));
        assert_eq!(Value::Map(map).to_string(), "{\"total\": 11, \"label\": \"sum\"}");
    }

    #[test]
    fn float_accessor_widens_ints() {
        assert_eq!(Value::Int(4).as_float(), Some(4.0));
        assert_eq!(Value::Float(2.5).as_int(), None);
    }

    #[test]
    fn typed_accessors_report_mismatches() {
        let mut named = IndexMap::new();
        named.insert("scale".to_string(), Value::from("big"));
        let args = Args::new(vec![Value::Int(1), Value::from("two")], named);

        assert_eq!(args.int(0), Ok(1));
        assert_eq!(
            args.int(1),
            Err(ArgError::TypeMismatch {
                slot: Slot::Position(1),
                expected: "int",
                found: "str",
            })
        );
        assert_eq!(
            args.int(2),
            Err(ArgError::Missing {
                slot: Slot::Position(2)
            })
        );
        assert_eq!(args.named_str("scale"), Ok("big"));
        assert!(matches!(
            args.named_float("scale"),
            Err(ArgError::TypeMismatch { .. })
        ));
        assert_eq!(
            args.named_int("offset").unwrap_err().to_string(),
            "argument `offset` is missing"
        );
    }

    #[test]
    fn untagged_json_form() {
        let value = Value::from(vec![Value::Int(3), Value::Unit, Value::Bool(true)]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "[3,null,true]");

        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}

//! Dependency Values
//!
//! Values that can appear in a dependency list or a node's state.
//!
//! # Equality
//!
//! Primitives compare by value. Composites (records and sequences) compare
//! by identity: every call to [`DepValue::record`] or [`DepValue::sequence`]
//! creates a new identity, even when the contents are equal, while cloning a
//! composite keeps the identity. Holding on to a clone is how a caller
//! "pre-memoizes" a composite so it stops re-triggering effects.
//!
//! Floats use same-value semantics: `NaN` equals `NaN`, `+0.0` does not
//! equal `-0.0`.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;
use smallvec::SmallVec;

/// A comparable dependency value.
#[derive(Clone, Debug, Default)]
pub enum DepValue {
    /// A key that no node defines.
    #[default]
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    /// A record or sequence, compared by identity.
    Composite(Arc<Value>),
}

impl DepValue {
    /// A fresh record identity wrapping the given JSON object or value.
    pub fn record(contents: Value) -> Self {
        DepValue::Composite(Arc::new(contents))
    }

    /// A fresh sequence identity.
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        DepValue::Composite(Arc::new(Value::Array(items.into_iter().collect())))
    }

    /// Same-value comparison used for dependency snapshots.
    pub fn same_value(&self, other: &DepValue) -> bool {
        match (self, other) {
            (DepValue::Undefined, DepValue::Undefined) => true,
            (DepValue::Bool(a), DepValue::Bool(b)) => a == b,
            (DepValue::Int(a), DepValue::Int(b)) => a == b,
            (DepValue::Float(a), DepValue::Float(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (DepValue::Str(a), DepValue::Str(b)) => a == b,
            (DepValue::Composite(a), DepValue::Composite(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, DepValue::Composite(_))
    }

    /// JSON view of the value, used for logs and fixtures.
    pub fn to_json(&self) -> Value {
        match self {
            DepValue::Undefined => Value::Null,
            DepValue::Bool(b) => Value::Bool(*b),
            DepValue::Int(i) => Value::from(*i),
            DepValue::Float(f) => Value::from(*f),
            DepValue::Str(s) => Value::String(s.to_string()),
            DepValue::Composite(v) => v.as_ref().clone(),
        }
    }
}

impl PartialEq for DepValue {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Display for DepValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepValue::Undefined => f.write_str("undefined"),
            DepValue::Bool(b) => write!(f, "{b}"),
            DepValue::Int(i) => write!(f, "{i}"),
            DepValue::Float(x) => write!(f, "{x}"),
            DepValue::Str(s) => write!(f, "{s:?}"),
            DepValue::Composite(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for DepValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Converts fixture JSON. Objects and arrays become fresh composites.
impl From<Value> for DepValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DepValue::Undefined,
            Value::Bool(b) => DepValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => DepValue::Int(i),
                None => DepValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => DepValue::Str(s.into()),
            composite @ (Value::Array(_) | Value::Object(_)) => DepValue::record(composite),
        }
    }
}

impl From<bool> for DepValue {
    fn from(b: bool) -> Self {
        DepValue::Bool(b)
    }
}

impl From<i64> for DepValue {
    fn from(i: i64) -> Self {
        DepValue::Int(i)
    }
}

impl From<i32> for DepValue {
    fn from(i: i32) -> Self {
        DepValue::Int(i64::from(i))
    }
}

impl From<f64> for DepValue {
    fn from(x: f64) -> Self {
        DepValue::Float(x)
    }
}

impl From<&str> for DepValue {
    fn from(s: &str) -> Self {
        DepValue::Str(s.into())
    }
}

impl From<String> for DepValue {
    fn from(s: String) -> Self {
        DepValue::Str(s.into())
    }
}

/// Dependency values captured at an effect's last run, or a memo's last
/// computation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DependencySnapshot(SmallVec<[DepValue; 4]>);

impl DependencySnapshot {
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator<Item = DepValue>,
    {
        Self(values.into_iter().collect())
    }

    /// True when `values` matches this snapshot element-wise.
    ///
    /// A length change counts as a difference.
    pub fn matches(&self, values: &[DepValue]) -> bool {
        self.0.len() == values.len()
            && self.0.iter().zip(values).all(|(a, b)| a.same_value(b))
    }

    pub fn values(&self) -> &[DepValue] {
        &self.0
    }
}

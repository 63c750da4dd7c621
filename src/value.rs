//! The runtime value type carried by parameters.
//!
//! `spec.md` §3 names five concrete type tags plus a generic-object
//! escape hatch: integer, real, boolean, string, table-of-rows, and
//! generic-object. The first five round-trip through the dump/load
//! format (§4.5); the generic-object variant exists for block-internal
//! state that never needs to cross a `dump()` boundary.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::{Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// A single row of a table-of-rows value.
pub type Row = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    Integer,
    Real,
    Boolean,
    String,
    Table,
    Object,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamType::Integer => "integer",
            ParamType::Real => "real",
            ParamType::Boolean => "boolean",
            ParamType::String => "string",
            ParamType::Table => "table",
            ParamType::Object => "object",
        };
        f.write_str(s)
    }
}

#[derive(Clone)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Bool(bool),
    Str(String),
    Table(Vec<Row>),
    /// Block-internal generic state. Never produced by `dump()`/
    /// `load_dag()`; assigning one to a parameter whose spec requires
    /// `Table`/`Integer`/etc. fails validation, same as any other
    /// type mismatch.
    Object(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn param_type(&self) -> Option<ParamType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ParamType::Integer),
            Value::Real(_) => Some(ParamType::Real),
            Value::Bool(_) => Some(ParamType::Boolean),
            Value::Str(_) => Some(ParamType::String),
            Value::Table(_) => Some(ParamType::Table),
            Value::Object(_) => Some(ParamType::Object),
        }
    }

    /// `Null` is the "no value yet" placeholder and is assignment
    /// compatible with every declared type, so a parameter can be left
    /// at its `Value::Null` default before anything ever sets it.
    pub fn matches(&self, ty: &ParamType) -> bool {
        match self.param_type() {
            None => true,
            Some(actual) => actual == *ty,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&[Row]> {
        match self {
            Value::Table(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_object<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Object(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn object<T: Send + Sync + 'static>(val: T) -> Self {
        Value::Object(Arc::new(val))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Real(v) => write!(f, "Real({v})"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Table(v) => write!(f, "Table({} rows)", v.len()),
            Value::Object(_) => write!(f, "Object(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            // Object values are never meaningfully comparable; treat
            // distinct instances as unequal, as Python would for two
            // unrelated objects without a custom __eq__.
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Real(v) => serializer.serialize_f64(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Str(v) => serializer.serialize_str(v),
            Value::Table(rows) => {
                let mut seq = serializer.serialize_seq(Some(rows.len()))?;
                for row in rows {
                    seq.serialize_element(&RowSer(row))?;
                }
                seq.end()
            }
            Value::Object(_) => Err(serde::ser::Error::custom(
                "generic-object parameter values cannot be serialized",
            )),
        }
    }
}

struct RowSer<'a>(&'a Row);

impl Serialize for RowSer<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a flowgraph parameter value")
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(Value::Null)
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Value::Int(v as i64))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Value::Real(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Value::Str(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
        Ok(Value::Str(v))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut rows = Vec::new();
        while let Some(row) = seq.next_element::<Row>()? {
            rows.push(row);
        }
        Ok(Value::Table(rows))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut row = Row::new();
        while let Some((k, v)) = map.next_entry::<String, Value>()? {
            row.insert(k, v);
        }
        Ok(Value::Table(vec![row]))
    }
}


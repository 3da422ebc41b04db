//! Dynamically typed record tree produced by schema decoding.
//!
//! A [`Record`] keeps a shared reference to the [`MessageSchema`] it was
//! decoded with, so later passes can reflect over field kinds, defaults and
//! enum tables without going back to the descriptors.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Message type name that gets the matrix-fill treatment instead of recursion.
pub const TRANSFORM_TYPE_NAME: &str = "TransformProto";

/// Code to symbolic name table of an enum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumTable {
    pub type_name: String,
    values: BTreeMap<i32, String>,
}

impl EnumTable {
    pub fn new(type_name: impl Into<String>, values: impl IntoIterator<Item = (i32, String)>) -> Self {
        let mut table = BTreeMap::new();
        for (code, name) in values {
            // Aliased codes resolve to the first declared name.
            table.entry(code).or_insert(name);
        }
        Self {
            type_name: type_name.into(),
            values: table,
        }
    }

    pub fn name(&self, code: i32) -> Option<&str> {
        self.values.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Declared kind of a field, as far as normalization cares.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar,
    Enum(Arc<EnumTable>),
    Message { type_name: String },
    /// A `TransformProto` whose matrix may need deriving from its type flags.
    Transform,
    Map,
}

/// Reflection metadata for one declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    pub repeated: bool,
    pub default: Value,
}

/// Reflection metadata for one message type.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSchema {
    pub full_name: String,
    pub fields: Vec<FieldSchema>,
    index: HashMap<String, usize>,
}

impl MessageSchema {
    pub fn new(full_name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.name.clone(), i))
            .collect();
        Self {
            full_name: full_name.into(),
            fields,
            index,
        }
    }

    /// Message name without its package.
    pub fn name(&self) -> &str {
        self.full_name
            .rsplit_once('.')
            .map_or(self.full_name.as_str(), |(_, name)| name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.field_index(name).map(|i| &self.fields[i])
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Record(Record),
}

impl Value {
    /// Whether the value counts as "not set" for display defaults.
    ///
    /// Zero, `NaN`, `false` and the empty string all qualify, not just `Null`.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(n) => *n == 0,
            Value::UInt(n) => *n == 0,
            Value::Float(f) => *f == 0.0 || f.is_nan(),
            Value::String(s) => s.is_empty(),
            Value::Bytes(_) | Value::List(_) | Value::Map(_) | Value::Record(_) => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            Value::UInt(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::UInt(n) => write!(f, "{n}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::List(items) => write!(f, "[{} items]", items.len()),
            Value::Map(entries) => write!(f, "{{{} entries}}", entries.len()),
            Value::Record(r) => write!(f, "{}", r.schema().name()),
        }
    }
}

/// A structured record: one value per declared field of its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<MessageSchema>,
    values: Vec<Value>,
}

impl Record {
    /// Builds a record, padding missing trailing fields with `Null`.
    pub fn new(schema: Arc<MessageSchema>, mut values: Vec<Value>) -> Self {
        values.resize(schema.fields.len(), Value::Null);
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<MessageSchema> {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.field_index(name).map(|i| &self.values[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.schema.field_index(name).map(|i| &mut self.values[i])
    }

    /// Stores `value` into a declared field. Returns false if the schema has
    /// no field called `name`.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Declared fields paired with their current values, in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldSchema, &Value)> {
        self.schema.fields.iter().zip(self.values.iter())
    }

    pub(crate) fn fields_mut(&mut self) -> (&MessageSchema, &mut [Value]) {
        (self.schema.as_ref(), self.values.as_mut_slice())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.fields() {
            map.serialize_entry(&field.name, value)?;
        }
        map.end()
    }
}

//! Field normalization over decoded record trees.
//!
//! Rewrites a tree in place for display:
//! - enum codes become their symbolic names
//! - with `apply_defaults`, falsy fields take their declared default
//! - `TransformProto` fields get their matrix filled in instead of being
//!   walked
//!
//! Elements of repeated fields are normalized one by one. Scalar elements,
//! repeated enum codes included, are left as they are.

use anyhow::Result;
use tracing::warn;

use crate::matrix::MatrixFill;
use crate::schema::{FieldKind, FieldSchema, Record, Value};

/// Visitor applying the normalization rules to every record of a tree.
pub struct Normalizer<'a> {
    matrix: &'a dyn MatrixFill,
    apply_defaults: bool,
}

impl<'a> Normalizer<'a> {
    pub fn new(matrix: &'a dyn MatrixFill, apply_defaults: bool) -> Self {
        Self {
            matrix,
            apply_defaults,
        }
    }

    /// Normalize `value` if it is a record; anything else is left alone.
    pub fn normalize(&self, value: &mut Value) -> Result<()> {
        match value {
            Value::Record(record) => self.normalize_record(record),
            _ => Ok(()),
        }
    }

    pub fn normalize_record(&self, record: &mut Record) -> Result<()> {
        let (schema, values) = record.fields_mut();
        for (field, value) in schema.fields.iter().zip(values.iter_mut()) {
            self.visit_field(field, value)?;
        }
        Ok(())
    }

    fn visit_field(&self, field: &FieldSchema, value: &mut Value) -> Result<()> {
        if let Value::List(items) = value {
            for item in items {
                self.normalize(item)?;
            }
            return Ok(());
        }

        if field.kind == FieldKind::Transform {
            return self.matrix.fill(value);
        }

        if self.apply_defaults && value.is_falsy() {
            *value = field.default.clone();
        }

        match &field.kind {
            FieldKind::Enum(table) => {
                if let Value::Int(code) = *value {
                    let name = i32::try_from(code).ok().and_then(|code| table.name(code));
                    match name {
                        Some(name) => *value = Value::String(name.to_string()),
                        None => warn!(
                            "{}: code {code} is not a {} value",
                            field.name, table.type_name
                        ),
                    }
                }
                Ok(())
            }
            FieldKind::Message { .. } => self.normalize(value),
            FieldKind::Scalar | FieldKind::Map | FieldKind::Transform => Ok(()),
        }
    }
}

/// Normalize `record` in place with the given matrix filler.
pub fn normalize(record: &mut Record, matrix: &dyn MatrixFill, apply_defaults: bool) -> Result<()> {
    Normalizer::new(matrix, apply_defaults).normalize_record(record)
}

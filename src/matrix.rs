//! Matrix fill for `TransformProto` values.
//!
//! Simple transforms (pure flips and quarter rotations) are often stored as
//! type flags only. The coefficients `dsdx, dtdx, dsdy, dtdy` are derived from
//! those flags so every transform can be displayed as a matrix.

use anyhow::{bail, Result};

use crate::schema::{Record, Value};

pub const TRANSLATE_VAL: i64 = 0x0001;
pub const ROTATE_VAL: i64 = 0x0002;
pub const SCALE_VAL: i64 = 0x0004;
pub const FLIP_H_VAL: i64 = 0x0100;
pub const FLIP_V_VAL: i64 = 0x0200;
pub const ROT_90_VAL: i64 = 0x0400;
pub const ROT_INVALID_VAL: i64 = 0x8000;

const MATRIX_FIELDS: [&str; 4] = ["dsdx", "dtdx", "dsdy", "dtdy"];

/// Fills in a transform-typed field value in place.
pub trait MatrixFill: Send + Sync {
    fn fill(&self, transform: &mut Value) -> Result<()>;
}

/// Derives the matrix from the orientation flags in `type`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrientationMatrixFill;

impl OrientationMatrixFill {
    /// A transform is simple when its matrix follows from the flags alone.
    pub fn is_simple(kind: i64) -> bool {
        kind & (ROT_INVALID_VAL | SCALE_VAL) == 0
    }

    /// `[dsdx, dtdx, dsdy, dtdy]` for a simple transform.
    pub fn matrix(kind: i64) -> [f64; 4] {
        let mut m = [1.0, 0.0, 0.0, 1.0];
        if kind & ROT_90_VAL != 0 {
            m = [0.0, 1.0, -1.0, 0.0];
        }
        if kind & FLIP_V_VAL != 0 {
            m[1] = -m[1];
            m[3] = -m[3];
        }
        if kind & FLIP_H_VAL != 0 {
            m[0] = -m[0];
            m[2] = -m[2];
        }
        m
    }

    fn fill_record(record: &mut Record) -> Result<()> {
        let kind = record.get("type").and_then(Value::as_i64).unwrap_or(0);
        if !Self::is_simple(kind) {
            return Ok(());
        }
        for (field, value) in MATRIX_FIELDS.iter().zip(Self::matrix(kind)) {
            if !record.set(field, Value::Float(value)) {
                bail!("{} has no '{field}' field", record.schema().full_name);
            }
        }
        Ok(())
    }
}

impl MatrixFill for OrientationMatrixFill {
    fn fill(&self, transform: &mut Value) -> Result<()> {
        match transform {
            Value::Null => Ok(()),
            Value::Record(record) => Self::fill_record(record),
            other => bail!("transform value is not a record: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use crate::test_utils::encode;

    fn transform(kind: i32, dsdx: Option<f32>) -> Value {
        let schemas = SchemaRegistry::builtin().unwrap();
        let bytes = encode(|os| {
            os.write_int32(1, kind)?;
            if let Some(v) = dsdx {
                os.write_float(2, v)?;
            }
            Ok(())
        });
        Value::Record(
            schemas
                .decode("android.surfaceflinger.TransformProto", &bytes)
                .unwrap(),
        )
    }

    fn coefficients(value: &Value) -> [f64; 4] {
        let record = value.as_record().unwrap();
        MATRIX_FIELDS.map(|f| record.get(f).and_then(Value::as_f64).unwrap())
    }

    #[test]
    fn test_identity() {
        let mut value = transform(0, None);
        OrientationMatrixFill.fill(&mut value).unwrap();
        assert_eq!(coefficients(&value), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_translate_only_is_identity() {
        let mut value = transform(TRANSLATE_VAL as i32, None);
        OrientationMatrixFill.fill(&mut value).unwrap();
        assert_eq!(coefficients(&value), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rotations() {
        assert_eq!(OrientationMatrixFill::matrix(ROT_90_VAL), [0.0, 1.0, -1.0, 0.0]);
        assert_eq!(
            OrientationMatrixFill::matrix(FLIP_H_VAL | FLIP_V_VAL),
            [-1.0, 0.0, 0.0, -1.0]
        );
        assert_eq!(
            OrientationMatrixFill::matrix(ROT_90_VAL | FLIP_H_VAL | FLIP_V_VAL),
            [0.0, -1.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_scaled_transform_keeps_stored_matrix() {
        let mut value = transform((SCALE_VAL | ROTATE_VAL) as i32, Some(2.5));
        OrientationMatrixFill.fill(&mut value).unwrap();
        assert_eq!(coefficients(&value), [2.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_null_and_invalid_values() {
        let mut null = Value::Null;
        assert!(OrientationMatrixFill.fill(&mut null).is_ok());
        assert_eq!(null, Value::Null);

        let mut scalar = Value::Int(3);
        assert!(OrientationMatrixFill.fill(&mut scalar).is_err());
    }
}

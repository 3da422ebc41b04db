//! Schema registry backed by protobuf reflection.
//!
//! The trace schemas under `proto/` are compiled into a descriptor set by the
//! build script and loaded here as dynamic descriptors. Decoding parses bytes
//! against one of those descriptors and converts the resulting dynamic message
//! into a [`Record`] tree that carries its own field metadata.

mod record;

pub use record::*;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use protobuf::descriptor::FileDescriptorSet;
use protobuf::reflect::{
    EnumDescriptor, FieldDescriptor, FileDescriptor, MessageDescriptor, ReflectValueRef,
    RuntimeFieldType, RuntimeType,
};
use protobuf::{CodedInputStream, Message, MessageDyn};

use crate::error::SchemaError;

const BUILTIN_SCHEMAS: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/trace_schemas.pb"));

/// Read-only set of message schemas, built once at startup.
pub struct SchemaRegistry {
    files: Vec<FileDescriptor>,
}

impl SchemaRegistry {
    /// Load the trace schemas compiled into the crate.
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_descriptor_set(BUILTIN_SCHEMAS)
    }

    /// Load schemas from a serialized `FileDescriptorSet`.
    pub fn from_descriptor_set(bytes: &[u8]) -> Result<Self, SchemaError> {
        let set = FileDescriptorSet::parse_from_bytes(bytes).map_err(SchemaError::Load)?;
        let files = FileDescriptor::new_dynamic_fds(set.file, &[]).map_err(SchemaError::Load)?;
        Ok(Self { files })
    }

    /// Look up a top-level message type by its fully qualified name.
    pub fn message(&self, full_name: &str) -> Option<MessageDescriptor> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.files
            .iter()
            .flat_map(|file| file.messages())
            .find(|message| message.full_name() == full_name)
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.message(full_name).is_some()
    }

    /// Reflection metadata for `full_name`, without decoding anything.
    pub fn schema(&self, full_name: &str) -> Result<Arc<MessageSchema>, SchemaError> {
        let descriptor = self
            .message(full_name)
            .ok_or_else(|| SchemaError::UnknownMessage(full_name.to_string()))?;
        Ok(RecordBuilder::default().schema(&descriptor))
    }

    /// Decode `bytes` as a `full_name` message.
    ///
    /// Malformed input, including missing required fields, is reported as
    /// [`SchemaError::Decode`].
    pub fn decode(&self, full_name: &str, bytes: &[u8]) -> Result<Record, SchemaError> {
        let descriptor = self
            .message(full_name)
            .ok_or_else(|| SchemaError::UnknownMessage(full_name.to_string()))?;

        let decode_error = |source| SchemaError::Decode {
            message: descriptor.full_name().to_string(),
            source,
        };
        // Length prefixes must not run past the end of the buffer.
        let mut message = descriptor.new_instance();
        let mut is = CodedInputStream::from_bytes(bytes);
        let old_limit = is.push_limit(bytes.len() as u64).map_err(decode_error)?;
        message.merge_from_dyn(&mut is).map_err(decode_error)?;
        is.pop_limit(old_limit);
        message.check_initialized_dyn().map_err(decode_error)?;

        Ok(RecordBuilder::default().record(&*message))
    }
}

/// Converts dynamic messages into records, sharing one schema per type.
#[derive(Default)]
struct RecordBuilder {
    schemas: HashMap<String, Arc<MessageSchema>>,
}

impl RecordBuilder {
    fn record(&mut self, message: &dyn MessageDyn) -> Record {
        let descriptor = message.descriptor_dyn();
        let schema = self.schema(&descriptor);
        let values = descriptor
            .fields()
            .map(|field| self.field_value(&field, message))
            .collect();
        Record::new(schema, values)
    }

    fn schema(&mut self, descriptor: &MessageDescriptor) -> Arc<MessageSchema> {
        if let Some(schema) = self.schemas.get(descriptor.full_name()) {
            return Arc::clone(schema);
        }
        let fields = descriptor.fields().map(|f| field_schema(&f)).collect();
        let schema = Arc::new(MessageSchema::new(descriptor.full_name(), fields));
        self.schemas
            .insert(descriptor.full_name().to_string(), Arc::clone(&schema));
        schema
    }

    fn field_value(&mut self, field: &FieldDescriptor, message: &dyn MessageDyn) -> Value {
        match field.runtime_field_type() {
            RuntimeFieldType::Singular(RuntimeType::Message(_)) => {
                if field.has_field(message) {
                    self.value(field.get_singular_field_or_default(message))
                } else {
                    Value::Null
                }
            }
            RuntimeFieldType::Singular(_) => self.value(field.get_singular_field_or_default(message)),
            RuntimeFieldType::Repeated(_) => {
                let repeated = field.get_repeated(message);
                Value::List((0..repeated.len()).map(|i| self.value(repeated.get(i))).collect())
            }
            RuntimeFieldType::Map(..) => {
                let map = field.get_map(message);
                let mut entries = BTreeMap::new();
                for (key, value) in &map {
                    let key = self.value(key).to_string();
                    entries.insert(key, self.value(value));
                }
                Value::Map(entries)
            }
        }
    }

    fn value(&mut self, value: ReflectValueRef) -> Value {
        match value {
            ReflectValueRef::U32(n) => Value::Int(i64::from(n)),
            ReflectValueRef::U64(n) => Value::UInt(n),
            ReflectValueRef::I32(n) => Value::Int(i64::from(n)),
            ReflectValueRef::I64(n) => Value::Int(n),
            ReflectValueRef::F32(f) => Value::Float(f64::from(f)),
            ReflectValueRef::F64(f) => Value::Float(f),
            ReflectValueRef::Bool(b) => Value::Bool(b),
            ReflectValueRef::String(s) => Value::String(s.to_string()),
            ReflectValueRef::Bytes(b) => Value::Bytes(b.to_vec()),
            // Enum codes stay numeric until normalization.
            ReflectValueRef::Enum(_, code) => Value::Int(i64::from(code)),
            ReflectValueRef::Message(m) => Value::Record(self.record(&*m)),
        }
    }
}

fn field_schema(field: &FieldDescriptor) -> FieldSchema {
    let (kind, repeated, default) = match field.runtime_field_type() {
        RuntimeFieldType::Singular(t) => (field_kind(&t), false, default_value(field, &t)),
        RuntimeFieldType::Repeated(t) => (field_kind(&t), true, Value::List(Vec::new())),
        RuntimeFieldType::Map(..) => (FieldKind::Map, false, Value::Map(BTreeMap::new())),
    };
    FieldSchema {
        name: field.name().to_string(),
        kind,
        repeated,
        default,
    }
}

fn field_kind(runtime_type: &RuntimeType) -> FieldKind {
    match runtime_type {
        RuntimeType::Enum(e) => FieldKind::Enum(Arc::new(enum_table(e))),
        RuntimeType::Message(m) if m.name() == TRANSFORM_TYPE_NAME => FieldKind::Transform,
        RuntimeType::Message(m) => FieldKind::Message {
            type_name: m.full_name().to_string(),
        },
        _ => FieldKind::Scalar,
    }
}

fn enum_table(descriptor: &EnumDescriptor) -> EnumTable {
    EnumTable::new(
        descriptor.full_name(),
        descriptor
            .values()
            .map(|v| (v.value(), v.name().to_string())),
    )
}

/// Declared default of a singular field: the explicit `[default = ...]` if
/// present, else the zero of its type (first value for enums, null for
/// messages).
fn default_value(field: &FieldDescriptor, runtime_type: &RuntimeType) -> Value {
    let proto = field.proto();
    let explicit = proto.has_default_value().then(|| proto.default_value());

    match runtime_type {
        RuntimeType::I32 | RuntimeType::I64 | RuntimeType::U32 => {
            Value::Int(explicit.and_then(|s| s.parse().ok()).unwrap_or(0))
        }
        RuntimeType::U64 => Value::UInt(explicit.and_then(|s| s.parse().ok()).unwrap_or(0)),
        RuntimeType::F32 | RuntimeType::F64 => {
            Value::Float(explicit.and_then(|s| s.parse().ok()).unwrap_or(0.0))
        }
        RuntimeType::Bool => Value::Bool(explicit == Some("true")),
        RuntimeType::String => Value::String(explicit.unwrap_or_default().to_string()),
        RuntimeType::VecU8 => Value::Bytes(explicit.map(|s| s.as_bytes().to_vec()).unwrap_or_default()),
        RuntimeType::Enum(e) => {
            let code = explicit
                .and_then(|name| e.value_by_name(name))
                .or_else(|| e.values().next())
                .map_or(0, |v| v.value());
            Value::Int(i64::from(code))
        }
        RuntimeType::Message(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    const LAYER: &str = "android.surfaceflinger.LayerProto";

    #[test]
    fn test_builtin_schemas_load() {
        let registry = SchemaRegistry::builtin().unwrap();
        for name in [
            "com.android.server.wm.WindowManagerTraceFileProto",
            "com.android.server.wm.WindowManagerServiceDumpProto",
            "android.surfaceflinger.LayersTraceFileProto",
            "android.surfaceflinger.LayersProto",
            "org.chromium.arc.wayland_composer.TraceFileProto",
            "org.chromium.arc.wayland_composer.OutputStateProto",
            "com.android.server.protolog.ProtoLogFileProto",
            "Trace",
        ] {
            assert!(registry.contains(name), "missing schema {name}");
        }
        assert!(registry.contains(".android.surfaceflinger.LayersProto"));
        assert!(!registry.contains("android.surfaceflinger.Missing"));
    }

    #[test]
    fn test_field_metadata() {
        let registry = SchemaRegistry::builtin().unwrap();
        let schema = registry.schema(LAYER).unwrap();

        let parent = schema.field("parent").unwrap();
        assert_eq!(parent.kind, FieldKind::Scalar);
        assert_eq!(parent.default, Value::Int(-1));

        assert_eq!(schema.field("transform").unwrap().kind, FieldKind::Transform);
        assert!(schema.field("children").unwrap().repeated);

        match &schema.field("hwc_composition_type").unwrap().kind {
            FieldKind::Enum(table) => {
                assert_eq!(table.name(2), Some("DEVICE"));
                assert_eq!(table.type_name, "android.surfaceflinger.LayerProto.HwcCompositionType");
            }
            other => panic!("expected enum kind, got {other:?}"),
        }

        match &schema.field("color").unwrap().kind {
            FieldKind::Message { type_name } => {
                assert_eq!(type_name, "android.surfaceflinger.ColorProto")
            }
            other => panic!("expected message kind, got {other:?}"),
        }
        let color = registry.schema("android.surfaceflinger.ColorProto").unwrap();
        assert_eq!(color.field("a").unwrap().default, Value::Float(1.0));
    }

    #[test]
    fn test_decode_layer() {
        let registry = SchemaRegistry::builtin().unwrap();
        let bytes = encode(|os| {
            os.write_int32(1, 42)?;
            os.write_string(2, "StatusBar")?;
            os.write_enum(22, 2)?;
            Ok(())
        });

        let record = registry.decode(LAYER, &bytes).unwrap();
        assert_eq!(record.get("id"), Some(&Value::Int(42)));
        assert_eq!(record.get("name").and_then(Value::as_str), Some("StatusBar"));
        assert_eq!(record.get("hwc_composition_type"), Some(&Value::Int(2)));
        // Unset message fields are null, unset scalars read their default.
        assert_eq!(record.get("transform"), Some(&Value::Null));
        assert_eq!(record.get("parent"), Some(&Value::Int(-1)));
        assert_eq!(record.get("children"), Some(&Value::List(Vec::new())));
    }

    #[test]
    fn test_decode_malformed_input() {
        let registry = SchemaRegistry::builtin().unwrap();
        // Length-delimited field claiming 16 bytes with none following.
        let err = registry.decode(LAYER, &[0x12, 0x10]).unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_decode_truncated_nested_message() {
        let registry = SchemaRegistry::builtin().unwrap();
        for bytes in [&[0x0a, 0x10][..], &[0x0a, 0x10, 0x08, 0x05]] {
            let err = registry.decode("Trace", bytes).unwrap_err();
            assert!(err.is_malformed_input(), "{bytes:?} accepted");
        }

        let trace = registry.decode("Trace", &[0x0a, 0x02, 0x08, 0x05]).unwrap();
        let increments = trace.get("increment").and_then(Value::as_list).unwrap();
        assert_eq!(increments.len(), 1);
    }

    #[test]
    fn test_decode_missing_required_field() {
        let registry = SchemaRegistry::builtin().unwrap();
        let bytes = encode(|os| os.write_int32(1, 7));
        let err = registry.decode("SurfaceCreation", &bytes).unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_decode_unknown_message() {
        let registry = SchemaRegistry::builtin().unwrap();
        let err = registry.decode("does.not.Exist", &[]).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownMessage(_)));
        assert!(!err.is_malformed_input());
    }
}

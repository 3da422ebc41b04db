//! Registry of supported trace file types.
//!
//! Each [`FileType`] names its data type classification and how it is
//! decoded. The registry is built once, validated, and then only read.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::RegistryError;
use crate::magic::{self, MagicSignature, BUILTIN_SIGNATURES};
use crate::schema::SchemaRegistry;
use crate::transform::{EntriesAdapter, Label, SnapshotAdapter, TransformAdapter};
use crate::video::{Mp4Decoder, VideoDecoder};

/// Header-less file types, in the order they are trial decoded.
pub const AMBIGUOUS_FILE_TYPES: [FileTypeKey; 4] = [
    FileTypeKey::Transaction,
    FileTypeKey::LayersDump,
    FileTypeKey::WindowDump,
    FileTypeKey::WaylandDump,
];

/// Domain category of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    WindowManager,
    SurfaceFlinger,
    ScreenRecording,
    Transaction,
    Wayland,
    ProtoLog,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            DataType::WindowManager => "WindowManager",
            DataType::SurfaceFlinger => "SurfaceFlinger",
            DataType::ScreenRecording => "Screen recording",
            DataType::Transaction => "Transaction",
            DataType::Wayland => "Wayland",
            DataType::ProtoLog => "ProtoLog",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            DataType::WindowManager => "view_compact",
            DataType::SurfaceFlinger | DataType::Wayland => "filter_none",
            DataType::ScreenRecording => "videocam",
            DataType::Transaction => "timeline",
            DataType::ProtoLog => "notes",
        }
    }

    /// MIME type used when the raw bytes are exported again.
    pub fn mime(self) -> &'static str {
        match self {
            DataType::ScreenRecording => "video/mp4",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Identifier of a supported file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileTypeKey {
    WindowTrace,
    LayersTrace,
    WaylandTrace,
    LayersDump,
    WindowDump,
    WaylandDump,
    ScreenRecording,
    Transaction,
    ProtoLog,
}

impl FileTypeKey {
    pub const ALL: [FileTypeKey; 9] = [
        FileTypeKey::WindowTrace,
        FileTypeKey::LayersTrace,
        FileTypeKey::WaylandTrace,
        FileTypeKey::LayersDump,
        FileTypeKey::WindowDump,
        FileTypeKey::WaylandDump,
        FileTypeKey::ScreenRecording,
        FileTypeKey::Transaction,
        FileTypeKey::ProtoLog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileTypeKey::WindowTrace => "window_trace",
            FileTypeKey::LayersTrace => "layers_trace",
            FileTypeKey::WaylandTrace => "wl_trace",
            FileTypeKey::LayersDump => "layers_dump",
            FileTypeKey::WindowDump => "window_dump",
            FileTypeKey::WaylandDump => "wl_dump",
            FileTypeKey::ScreenRecording => "screen_recording",
            FileTypeKey::Transaction => "transaction",
            FileTypeKey::ProtoLog => "proto_log",
        }
    }
}

impl fmt::Display for FileTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for FileTypeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileTypeKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown file type '{s}'"))
    }
}

impl Serialize for FileTypeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// How a file type's bytes become a data file.
pub enum Decoder {
    /// Schema decode, normalize, then hand the tree to `transform`.
    Structured {
        message_type: &'static str,
        transform: Box<dyn TransformAdapter>,
        timeline: bool,
    },
    /// Delegate to a video decoder for payload and frame timestamps.
    Video { decoder: Box<dyn VideoDecoder> },
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoder::Structured {
                message_type,
                timeline,
                ..
            } => f
                .debug_struct("Structured")
                .field("message_type", message_type)
                .field("timeline", timeline)
                .finish_non_exhaustive(),
            Decoder::Video { .. } => f.debug_struct("Video").finish_non_exhaustive(),
        }
    }
}

/// Static description of one supported trace family.
#[derive(Debug)]
pub struct FileType {
    pub key: FileTypeKey,
    pub name: &'static str,
    pub data_type: DataType,
    pub decoder: Decoder,
}

impl FileType {
    pub fn structured(
        key: FileTypeKey,
        name: &'static str,
        data_type: DataType,
        message_type: &'static str,
        transform: impl TransformAdapter + 'static,
        timeline: bool,
    ) -> Self {
        Self {
            key,
            name,
            data_type,
            decoder: Decoder::Structured {
                message_type,
                transform: Box::new(transform),
                timeline,
            },
        }
    }

    pub fn video(
        key: FileTypeKey,
        name: &'static str,
        data_type: DataType,
        decoder: impl VideoDecoder + 'static,
    ) -> Self {
        Self {
            key,
            name,
            data_type,
            decoder: Decoder::Video {
                decoder: Box::new(decoder),
            },
        }
    }

    /// True if decoding yields a time-ordered sequence rather than a snapshot.
    pub fn is_timeline(&self) -> bool {
        match &self.decoder {
            Decoder::Structured { timeline, .. } => *timeline,
            Decoder::Video { .. } => true,
        }
    }
}

fn builtin_file_types() -> Vec<FileType> {
    let timestamped =
        |entries| EntriesAdapter::new(entries, "elapsed_realtime_nanos", Label::Field("where"));

    vec![
        FileType::structured(
            FileTypeKey::WindowTrace,
            "WindowManager trace",
            DataType::WindowManager,
            "com.android.server.wm.WindowManagerTraceFileProto",
            timestamped("entry"),
            true,
        ),
        FileType::structured(
            FileTypeKey::LayersTrace,
            "SurfaceFlinger trace",
            DataType::SurfaceFlinger,
            "android.surfaceflinger.LayersTraceFileProto",
            timestamped("entry"),
            true,
        ),
        FileType::structured(
            FileTypeKey::WaylandTrace,
            "Wayland trace",
            DataType::Wayland,
            "org.chromium.arc.wayland_composer.TraceFileProto",
            timestamped("entry"),
            true,
        ),
        FileType::structured(
            FileTypeKey::LayersDump,
            "SurfaceFlinger dump",
            DataType::SurfaceFlinger,
            "android.surfaceflinger.LayersProto",
            SnapshotAdapter,
            false,
        ),
        FileType::structured(
            FileTypeKey::WindowDump,
            "WindowManager dump",
            DataType::WindowManager,
            "com.android.server.wm.WindowManagerServiceDumpProto",
            SnapshotAdapter,
            false,
        ),
        FileType::structured(
            FileTypeKey::WaylandDump,
            "Wayland dump",
            DataType::Wayland,
            "org.chromium.arc.wayland_composer.OutputStateProto",
            SnapshotAdapter,
            false,
        ),
        FileType::video(
            FileTypeKey::ScreenRecording,
            "Screen recording",
            DataType::ScreenRecording,
            Mp4Decoder,
        ),
        FileType::structured(
            FileTypeKey::Transaction,
            "Transaction",
            DataType::Transaction,
            "Trace",
            EntriesAdapter::new("increment", "time_stamp", Label::FirstPresentRecord),
            true,
        ),
        FileType::structured(
            FileTypeKey::ProtoLog,
            "ProtoLog",
            DataType::ProtoLog,
            "com.android.server.protolog.ProtoLogFileProto",
            EntriesAdapter::new("log", "elapsed_realtime_nanos", Label::Field("message_hash")),
            true,
        ),
    ]
}

/// Validated, read-only table of file types.
#[derive(Debug)]
pub struct FileTypeRegistry {
    file_types: Vec<FileType>,
    signatures: Vec<MagicSignature>,
    ambiguous: Vec<FileTypeKey>,
}

impl FileTypeRegistry {
    /// The built-in file types, checked against `schemas`.
    pub fn builtin(schemas: &SchemaRegistry) -> Result<Self, RegistryError> {
        Self::new(
            builtin_file_types(),
            BUILTIN_SIGNATURES.to_vec(),
            AMBIGUOUS_FILE_TYPES.to_vec(),
            schemas,
        )
    }

    /// Build a registry, validating that:
    /// - keys are unique and every signature and candidate names a registered type
    /// - no signature is a prefix of another
    /// - fallback candidates have no signature
    /// - structured types refer to messages present in `schemas`
    pub fn new(
        file_types: Vec<FileType>,
        signatures: Vec<MagicSignature>,
        ambiguous: Vec<FileTypeKey>,
        schemas: &SchemaRegistry,
    ) -> Result<Self, RegistryError> {
        for (i, file_type) in file_types.iter().enumerate() {
            if file_types[..i].iter().any(|other| other.key == file_type.key) {
                return Err(RegistryError::DuplicateFileType(file_type.key));
            }
            if let Decoder::Structured { message_type, .. } = &file_type.decoder {
                if !schemas.contains(message_type) {
                    return Err(RegistryError::UnknownMessage {
                        key: file_type.key,
                        message: message_type.to_string(),
                    });
                }
            }
        }

        let registered = |key: FileTypeKey| file_types.iter().any(|t| t.key == key);
        if let Some(signature) = signatures.iter().find(|s| !registered(s.key)) {
            return Err(RegistryError::UnregisteredSignature(signature.key));
        }
        magic::check_prefix_free(&signatures)?;

        for key in &ambiguous {
            if !registered(*key) {
                return Err(RegistryError::UnregisteredCandidate(*key));
            }
            if signatures.iter().any(|s| s.key == *key) {
                return Err(RegistryError::CandidateHasSignature(*key));
            }
        }

        Ok(Self {
            file_types,
            signatures,
            ambiguous,
        })
    }

    pub fn get(&self, key: FileTypeKey) -> Option<&FileType> {
        self.file_types.iter().find(|t| t.key == key)
    }

    /// All file types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &FileType> {
        self.file_types.iter()
    }

    pub fn signatures(&self) -> &[MagicSignature] {
        &self.signatures
    }

    pub fn signature(&self, key: FileTypeKey) -> Option<&MagicSignature> {
        self.signatures.iter().find(|s| s.key == key)
    }

    /// Header-less candidates in trial order.
    pub fn ambiguous(&self) -> impl Iterator<Item = &FileType> {
        self.ambiguous.iter().filter_map(|key| self.get(*key))
    }

    /// File type whose signature `buffer` starts with, if any.
    pub fn detect(&self, buffer: &[u8]) -> Option<&FileType> {
        magic::detect(&self.signatures, buffer).and_then(|key| self.get(key))
    }
}

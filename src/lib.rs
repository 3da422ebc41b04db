//! tracescope - detect and decode trace captures.
//!
//! Given the raw bytes of a capture and its file name, tracescope works out
//! which kind of trace it is from the content alone, decodes it against the
//! matching schema, normalizes the decoded tree for display and returns a
//! uniform [`DataFile`].
//!
//! # Modules
//!
//! - [`magic`] - Magic number signatures and detection
//! - [`file_types`] - Registry of supported trace types
//! - [`schema`] - Schema registry and decoded record trees
//! - [`normalize`] - Enum names, display defaults and transform matrices
//! - [`transform`] - Adapters from record trees to neutral timeline entries
//! - [`video`] - Screen recording decoding
//! - [`blob`] - Retained raw buffers behind release-once handles
//! - [`decode`] - Detection and decode dispatch
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracescope::{DecodeOptions, Dispatcher, FileTypeRegistry, InMemoryBlobStore, SchemaRegistry};
//!
//! let schemas = SchemaRegistry::builtin().expect("Failed to load schemas");
//! let file_types = FileTypeRegistry::builtin(&schemas).expect("Invalid file type registry");
//! let dispatcher = Dispatcher::new(&file_types, &schemas, Arc::new(InMemoryBlobStore::new()));
//!
//! let buffer = std::fs::read("layers_trace.winscope").expect("Failed to read trace");
//! let (file_type, data_file) = dispatcher
//!     .detect_and_decode(&buffer, "layers_trace.winscope", &DecodeOptions::default())
//!     .expect("Failed to decode trace");
//! println!("{}: {} entries", file_type.name, data_file.len());
//! data_file.release();
//! ```

pub mod blob;
pub mod config;
pub mod decode;
pub mod error;
pub mod file_types;
pub mod logging;
pub mod magic;
pub mod matrix;
pub mod normalize;
pub mod schema;
pub mod transform;
pub mod video;

#[cfg(test)]
mod test_utils;

// Re-export for convenience
pub use blob::{BlobHandle, BlobId, BlobStore, InMemoryBlobStore};
pub use config::DecodeOptions;
pub use decode::{DataFile, Dispatcher, TraceData};
pub use error::{DecodeError, RegistryError, SchemaError};
pub use file_types::{DataType, FileType, FileTypeKey, FileTypeRegistry};
pub use schema::{Record, SchemaRegistry, Value};
pub use transform::NeutralEntry;

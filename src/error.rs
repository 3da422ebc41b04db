//! Error types for detection and decoding.
//!
//! Only [`SchemaError::Decode`] is ever recovered from, and only while trying
//! the header-less trace types one after another. Everything else reaches the
//! caller unchanged.

use thiserror::Error;

use crate::file_types::FileTypeKey;

/// Failures raised by the schema registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The requested message type is not part of the loaded schemas.
    #[error("Unknown message type '{0}'")]
    UnknownMessage(String),

    /// The bytes do not form a valid `message` record.
    #[error("Failed to decode {message}: {source}")]
    Decode {
        message: String,
        #[source]
        source: protobuf::Error,
    },

    /// The embedded descriptor set could not be loaded.
    #[error("Failed to load trace schemas: {0}")]
    Load(#[source] protobuf::Error),
}

impl SchemaError {
    /// True when the input bytes were rejected by the schema, as opposed to
    /// the schema itself being unusable.
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, SchemaError::Decode { .. })
    }
}

/// Failures raised by the decode dispatcher.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// No signature matched and every header-less candidate failed to parse.
    #[error("Unable to detect file type of {filename}")]
    UnrecognizedFormat { filename: String },

    #[error("File type '{0}' is not registered")]
    UnknownFileType(FileTypeKey),

    /// Raised by a matrix-fill, transform or video collaborator.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

/// Inconsistencies found while building a [`FileTypeRegistry`](crate::FileTypeRegistry).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Signatures of {first} and {second} overlap, detection would be ambiguous")]
    OverlappingSignatures {
        first: FileTypeKey,
        second: FileTypeKey,
    },

    #[error("File type {0} is registered more than once")]
    DuplicateFileType(FileTypeKey),

    #[error("Signature refers to unregistered file type {0}")]
    UnregisteredSignature(FileTypeKey),

    #[error("Fallback candidate {0} is not registered")]
    UnregisteredCandidate(FileTypeKey),

    #[error("Fallback candidate {0} has a magic number and must not be trial decoded")]
    CandidateHasSignature(FileTypeKey),

    #[error("File type {key} uses unknown message type '{message}'")]
    UnknownMessage { key: FileTypeKey, message: String },
}

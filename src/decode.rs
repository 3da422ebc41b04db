//! Detection and decode dispatch.
//!
//! A buffer is first matched against the registered magic numbers. A match is
//! authoritative: the file is decoded as that type and any failure is
//! returned. Without a match, the header-less types are tried in registry
//! order and the first one whose schema accepts the bytes wins.

use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;
use tracing::{debug, trace};

use crate::blob::{BlobHandle, BlobId, BlobStore};
use crate::config::DecodeOptions;
use crate::error::{DecodeError, SchemaError};
use crate::file_types::{DataType, Decoder, FileType, FileTypeKey, FileTypeRegistry};
use crate::matrix::{MatrixFill, OrientationMatrixFill};
use crate::normalize::normalize;
use crate::schema::{Record, SchemaRegistry};
use crate::transform::{NeutralEntry, TransformAdapter, Transformed};
use crate::video::{DecodedVideo, VideoDecoder};

/// Decoded content of a data file.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TraceData {
    /// One entry per timeline element.
    Entries(Vec<NeutralEntry>),
    /// The retained media itself; same id as the file's blob handle.
    Blob(BlobId),
}

/// Uniform result of decoding one file.
#[derive(Debug, Serialize)]
pub struct DataFile {
    pub filename: String,
    pub timeline: Vec<i64>,
    pub data: TraceData,
    #[serde(rename = "blob_url")]
    pub blob: BlobHandle,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub selected_index: usize,
}

impl DataFile {
    fn new(
        filename: &str,
        timeline: Vec<i64>,
        data: TraceData,
        blob: BlobHandle,
        data_type: DataType,
    ) -> Self {
        Self {
            filename: filename.to_string(),
            timeline,
            data,
            blob,
            data_type,
            selected_index: 0,
        }
    }

    /// Number of timeline positions.
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn entries(&self) -> Option<&[NeutralEntry]> {
        match &self.data {
            TraceData::Entries(entries) => Some(entries),
            TraceData::Blob(_) => None,
        }
    }

    /// Move the cursor. Out of range indices are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.timeline.len() {
            self.selected_index = index;
            true
        } else {
            false
        }
    }

    pub fn selected_timestamp(&self) -> Option<i64> {
        self.timeline.get(self.selected_index).copied()
    }

    /// Release the retained bytes. Consumes the file.
    pub fn release(self) {
        self.blob.release();
    }
}

/// Outcome of trying one header-less candidate.
enum Attempt {
    Decoded(DataFile),
    Rejected(SchemaError),
}

/// Orchestrates detection, decoding and data file construction.
pub struct Dispatcher<'a> {
    file_types: &'a FileTypeRegistry,
    schemas: &'a SchemaRegistry,
    matrix: Box<dyn MatrixFill>,
    blobs: Arc<dyn BlobStore>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        file_types: &'a FileTypeRegistry,
        schemas: &'a SchemaRegistry,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            file_types,
            schemas,
            matrix: Box::new(OrientationMatrixFill),
            blobs,
        }
    }

    pub fn with_matrix_fill(mut self, matrix: impl MatrixFill + 'static) -> Self {
        self.matrix = Box::new(matrix);
        self
    }

    /// Detect the type of `buffer` and decode it.
    pub fn detect_and_decode(
        &self,
        buffer: &[u8],
        filename: &str,
        options: &DecodeOptions,
    ) -> Result<(&'a FileType, DataFile), DecodeError> {
        let file_types = self.file_types;

        if let Some(file_type) = file_types.detect(buffer) {
            debug!(filename, file_type = %file_type.key, "Matched magic number");
            let data_file = self.decode(file_type, buffer, filename, options)?;
            return Ok((file_type, data_file));
        }

        for file_type in file_types.ambiguous() {
            match self.try_decode(file_type, buffer, filename, options)? {
                Attempt::Decoded(data_file) => {
                    debug!(filename, file_type = %file_type.key, "Decoded without magic number");
                    return Ok((file_type, data_file));
                }
                Attempt::Rejected(err) => {
                    trace!(filename, file_type = %file_type.key, error = %err, "Candidate rejected");
                }
            }
        }

        Err(DecodeError::UnrecognizedFormat {
            filename: filename.to_string(),
        })
    }

    /// Decode `buffer` as `key`, skipping detection.
    pub fn decode_as(
        &self,
        key: FileTypeKey,
        buffer: &[u8],
        filename: &str,
        options: &DecodeOptions,
    ) -> Result<(&'a FileType, DataFile), DecodeError> {
        let file_type = self
            .file_types
            .get(key)
            .ok_or(DecodeError::UnknownFileType(key))?;
        let data_file = self.decode(file_type, buffer, filename, options)?;
        Ok((file_type, data_file))
    }

    fn decode(
        &self,
        file_type: &FileType,
        buffer: &[u8],
        filename: &str,
        options: &DecodeOptions,
    ) -> Result<DataFile, DecodeError> {
        match &file_type.decoder {
            Decoder::Structured { message_type, .. } => {
                let tree = self.schemas.decode(message_type, buffer)?;
                self.decode_structured(file_type, tree, buffer, filename, options)
            }
            Decoder::Video { decoder } => {
                self.decode_video(file_type, &**decoder, buffer, filename)
            }
        }
    }

    /// Like [`decode`](Self::decode), but a schema rejecting the bytes is an
    /// ordinary outcome rather than an error.
    fn try_decode(
        &self,
        file_type: &FileType,
        buffer: &[u8],
        filename: &str,
        options: &DecodeOptions,
    ) -> Result<Attempt, DecodeError> {
        let message_type = match &file_type.decoder {
            Decoder::Structured { message_type, .. } => message_type,
            Decoder::Video { .. } => {
                return self
                    .decode(file_type, buffer, filename, options)
                    .map(Attempt::Decoded)
            }
        };

        let tree = match self.schemas.decode(message_type, buffer) {
            Ok(tree) => tree,
            Err(err) if err.is_malformed_input() => return Ok(Attempt::Rejected(err)),
            Err(err) => return Err(err.into()),
        };
        self.decode_structured(file_type, tree, buffer, filename, options)
            .map(Attempt::Decoded)
    }

    /// Normalize and transform a decoded tree, then package it.
    fn decode_structured(
        &self,
        file_type: &FileType,
        mut tree: Record,
        buffer: &[u8],
        filename: &str,
        options: &DecodeOptions,
    ) -> Result<DataFile, DecodeError> {
        let (transform, timeline): (&dyn TransformAdapter, bool) = match &file_type.decoder {
            Decoder::Structured {
                transform,
                timeline,
                ..
            } => (&**transform, *timeline),
            Decoder::Video { .. } => {
                return Err(anyhow!("{} is not a structured trace", file_type.key).into())
            }
        };

        normalize(&mut tree, &*self.matrix, options.apply_defaults)?;

        let entries = match (transform.transform(tree)?, timeline) {
            (Transformed::Timeline { children }, true) => children,
            (Transformed::Snapshot(entry), false) => vec![entry],
            (_, true) => {
                return Err(anyhow!("{} adapter returned a snapshot", file_type.key).into())
            }
            (_, false) => {
                return Err(anyhow!("{} adapter returned a timeline", file_type.key).into())
            }
        };

        let timeline = entries.iter().map(|entry| entry.timestamp).collect();
        let blob = BlobHandle::create(&self.blobs, buffer.to_vec(), file_type.data_type.mime());
        Ok(DataFile::new(
            filename,
            timeline,
            TraceData::Entries(entries),
            blob,
            file_type.data_type,
        ))
    }

    fn decode_video(
        &self,
        file_type: &FileType,
        decoder: &dyn VideoDecoder,
        buffer: &[u8],
        filename: &str,
    ) -> Result<DataFile, DecodeError> {
        let DecodedVideo { payload, timeline } = decoder.decode(buffer)?;
        let blob = BlobHandle::create(&self.blobs, payload, file_type.data_type.mime());
        let data = TraceData::Blob(blob.id());
        Ok(DataFile::new(
            filename,
            timeline,
            data,
            blob,
            file_type.data_type,
        ))
    }
}

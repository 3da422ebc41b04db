//! Magic number detection.
//!
//! Traces with a header start with a fixed byte string. For the structured
//! traces this is the encoded `magic_number` field: tag byte `0x09` (field 1,
//! fixed 64-bit) followed by eight ASCII bytes.

use crate::error::RegistryError;
use crate::file_types::FileTypeKey;

pub const LAYER_TRACE_MAGIC_NUMBER: [u8; 9] = *b"\x09LYRTRACE";
pub const WINDOW_TRACE_MAGIC_NUMBER: [u8; 9] = *b"\x09WINTRACE";
pub const MPEG4_MAGIC_NUMBER: [u8; 12] = *b"\x00\x00\x00\x18ftypmp42";
pub const WAYLAND_TRACE_MAGIC_NUMBER: [u8; 9] = *b"\x09WYLTRACE";
pub const PROTO_LOG_MAGIC_NUMBER: [u8; 9] = *b"\x09PROTOLOG";

/// A leading byte string identifying one file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicSignature {
    pub key: FileTypeKey,
    bytes: &'static [u8],
}

impl MagicSignature {
    pub const fn new(key: FileTypeKey, bytes: &'static [u8]) -> Self {
        Self { key, bytes }
    }

    pub fn bytes(&self) -> &'static [u8] {
        self.bytes
    }

    /// True if `buffer` begins with this signature. Buffers shorter than the
    /// signature never match.
    pub fn matches(&self, buffer: &[u8]) -> bool {
        buffer.starts_with(self.bytes)
    }

    fn overlaps(&self, other: &MagicSignature) -> bool {
        self.bytes.starts_with(other.bytes) || other.bytes.starts_with(self.bytes)
    }
}

/// Signatures in detection priority order.
pub const BUILTIN_SIGNATURES: [MagicSignature; 5] = [
    MagicSignature::new(FileTypeKey::LayersTrace, &LAYER_TRACE_MAGIC_NUMBER),
    MagicSignature::new(FileTypeKey::WindowTrace, &WINDOW_TRACE_MAGIC_NUMBER),
    MagicSignature::new(FileTypeKey::ScreenRecording, &MPEG4_MAGIC_NUMBER),
    MagicSignature::new(FileTypeKey::WaylandTrace, &WAYLAND_TRACE_MAGIC_NUMBER),
    MagicSignature::new(FileTypeKey::ProtoLog, &PROTO_LOG_MAGIC_NUMBER),
];

/// Return the file type of the first signature `buffer` starts with.
pub fn detect(signatures: &[MagicSignature], buffer: &[u8]) -> Option<FileTypeKey> {
    signatures
        .iter()
        .find(|signature| signature.matches(buffer))
        .map(|signature| signature.key)
}

/// Reject signature sets where one signature is a prefix of another, since
/// first-match detection would then depend on ordering.
pub fn check_prefix_free(signatures: &[MagicSignature]) -> Result<(), RegistryError> {
    for (i, first) in signatures.iter().enumerate() {
        for second in &signatures[i + 1..] {
            if first.overlaps(second) {
                return Err(RegistryError::OverlappingSignatures {
                    first: first.key,
                    second: second.key,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_every_signature() {
        for signature in &BUILTIN_SIGNATURES {
            let mut buffer = signature.bytes().to_vec();
            assert_eq!(detect(&BUILTIN_SIGNATURES, &buffer), Some(signature.key));

            buffer.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
            assert_eq!(detect(&BUILTIN_SIGNATURES, &buffer), Some(signature.key));
        }
    }

    #[test]
    fn test_truncated_buffer_never_matches() {
        for signature in &BUILTIN_SIGNATURES {
            let bytes = signature.bytes();
            for len in 0..bytes.len() {
                assert_eq!(detect(&BUILTIN_SIGNATURES, &bytes[..len]), None);
            }
        }
    }

    #[test]
    fn test_no_match() {
        assert_eq!(detect(&BUILTIN_SIGNATURES, b""), None);
        assert_eq!(detect(&BUILTIN_SIGNATURES, b"\x09LYRTRACF"), None);
        assert_eq!(detect(&BUILTIN_SIGNATURES, b"\x0a\x04test"), None);
    }

    #[test]
    fn test_builtin_signatures_are_prefix_free() {
        assert_eq!(check_prefix_free(&BUILTIN_SIGNATURES), Ok(()));
    }

    #[test]
    fn test_overlapping_signatures_rejected() {
        let signatures = [
            MagicSignature::new(FileTypeKey::LayersTrace, b"\x09LYR"),
            MagicSignature::new(FileTypeKey::WindowTrace, b"\x09WIN"),
            MagicSignature::new(FileTypeKey::ProtoLog, b"\x09LYRTRACE"),
        ];
        assert_eq!(
            check_prefix_free(&signatures),
            Err(RegistryError::OverlappingSignatures {
                first: FileTypeKey::LayersTrace,
                second: FileTypeKey::ProtoLog,
            })
        );
    }
}

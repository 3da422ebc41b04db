//! Screen recording decoder.
//!
//! Screen recordings are MP4 files whose frame timestamps are embedded in the
//! `moov` box as a metadata block: the marker [`FRAME_TIMESTAMPS_MARKER`], a
//! little-endian `u32` frame count, then one little-endian `u64` per frame
//! holding elapsed realtime in microseconds.

use std::io::Read;

use anyhow::{anyhow, bail, Context, Result};

pub const FRAME_TIMESTAMPS_MARKER: &[u8] = b"#VV1NSC0PET1ME!#";

/// Box holding the frame timestamp metadata.
pub const METADATA_BOX: &[u8; 4] = b"moov";

const BOX_HEADER_LEN: usize = 8;
const LARGE_BOX_HEADER_LEN: usize = 16;

/// Payload and frame timeline of a decoded video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedVideo {
    pub payload: Vec<u8>,
    /// Frame timestamps in nanoseconds.
    pub timeline: Vec<i64>,
}

/// Splits a video buffer into a displayable payload and its frame timeline.
pub trait VideoDecoder: Send + Sync {
    fn decode(&self, buffer: &[u8]) -> Result<DecodedVideo>;
}

/// A top-level ISO base media box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp4Box {
    pub kind: [u8; 4],
    pub offset: usize,
    pub header_len: usize,
    pub size: usize,
}

impl Mp4Box {
    pub fn kind_str(&self) -> String {
        String::from_utf8_lossy(&self.kind).into_owned()
    }

    pub fn body<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        &buffer[self.offset + self.header_len..self.offset + self.size]
    }
}

/// Walk the top-level boxes of `buffer`, checking that their sizes tile it.
pub fn read_boxes(buffer: &[u8]) -> Result<Vec<Mp4Box>> {
    let mut boxes = Vec::new();
    let mut offset = 0;

    while offset < buffer.len() {
        let rest = &buffer[offset..];
        if rest.len() < BOX_HEADER_LEN {
            bail!("Truncated box header at offset {offset}");
        }
        let size = u32::from_be_bytes(rest[0..4].try_into()?);
        let kind: [u8; 4] = rest[4..8].try_into()?;

        let (header_len, size) = match size {
            // Box extends to the end of the file.
            0 => (BOX_HEADER_LEN, rest.len() as u64),
            1 => {
                if rest.len() < LARGE_BOX_HEADER_LEN {
                    bail!("Truncated large box header at offset {offset}");
                }
                (
                    LARGE_BOX_HEADER_LEN,
                    u64::from_be_bytes(rest[8..16].try_into()?),
                )
            }
            n => (BOX_HEADER_LEN, u64::from(n)),
        };

        let mp4_box = Mp4Box {
            kind,
            offset,
            header_len,
            size: size as usize,
        };
        if size < header_len as u64 || size > rest.len() as u64 {
            bail!(
                "Box '{}' at offset {offset} has invalid size {size}",
                mp4_box.kind_str()
            );
        }
        boxes.push(mp4_box);
        offset += mp4_box.size;
    }

    Ok(boxes)
}

/// Read the frame timestamps from a metadata box body, converted to
/// nanoseconds.
pub fn read_frame_timestamps(metadata: &[u8]) -> Result<Vec<i64>> {
    let start = metadata
        .windows(FRAME_TIMESTAMPS_MARKER.len())
        .position(|window| window == FRAME_TIMESTAMPS_MARKER)
        .ok_or_else(|| anyhow!("Screen recording has no frame timestamp metadata"))?;
    let mut reader = &metadata[start + FRAME_TIMESTAMPS_MARKER.len()..];

    let mut count = [0u8; 4];
    reader
        .read_exact(&mut count)
        .context("Truncated frame count")?;
    let count = u32::from_le_bytes(count) as usize;

    // Every frame needs eight bytes, so a count beyond that is corrupt.
    if count > reader.len() / 8 {
        bail!(
            "Frame count {count} exceeds the {} bytes of timestamp data",
            reader.len()
        );
    }

    let mut timeline = Vec::with_capacity(count);
    for frame in 0..count {
        let mut micros = [0u8; 8];
        reader.read_exact(&mut micros)?;
        let nanos = i64::try_from(u64::from_le_bytes(micros))
            .ok()
            .and_then(|us| us.checked_mul(1000))
            .ok_or_else(|| anyhow!("Frame {frame} timestamp out of range"))?;
        timeline.push(nanos);
    }
    Ok(timeline)
}

/// MP4 screen recording decoder. The payload is the untouched file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp4Decoder;

impl VideoDecoder for Mp4Decoder {
    fn decode(&self, buffer: &[u8]) -> Result<DecodedVideo> {
        let boxes = read_boxes(buffer)?;
        match boxes.first() {
            Some(first) if &first.kind == b"ftyp" => {}
            _ => bail!("Not an MP4 file: missing leading ftyp box"),
        }
        let metadata = boxes
            .iter()
            .find(|b| &b.kind == METADATA_BOX)
            .ok_or_else(|| anyhow!("Screen recording has no frame timestamp metadata"))?;
        let timeline = read_frame_timestamps(metadata.body(buffer))?;
        Ok(DecodedVideo {
            payload: buffer.to_vec(),
            timeline,
        })
    }
}

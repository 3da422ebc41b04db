//! Common test utilities for tracescope integration tests.

#![allow(dead_code)]

use protobuf::CodedOutputStream;
use tracescope::magic::{LAYER_TRACE_MAGIC_NUMBER, WINDOW_TRACE_MAGIC_NUMBER};

pub fn encode(f: impl FnOnce(&mut CodedOutputStream) -> protobuf::Result<()>) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut os = CodedOutputStream::vec(&mut buf);
        f(&mut os).expect("Failed to encode test message");
        os.flush().expect("Failed to flush test message");
    }
    buf
}

/// The fixed64 `magic_number` value whose field encoding is `magic`.
fn magic_value(magic: &[u8; 9]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&magic[1..]);
    u64::from_le_bytes(bytes)
}

pub fn layer(id: i32, name: &str, parent: Option<i32>) -> Vec<u8> {
    encode(|os| {
        os.write_int32(1, id)?;
        os.write_string(2, name)?;
        if let Some(parent) = parent {
            os.write_int32(19, parent)?;
        }
        Ok(())
    })
}

pub fn layers_dump(layers: &[Vec<u8>]) -> Vec<u8> {
    encode(|os| {
        for layer in layers {
            os.write_bytes(1, layer)?;
        }
        Ok(())
    })
}

/// A SurfaceFlinger trace with one entry per `(timestamp, reason)`.
pub fn layers_trace(entries: &[(i64, &str)]) -> Vec<u8> {
    encode(|os| {
        os.write_fixed64(1, magic_value(&LAYER_TRACE_MAGIC_NUMBER))?;
        for (i, (ts, reason)) in entries.iter().enumerate() {
            let snapshot = layers_dump(&[layer(i as i32 + 1, "StatusBar", Some(0))]);
            let entry = encode(|os| {
                os.write_sfixed64(1, *ts)?;
                os.write_string(2, reason)?;
                os.write_bytes(3, &snapshot)?;
                Ok(())
            });
            os.write_bytes(2, &entry)?;
        }
        Ok(())
    })
}

/// A WindowManager trace, each entry carrying a rotation enum code.
pub fn window_trace(entries: &[(u64, i32)]) -> Vec<u8> {
    encode(|os| {
        os.write_fixed64(1, magic_value(&WINDOW_TRACE_MAGIC_NUMBER))?;
        for (ts, rotation) in entries {
            let service = encode(|os| os.write_enum(7, *rotation));
            let entry = encode(|os| {
                os.write_fixed64(1, *ts)?;
                os.write_string(2, "trace.enable")?;
                os.write_bytes(3, &service)?;
                Ok(())
            });
            os.write_bytes(2, &entry)?;
        }
        Ok(())
    })
}

/// A transaction trace with one surface creation per timestamp.
pub fn transaction_trace(timestamps: &[i64]) -> Vec<u8> {
    encode(|os| {
        for (i, ts) in timestamps.iter().enumerate() {
            let creation = encode(|os| {
                os.write_int32(1, i as i32)?;
                os.write_string(2, "com.example/MainActivity")?;
                os.write_uint32(3, 1080)?;
                os.write_uint32(4, 1920)?;
                Ok(())
            });
            let increment = encode(|os| {
                os.write_int64(1, *ts)?;
                os.write_bytes(3, &creation)?;
                Ok(())
            });
            os.write_bytes(1, &increment)?;
        }
        Ok(())
    })
}

/// Minimal MP4 with frame timestamp metadata in microseconds.
pub fn screen_recording(frame_micros: &[u64]) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&0x18u32.to_be_bytes());
    buffer.extend_from_slice(b"ftypmp42");
    buffer.extend_from_slice(&0u32.to_be_bytes());
    buffer.extend_from_slice(b"isommp42");

    // Media data containing a stray marker that must not be read as metadata.
    let mut media = b"frame".to_vec();
    media.extend_from_slice(tracescope::video::FRAME_TIMESTAMPS_MARKER);
    media.extend_from_slice(&1u32.to_le_bytes());
    media.extend_from_slice(&999u64.to_le_bytes());
    push_box(&mut buffer, b"mdat", &media);

    let mut metadata = tracescope::video::FRAME_TIMESTAMPS_MARKER.to_vec();
    metadata.extend_from_slice(&(frame_micros.len() as u32).to_le_bytes());
    for us in frame_micros {
        metadata.extend_from_slice(&us.to_le_bytes());
    }
    let mut udta = Vec::new();
    push_box(&mut udta, b"udta", &metadata);
    push_box(&mut buffer, b"moov", &udta);
    buffer
}

fn push_box(buffer: &mut Vec<u8>, kind: &[u8; 4], body: &[u8]) {
    buffer.extend_from_slice(&(body.len() as u32 + 8).to_be_bytes());
    buffer.extend_from_slice(kind);
    buffer.extend_from_slice(body);
}

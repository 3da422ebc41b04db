//! Builders for encoded trace buffers used across unit tests.

use protobuf::CodedOutputStream;

use crate::magic::MagicSignature;

pub(crate) fn encode(f: impl FnOnce(&mut CodedOutputStream) -> protobuf::Result<()>) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut os = CodedOutputStream::vec(&mut buf);
        f(&mut os).expect("Failed to encode test message");
        os.flush().expect("Failed to flush test message");
    }
    buf
}

/// The `magic_number` field value whose encoding starts with `signature`.
pub(crate) fn magic_value(signature: &MagicSignature) -> u64 {
    let bytes: [u8; 8] = signature.bytes()[1..9]
        .try_into()
        .expect("structured trace signatures are nine bytes");
    u64::from_le_bytes(bytes)
}

/// A `LayerProto` with an id and a name.
pub(crate) fn layer(id: i32, name: &str) -> Vec<u8> {
    encode(|os| {
        os.write_int32(1, id)?;
        os.write_string(2, name)?;
        Ok(())
    })
}

/// A `LayersProto` snapshot holding the given layers.
pub(crate) fn layers_dump(layers: &[Vec<u8>]) -> Vec<u8> {
    encode(|os| {
        for layer in layers {
            os.write_bytes(1, layer)?;
        }
        Ok(())
    })
}

/// A complete `LayersTraceFileProto`, one single-layer entry per timestamp.
pub(crate) fn layers_trace(signature: &MagicSignature, timestamps: &[i64]) -> Vec<u8> {
    encode(|os| {
        os.write_fixed64(1, magic_value(signature))?;
        for (i, ts) in timestamps.iter().enumerate() {
            let snapshot = layers_dump(&[layer(i as i32 + 1, "Wallpaper")]);
            let entry = encode(|os| {
                os.write_sfixed64(1, *ts)?;
                os.write_string(2, "visibleLayersChanged")?;
                os.write_bytes(3, &snapshot)?;
                Ok(())
            });
            os.write_bytes(2, &entry)?;
        }
        Ok(())
    })
}

/// A transaction `Trace` with one surface creation per timestamp.
pub(crate) fn transaction_trace(timestamps: &[i64]) -> Vec<u8> {
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

/// A minimal MP4 screen recording: `ftyp`, `mdat`, then a `moov` box holding
/// the frame timestamp metadata.
pub(crate) fn screen_recording(frame_micros: &[u64]) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&0x18u32.to_be_bytes());
    buffer.extend_from_slice(b"ftypmp42");
    buffer.extend_from_slice(&0u32.to_be_bytes());
    buffer.extend_from_slice(b"isommp42");

    // Media data containing a stray marker that must not be read as metadata.
    let mut media = b"frame".to_vec();
    media.extend_from_slice(crate::video::FRAME_TIMESTAMPS_MARKER);
    media.extend_from_slice(&1u32.to_le_bytes());
    media.extend_from_slice(&999u64.to_le_bytes());
    push_box(&mut buffer, b"mdat", &media);

    let mut metadata = crate::video::FRAME_TIMESTAMPS_MARKER.to_vec();
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

//! Transparent split/merge of oversized values, with optional compression.
//!
//! Cross-chunk atomicity is not provided: chunks are written one at a
//! time with no crash-safe ordering, so a reader racing a concurrent
//! [`safe_set_value`] may observe a partial chunk sequence (decided,
//! see DESIGN.md open question 2 — inherited from the original rather
//! than remedied here).

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Chunk size chosen conservatively because JSON/base64 wire encoding
/// inflates binary payloads roughly 33%; 300 KiB keeps the on-wire frame
/// comfortably under common proxy/transport limits.
pub const PACKED_VALUE_SIZE: usize = 300 * 1024;

/// Errors from chunked read/write, distinct from `NotExists` (the
/// backend's own absence signal, used to detect the end of a chunk run).
#[derive(Debug, thiserror::Error)]
pub enum ChunkError<E: std::error::Error + 'static> {
    #[error("backend error: {0}")]
    Backend(#[source] E),
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
}

/// The minimal get/set/delete surface the chunker needs from whatever
/// holds the actual key/value pairs (the discovery client's blocking
/// request API, in practice).
pub trait ValueBackend {
    type Error: std::error::Error + 'static;

    fn get_raw(&mut self, key: &str) -> Result<Option<Vec<u8>>, Self::Error>;
    fn set_raw(&mut self, key: &str, value: Vec<u8>) -> Result<(), Self::Error>;
    fn delete_raw(&mut self, key: &str) -> Result<(), Self::Error>;
}

fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("writing to an in-memory encoder cannot fail");
    encoder.finish().expect("finishing an in-memory encoder cannot fail")
}

fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn chunk_key(key: &str, index: usize) -> String {
    if index == 0 {
        key.to_owned()
    } else {
        format!("{key}.{index}")
    }
}

/// Delete `key` and every `key.N` chunk, stopping at the first absent
/// chunk. Errors from individual deletes are not propagated (matching the
/// original, which logs and continues): a partially-chunked key should
/// never block a subsequent full rewrite.
fn delete_existing_chunks<B: ValueBackend>(backend: &mut B, key: &str) {
    let mut n = 0usize;
    loop {
        let k = chunk_key(key, n);
        match backend.get_raw(&k) {
            Ok(Some(_)) => {
                let _ = backend.delete_raw(&k);
                n += 1;
            }
            _ => break,
        }
    }
}

/// Write `value` under `key`, splitting into `key`, `key.1`, `key.2`, …
/// whenever the (optionally compressed) payload exceeds
/// [`PACKED_VALUE_SIZE`]. Always deletes any prior chunking of `key`
/// first, so re-writing a smaller value never leaves a stale tail.
pub fn safe_set_value<B: ValueBackend>(
    backend: &mut B,
    key: &str,
    value: &[u8],
    use_compression: bool,
) -> Result<(), ChunkError<B::Error>> {
    let payload = if use_compression { compress(value) } else { value.to_vec() };

    delete_existing_chunks(backend, key);

    if payload.len() < PACKED_VALUE_SIZE {
        backend.set_raw(key, payload).map_err(ChunkError::Backend)?;
        return Ok(());
    }

    for (index, piece) in payload.chunks(PACKED_VALUE_SIZE).enumerate() {
        backend
            .set_raw(&chunk_key(key, index), piece.to_vec())
            .map_err(ChunkError::Backend)?;
    }
    Ok(())
}

/// Read a value written by [`safe_set_value`]: probes `key.N` until the
/// backend reports absence, concatenates, then decompresses if requested.
pub fn safe_get_value<B: ValueBackend>(
    backend: &mut B,
    key: &str,
    use_compression: bool,
) -> Result<Option<Vec<u8>>, ChunkError<B::Error>> {
    let mut data = Vec::new();
    let mut n = 0usize;
    loop {
        let k = chunk_key(key, n);
        match backend.get_raw(&k).map_err(ChunkError::Backend)? {
            Some(piece) => {
                data.extend_from_slice(&piece);
                n += 1;
            }
            None if n == 0 => return Ok(None),
            None => break,
        }
    }

    if use_compression {
        decompress(&data).map(Some).map_err(ChunkError::Decompress)
    } else {
        Ok(Some(data))
    }
}

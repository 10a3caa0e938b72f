//! Async counterpart to [`mesh_core::chunk`]'s `ValueBackend`-driven
//! chunker (§4.8). The split/merge algorithm — delete any prior chunking
//! before a rewrite, probe `key.N` until absence, compress before
//! splitting — is identical to `mesh_core::chunk::{safe_set_value,
//! safe_get_value}`; it is reimplemented here against the client's async
//! request calls rather than routed through `ValueBackend`, since that
//! trait's methods are synchronous and the discovery client's
//! request/response path is inherently async.

use crate::connection::ClientError;
use crate::DiscoveryClient;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use mesh_core::chunk::PACKED_VALUE_SIZE;
use std::io::{Read, Write};

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

async fn delete_existing_chunks(client: &DiscoveryClient, key: &str) -> Result<(), ClientError> {
    let mut n = 0usize;
    loop {
        let k = chunk_key(key, n);
        match client.get_value(&k).await? {
            Some(_) => {
                client.delete_value(&k).await?;
                n += 1;
            }
            None => break,
        }
    }
    Ok(())
}

pub(crate) async fn safe_set_value(
    client: &DiscoveryClient,
    key: &str,
    value: &[u8],
    use_compression: bool,
) -> Result<(), ClientError> {
    let payload = if use_compression { compress(value) } else { value.to_vec() };

    delete_existing_chunks(client, key).await?;

    if payload.len() < PACKED_VALUE_SIZE {
        return client.set_value(key, payload).await;
    }

    for (index, piece) in payload.chunks(PACKED_VALUE_SIZE).enumerate() {
        client.set_value(chunk_key(key, index), piece.to_vec()).await?;
    }
    Ok(())
}

pub(crate) async fn safe_get_value(
    client: &DiscoveryClient,
    key: &str,
    use_compression: bool,
) -> Result<Option<Vec<u8>>, ClientError> {
    let mut data = Vec::new();
    let mut n = 0usize;
    loop {
        let k = chunk_key(key, n);
        match client.get_value(&k).await? {
            Some(piece) => {
                data.extend_from_slice(&piece);
                n += 1;
            }
            None if n == 0 => return Ok(None),
            None => break,
        }
    }

    if use_compression {
        decompress(&data).map(Some).map_err(ClientError::Decompress)
    } else {
        Ok(Some(data))
    }
}

//! Columnar binary format
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic "QVH5" | version u32 | attr_len u32 | attributes (JSON)
//! block: embeddings   f32 matrix, byte-shuffled then gzip level 9
//! block: texts        length-prefixed UTF-8 strings, gzip
//! block: filenames    length-prefixed UTF-8 strings, gzip
//! block: token_counts i32 array, gzip
//! block: models       length-prefixed UTF-8 strings, gzip
//! ```
//!
//! Each block is `len u32 | crc32 u32 | compressed payload`; the checksum
//! covers the compressed bytes and is verified on load. The attributes
//! record carries `file_id`, `embedding_count`, `embedding_dimension`,
//! `storage_format` and the document metadata blob.
//!
//! Vectors are stored as raw f32, so a load reproduces them exactly.

use crate::error::{Error, Result};
use crate::types::{EmbeddedChunk, PersistedEmbeddingSet, SetMetadata};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

const MAGIC: &[u8; 4] = b"QVH5";
const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Attributes {
    file_id: String,
    embedding_count: usize,
    embedding_dimension: usize,
    storage_format: String,
    metadata: SetMetadata,
}

fn corrupt(reason: impl Into<String>) -> Error {
    Error::PersistFailed(format!("columnar file corrupt: {}", reason.into()))
}

/// Byte-shuffle: group byte 0 of every word, then byte 1, and so on.
/// Similar words then share long runs, which gzip exploits.
fn shuffle(bytes: &[u8], word: usize) -> Vec<u8> {
    let n = bytes.len() / word;
    let mut out = vec![0u8; bytes.len()];
    for i in 0..n {
        for j in 0..word {
            out[j * n + i] = bytes[i * word + j];
        }
    }
    out
}

fn unshuffle(bytes: &[u8], word: usize) -> Vec<u8> {
    let n = bytes.len() / word;
    let mut out = vec![0u8; bytes.len()];
    for i in 0..n {
        for j in 0..word {
            out[i * word + j] = bytes[j * n + i];
        }
    }
    out
}

fn write_block(out: &mut Vec<u8>, raw: &[u8]) -> Result<()> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(raw)
        .and_then(|_| encoder.finish())
        .map(|compressed| {
            out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
            out.extend_from_slice(&crc32fast::hash(&compressed).to_le_bytes());
            out.extend_from_slice(&compressed);
        })
        .map_err(|e| Error::PersistFailed(format!("compression failed: {}", e)))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(corrupt("unexpected end of file"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn read_block(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()? as usize;
        let checksum = self.read_u32()?;
        let compressed = self.take(len)?;
        if crc32fast::hash(compressed) != checksum {
            return Err(corrupt("checksum mismatch"));
        }
        let mut raw = Vec::new();
        GzDecoder::new(compressed)
            .read_to_end(&mut raw)
            .map_err(|e| corrupt(format!("decompression failed: {}", e)))?;
        Ok(raw)
    }
}

fn encode_strings<'a>(items: impl Iterator<Item = &'a str>, count: usize) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(count as u32).to_le_bytes());
    for item in items {
        out.extend_from_slice(&(item.len() as u32).to_le_bytes());
        out.extend_from_slice(item.as_bytes());
    }
    out
}

fn decode_strings(raw: &[u8]) -> Result<Vec<String>> {
    let mut cursor = Cursor { bytes: raw, pos: 0 };
    let count = cursor.read_u32()? as usize;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        let len = cursor.read_u32()? as usize;
        let bytes = cursor.take(len)?;
        items.push(
            String::from_utf8(bytes.to_vec()).map_err(|e| corrupt(format!("bad UTF-8: {}", e)))?,
        );
    }
    Ok(items)
}

pub fn to_bytes(set: &PersistedEmbeddingSet) -> Result<Vec<u8>> {
    let dimension = set.dimension();
    if set.embeddings.iter().any(|c| c.embedding.len() != dimension) {
        return Err(Error::PersistFailed(
            "embedding dimensions are not uniform".to_string(),
        ));
    }

    let attributes = Attributes {
        file_id: set.file_id.clone(),
        embedding_count: set.embeddings.len(),
        embedding_dimension: dimension,
        storage_format: "hdf5".to_string(),
        metadata: set.metadata.clone(),
    };
    let attr_json =
        serde_json::to_vec(&attributes).map_err(|e| Error::PersistFailed(e.to_string()))?;

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(attr_json.len() as u32).to_le_bytes());
    out.extend_from_slice(&attr_json);

    // embeddings: row-major f32, shuffled for compressibility
    let mut matrix = Vec::with_capacity(set.embeddings.len() * dimension * 4);
    for chunk in &set.embeddings {
        for value in &chunk.embedding {
            matrix.extend_from_slice(&value.to_le_bytes());
        }
    }
    write_block(&mut out, &shuffle(&matrix, 4))?;

    write_block(
        &mut out,
        &encode_strings(
            set.embeddings.iter().map(|c| c.text.as_str()),
            set.embeddings.len(),
        ),
    )?;
    write_block(
        &mut out,
        &encode_strings(
            set.embeddings.iter().map(|c| c.filename.as_str()),
            set.embeddings.len(),
        ),
    )?;

    let mut counts = Vec::with_capacity(4 + set.embeddings.len() * 4);
    counts.extend_from_slice(&(set.embeddings.len() as u32).to_le_bytes());
    for chunk in &set.embeddings {
        counts.extend_from_slice(&(chunk.token_count as i32).to_le_bytes());
    }
    write_block(&mut out, &counts)?;

    write_block(
        &mut out,
        &encode_strings(
            set.embeddings.iter().map(|c| c.embedding_model.as_str()),
            set.embeddings.len(),
        ),
    )?;

    Ok(out)
}

pub fn from_bytes(bytes: &[u8]) -> Result<PersistedEmbeddingSet> {
    let mut cursor = Cursor { bytes, pos: 0 };

    if cursor.take(4)? != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = cursor.read_u32()?;
    if version != VERSION {
        return Err(corrupt(format!("unsupported version {}", version)));
    }

    let attr_len = cursor.read_u32()? as usize;
    let attributes: Attributes = serde_json::from_slice(cursor.take(attr_len)?)
        .map_err(|e| corrupt(format!("bad attributes: {}", e)))?;
    let n = attributes.embedding_count;
    let dimension = attributes.embedding_dimension;

    let matrix = unshuffle(&cursor.read_block()?, 4);
    if matrix.len() != n * dimension * 4 {
        return Err(corrupt(format!(
            "embedding matrix is {} bytes, expected {}",
            matrix.len(),
            n * dimension * 4
        )));
    }

    let texts = decode_strings(&cursor.read_block()?)?;
    let filenames = decode_strings(&cursor.read_block()?)?;

    let counts_raw = cursor.read_block()?;
    let mut counts_cursor = Cursor {
        bytes: &counts_raw,
        pos: 0,
    };
    let counts_len = counts_cursor.read_u32()? as usize;
    let mut token_counts = Vec::with_capacity(counts_len);
    for _ in 0..counts_len {
        let raw = counts_cursor.take(4)?;
        token_counts.push(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]));
    }

    let models = decode_strings(&cursor.read_block()?)?;

    if texts.len() != n || filenames.len() != n || token_counts.len() != n || models.len() != n {
        return Err(corrupt("dataset lengths disagree"));
    }

    let embeddings = (0..n)
        .map(|i| {
            let offset = i * dimension * 4;
            let embedding = (0..dimension)
                .map(|j| {
                    let at = offset + j * 4;
                    f32::from_le_bytes([
                        matrix[at],
                        matrix[at + 1],
                        matrix[at + 2],
                        matrix[at + 3],
                    ])
                })
                .collect();
            EmbeddedChunk {
                filename: filenames[i].clone(),
                text: texts[i].clone(),
                token_count: token_counts[i] as u32,
                embedding,
                embedding_model: models[i].clone(),
            }
        })
        .collect();

    Ok(PersistedEmbeddingSet {
        file_id: attributes.file_id,
        embeddings,
        metadata: attributes.metadata,
        storage_format: attributes.storage_format,
        embedding_count: n,
    })
}

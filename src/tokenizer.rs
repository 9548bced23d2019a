//! Byte-pair tokenization
//!
//! Chunk boundaries are defined in token space, so the same encoder must be
//! used for chunking and for token counting at embed time. Encoders are
//! selected by name and are read-only after load; one instance is shared
//! process-wide behind an `Arc`.

use crate::error::{Error, Result};
use tiktoken_rs::CoreBPE;

/// A named byte-pair encoder with a reversible encode/decode pair.
pub struct Tokenizer {
    name: String,
    bpe: CoreBPE,
}

impl Tokenizer {
    /// Load an encoder by name. Known names are the OpenAI vocabulary
    /// families; anything else is an error.
    pub fn by_name(name: &str) -> Result<Self> {
        let bpe = match name {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            other => {
                return Err(Error::ChunkingFailed(format!(
                    "unknown tokenizer: {}",
                    other
                )))
            }
        }
        .map_err(|e| Error::ChunkingFailed(format!("failed to load {}: {}", name, e)))?;

        Ok(Self {
            name: name.to_string(),
            bpe,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encode text to its token sequence. No special tokens are recognized;
    /// input text is treated as plain content.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text)
    }

    /// Decode a token sequence back to text.
    pub fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| Error::ChunkingFailed(format!("token decode failed: {}", e)))
    }

    pub fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

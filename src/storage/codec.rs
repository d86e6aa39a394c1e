//! # Block Codec
//!
//! Translates one record to and from the fixed-size block buffer the file
//! stores.
//!
//! ## Encoding
//!
//! 1. Serialize the record to its canonical JSON string.
//! 2. When the store is compressed, run the dictionary compressor over the
//!    bytes; otherwise keep the raw UTF-8.
//! 3. Pad to the block size with ASCII spaces (0x20).
//!
//! ## Decoding
//!
//! The padding is never stripped explicitly. A raw payload is sliced from
//! the first `{` to the last `}`; a compressed payload is decompressed
//! first (space padding decodes to harmless dictionary text containing no
//! braces) and then sliced the same way. Anything that fails to slice or
//! parse is a [`StoreError::CorruptBlock`].
//!
//! `payload` (the pre-padding bytes) is split out from `encode` because the
//! insert path needs the encoded length to decide whether the store must be
//! resized before anything is written.

use eyre::{ensure, Result};

use crate::error::StoreError;
use crate::parsing::parse_json;
use crate::storage::smaz;
use crate::types::JsonValue;

const PAD_BYTE: u8 = b' ';

#[derive(Debug, Clone, Copy)]
pub struct BlockCodec {
    compressed: bool,
}

impl BlockCodec {
    pub fn new(compressed: bool) -> Self {
        Self { compressed }
    }

    pub fn compressed(&self) -> bool {
        self.compressed
    }

    /// The pre-padding encoded form of `record`.
    pub fn payload(&self, record: &JsonValue) -> Vec<u8> {
        let json = record.to_string().into_bytes();
        if self.compressed {
            smaz::compress(&json)
        } else {
            json
        }
    }

    /// Length of the pre-padding encoding; drives resize decisions.
    pub fn encoded_len(&self, record: &JsonValue) -> u64 {
        self.payload(record).len() as u64
    }

    /// Pads an already-computed payload out to a full block buffer.
    pub fn pad(&self, mut payload: Vec<u8>, block_size: u64) -> Result<Vec<u8>> {
        ensure!(
            payload.len() as u64 <= block_size,
            "record encodes to {} bytes, exceeding block size {}",
            payload.len(),
            block_size
        );
        payload.resize(block_size as usize, PAD_BYTE);
        Ok(payload)
    }

    /// Encodes `record` into a full block buffer of exactly `block_size`
    /// bytes.
    pub fn encode(&self, record: &JsonValue, block_size: u64) -> Result<Vec<u8>> {
        self.pad(self.payload(record), block_size)
    }

    /// Decodes the record stored in `data`; `block` is only used for error
    /// context.
    pub fn decode(&self, block: u64, data: &[u8]) -> Result<JsonValue> {
        let raw;
        let bytes: &[u8] = if self.compressed {
            raw = smaz::decompress(data)
                .map_err(|e| StoreError::corrupt_block(block, e.to_string()))?;
            &raw
        } else {
            data
        };

        let start = bytes.iter().position(|&b| b == b'{');
        let end = bytes.iter().rposition(|&b| b == b'}');
        let (start, end) = match (start, end) {
            (Some(s), Some(e)) if s < e => (s, e),
            _ => {
                return Err(StoreError::corrupt_block(block, "no JSON object delimiters").into())
            }
        };

        let text = std::str::from_utf8(&bytes[start..=end])
            .map_err(|e| StoreError::corrupt_block(block, e.to_string()))?;
        parse_json(text).map_err(|e| StoreError::corrupt_block(block, e.to_string()).into())
    }
}

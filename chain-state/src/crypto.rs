//! Content hashing for blocks
//!
//! This module provides:
//! - A canonical byte encoding for blocks (fixed field order, big-endian
//!   integers, length-prefixed strings)
//! - SHA-256 hashing of that encoding
//!
//! The encoding is independent of the JSON layout on disk, so reformatting a
//! log line never changes a block's hash.

use crate::types::{Block, BlockHeader, Hash, Tx};
use sha2::{Digest, Sha256};

/// Encoding version, first byte of every canonical encoding
pub const CODEC_VERSION: u8 = 1;

const DOM_BLOCK: &[u8] = b"BLK";

/// Canonical encoder
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create new encoder
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn write_u32(&mut self, n: u32) {
        self.write_bytes(&n.to_be_bytes());
    }

    fn write_u64(&mut self, n: u64) {
        self.write_bytes(&n.to_be_bytes());
    }

    /// Length-prefixed (u64)
    fn write_string(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write_bytes(s.as_bytes());
    }

    fn write_header(&mut self, header: &BlockHeader) {
        self.write_bytes(header.parent.as_bytes());
        self.write_u64(header.number);
        self.write_u64(header.time);
    }

    fn write_tx(&mut self, tx: &Tx) {
        self.write_string(tx.from.as_str());
        self.write_string(tx.to.as_str());
        self.write_u64(tx.value);
        self.write_string(&tx.data);
    }

    /// Encode a whole block
    pub fn write_block(&mut self, block: &Block) {
        self.buffer.push(CODEC_VERSION);
        self.write_bytes(DOM_BLOCK);
        self.write_header(&block.header);
        self.write_u32(block.txs.len() as u32);
        for tx in &block.txs {
            self.write_tx(tx);
        }
    }

    /// Finalize and return bytes
    pub fn finalize(self) -> Vec<u8> {
        self.buffer
    }
}

/// Canonical bytes of a block
pub fn block_bytes(block: &Block) -> Vec<u8> {
    let mut enc = CanonicalEncoder::new();
    enc.write_block(block);
    enc.finalize()
}

/// Hash a block using SHA-256 over its canonical bytes
pub fn hash_block(block: &Block) -> Hash {
    Hash::from_bytes(hash_bytes(&block_bytes(block)))
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

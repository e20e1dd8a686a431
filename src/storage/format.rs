//! Stored block format
//!
//! Block handles, compression, and the checksum trailer.

use serde::{Deserialize, Serialize};

use crate::backend::RandomAccessFile;
use crate::config::Compression;
use crate::error::{BurstError, Result};

use super::BLOCK_TRAILER_SIZE;

/// Encoded size of a `BlockHandle`
pub const BLOCK_HANDLE_SIZE: usize = 16;

/// Payload encoding recorded in the trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockType {
    Raw = 0x00,
    Snappy = 0x01,
}

impl BlockType {
    fn from_u8(b: u8) -> Result<Self> {
        match b {
            0x00 => Ok(BlockType::Raw),
            0x01 => Ok(BlockType::Snappy),
            _ => Err(BurstError::Corruption(format!(
                "unknown block type: 0x{:02x}",
                b
            ))),
        }
    }
}

/// Location of a stored block payload (trailer excluded)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

impl BlockHandle {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    pub fn encode(&self) -> [u8; BLOCK_HANDLE_SIZE] {
        let mut out = [0u8; BLOCK_HANDLE_SIZE];
        out[..8].copy_from_slice(&self.offset.to_le_bytes());
        out[8..].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != BLOCK_HANDLE_SIZE {
            return Err(BurstError::Corruption(format!(
                "bad block handle length: {}",
                bytes.len()
            )));
        }
        let mut offset = [0u8; 8];
        let mut size = [0u8; 8];
        offset.copy_from_slice(&bytes[..8]);
        size.copy_from_slice(&bytes[8..]);
        Ok(Self {
            offset: u64::from_le_bytes(offset),
            size: u64::from_le_bytes(size),
        })
    }

    /// Bytes occupied on disk, trailer included
    pub fn stored_size(&self) -> u64 {
        self.size.saturating_add(BLOCK_TRAILER_SIZE as u64)
    }
}

fn block_crc(payload: &[u8], block_type: BlockType) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.update(&[block_type as u8]);
    hasher.finalize()
}

/// Pick the stored form of a raw block payload.
///
/// Snappy output is kept when it saves at least 1/8 of the raw size, or
/// unconditionally when `force` is set. With `paranoid`, compressed output
/// is decoded again and compared with the input.
pub fn compress_block(
    raw: Vec<u8>,
    compression: Compression,
    force: bool,
    paranoid: bool,
) -> Result<(Vec<u8>, BlockType)> {
    match compression {
        Compression::None => Ok((raw, BlockType::Raw)),
        Compression::Snappy => {
            let compressed = snap::raw::Encoder::new().compress_vec(&raw)?;
            if !force && compressed.len() >= raw.len() - raw.len() / 8 {
                return Ok((raw, BlockType::Raw));
            }
            if paranoid {
                let check = snap::raw::Decoder::new().decompress_vec(&compressed)?;
                if check != raw {
                    return Err(BurstError::Compression(
                        "snappy round trip mismatch".to_string(),
                    ));
                }
            }
            Ok((compressed, BlockType::Snappy))
        }
    }
}

/// Append `payload` and its trailer to `dst`
pub fn write_block(dst: &mut Vec<u8>, payload: &[u8], block_type: BlockType) {
    dst.extend_from_slice(payload);
    dst.push(block_type as u8);
    dst.extend_from_slice(&block_crc(payload, block_type).to_le_bytes());
}

/// Fetch a stored block and return its uncompressed payload.
///
/// A checksum mismatch (when `verify` is set) is a corruption error.
pub fn read_block(
    file: &dyn RandomAccessFile,
    handle: &BlockHandle,
    verify: bool,
) -> Result<Vec<u8>> {
    let file_len = file.size()?;
    let stored_len = handle
        .size
        .checked_add(BLOCK_TRAILER_SIZE as u64)
        .filter(|len| {
            handle
                .offset
                .checked_add(*len)
                .map_or(false, |end| end <= file_len)
        })
        .ok_or_else(|| {
            BurstError::Corruption(format!(
                "block handle out of range: offset {} size {} (file has {})",
                handle.offset, handle.size, file_len
            ))
        })?;
    let stored = file.read_at(handle.offset, stored_len as usize)?;
    let n = handle.size as usize;
    let block_type = BlockType::from_u8(stored[n])?;

    if verify {
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&stored[n + 1..n + BLOCK_TRAILER_SIZE]);
        let expected = u32::from_le_bytes(crc);
        let actual = block_crc(&stored[..n], block_type);
        if expected != actual {
            return Err(BurstError::Corruption(format!(
                "block checksum mismatch at offset {}: expected {:08x}, got {:08x}",
                handle.offset, expected, actual
            )));
        }
    }

    match block_type {
        BlockType::Raw => {
            let mut payload = stored;
            payload.truncate(n);
            Ok(payload)
        }
        BlockType::Snappy => Ok(snap::raw::Decoder::new().decompress_vec(&stored[..n])?),
    }
}

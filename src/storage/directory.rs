//! Fragment directory
//!
//! The top-level file a reader opens instead of scanning the logs.
//!
//! ## File Format
//! ```text
//! ┌──────────┬──────────┬──────────────────────────┬───────────┐
//! │ "BKVD"   │ len u32  │ bincode(Directory)       │ crc32 u32 │
//! └──────────┴──────────┴──────────────────────────┴───────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BurstError, Result};

use super::format::BlockHandle;

/// Magic bytes identifying a directory file
const MAGIC: &[u8; 4] = b"BKVD";

/// Current directory format version
const VERSION: u32 = 1;

/// Magic (4) + length (4)
const HEADER_SIZE: usize = 8;

/// Descriptor of one persisted table fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMeta {
    /// Epoch whose appends the fragment holds
    pub epoch: u32,
    /// Position among the partition's fragments (compaction order)
    pub seq: u32,
    pub num_entries: u64,
    /// Filter block in the index log (absent when filters are disabled)
    pub filter: Option<BlockHandle>,
    /// Block index in the index log
    pub index: BlockHandle,
    /// Uncompressed data block bytes
    pub data_bytes: u64,
}

/// Everything a reader needs to open a finished store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub version: u32,
    pub lg_parts: u32,
    pub unique_keys: bool,
    /// Epochs sealed by the writer
    pub num_epochs: u32,
    /// Fragments of each partition, in compaction order
    pub partitions: Vec<Vec<FragmentMeta>>,
}

impl Directory {
    pub fn new(lg_parts: u32, unique_keys: bool) -> Self {
        Self {
            version: VERSION,
            lg_parts,
            unique_keys,
            num_epochs: 0,
            partitions: vec![Vec::new(); 1usize << lg_parts],
        }
    }

    pub fn num_fragments(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len() + 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE + 4 {
            return Err(BurstError::Corruption(format!(
                "directory too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(BurstError::Corruption(format!(
                "invalid directory magic: expected BKVD, got {:?}",
                &bytes[0..4]
            )));
        }

        let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        if bytes.len() != HEADER_SIZE + len + 4 {
            return Err(BurstError::Corruption(format!(
                "directory length mismatch: header says {}, file has {}",
                len,
                bytes.len() - HEADER_SIZE - 4
            )));
        }

        let payload = &bytes[HEADER_SIZE..HEADER_SIZE + len];
        let tail = &bytes[HEADER_SIZE + len..];
        let expected = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
        if crc32fast::hash(payload) != expected {
            return Err(BurstError::Corruption(
                "directory checksum mismatch".to_string(),
            ));
        }

        let dir: Directory = bincode::deserialize(payload)?;
        if dir.version != VERSION {
            return Err(BurstError::Corruption(format!(
                "unsupported directory version: {}",
                dir.version
            )));
        }
        if dir.partitions.len() != 1usize << dir.lg_parts {
            return Err(BurstError::Corruption(format!(
                "directory lists {} partitions for lg_parts {}",
                dir.partitions.len(),
                dir.lg_parts
            )));
        }
        Ok(dir)
    }
}

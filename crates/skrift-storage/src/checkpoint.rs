//! Bootstrap checkpoint (`bootstrap.checkpoint`) reader.
//!
//! The layout past the 16-byte preamble is not publicly documented, so
//! this is a best-effort parse: entries are read as long as their length
//! field stays within sane bounds, and parsing stops quietly at the
//! first implausible value instead of failing the whole file.

use std::path::Path;

use bytes::Bytes;
use skrift_common::{Error, Result};
use tracing::debug;

const PREAMBLE_SIZE: usize = 16;
// offset (8) + crc (4) + length (4) + timestamp (8) + 8 reserved
const ENTRY_FIXED_SIZE: usize = 32;
const MAX_ENTRY_LENGTH: i32 = 10_000;
const MAX_ENTRIES: usize = 50;

/// One best-effort checkpoint entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointEntry {
    pub offset: i64,
    pub crc: u32,
    pub length: i32,
    pub timestamp: i64,
    pub data: Bytes,
}

/// A parsed bootstrap checkpoint file.
#[derive(Debug, Clone)]
pub struct BootstrapCheckpoint {
    pub header_offset: i64,
    pub entry_count: i32,
    pub entries: Vec<CheckpointEntry>,
}

impl BootstrapCheckpoint {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < PREAMBLE_SIZE {
            return Err(Error::InvalidSegment(format!(
                "bootstrap checkpoint too small: {} bytes (need {} for the preamble)",
                data.len(),
                PREAMBLE_SIZE
            )));
        }

        let header_offset = i64::from_be_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ]);
        let entry_count = i32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        debug!(
            "Checkpoint preamble: header_offset={} entry_count={}",
            header_offset, entry_count
        );

        let mut entries = Vec::new();
        let mut pos = PREAMBLE_SIZE;

        while entries.len() < MAX_ENTRIES && pos + ENTRY_FIXED_SIZE <= data.len() {
            let offset = i64::from_be_bytes([
                data[pos],
                data[pos + 1],
                data[pos + 2],
                data[pos + 3],
                data[pos + 4],
                data[pos + 5],
                data[pos + 6],
                data[pos + 7],
            ]);
            let crc = u32::from_be_bytes([data[pos + 8], data[pos + 9], data[pos + 10], data[pos + 11]]);
            let length =
                i32::from_be_bytes([data[pos + 12], data[pos + 13], data[pos + 14], data[pos + 15]]);

            if !(0..=MAX_ENTRY_LENGTH).contains(&length) {
                debug!("Stopping at byte {} on implausible length {}", pos + 12, length);
                break;
            }

            let timestamp = i64::from_be_bytes([
                data[pos + 16],
                data[pos + 17],
                data[pos + 18],
                data[pos + 19],
                data[pos + 20],
                data[pos + 21],
                data[pos + 22],
                data[pos + 23],
            ]);
            // 8 reserved bytes trail the timestamp.
            pos += ENTRY_FIXED_SIZE;

            let end = pos + length as usize;
            if end > data.len() {
                debug!("Stopping at byte {}: entry body runs past end of file", pos);
                break;
            }
            let entry_data = Bytes::copy_from_slice(&data[pos..end]);
            pos = end;

            entries.push(CheckpointEntry {
                offset,
                crc,
                length,
                timestamp,
                data: entry_data,
            });
        }

        debug!("Parsed {} bootstrap checkpoint entries", entries.len());
        Ok(BootstrapCheckpoint {
            header_offset,
            entry_count,
            entries,
        })
    }
}

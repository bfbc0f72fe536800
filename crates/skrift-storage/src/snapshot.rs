//! KRaft snapshot (`.snapshot`) reader.
//!
//! The header layout here (version, crc, last offset) matches what
//! current brokers write; the payload past the 14-byte header is
//! returned verbatim.

use std::path::Path;

use bytes::Bytes;
use skrift_common::{Error, Result};
use tracing::debug;

const HEADER_SIZE: usize = 14;

/// Fixed-layout snapshot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: i16,
    pub crc: u32,
    /// Last offset included in the snapshot
    pub last_offset: i64,
}

/// A parsed snapshot file: header plus opaque payload.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub header: SnapshotHeader,
    pub payload: Bytes,
}

impl Snapshot {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::InvalidSegment(format!(
                "snapshot too small: {} bytes (need {} for the header)",
                data.len(),
                HEADER_SIZE
            )));
        }

        let version = i16::from_be_bytes([data[0], data[1]]);
        let crc = u32::from_be_bytes([data[2], data[3], data[4], data[5]]);
        let last_offset = i64::from_be_bytes([
            data[6], data[7], data[8], data[9], data[10], data[11], data[12], data[13],
        ]);
        debug!(
            "Snapshot version {} crc {:#010x} last_offset {}",
            version, crc, last_offset
        );

        Ok(Snapshot {
            header: SnapshotHeader {
                version,
                crc,
                last_offset,
            },
            payload: Bytes::copy_from_slice(&data[HEADER_SIZE..]),
        })
    }
}

/// Parse the 20-digit zero-padded base offset out of a segment artifact
/// filename such as `00000000000000000186.snapshot`.
pub fn base_offset_from_filename(path: impl AsRef<Path>) -> Result<i64> {
    let path = path.as_ref();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidSegment(format!("no file stem in {}", path.display())))?;

    if stem.len() != 20 || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidSegment(format!(
            "expected a 20-digit base offset, got {:?}",
            stem
        )));
    }

    stem.parse::<i64>()
        .map_err(|e| Error::InvalidSegment(format!("unparseable base offset {:?}: {}", stem, e)))
}

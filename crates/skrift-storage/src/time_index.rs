//! Time index (`.timeindex`) reader.
//!
//! Packed 12-byte entries mapping a millisecond timestamp to the
//! relative offset of the first batch at or after it.

use std::path::Path;

use skrift_common::{Error, Result};
use tracing::debug;

/// One time index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeIndexEntry {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Offset relative to the segment's base offset
    pub relative_offset: i32,
}

const ENTRY_SIZE: usize = 12;

/// Parsed time index with lookup helpers.
#[derive(Debug, Clone, Default)]
pub struct TimeIndex {
    pub entries: Vec<TimeIndexEntry>,
}

impl TimeIndex {
    /// Parse a whole time index file. An empty file is a valid empty index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        if data.is_empty() {
            debug!("Time index file {} is empty", path.as_ref().display());
            return Ok(Self::default());
        }
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() % ENTRY_SIZE != 0 {
            return Err(Error::InvalidSegment(format!(
                "invalid time index file size: {} bytes (must be a multiple of {})",
                data.len(),
                ENTRY_SIZE
            )));
        }

        let entries = data
            .chunks_exact(ENTRY_SIZE)
            .map(|chunk| TimeIndexEntry {
                timestamp: i64::from_be_bytes([
                    chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
                ]),
                relative_offset: i32::from_be_bytes([chunk[8], chunk[9], chunk[10], chunk[11]]),
            })
            .collect::<Vec<_>>();

        debug!("Decoded {} time index entries", entries.len());
        Ok(TimeIndex { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Relative offset of the largest `timestamp <= target`, or -1 when
    /// the index is empty or every entry is newer than the target.
    pub fn find_offset_by_time(&self, target: i64) -> i32 {
        let mut left = 0usize;
        let mut right = self.entries.len();
        let mut relative_offset = -1;

        while left < right {
            let mid = left + (right - left) / 2;
            if self.entries[mid].timestamp <= target {
                relative_offset = self.entries[mid].relative_offset;
                left = mid + 1;
            } else {
                right = mid;
            }
        }

        relative_offset
    }

    /// Earliest and latest indexed timestamps; `None` when empty.
    pub fn range(&self) -> Option<(i64, i64)> {
        match (self.entries.first(), self.entries.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_entries(entries: &[(i64, i32)]) -> Vec<u8> {
        let mut data = Vec::new();
        for (timestamp, offset) in entries {
            data.extend_from_slice(&timestamp.to_be_bytes());
            data.extend_from_slice(&offset.to_be_bytes());
        }
        data
    }

    #[test]
    fn test_range_and_lookup() {
        let index = TimeIndex::parse(&encode_entries(&[
            (1_700_000_000_000, 0),
            (1_700_000_001_000, 10),
        ]))
        .unwrap();

        assert_eq!(index.range(), Some((1_700_000_000_000, 1_700_000_001_000)));
        assert_eq!(index.find_offset_by_time(1_700_000_000_500), 0);
        assert_eq!(index.find_offset_by_time(1_699_999_999_000), -1);
        assert_eq!(index.find_offset_by_time(1_700_000_001_000), 10);
        assert_eq!(index.find_offset_by_time(i64::MAX), 10);
    }

    #[test]
    fn test_empty_time_index() {
        let index = TimeIndex::parse(&[]).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.range(), None);
        assert_eq!(index.find_offset_by_time(0), -1);
    }

    #[test]
    fn test_misaligned_file_rejected() {
        let data = vec![0u8; 13];
        assert!(TimeIndex::parse(&data).is_err());
    }
}

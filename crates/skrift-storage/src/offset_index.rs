//! Sparse offset index (`.index`) reader.
//!
//! The file is a packed sequence of 8-byte entries mapping a relative
//! offset to the byte position of its batch in the `.log` file. Kafka
//! writes these sparsely, so lookups return the closest entry at or
//! below the target.

use std::path::Path;

use skrift_common::{Error, Result};
use tracing::debug;

/// One sparse index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Offset relative to the segment's base offset
    pub relative_offset: i32,
    /// Byte position of the batch in the log file
    pub position: i32,
}

const ENTRY_SIZE: usize = 8;

/// Parsed offset index with lookup helpers.
#[derive(Debug, Clone, Default)]
pub struct OffsetIndex {
    pub entries: Vec<IndexEntry>,
}

impl OffsetIndex {
    /// Parse a whole index file. An empty file is a valid empty index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        if data.is_empty() {
            debug!("Index file {} is empty", path.as_ref().display());
            return Ok(Self::default());
        }
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() % ENTRY_SIZE != 0 {
            return Err(Error::InvalidSegment(format!(
                "invalid index file size: {} bytes (must be a multiple of {})",
                data.len(),
                ENTRY_SIZE
            )));
        }

        let entries = data
            .chunks_exact(ENTRY_SIZE)
            .map(|chunk| IndexEntry {
                relative_offset: i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                position: i32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
            })
            .collect::<Vec<_>>();

        debug!("Decoded {} index entries", entries.len());
        Ok(OffsetIndex { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Byte position of the largest `relative_offset <= target`, or -1
    /// when the index is empty or every entry lies above the target.
    pub fn find_position(&self, target: i32) -> i32 {
        let mut left = 0usize;
        let mut right = self.entries.len();
        let mut position = -1;

        while left < right {
            let mid = left + (right - left) / 2;
            if self.entries[mid].relative_offset <= target {
                position = self.entries[mid].position;
                left = mid + 1;
            } else {
                right = mid;
            }
        }

        position
    }

    /// Smallest and largest indexed relative offsets; `None` when empty.
    pub fn range(&self) -> Option<(i32, i32)> {
        match (self.entries.first(), self.entries.last()) {
            (Some(first), Some(last)) => Some((first.relative_offset, last.relative_offset)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn encode_entries(entries: &[(i32, i32)]) -> Vec<u8> {
        let mut data = Vec::new();
        for (offset, position) in entries {
            data.extend_from_slice(&offset.to_be_bytes());
            data.extend_from_slice(&position.to_be_bytes());
        }
        data
    }

    #[test]
    fn test_find_position() {
        let index = OffsetIndex::parse(&encode_entries(&[(0, 0), (50, 420), (150, 1800)])).unwrap();

        assert_eq!(index.find_position(0), 0);
        assert_eq!(index.find_position(49), 0);
        assert_eq!(index.find_position(50), 420);
        assert_eq!(index.find_position(120), 420);
        assert_eq!(index.find_position(150), 1800);
        assert_eq!(index.find_position(10_000), 1800);
        assert_eq!(index.find_position(-1), -1);
    }

    #[test]
    fn test_empty_index() {
        let index = OffsetIndex::parse(&[]).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.find_position(10), -1);
        assert_eq!(index.range(), None);
    }

    #[test]
    fn test_misaligned_file_rejected() {
        let mut data = encode_entries(&[(0, 0)]);
        data.push(0xaa);
        assert!(OffsetIndex::parse(&data).is_err());
    }

    #[test]
    fn test_range() {
        let index = OffsetIndex::parse(&encode_entries(&[(5, 100), (90, 7000)])).unwrap();
        assert_eq!(index.range(), Some((5, 90)));
    }

    #[test]
    fn test_open_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&encode_entries(&[(0, 0), (10, 512)]))
            .unwrap();
        file.flush().unwrap();

        let index = OffsetIndex::open(file.path()).unwrap();
        assert_eq!(index.entries.len(), 2);
        assert_eq!(index.find_position(10), 512);
    }
}

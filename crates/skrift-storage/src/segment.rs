//! Log segment (`.log`) reader.
//!
//! A segment is a concatenation of record batches consumed sequentially
//! until end of file. Every batch CRC is verified; a mismatch aborts the
//! parse with the batch index and byte offset in the error.

use std::path::Path;

use skrift_common::{Error, Result};
use skrift_protocol::parser::Decoder;
use skrift_protocol::records::{decode_batch_sequence, RecordBatch};
use tracing::debug;

/// A fully parsed log segment.
#[derive(Debug, Clone)]
pub struct LogSegment {
    /// Base offset parsed from the 20-digit filename, when opened from
    /// a file
    pub base_offset: Option<i64>,
    pub batches: Vec<RecordBatch>,
}

impl LogSegment {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let base_offset = crate::snapshot::base_offset_from_filename(path).ok();

        let mut segment = Self::parse(&data)?;
        segment.base_offset = base_offset;
        Ok(segment)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let batches = decode_batch_sequence(&mut decoder, data.len()).map_err(Error::Decode)?;
        debug!("Decoded {} batches from log segment", batches.len());

        Ok(LogSegment {
            base_offset: None,
            batches,
        })
    }

    /// Total record count across all batches.
    pub fn record_count(&self) -> usize {
        self.batches.iter().map(|b| b.records.len()).sum()
    }

    /// Offset one past the last record in the segment, or `None` when
    /// the segment is empty.
    pub fn next_offset(&self) -> Option<i64> {
        self.batches
            .last()
            .map(|b| b.base_offset + b.last_offset_delta as i64 + 1)
    }
}

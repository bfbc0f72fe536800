//! On-disk Kafka segment artifact readers for Skrift.
//!
//! Decoders for the files a broker leaves in a log directory:
//! - `.log` segments (sequences of record batches, CRC-verified)
//! - `.index` sparse offset indexes
//! - `.timeindex` timestamp indexes
//! - `.snapshot` KRaft snapshots
//! - `bootstrap.checkpoint` (best-effort)

pub mod checkpoint;
pub mod offset_index;
pub mod segment;
pub mod snapshot;
pub mod time_index;

pub use checkpoint::{BootstrapCheckpoint, CheckpointEntry};
pub use offset_index::{IndexEntry, OffsetIndex};
pub use segment::LogSegment;
pub use snapshot::{base_offset_from_filename, Snapshot, SnapshotHeader};
pub use time_index::{TimeIndex, TimeIndexEntry};

//! Common types and utilities shared across Skrift components.

pub mod error;
pub mod hexdump;

pub use error::{DecodeError, DecodeErrorKind, DecodeResult, Error, ErrorContext, Result};
pub use hexdump::InspectableHexDump;

/// Re-export commonly used external types
pub use bytes::Bytes;
pub use uuid::Uuid;

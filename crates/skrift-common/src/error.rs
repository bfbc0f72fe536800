//! Error types for Skrift.

use thiserror::Error;

use crate::hexdump::InspectableHexDump;

/// Result type alias for Skrift operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for wire and file decoding.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Main error type for Skrift.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structured decoding errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid segment errors
    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// What went wrong while decoding.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// A fixed-width read ran past the end of the buffer
    #[error("insufficient data: expected {expected} byte(s), only {remaining} remaining")]
    InsufficientData { expected: usize, remaining: usize },

    /// Array length is negative, larger than the buffer, or implausibly large
    #[error("invalid array length")]
    InvalidArrayLength,

    /// String length is negative (other than the null sentinel) or larger than the buffer
    #[error("invalid string length")]
    InvalidStringLength,

    /// Varint encoding exceeds the maximum width for its type
    #[error("varint exceeds maximum encoded length")]
    VarintOverflow,

    /// Boolean byte is neither 0 nor 1
    #[error("invalid boolean byte")]
    InvalidBool,

    /// UUID is not exactly 16 bytes or not in canonical form
    #[error("invalid UUID")]
    InvalidUuid,

    /// Stored record batch CRC does not match the computed CRC-32C
    #[error("CRC mismatch: expected {expected:#010x}, computed {actual:#010x}")]
    CrcMismatch { expected: u32, actual: u32 },

    /// Bytes were left over after the outermost message body
    #[error("{0} trailing byte(s) after message body")]
    TrailingBytes(usize),

    /// The cursor did not land where a length field said it should
    #[error("cursor not at expected position")]
    UnexpectedCursor,
}

/// A structured decoding error.
///
/// Carries the byte offset at which decoding halted and a breadcrumb
/// chain of field contexts, innermost first. Layers append one context
/// each while unwinding, so `["crc", "RecordBatch[0]"]` reads inside
/// out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at offset {offset}")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub context: Vec<String>,
    pub offset: usize,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, offset: usize) -> Self {
        Self {
            kind,
            context: Vec::new(),
            offset,
        }
    }

    /// Append one breadcrumb. The first call records the innermost field.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Render the error atop a hex dump of the bytes being decoded,
    /// with a caret at the failure offset.
    pub fn render_with_received(&self, received: &[u8]) -> String {
        let mut out = String::from("Received:\n");

        if received.is_empty() {
            out.push_str("(no bytes)\n");
        } else {
            let highlight = self.offset.min(received.len() - 1);
            let dump = InspectableHexDump::new(received);
            out.push_str(&dump.format_with_highlighted_offset(highlight));
            out.push('\n');
        }

        out.push_str(&format!("Error: {}\n", self.kind));
        out.push_str("Context:\n");

        let mut indent = String::new();
        for ctx in self.context.iter().rev() {
            out.push_str(&format!("{}- {}\n", indent, ctx));
            indent.push_str("  ");
        }

        out
    }
}

/// Extension trait for attaching field context to decode results.
pub trait ErrorContext<T> {
    fn context(self, context: impl Into<String>) -> DecodeResult<T>;
}

impl<T> ErrorContext<T> for DecodeResult<T> {
    fn context(self, context: impl Into<String>) -> DecodeResult<T> {
        self.map_err(|e| e.context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_order_is_innermost_first() {
        let err = DecodeError::new(DecodeErrorKind::InvalidBool, 3)
            .context("is_internal")
            .context("Topic[1]")
            .context("DescribeTopicPartitions Response v0");

        assert_eq!(
            err.context,
            vec!["is_internal", "Topic[1]", "DescribeTopicPartitions Response v0"]
        );
    }

    #[test]
    fn test_render_nests_outermost_first() {
        let err = DecodeError::new(DecodeErrorKind::InvalidBool, 1)
            .context("inner")
            .context("outer");
        let rendered = err.render_with_received(&[0x41, 0x02]);

        assert!(rendered.contains("Received:"));
        assert!(rendered.contains("Error: invalid boolean byte"));
        assert!(rendered.contains("- outer\n  - inner"));
    }

    #[test]
    fn test_display_includes_offset() {
        let err = DecodeError::new(
            DecodeErrorKind::InsufficientData {
                expected: 4,
                remaining: 1,
            },
            7,
        );
        let message = err.to_string();
        assert!(message.contains("expected 4 byte(s)"));
        assert!(message.contains("offset 7"));
    }
}

//! Kafka protocol frame handling for request/response framing.
//!
//! The Kafka protocol uses length-prefixed messages:
//! - Request: [Length: i32][RequestMessage]
//! - Response: [Length: i32][ResponseMessage]

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use skrift_common::{Error, Result};

/// Maximum frame size (100MB) to prevent OOM attacks
const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Prepend a 4-byte big-endian length prefix to an encoded message.
pub fn pack_message(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_i32(payload.len() as i32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Kafka protocol frame decoder/encoder
pub struct KafkaFrameCodec {
    /// Maximum allowed frame size
    max_frame_size: usize,
}

impl KafkaFrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for KafkaFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for KafkaFrameCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // Need at least 4 bytes for the length prefix
        if src.len() < 4 {
            trace!("Not enough data for length prefix, have {} bytes", src.len());
            return Ok(None);
        }

        // Peek at the length without consuming
        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&src[..4]);
        let length = i32::from_be_bytes(length_bytes);

        if length < 0 {
            return Err(Error::Protocol(format!("Negative frame size {}", length)));
        }
        let length = length as usize;

        if length > self.max_frame_size {
            return Err(Error::Protocol(format!(
                "Frame size {} exceeds maximum {}",
                length, self.max_frame_size
            )));
        }

        // Check if we have the complete frame
        if src.len() < 4 + length {
            trace!(
                "Waiting for complete frame, have {} bytes, need {}",
                src.len(),
                4 + length
            );
            src.reserve(4 + length - src.len());
            return Ok(None);
        }

        debug!("Decoding frame of {} bytes", length);

        src.advance(4);
        let frame = src.split_to(length).freeze();

        Ok(Some(frame))
    }
}

impl Encoder<Bytes> for KafkaFrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        let length = item.len();

        if length > self.max_frame_size {
            return Err(Error::Protocol(format!(
                "Frame size {} exceeds maximum {}",
                length, self.max_frame_size
            )));
        }

        debug!("Encoding frame of {} bytes", length);

        dst.reserve(4 + length);
        dst.put_i32(length as i32);
        dst.put(item);

        Ok(())
    }
}

/// An unframed message together with its lazily extracted correlation ID.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The frame data (length prefix already stripped)
    pub data: Bytes,
    /// Optional correlation ID extracted from the header
    pub correlation_id: Option<i32>,
}

impl Frame {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(data: Bytes, correlation_id: i32) -> Self {
        Self {
            data,
            correlation_id: Some(correlation_id),
        }
    }

    /// Frame size, excluding the length prefix.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Extract the correlation ID from a v2 request header
    /// (api_key: i16, api_version: i16, correlation_id: i32).
    pub fn extract_correlation_id(&mut self) -> Option<i32> {
        if self.correlation_id.is_some() {
            return self.correlation_id;
        }

        if self.data.len() >= 8 {
            let mut data = self.data.clone();
            data.advance(4);
            let correlation_id = data.get_i32();
            self.correlation_id = Some(correlation_id);
            Some(correlation_id)
        } else {
            None
        }
    }
}

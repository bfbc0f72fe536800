//! Request and response header codecs.
//!
//! Requests in this core always use header v2 (api key, api version,
//! correlation id, nullable client id, tag buffer). Responses use header
//! v0 (correlation id only) for ApiVersions and header v1 (correlation
//! id plus tag buffer) for flexible bodies.

use serde::{Deserialize, Serialize};
use skrift_common::{DecodeError, DecodeErrorKind, DecodeResult, ErrorContext};

use crate::parser::{Decoder, Encoder};

/// Kafka API keys handled by this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum ApiKey {
    Produce = 0,
    Fetch = 1,
    ApiVersions = 18,
    CreateTopics = 19,
    DescribeTopicPartitions = 75,
}

impl ApiKey {
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(ApiKey::Produce),
            1 => Some(ApiKey::Fetch),
            18 => Some(ApiKey::ApiVersions),
            19 => Some(ApiKey::CreateTopics),
            75 => Some(ApiKey::DescribeTopicPartitions),
            _ => None,
        }
    }
}

/// Kafka request header (v2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub api_key: ApiKey,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

impl RequestHeader {
    pub fn encode(&self, encoder: &mut Encoder<'_>) {
        encoder.write_i16(self.api_key as i16);
        encoder.write_i16(self.api_version);
        encoder.write_i32(self.correlation_id);
        encoder.write_nullable_string(self.client_id.as_deref());
        encoder.write_empty_tag_buffer();
    }

    pub fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let api_key_offset = decoder.position();
        let api_key_raw = decoder.read_i16().context("api_key")?;
        let api_key = ApiKey::from_i16(api_key_raw).ok_or_else(|| {
            DecodeError::new(DecodeErrorKind::UnexpectedCursor, api_key_offset)
                .context(format!("api_key ({})", api_key_raw))
        })?;

        let api_version = decoder.read_i16().context("api_version")?;
        let correlation_id = decoder.read_i32().context("correlation_id")?;
        let client_id = decoder.read_nullable_string().context("client_id")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(RequestHeader {
            api_key,
            api_version,
            correlation_id,
            client_id,
        })
    }
}

/// Kafka response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub correlation_id: i32,
}

impl ResponseHeader {
    pub fn new(correlation_id: i32) -> Self {
        Self { correlation_id }
    }

    /// Header v0: correlation id only. Used by ApiVersions responses.
    pub fn encode_v0(&self, encoder: &mut Encoder<'_>) {
        encoder.write_i32(self.correlation_id);
    }

    /// Header v1: correlation id plus tag buffer. Used by flexible bodies.
    pub fn encode_v1(&self, encoder: &mut Encoder<'_>) {
        encoder.write_i32(self.correlation_id);
        encoder.write_empty_tag_buffer();
    }

    pub fn decode_v0(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let correlation_id = decoder.read_i32().context("Header.CorrelationID")?;
        Ok(Self { correlation_id })
    }

    pub fn decode_v1(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let correlation_id = decoder.read_i32().context("Header.CorrelationID")?;
        decoder.consume_tag_buffer().context("Header.TAG_BUFFER")?;
        Ok(Self { correlation_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_request_header_round_trip() {
        let header = RequestHeader {
            api_key: ApiKey::Fetch,
            api_version: 16,
            correlation_id: 42,
            client_id: Some("kafka-tester".to_string()),
        };

        let mut buf = BytesMut::new();
        header.encode(&mut Encoder::new(&mut buf));

        let mut decoder = Decoder::new(&buf);
        let decoded = RequestHeader::decode(&mut decoder).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoder.remaining(), 0);
    }

    #[test]
    fn test_request_header_null_client_id() {
        let header = RequestHeader {
            api_key: ApiKey::ApiVersions,
            api_version: 4,
            correlation_id: 0,
            client_id: None,
        };

        let mut buf = BytesMut::new();
        header.encode(&mut Encoder::new(&mut buf));
        // api_key + api_version + correlation_id + (-1) + tag buffer
        assert_eq!(buf.len(), 2 + 2 + 4 + 2 + 1);

        let decoded = RequestHeader::decode(&mut Decoder::new(&buf)).unwrap();
        assert_eq!(decoded.client_id, None);
    }

    #[test]
    fn test_response_header_v0() {
        let bytes = [0x00, 0x00, 0x00, 0x07];
        let header = ResponseHeader::decode_v0(&mut Decoder::new(&bytes)).unwrap();
        assert_eq!(header.correlation_id, 7);
    }

    #[test]
    fn test_response_header_v1_round_trip() {
        let mut buf = BytesMut::new();
        ResponseHeader::new(-3).encode_v1(&mut Encoder::new(&mut buf));

        let mut decoder = Decoder::new(&buf);
        let header = ResponseHeader::decode_v1(&mut decoder).unwrap();
        assert_eq!(header.correlation_id, -3);
        assert_eq!(decoder.remaining(), 0);
    }

    #[test]
    fn test_unknown_api_key_is_refused() {
        let mut buf = BytesMut::new();
        let mut encoder = Encoder::new(&mut buf);
        encoder.write_i16(99);
        encoder.write_i16(0);
        encoder.write_i32(1);
        encoder.write_nullable_string(None);
        encoder.write_empty_tag_buffer();

        assert!(RequestHeader::decode(&mut Decoder::new(&buf)).is_err());
    }
}

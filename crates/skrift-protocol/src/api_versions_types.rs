//! ApiVersions API types (v3/v4).
//!
//! The response body is flexible but is paired with response header v0.
//! This asymmetry is mandated by the protocol so that clients can parse
//! the version advertisement before they know which header versions the
//! broker supports.

use serde::{Deserialize, Serialize};
use skrift_common::{DecodeError, DecodeErrorKind, DecodeResult, ErrorContext};

use crate::headers::ResponseHeader;
use crate::parser::{Decoder, Encoder, KafkaDecodable, KafkaEncodable};

/// ApiVersions request body (v3+).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersionsRequest {
    pub client_software_name: String,
    pub client_software_version: String,
}

impl KafkaEncodable for ApiVersionsRequest {
    fn encode(&self, encoder: &mut Encoder<'_>, _version: i16) {
        encoder.write_compact_string(&self.client_software_name);
        encoder.write_compact_string(&self.client_software_version);
        encoder.write_empty_tag_buffer();
    }
}

impl KafkaDecodable for ApiVersionsRequest {
    fn decode(decoder: &mut Decoder<'_>, _version: i16) -> DecodeResult<Self> {
        let client_software_name = decoder
            .read_compact_string()
            .context("client_software_name")?;
        let client_software_version = decoder
            .read_compact_string()
            .context("client_software_version")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(ApiVersionsRequest {
            client_software_name,
            client_software_version,
        })
    }
}

/// Version range advertised for a single API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersionRange {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

impl ApiVersionRange {
    fn encode(&self, encoder: &mut Encoder<'_>) {
        encoder.write_i16(self.api_key);
        encoder.write_i16(self.min_version);
        encoder.write_i16(self.max_version);
        encoder.write_empty_tag_buffer();
    }

    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let api_key = decoder.read_i16().context("api_key")?;
        let min_version = decoder.read_i16().context("min_version")?;
        let max_version = decoder.read_i16().context("max_version")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(ApiVersionRange {
            api_key,
            min_version,
            max_version,
        })
    }
}

/// ApiVersions response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersionsResponse {
    pub error_code: i16,
    pub api_keys: Vec<ApiVersionRange>,
    pub throttle_time_ms: i32,
}

impl KafkaEncodable for ApiVersionsResponse {
    fn encode(&self, encoder: &mut Encoder<'_>, _version: i16) {
        encoder.write_i16(self.error_code);
        encoder.write_compact_array_length(self.api_keys.len());
        for range in &self.api_keys {
            range.encode(encoder);
        }
        encoder.write_i32(self.throttle_time_ms);
        encoder.write_empty_tag_buffer();
    }
}

impl KafkaDecodable for ApiVersionsResponse {
    fn decode(decoder: &mut Decoder<'_>, _version: i16) -> DecodeResult<Self> {
        let error_code = decoder.read_i16().context("error_code")?;

        let count = decoder.read_compact_array_length().context("api_keys")?;
        let mut api_keys = Vec::with_capacity(count);
        for i in 0..count {
            api_keys.push(ApiVersionRange::decode(decoder).context(format!("ApiKeys[{}]", i))?);
        }

        let throttle_time_ms = decoder.read_i32().context("throttle_time_ms")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(ApiVersionsResponse {
            error_code,
            api_keys,
            throttle_time_ms,
        })
    }
}

/// Decode a full unframed ApiVersions response: header v0, body, and a
/// zero-remainder check.
pub fn decode_api_versions_response(
    bytes: &[u8],
    version: i16,
) -> DecodeResult<(ResponseHeader, ApiVersionsResponse)> {
    let mut decoder = Decoder::new(bytes);
    let result = (|| {
        let header = ResponseHeader::decode_v0(&mut decoder)?;
        let body = ApiVersionsResponse::decode(&mut decoder, version)?;
        if decoder.remaining() > 0 {
            return Err(DecodeError::new(
                DecodeErrorKind::TrailingBytes(decoder.remaining()),
                decoder.position(),
            ));
        }
        Ok((header, body))
    })();

    result.context(format!("ApiVersions Response v{}", version))
}

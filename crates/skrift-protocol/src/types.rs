//! Request/response dispatch across the supported API families.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use skrift_common::{DecodeError, DecodeErrorKind, DecodeResult, ErrorContext};
use tracing::debug;

use crate::api_versions_types::{ApiVersionsRequest, ApiVersionsResponse};
use crate::create_topics_types::{CreateTopicsRequest, CreateTopicsResponse};
use crate::describe_topic_partitions_types::{
    DescribeTopicPartitionsRequest, DescribeTopicPartitionsResponse,
};
use crate::fetch_types::{FetchRequest, FetchResponse};
use crate::frame::pack_message;
use crate::headers::{ApiKey, RequestHeader, ResponseHeader};
use crate::parser::{Decoder, Encoder, KafkaDecodable, KafkaEncodable};
use crate::produce_types::{ProduceRequest, ProduceResponse};

/// Request body for any supported API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestBody {
    Produce(ProduceRequest),
    Fetch(FetchRequest),
    ApiVersions(ApiVersionsRequest),
    CreateTopics(CreateTopicsRequest),
    DescribeTopicPartitions(DescribeTopicPartitionsRequest),
}

impl RequestBody {
    pub fn api_key(&self) -> ApiKey {
        match self {
            RequestBody::Produce(_) => ApiKey::Produce,
            RequestBody::Fetch(_) => ApiKey::Fetch,
            RequestBody::ApiVersions(_) => ApiKey::ApiVersions,
            RequestBody::CreateTopics(_) => ApiKey::CreateTopics,
            RequestBody::DescribeTopicPartitions(_) => ApiKey::DescribeTopicPartitions,
        }
    }

    fn encode(&self, encoder: &mut Encoder<'_>, version: i16) {
        match self {
            RequestBody::Produce(body) => body.encode(encoder, version),
            RequestBody::Fetch(body) => body.encode(encoder, version),
            RequestBody::ApiVersions(body) => body.encode(encoder, version),
            RequestBody::CreateTopics(body) => body.encode(encoder, version),
            RequestBody::DescribeTopicPartitions(body) => body.encode(encoder, version),
        }
    }
}

/// A complete request: header plus matching body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub header: RequestHeader,
    pub body: RequestBody,
}

impl Request {
    /// Encode to the on-the-wire form: header v2 + body, length-prefixed.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        let mut encoder = Encoder::new(&mut buf);
        self.header.encode(&mut encoder);
        self.body.encode(&mut encoder, self.header.api_version);

        debug!(
            "Encoded {:?} v{} request, {} bytes unframed",
            self.header.api_key,
            self.header.api_version,
            buf.len()
        );
        pack_message(&buf)
    }
}

/// Decode an unframed request: header v2 then the body for its API key.
/// The whole buffer must be consumed.
pub fn decode_request(bytes: &[u8]) -> DecodeResult<Request> {
    let mut decoder = Decoder::new(bytes);
    let header = RequestHeader::decode(&mut decoder).context("Request Header")?;

    let version = header.api_version;
    let body = match header.api_key {
        ApiKey::Produce => RequestBody::Produce(ProduceRequest::decode(&mut decoder, version)?),
        ApiKey::Fetch => RequestBody::Fetch(FetchRequest::decode(&mut decoder, version)?),
        ApiKey::ApiVersions => {
            RequestBody::ApiVersions(ApiVersionsRequest::decode(&mut decoder, version)?)
        }
        ApiKey::CreateTopics => {
            RequestBody::CreateTopics(CreateTopicsRequest::decode(&mut decoder, version)?)
        }
        ApiKey::DescribeTopicPartitions => RequestBody::DescribeTopicPartitions(
            DescribeTopicPartitionsRequest::decode(&mut decoder, version)?,
        ),
    };

    if decoder.remaining() > 0 {
        return Err(DecodeError::new(
            DecodeErrorKind::TrailingBytes(decoder.remaining()),
            decoder.position(),
        ));
    }

    Ok(Request { header, body })
}

/// Response body for any supported API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseBody {
    Produce(ProduceResponse),
    Fetch(FetchResponse),
    ApiVersions(ApiVersionsResponse),
    CreateTopics(CreateTopicsResponse),
    DescribeTopicPartitions(DescribeTopicPartitionsResponse),
}

/// Decode an unframed response for a known API key and version.
///
/// ApiVersions pairs with response header v0, everything else with v1.
pub fn decode_response(
    bytes: &[u8],
    api_key: ApiKey,
    version: i16,
) -> DecodeResult<(ResponseHeader, ResponseBody)> {
    match api_key {
        ApiKey::Produce => {
            let (header, body) = crate::produce_types::decode_produce_response(bytes, version)?;
            Ok((header, ResponseBody::Produce(body)))
        }
        ApiKey::Fetch => {
            let (header, body) = crate::fetch_types::decode_fetch_response(bytes, version)?;
            Ok((header, ResponseBody::Fetch(body)))
        }
        ApiKey::ApiVersions => {
            let (header, body) =
                crate::api_versions_types::decode_api_versions_response(bytes, version)?;
            Ok((header, ResponseBody::ApiVersions(body)))
        }
        ApiKey::CreateTopics => {
            let (header, body) =
                crate::create_topics_types::decode_create_topics_response(bytes, version)?;
            Ok((header, ResponseBody::CreateTopics(body)))
        }
        ApiKey::DescribeTopicPartitions => {
            let (header, body) =
                crate::describe_topic_partitions_types::decode_describe_topic_partitions_response(
                    bytes, version,
                )?;
            Ok((header, ResponseBody::DescribeTopicPartitions(body)))
        }
    }
}

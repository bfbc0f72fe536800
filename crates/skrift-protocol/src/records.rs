//! Kafka record batch format handling (v2, KIP-98).
//!
//! The same container appears on the wire inside Fetch/Produce bodies and
//! on disk as the unit of a `.log` segment. The batch CRC is CRC-32C
//! (Castagnoli) over the contiguous bytes after the `crc` field, i.e.
//! `batch_length - 9` bytes.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use skrift_common::{DecodeError, DecodeErrorKind, DecodeResult, ErrorContext};
use tracing::debug;

use crate::parser::{Decoder, Encoder};

/// Magic byte for record batch format v2
pub const MAGIC_V2: i8 = 2;

/// Bytes between the end of `batch_length` and the end of `crc`:
/// partition_leader_epoch (4) + magic (1) + crc (4).
const PRE_CRC_LEN: i32 = 9;

/// Bytes before `batch_length` ends: base_offset (8) + batch_length (4).
const BATCH_PRELUDE_LEN: usize = 12;

/// Record header (key-value pair)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub key: String,
    pub value: Option<Bytes>,
}

/// A single record inside a batch. All integer fields are varint-encoded
/// on the wire; the leading `length` field is recomputed on encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub attributes: i8,
    pub timestamp_delta: i64,
    pub offset_delta: i32,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    pub headers: Vec<RecordHeader>,
}

/// Kafka record batch (v2 format).
///
/// `batch_length` and `crc` are populated by the decoder and recomputed
/// by the encoder; values supplied by callers are ignored on encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub base_offset: i64,
    pub batch_length: i32,
    pub partition_leader_epoch: i32,
    pub magic: i8,
    pub crc: u32,
    pub attributes: i16,
    pub last_offset_delta: i32,
    pub first_timestamp: i64,
    pub max_timestamp: i64,
    pub producer_id: i64,
    pub producer_epoch: i16,
    pub base_sequence: i32,
    pub records: Vec<Record>,
}

impl RecordBatch {
    /// Decode one batch. On CRC mismatch the error points at the `crc`
    /// field with innermost context `"crc"`.
    pub fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let batch_start = decoder.position();
        let base_offset = decoder.read_i64().context("base_offset")?;

        let batch_length_offset = decoder.position();
        let batch_length = decoder.read_i32().context("batch_length")?;
        if batch_length < PRE_CRC_LEN {
            return Err(
                DecodeError::new(DecodeErrorKind::InvalidArrayLength, batch_length_offset)
                    .context("batch_length"),
            );
        }

        let partition_leader_epoch = decoder.read_i32().context("partition_leader_epoch")?;
        let magic = decoder.read_i8().context("magic")?;
        if magic != MAGIC_V2 {
            debug!("Unexpected record batch magic byte {}", magic);
        }

        let crc_offset = decoder.position();
        let crc = decoder.read_u32().context("crc")?;

        let body_len = (batch_length - PRE_CRC_LEN) as usize;
        let body = decoder.peek_raw_bytes(body_len).context("crc")?;
        let computed = crc32c::crc32c(body);
        if computed != crc {
            return Err(DecodeError::new(
                DecodeErrorKind::CrcMismatch {
                    expected: crc,
                    actual: computed,
                },
                crc_offset,
            )
            .context("crc"));
        }

        let attributes = decoder.read_i16().context("attributes")?;
        let last_offset_delta = decoder.read_i32().context("last_offset_delta")?;
        let first_timestamp = decoder.read_i64().context("first_timestamp")?;
        let max_timestamp = decoder.read_i64().context("max_timestamp")?;
        let producer_id = decoder.read_i64().context("producer_id")?;
        let producer_epoch = decoder.read_i16().context("producer_epoch")?;
        let base_sequence = decoder.read_i32().context("base_sequence")?;

        let record_count_offset = decoder.position();
        let record_count = decoder.read_i32().context("record_count")?;
        if record_count < 0 {
            return Err(
                DecodeError::new(DecodeErrorKind::InvalidArrayLength, record_count_offset)
                    .context("record_count"),
            );
        }

        let mut records = Vec::with_capacity(record_count as usize);
        for i in 0..record_count {
            records.push(Record::decode(decoder).context(format!("Record[{}]", i))?);
        }

        // batch_length covers everything after itself
        let batch_end = batch_start + BATCH_PRELUDE_LEN + batch_length as usize;
        if decoder.position() != batch_end {
            return Err(
                DecodeError::new(DecodeErrorKind::UnexpectedCursor, decoder.position())
                    .context("batch_length"),
            );
        }

        Ok(RecordBatch {
            base_offset,
            batch_length,
            partition_leader_epoch,
            magic,
            crc,
            attributes,
            last_offset_delta,
            first_timestamp,
            max_timestamp,
            producer_id,
            producer_epoch,
            base_sequence,
            records,
        })
    }

    /// Encode the batch, back-patching `batch_length` and `crc`.
    pub fn encode(&self, encoder: &mut Encoder<'_>) {
        let batch_start = encoder.len();
        encoder.write_i64(self.base_offset);

        let batch_length_at = encoder.len();
        encoder.write_i32(0);
        encoder.write_i32(self.partition_leader_epoch);
        encoder.write_i8(MAGIC_V2);

        let crc_at = encoder.len();
        encoder.write_u32(0);
        let after_crc = encoder.len();

        encoder.write_i16(self.attributes);
        encoder.write_i32(self.last_offset_delta);
        encoder.write_i64(self.first_timestamp);
        encoder.write_i64(self.max_timestamp);
        encoder.write_i64(self.producer_id);
        encoder.write_i16(self.producer_epoch);
        encoder.write_i32(self.base_sequence);
        encoder.write_i32(self.records.len() as i32);

        for record in &self.records {
            record.encode(encoder);
        }

        let batch_end = encoder.len();
        encoder.patch_i32(
            batch_length_at,
            (batch_end - batch_start - BATCH_PRELUDE_LEN) as i32,
        );

        let crc = crc32c::crc32c(&encoder.as_slice()[after_crc..batch_end]);
        encoder.patch_u32(crc_at, crc);
    }

    /// Encode into a standalone buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut Encoder::new(&mut buf));
        buf.freeze()
    }
}

impl Record {
    pub fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let length_offset = decoder.position();
        let length = decoder.read_varint().context("length")?;
        if length < 0 {
            return Err(
                DecodeError::new(DecodeErrorKind::InvalidArrayLength, length_offset)
                    .context("length"),
            );
        }

        let body_start = decoder.position();
        let attributes = decoder.read_i8().context("attributes")?;
        let timestamp_delta = decoder.read_varlong().context("timestamp_delta")?;
        let offset_delta = decoder.read_varint().context("offset_delta")?;

        let key = read_varint_bytes(decoder).context("key")?;
        let value = read_varint_bytes(decoder).context("value")?;

        let header_count_offset = decoder.position();
        let header_count = decoder.read_varint().context("header_count")?;
        if header_count < 0 {
            return Err(
                DecodeError::new(DecodeErrorKind::InvalidArrayLength, header_count_offset)
                    .context("header_count"),
            );
        }

        let mut headers = Vec::with_capacity(header_count as usize);
        for i in 0..header_count {
            headers.push(RecordHeader::decode(decoder).context(format!("Header[{}]", i))?);
        }

        // length is the byte count of the body that follows it
        let consumed = decoder.position() - body_start;
        if consumed != length as usize {
            return Err(
                DecodeError::new(DecodeErrorKind::UnexpectedCursor, decoder.position())
                    .context("length"),
            );
        }

        Ok(Record {
            attributes,
            timestamp_delta,
            offset_delta,
            key,
            value,
            headers,
        })
    }

    /// Records are length-prefixed by a varint measuring the body, so the
    /// body goes through a scratch buffer first.
    pub fn encode(&self, encoder: &mut Encoder<'_>) {
        let mut scratch = BytesMut::new();
        let mut body = Encoder::new(&mut scratch);

        body.write_i8(self.attributes);
        body.write_varlong(self.timestamp_delta);
        body.write_varint(self.offset_delta);
        write_varint_bytes(&mut body, self.key.as_deref());
        write_varint_bytes(&mut body, self.value.as_deref());
        body.write_varint(self.headers.len() as i32);
        for header in &self.headers {
            header.encode(&mut body);
        }

        encoder.write_varint(scratch.len() as i32);
        encoder.write_raw_bytes(&scratch);
    }
}

impl RecordHeader {
    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let key_offset = decoder.position();
        let key_len = decoder.read_varint().context("key_length")?;
        if key_len < 0 {
            return Err(
                DecodeError::new(DecodeErrorKind::InvalidStringLength, key_offset)
                    .context("key_length"),
            );
        }
        let key_bytes = decoder.read_raw_bytes(key_len as usize).context("key")?;
        let key = String::from_utf8(key_bytes.to_vec()).map_err(|_| {
            DecodeError::new(DecodeErrorKind::InvalidStringLength, key_offset).context("key")
        })?;

        let value = read_varint_bytes(decoder).context("value")?;

        Ok(RecordHeader { key, value })
    }

    fn encode(&self, encoder: &mut Encoder<'_>) {
        encoder.write_varint(self.key.len() as i32);
        encoder.write_raw_bytes(self.key.as_bytes());
        write_varint_bytes(encoder, self.value.as_deref());
    }
}

/// Varint-length-prefixed bytes; length -1 denotes null.
fn read_varint_bytes(decoder: &mut Decoder<'_>) -> DecodeResult<Option<Bytes>> {
    let length_offset = decoder.position();
    let len = decoder.read_varint()?;
    match len {
        -1 => Ok(None),
        l if l < -1 => Err(DecodeError::new(
            DecodeErrorKind::InvalidArrayLength,
            length_offset,
        )),
        l => Ok(Some(Bytes::copy_from_slice(
            decoder.read_raw_bytes(l as usize)?,
        ))),
    }
}

fn write_varint_bytes(encoder: &mut Encoder<'_>, bytes: Option<&[u8]>) {
    match bytes {
        Some(b) => {
            encoder.write_varint(b.len() as i32);
            encoder.write_raw_bytes(b);
        }
        None => encoder.write_varint(-1),
    }
}

/// Decode a contiguous run of batches ending exactly at `end`, as found in
/// Fetch/Produce record blobs and `.log` segment files.
pub fn decode_batch_sequence(decoder: &mut Decoder<'_>, end: usize) -> DecodeResult<Vec<RecordBatch>> {
    let mut batches = Vec::new();
    while decoder.position() < end {
        let index = batches.len();
        batches.push(RecordBatch::decode(decoder).context(format!("RecordBatch[{}]", index))?);
    }

    if decoder.position() != end {
        return Err(
            DecodeError::new(DecodeErrorKind::UnexpectedCursor, decoder.position())
                .context("record_batches"),
        );
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skrift_common::DecodeErrorKind;

    fn tiny_batch() -> RecordBatch {
        RecordBatch {
            base_offset: 0,
            batch_length: 0,
            partition_leader_epoch: 0,
            magic: MAGIC_V2,
            crc: 0,
            attributes: 0,
            last_offset_delta: 0,
            first_timestamp: 0,
            max_timestamp: 0,
            producer_id: 0,
            producer_epoch: 0,
            base_sequence: 0,
            records: vec![Record {
                attributes: 0,
                timestamp_delta: 0,
                offset_delta: 0,
                key: None,
                value: Some(Bytes::from_static(b"hi")),
                headers: vec![],
            }],
        }
    }

    #[test]
    fn test_tiny_batch_round_trip() {
        let encoded = tiny_batch().to_bytes();

        // Record body is 8 bytes, so the batch covers 9 + 40 + 9 bytes
        // past the 12-byte prelude.
        assert_eq!(encoded.len(), 70);

        let mut decoder = Decoder::new(&encoded);
        let decoded = RecordBatch::decode(&mut decoder).unwrap();
        assert_eq!(decoder.remaining(), 0);

        assert_eq!(decoded.batch_length, 58);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].value, Some(Bytes::from_static(b"hi")));
        assert_eq!(decoded.records[0].key, None);
        assert_eq!(decoded.records[0].offset_delta, 0);
    }

    #[test]
    fn test_stored_crc_matches_recomputed() {
        let encoded = tiny_batch().to_bytes();
        let stored = u32::from_be_bytes(encoded[17..21].try_into().unwrap());
        // CRC-32C over everything after the crc field.
        assert_eq!(stored, crc32c::crc32c(&encoded[21..]));
    }

    #[test]
    fn test_reencode_is_byte_identical() {
        let encoded = tiny_batch().to_bytes();
        let decoded = RecordBatch::decode(&mut Decoder::new(&encoded)).unwrap();
        assert_eq!(decoded.to_bytes(), encoded);
    }

    #[test]
    fn test_crc_mismatch_error() {
        let mut corrupted = tiny_batch().to_bytes().to_vec();
        // Flip the last byte of the crc field.
        corrupted[20] ^= 0xff;

        let err = decode_batch_sequence(&mut Decoder::new(&corrupted), corrupted.len()).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::CrcMismatch { .. }));
        assert_eq!(err.context, vec!["crc", "RecordBatch[0]"]);
        assert_eq!(err.offset, 17);
    }

    #[test]
    fn test_multi_record_batch_with_headers() {
        let batch = RecordBatch {
            records: vec![
                Record {
                    attributes: 0,
                    timestamp_delta: 0,
                    offset_delta: 0,
                    key: Some(Bytes::from_static(b"k1")),
                    value: Some(Bytes::from_static(b"v1")),
                    headers: vec![RecordHeader {
                        key: "source".to_string(),
                        value: Some(Bytes::from_static(b"test")),
                    }],
                },
                Record {
                    attributes: 0,
                    timestamp_delta: 100,
                    offset_delta: 1,
                    key: None,
                    value: Some(Bytes::from_static(b"v2")),
                    headers: vec![RecordHeader {
                        key: "empty".to_string(),
                        value: None,
                    }],
                },
            ],
            last_offset_delta: 1,
            ..tiny_batch()
        };

        let encoded = batch.to_bytes();
        let decoded = RecordBatch::decode(&mut Decoder::new(&encoded)).unwrap();

        assert_eq!(decoded.records, batch.records);
        assert_eq!(decoded.last_offset_delta, 1);
        assert_eq!(decoded.to_bytes(), encoded);
    }

    #[test]
    fn test_batch_sequence() {
        let mut buf = BytesMut::new();
        let mut encoder = Encoder::new(&mut buf);
        let first = tiny_batch();
        let second = RecordBatch {
            base_offset: 1,
            ..tiny_batch()
        };
        first.encode(&mut encoder);
        second.encode(&mut encoder);

        let mut decoder = Decoder::new(&buf);
        let batches = decode_batch_sequence(&mut decoder, buf.len()).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].base_offset, 0);
        assert_eq!(batches[1].base_offset, 1);
    }

    #[test]
    fn test_truncated_batch_fails_with_insufficient_data() {
        let encoded = tiny_batch().to_bytes();
        let truncated = &encoded[..encoded.len() - 4];

        let err = RecordBatch::decode(&mut Decoder::new(truncated)).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::InsufficientData { .. }));
        assert!(err.offset <= truncated.len());
    }
}

//! Kafka wire protocol primitives.
//!
//! `Decoder` reads the Kafka primitive set from a byte slice with an
//! advancing cursor; every error carries the byte offset at which
//! decoding halted. `Encoder` writes the same set into a `BytesMut`
//! and cannot fail.

use bytes::{BufMut, Bytes, BytesMut};
use skrift_common::{DecodeError, DecodeErrorKind, DecodeResult};
use uuid::Uuid;

/// Compact arrays longer than this are treated as corrupt.
const MAX_COMPACT_ARRAY_LEN: usize = 2 * 65535;

/// Trait for types that can be encoded to the Kafka wire format.
pub trait KafkaEncodable {
    fn encode(&self, encoder: &mut Encoder<'_>, version: i16);
}

/// Trait for types that can be decoded from the Kafka wire format.
pub trait KafkaDecodable: Sized {
    fn decode(decoder: &mut Decoder<'_>, version: i16) -> DecodeResult<Self>;
}

/// Protocol decoder for reading Kafka protocol primitives.
///
/// Owns an exclusive cursor over the buffer; on failure the cursor is
/// not rewound and the error records where parsing halted.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to consume.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn fail(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(kind, self.pos)
    }

    fn fail_at(&self, kind: DecodeErrorKind, offset: usize) -> DecodeError {
        DecodeError::new(kind, offset)
    }

    fn take(&mut self, count: usize) -> DecodeResult<&'a [u8]> {
        if self.remaining() < count {
            return Err(self.fail(DecodeErrorKind::InsufficientData {
                expected: count,
                remaining: self.remaining(),
            }));
        }
        let slice = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Read `count` bytes without advancing the cursor.
    pub fn peek_raw_bytes(&self, count: usize) -> DecodeResult<&'a [u8]> {
        if self.remaining() < count {
            return Err(self.fail(DecodeErrorKind::InsufficientData {
                expected: count,
                remaining: self.remaining(),
            }));
        }
        Ok(&self.buf[self.pos..self.pos + count])
    }

    pub fn read_raw_bytes(&mut self, count: usize) -> DecodeResult<&'a [u8]> {
        self.take(count)
    }

    fn take_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_i8(&mut self) -> DecodeResult<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_i16(&mut self) -> DecodeResult<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> DecodeResult<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> DecodeResult<f64> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    pub fn read_bool(&mut self) -> DecodeResult<bool> {
        let start = self.pos;
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(self.fail_at(DecodeErrorKind::InvalidBool, start)),
        }
    }

    /// Read a plain LEB128 unsigned varint, at most 5 bytes for 32 bits.
    pub fn read_unsigned_varint(&mut self) -> DecodeResult<u32> {
        let start = self.pos;
        let mut value = 0u32;
        for i in 0..5 {
            let byte = self.take(1)?[0];
            value |= ((byte & 0x7f) as u32) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(self.fail_at(DecodeErrorKind::VarintOverflow, start))
    }

    /// Read a plain LEB128 unsigned varint, at most 10 bytes for 64 bits.
    pub fn read_unsigned_varlong(&mut self) -> DecodeResult<u64> {
        let start = self.pos;
        let mut value = 0u64;
        for i in 0..10 {
            let byte = self.take(1)?[0];
            value |= ((byte & 0x7f) as u64) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(self.fail_at(DecodeErrorKind::VarintOverflow, start))
    }

    /// Read a ZigZag-encoded signed varint.
    pub fn read_varint(&mut self) -> DecodeResult<i32> {
        let raw = self.read_unsigned_varint()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    /// Read a ZigZag-encoded signed varlong.
    pub fn read_varlong(&mut self) -> DecodeResult<i64> {
        let raw = self.read_unsigned_varlong()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    /// Read an `Int16`-length-prefixed string. A negative length is invalid
    /// for the non-nullable form.
    pub fn read_string(&mut self) -> DecodeResult<String> {
        let start = self.pos;
        let len = self.read_i16()?;
        if len < 0 {
            return Err(self.fail_at(DecodeErrorKind::InvalidStringLength, start));
        }
        self.read_string_body(len as usize, start)
    }

    /// Read an `Int16`-length-prefixed string where length -1 denotes null.
    pub fn read_nullable_string(&mut self) -> DecodeResult<Option<String>> {
        let start = self.pos;
        let len = self.read_i16()?;
        match len {
            -1 => Ok(None),
            l if l < 0 => Err(self.fail_at(DecodeErrorKind::InvalidStringLength, start)),
            l => self.read_string_body(l as usize, start).map(Some),
        }
    }

    /// Read a compact string. A wire length of 0 denotes null and is
    /// invalid for the non-nullable form.
    pub fn read_compact_string(&mut self) -> DecodeResult<String> {
        let start = self.pos;
        let len = self.read_unsigned_varint()?;
        if len == 0 {
            return Err(self.fail_at(DecodeErrorKind::InvalidStringLength, start));
        }
        self.read_string_body(len as usize - 1, start)
    }

    pub fn read_compact_nullable_string(&mut self) -> DecodeResult<Option<String>> {
        let start = self.pos;
        let len = self.read_unsigned_varint()?;
        if len == 0 {
            return Ok(None);
        }
        self.read_string_body(len as usize - 1, start).map(Some)
    }

    fn read_string_body(&mut self, len: usize, start: usize) -> DecodeResult<String> {
        if self.remaining() < len {
            return Err(self.fail_at(DecodeErrorKind::InvalidStringLength, start));
        }
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| self.fail_at(DecodeErrorKind::InvalidStringLength, start))
    }

    /// Read compact bytes; a wire length of 0 denotes null.
    pub fn read_compact_bytes(&mut self) -> DecodeResult<Option<Bytes>> {
        let start = self.pos;
        let len = self.read_unsigned_varint()?;
        if len == 0 {
            return Ok(None);
        }
        let len = len as usize - 1;
        if self.remaining() < len {
            return Err(self.fail_at(DecodeErrorKind::InvalidArrayLength, start));
        }
        Ok(Some(Bytes::copy_from_slice(self.take(len)?)))
    }

    /// Read a compact array length. The wire value is N+1; 0 denotes a null
    /// array, which this core treats as empty.
    pub fn read_compact_array_length(&mut self) -> DecodeResult<usize> {
        let start = self.pos;
        let raw = self.read_unsigned_varint()?;
        if raw == 0 {
            return Ok(0);
        }
        let len = raw as usize - 1;
        if len > MAX_COMPACT_ARRAY_LEN || len > self.remaining() {
            return Err(self.fail_at(DecodeErrorKind::InvalidArrayLength, start));
        }
        Ok(len)
    }

    pub fn read_compact_int32_array(&mut self) -> DecodeResult<Vec<i32>> {
        let len = self.read_compact_array_length()?;
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(self.read_i32()?);
        }
        Ok(values)
    }

    /// Read 16 raw bytes as a UUID.
    pub fn read_uuid(&mut self) -> DecodeResult<Uuid> {
        Ok(Uuid::from_bytes(self.take_array()?))
    }

    /// Skip a tagged-field buffer. Unknown tags are not retained.
    pub fn consume_tag_buffer(&mut self) -> DecodeResult<()> {
        let tag_count = self.read_unsigned_varint()?;
        for _ in 0..tag_count {
            let _tag_id = self.read_unsigned_varint()?;
            let size = self.read_unsigned_varint()? as usize;
            self.take(size)?;
        }
        Ok(())
    }
}

/// Protocol encoder for writing Kafka protocol primitives.
///
/// The buffer grows on demand, so writes cannot fail; validation happens
/// at builder time.
pub struct Encoder<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    /// Bytes written so far, used to remember patch offsets.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// View of everything written so far, used for checksumming
    /// sub-ranges before patching.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..]
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    pub fn write_raw_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_i16(value.len() as i16);
        self.buf.put_slice(value.as_bytes());
    }

    pub fn write_nullable_string(&mut self, value: Option<&str>) {
        match value {
            Some(s) => self.write_string(s),
            None => self.write_i16(-1),
        }
    }

    pub fn write_compact_string(&mut self, value: &str) {
        self.write_unsigned_varint(value.len() as u32 + 1);
        self.buf.put_slice(value.as_bytes());
    }

    pub fn write_compact_nullable_string(&mut self, value: Option<&str>) {
        match value {
            Some(s) => self.write_compact_string(s),
            None => self.write_unsigned_varint(0),
        }
    }

    pub fn write_compact_bytes(&mut self, value: Option<&[u8]>) {
        match value {
            Some(bytes) => {
                self.write_unsigned_varint(bytes.len() as u32 + 1);
                self.buf.put_slice(bytes);
            }
            None => self.write_unsigned_varint(0),
        }
    }

    /// Write a compact array length (wire value is N+1).
    pub fn write_compact_array_length(&mut self, len: usize) {
        self.write_unsigned_varint(len as u32 + 1);
    }

    pub fn write_compact_int32_array(&mut self, values: &[i32]) {
        self.write_compact_array_length(values.len());
        for &v in values {
            self.write_i32(v);
        }
    }

    pub fn write_uuid(&mut self, value: Uuid) {
        self.buf.put_slice(value.as_bytes());
    }

    pub fn write_unsigned_varint(&mut self, mut value: u32) {
        while value & !0x7f != 0 {
            self.buf.put_u8((value & 0x7f) as u8 | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub fn write_unsigned_varlong(&mut self, mut value: u64) {
        while value & !0x7f != 0 {
            self.buf.put_u8((value & 0x7f) as u8 | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    /// Write a ZigZag-encoded signed varint.
    pub fn write_varint(&mut self, value: i32) {
        self.write_unsigned_varint(((value << 1) ^ (value >> 31)) as u32);
    }

    /// Write a ZigZag-encoded signed varlong.
    pub fn write_varlong(&mut self, value: i64) {
        self.write_unsigned_varlong(((value << 1) ^ (value >> 63)) as u64);
    }

    /// Tagged fields are never emitted, so the buffer is always the
    /// zero count.
    pub fn write_empty_tag_buffer(&mut self) {
        self.write_unsigned_varint(0);
    }

    /// Overwrite a previously written `Int32` in place.
    pub fn patch_i32(&mut self, at: usize, value: i32) {
        self.buf[at..at + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Overwrite a previously written `UInt32` in place.
    pub fn patch_u32(&mut self, at: usize, value: u32) {
        self.buf[at..at + 4].copy_from_slice(&value.to_be_bytes());
    }
}

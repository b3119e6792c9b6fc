//! Tag/length wire framing shared by the payload and container messages.
//!
//! Protobuf-compatible subset: a tag is `(field << 3) | wire_type`, with
//! wire type 0 (varint) and 2 (length-delimited) only. Every length is
//! checked against the bytes actually left before it is sliced.

use bytes::{Buf, BufMut, BytesMut};

use super::error::{AddressBookError, AddressBookResult};

pub const WIRE_VARINT: u8 = 0;
pub const WIRE_LEN: u8 = 2;

/// A varint never needs more than this many bytes for a u64.
const MAX_VARINT_LEN: usize = 10;

// ─── Writer ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: BytesMut::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn put_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    fn put_tag(&mut self, field: u32, wire_type: u8) {
        self.put_varint(((field as u64) << 3) | wire_type as u64);
    }

    pub fn write_u64(&mut self, field: u32, value: u64) {
        self.put_tag(field, WIRE_VARINT);
        self.put_varint(value);
    }

    pub fn write_u32(&mut self, field: u32, value: u32) {
        self.write_u64(field, value as u64);
    }

    /// Two's-complement, as protobuf `int64`.
    pub fn write_i64(&mut self, field: u32, value: i64) {
        self.write_u64(field, value as u64);
    }

    pub fn write_bool(&mut self, field: u32, value: bool) {
        self.write_u64(field, value as u64);
    }

    pub fn write_bytes(&mut self, field: u32, value: &[u8]) {
        self.put_tag(field, WIRE_LEN);
        self.put_varint(value.len() as u64);
        self.buf.put_slice(value);
    }

    pub fn write_str(&mut self, field: u32, value: &str) {
        self.write_bytes(field, value.as_bytes());
    }

    /// Nested message, already encoded by another writer.
    pub fn write_message(&mut self, field: u32, message: WireWriter) {
        self.write_bytes(field, &message.buf);
    }

    /// Tag and length of a length-delimited field whose `len` body bytes
    /// the caller writes next.
    pub fn begin_message(&mut self, field: u32, len: usize) {
        self.put_tag(field, WIRE_LEN);
        self.put_varint(len as u64);
    }

    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Encoded size of a length-delimited field with a `len`-byte body.
pub fn message_len(field: u32, len: usize) -> usize {
    varint_len(((field as u64) << 3) | WIRE_LEN as u64) + varint_len(len as u64) + len
}

fn varint_len(mut value: u64) -> usize {
    let mut n = 1;
    while value >= 0x80 {
        value >>= 7;
        n += 1;
    }
    n
}

// ─── Reader ─────────────────────────────────────────────────────────

/// Decoded value of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
}

impl<'a> FieldValue<'a> {
    pub fn as_u64(&self, what: &str) -> AddressBookResult<u64> {
        match self {
            Self::Varint(v) => Ok(*v),
            Self::Bytes(_) => Err(wrong_type(what)),
        }
    }

    pub fn as_u32(&self, what: &str) -> AddressBookResult<u32> {
        let v = self.as_u64(what)?;
        u32::try_from(v)
            .map_err(|_| AddressBookError::malformed(format!("{} out of range: {}", what, v)))
    }

    pub fn as_i64(&self, what: &str) -> AddressBookResult<i64> {
        self.as_u64(what).map(|v| v as i64)
    }

    pub fn as_bool(&self, what: &str) -> AddressBookResult<bool> {
        match self.as_u64(what)? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(AddressBookError::malformed(format!("{} is not a bool: {}", what, v))),
        }
    }

    pub fn as_bytes(&self, what: &str) -> AddressBookResult<&'a [u8]> {
        match self {
            Self::Bytes(b) => Ok(b),
            Self::Varint(_) => Err(wrong_type(what)),
        }
    }

    pub fn as_str(&self, what: &str) -> AddressBookResult<&'a str> {
        std::str::from_utf8(self.as_bytes(what)?)
            .map_err(|_| AddressBookError::malformed(format!("{} is not valid UTF-8", what)))
    }
}

fn wrong_type(what: &str) -> AddressBookError {
    AddressBookError::malformed(format!("{} has the wrong wire type", what))
}

/// Cursor over one message's bytes.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn read_varint(&mut self) -> AddressBookResult<u64> {
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            if !self.buf.has_remaining() {
                return Err(AddressBookError::malformed("Truncated varint"));
            }
            let byte = self.buf.get_u8();
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(AddressBookError::malformed("Varint overflows 64 bits"));
            }
            value |= ((byte & 0x7f) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(AddressBookError::malformed("Varint overflows 64 bits"))
    }

    /// Next `(field, value)` pair, or `None` once the message is exhausted.
    pub fn next_field(&mut self) -> AddressBookResult<Option<(u32, FieldValue<'a>)>> {
        if !self.buf.has_remaining() {
            return Ok(None);
        }
        let tag = self.read_varint()?;
        let wire_type = (tag & 0x7) as u8;
        let field = u32::try_from(tag >> 3)
            .map_err(|_| AddressBookError::malformed("Field number out of range"))?;
        if field == 0 {
            return Err(AddressBookError::malformed("Field number 0 is invalid"));
        }

        let value = match wire_type {
            WIRE_VARINT => FieldValue::Varint(self.read_varint()?),
            WIRE_LEN => {
                let len = self.read_varint()?;
                let available = self.buf.remaining();
                if len > available as u64 {
                    return Err(AddressBookError::malformed(format!(
                        "Length {} of field {} exceeds the {} bytes remaining",
                        len, field, available
                    )));
                }
                let len = len as usize;
                let (value, rest) = self.buf.split_at(len);
                self.buf = rest;
                FieldValue::Bytes(value)
            }
            other => {
                return Err(AddressBookError::malformed(format!(
                    "Unsupported wire type {} for field {}",
                    other, field
                )))
            }
        };
        Ok(Some((field, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        for value in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut w = WireWriter::new();
            w.write_u64(1, value);
            let bytes = w.into_vec();
            let mut r = WireReader::new(&bytes);
            let (field, v) = r.next_field().unwrap().unwrap();
            assert_eq!(field, 1);
            assert_eq!(v.as_u64("v").unwrap(), value);
            assert!(r.next_field().unwrap().is_none());
        }
    }

    #[test]
    fn message_len_matches_written_bytes() {
        for len in [0usize, 1, 127, 128, 16_384] {
            let mut w = WireWriter::new();
            w.begin_message(6, len);
            w.put_raw(&vec![0u8; len]);
            assert_eq!(w.len(), message_len(6, len));
        }
    }

    #[test]
    fn negative_i64_survives() {
        let mut w = WireWriter::new();
        w.write_i64(3, -42);
        let bytes = w.into_vec();
        let (_, v) = WireReader::new(&bytes).next_field().unwrap().unwrap();
        assert_eq!(v.as_i64("t").unwrap(), -42);
    }

    #[test]
    fn known_encoding_matches_protobuf() {
        // field 1, varint 150 → 08 96 01 ; field 2, "hi" → 12 02 68 69
        let mut w = WireWriter::new();
        w.write_u32(1, 150);
        w.write_str(2, "hi");
        assert_eq!(w.into_vec(), vec![0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i']);
    }

    #[test]
    fn length_beyond_buffer_is_rejected() {
        // field 2, length 100, but only 3 bytes follow
        let bytes = [0x12, 100, 1, 2, 3];
        let err = WireReader::new(&bytes).next_field().unwrap_err();
        assert!(matches!(err, AddressBookError::MalformedPayload(_)));
    }

    #[test]
    fn huge_length_does_not_allocate() {
        // field 2 with a length of u64::MAX
        let mut bytes = vec![0x12];
        bytes.extend_from_slice(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]);
        let err = WireReader::new(&bytes).next_field().unwrap_err();
        assert!(matches!(err, AddressBookError::MalformedPayload(_)));
    }

    #[test]
    fn overlong_varint_is_rejected() {
        let bytes = [0x08, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(WireReader::new(&bytes).next_field().is_err());
    }

    #[test]
    fn truncated_varint_is_rejected() {
        let bytes = [0x08, 0x80];
        assert!(WireReader::new(&bytes).next_field().is_err());
    }

    #[test]
    fn fixed_width_wire_types_are_rejected() {
        // field 1, wire type 5 (fixed32)
        let bytes = [0x0d, 0, 0, 0, 0];
        assert!(WireReader::new(&bytes).next_field().is_err());
    }

    #[test]
    fn field_zero_is_rejected() {
        let bytes = [0x00, 0x01];
        assert!(WireReader::new(&bytes).next_field().is_err());
    }

    #[test]
    fn type_mismatch_and_bad_utf8() {
        let v = FieldValue::Varint(2);
        assert!(v.as_bytes("x").is_err());
        assert!(v.as_bool("x").is_err());
        let b = FieldValue::Bytes(&[0xff, 0xfe]);
        assert!(b.as_u64("x").is_err());
        assert!(b.as_str("x").is_err());
        assert!(FieldValue::Varint(u64::MAX).as_u32("x").is_err());
    }
}

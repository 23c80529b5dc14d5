//! Little-endian byte cursor for Genome parsing
//!
//! [`Reader`] walks a borrowed slice and turns every out-of-bounds read into a
//! format error naming the source file. [`Writer`] mirrors it over an owned
//! buffer and supports patching previously written `u32` slots in place.

use byteorder::{ByteOrder, LittleEndian};

use crate::{Error, Result};

/// Sequential reader over a byte slice
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Absolute file offset of `data[0]`, so sub-readers report real offsets
    base: usize,
    source: &'a str,
}

impl<'a> Reader<'a> {
    pub fn new(source: &'a str, data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
            source,
        }
    }

    /// Name used in error messages
    pub fn source_name(&self) -> &'a str {
        self.source
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Position relative to the start of the file rather than this view
    pub fn absolute_position(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(self.truncated(pos.saturating_sub(self.pos)));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Look at `n` bytes at `offset` without moving the cursor
    pub fn peek_at(&self, offset: usize, n: usize) -> Option<&'a [u8]> {
        self.data.get(offset..offset.checked_add(n)?)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.truncated(n))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn truncated(&self, needed: usize) -> Error {
        Error::format(
            self.source,
            format!(
                "truncated: need {} bytes at offset {:#x}, {} available",
                needed,
                self.absolute_position(),
                self.remaining()
            ),
        )
    }

    /// Decode error at the current position
    pub fn decode_error(&self, reason: impl Into<String>) -> Error {
        Error::Decode {
            source_name: self.source.to_string(),
            offset: self.absolute_position(),
            reason: reason.into(),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_f32_array<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0f32; N];
        LittleEndian::read_f32_into(self.take(N * 4)?, &mut out);
        Ok(out)
    }

    /// `u16` length followed by single-byte text
    pub fn read_str(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        Ok(decode_latin1(self.take(len)?))
    }

    /// Upper-case hex text of the next `n` bytes
    pub fn read_hex(&mut self, n: usize) -> Result<String> {
        Ok(hex::encode_upper(self.take(n)?))
    }

    /// Bounded view over the next `len` bytes; the parent skips past them
    pub fn sub_reader(&mut self, len: usize) -> Result<Reader<'a>> {
        let base = self.absolute_position();
        let data = self.take(len)?;
        Ok(Reader {
            data,
            pos: 0,
            base,
            source: self.source,
        })
    }

    /// Fail unless every byte of this view was consumed
    pub fn expect_end(&self, what: &str) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.decode_error(format!(
                "{} has {} unread bytes",
                what,
                self.remaining()
            )))
        }
    }
}

/// Append-only writer with in-place patching
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    fn put<const N: usize>(&mut self, encode: impl FnOnce(&mut [u8])) {
        let mut bytes = [0u8; N];
        encode(&mut bytes);
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.put::<2>(|b| LittleEndian::write_u16(b, v));
    }

    pub fn write_i16(&mut self, v: i16) {
        self.put::<2>(|b| LittleEndian::write_i16(b, v));
    }

    pub fn write_u32(&mut self, v: u32) {
        self.put::<4>(|b| LittleEndian::write_u32(b, v));
    }

    pub fn write_i32(&mut self, v: i32) {
        self.put::<4>(|b| LittleEndian::write_i32(b, v));
    }

    pub fn write_i64(&mut self, v: i64) {
        self.put::<8>(|b| LittleEndian::write_i64(b, v));
    }

    pub fn write_f32(&mut self, v: f32) {
        self.put::<4>(|b| LittleEndian::write_f32(b, v));
    }

    pub fn write_f32_slice(&mut self, values: &[f32]) {
        for &v in values {
            self.write_f32(v);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, s: &str) -> Result<()> {
        let bytes = encode_latin1(s)?;
        let len = u16::try_from(bytes.len())
            .map_err(|_| Error::Encode(format!("string of {} bytes is too long", bytes.len())))?;
        self.write_u16(len);
        self.write_bytes(&bytes);
        Ok(())
    }

    /// Write bytes given as hex text (whitespace ignored)
    pub fn write_hex(&mut self, text: &str) -> Result<()> {
        let bytes = decode_hex(text)?;
        self.write_bytes(&bytes);
        Ok(())
    }

    /// Overwrite the `u32` at `offset`
    pub fn patch_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        let slot = offset
            .checked_add(4)
            .and_then(|end| self.buf.get_mut(offset..end))
            .ok_or_else(|| Error::Encode(format!("patch offset {:#x} beyond buffer", offset)))?;
        LittleEndian::write_u32(slot, value);
        Ok(())
    }

    /// Write a zero `u32` and return its offset for a later [`Writer::finish_len`]
    pub fn reserve_len(&mut self) -> usize {
        let at = self.position();
        self.write_u32(0);
        at
    }

    /// Patch the slot at `at` with the number of bytes written after it
    pub fn finish_len(&mut self, at: usize) -> Result<()> {
        let len = self.position() - at - 4;
        let len = u32::try_from(len)
            .map_err(|_| Error::Encode(format!("span of {} bytes is too long", len)))?;
        self.patch_u32(at, len)
    }
}

/// Bytes to text, one char per byte (ISO-8859-1)
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Text to bytes, failing on chars that do not fit a single byte
pub fn encode_latin1(s: &str) -> Result<Vec<u8>> {
    s.chars()
        .map(|c| {
            u8::try_from(u32::from(c))
                .map_err(|_| Error::Encode(format!("character {:?} in {:?} is not single-byte", c, s)))
        })
        .collect()
}

/// Decode hex text, ignoring whitespace
pub fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact).map_err(|e| Error::Encode(format!("invalid hex literal: {}", e)))
}

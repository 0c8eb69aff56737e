//! Length-delimited record encoding used for message bodies.
//!
//! Bodies are sequences of `(key, value)` fields where the key is a varint
//! holding `(tag << 3) | wire_type`. Only the varint and length-delimited
//! wire types are produced by this crate; the two fixed-width types are
//! recognized so unknown fields from newer hosts can be skipped.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::std;
use crate::{Error, Result};

/// Longest legal varint encoding of a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

/// Wire types of the field-key encoding.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    pub fn from_key_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            _ => Err(Error::syntax(format!("invalid wire type: {bits}"))),
        }
    }
}

/// Cursor over an encoded message body.
#[derive(Clone, Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Gets whether the cursor has consumed the entire body.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::syntax("truncated field"));
        }

        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;

        Ok(out)
    }

    /// Reads one varint off the cursor.
    pub fn varint(&mut self) -> Result<u64> {
        let mut acc = 0u64;

        for i in 0..MAX_VARINT_LEN {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| Error::syntax("truncated varint"))?;
            self.pos += 1;

            let bits = (byte & 0x7f) as u64;
            acc |= bits
                .checked_shl((i * 7) as u32)
                .filter(|_| i < 9 || bits <= 1)
                .ok_or_else(|| Error::syntax("varint overflow"))?;

            if byte & 0x80 == 0 {
                return Ok(acc);
            }
        }

        Err(Error::syntax("varint too long"))
    }

    /// Reads a field key, returning the tag and wire type.
    pub fn key(&mut self) -> Result<(u32, WireType)> {
        let key = self.varint()?;
        let tag = key >> 3;

        if tag == 0 || tag > u32::MAX as u64 {
            return Err(Error::syntax("invalid field tag"));
        }

        Ok((tag as u32, WireType::from_key_bits((key & 0x7) as u8)?))
    }

    /// Reads an unsigned varint field.
    pub fn uint64(&mut self, wire_type: WireType) -> Result<u64> {
        if wire_type != WireType::Varint {
            return Err(Error::syntax("expected varint field"));
        }

        self.varint()
    }

    /// Reads an unsigned varint field narrowed to 32 bits.
    pub fn uint32(&mut self, wire_type: WireType) -> Result<u32> {
        let value = self.uint64(wire_type)?;

        u32::try_from(value).map_err(|_| Error::syntax("field out of range"))
    }

    /// Reads a boolean varint field.
    pub fn boolean(&mut self, wire_type: WireType) -> Result<bool> {
        Ok(self.uint64(wire_type)? != 0)
    }

    /// Reads a length-delimited field.
    pub fn bytes(&mut self, wire_type: WireType) -> Result<&'a [u8]> {
        if wire_type != WireType::LengthDelimited {
            return Err(Error::syntax("expected length-delimited field"));
        }

        let len = self.varint()?;
        if len > self.remaining() as u64 {
            return Err(Error::syntax("truncated field"));
        }

        self.take(len as usize)
    }

    /// Reads a length-delimited field as UTF-8 text.
    pub fn string(&mut self, wire_type: WireType) -> Result<String> {
        Ok(std::str::from_utf8(self.bytes(wire_type)?)?.into())
    }

    /// Reads a repeated uint32 field, accepting both packed and unpacked
    /// encodings.
    pub fn uint32_list(&mut self, wire_type: WireType, out: &mut impl Extend<u32>) -> Result<()> {
        match wire_type {
            WireType::Varint => {
                let value = self.uint32(wire_type)?;
                out.extend([value]);
            }
            WireType::LengthDelimited => {
                let mut packed = Decoder::new(self.bytes(wire_type)?);
                while !packed.is_empty() {
                    let value = packed.uint32(WireType::Varint)?;
                    out.extend([value]);
                }
            }
            _ => return Err(Error::syntax("expected repeated varint field")),
        }

        Ok(())
    }

    /// Skips over one field of the given wire type.
    pub fn skip(&mut self, wire_type: WireType) -> Result<()> {
        match wire_type {
            WireType::Varint => {
                self.varint()?;
            }
            WireType::Fixed64 => {
                self.take(8)?;
            }
            WireType::LengthDelimited => {
                self.bytes(wire_type)?;
            }
            WireType::Fixed32 => {
                self.take(4)?;
            }
        }

        Ok(())
    }
}

/// Writes an encoded message body into a caller-provided scratch buffer.
#[derive(Debug)]
pub struct Encoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    fn put(&mut self, byte: u8) -> Result<()> {
        if self.pos >= self.buf.len() {
            return Err(Error::failure("encode buffer overflow"));
        }

        self.buf[self.pos] = byte;
        self.pos += 1;

        Ok(())
    }

    /// Writes one varint.
    pub fn varint(&mut self, mut value: u64) -> Result<()> {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;

            if value == 0 {
                return self.put(byte);
            }

            self.put(byte | 0x80)?;
        }
    }

    fn key(&mut self, tag: u32, wire_type: WireType) -> Result<()> {
        self.varint(((tag as u64) << 3) | wire_type as u64)
    }

    /// Writes an unsigned varint field.
    pub fn uint_field(&mut self, tag: u32, value: u64) -> Result<()> {
        self.key(tag, WireType::Varint)?;
        self.varint(value)
    }

    /// Writes a boolean varint field.
    pub fn bool_field(&mut self, tag: u32, value: bool) -> Result<()> {
        self.uint_field(tag, value as u64)
    }

    /// Writes a length-delimited field.
    pub fn bytes_field(&mut self, tag: u32, value: &[u8]) -> Result<()> {
        self.key(tag, WireType::LengthDelimited)?;
        self.varint(value.len() as u64)?;

        for &byte in value {
            self.put(byte)?;
        }

        Ok(())
    }

    /// Writes a length-delimited text field.
    pub fn string_field(&mut self, tag: u32, value: &str) -> Result<()> {
        self.bytes_field(tag, value.as_bytes())
    }
}

//! Little-endian binary codec used by the chain for contract arguments and
//! pre-exec results.
//!
//! Variable-length integers use a one byte tag: values below `0xFD` are stored
//! inline, `0xFD`, `0xFE` and `0xFF` announce a following u16, u32 or u64.
//! A value stored in a wider form than it needs is rejected as irregular.

use alloy::primitives::Address;

use crate::error::DecodeError;

pub const ADDRESS_LEN: usize = 20;

/// Zero-copy reader over a result buffer.
#[derive(Debug, Clone)]
pub struct Source<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Source<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn next_bytes(
        &mut self,
        needed: usize,
        what: &'static str,
    ) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(DecodeError::UnexpectedEof { what, needed, remaining });
        }

        let bytes = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    fn next_array<const N: usize>(
        &mut self,
        what: &'static str,
    ) -> Result<[u8; N], DecodeError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.next_bytes(N, what)?);
        Ok(array)
    }

    pub fn next_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.next_array::<1>("u8")?[0])
    }

    pub fn next_u16(&mut self) -> Result<u16, DecodeError> {
        self.next_array("u16").map(u16::from_le_bytes)
    }

    pub fn next_u32(&mut self) -> Result<u32, DecodeError> {
        self.next_array("u32").map(u32::from_le_bytes)
    }

    pub fn next_u64(&mut self) -> Result<u64, DecodeError> {
        self.next_array("u64").map(u64::from_le_bytes)
    }

    pub fn next_var_uint(&mut self) -> Result<u64, DecodeError> {
        let (value, min) = match self.next_u8()? {
            0xFD => (u64::from(self.next_u16()?), 0xFD),
            0xFE => (u64::from(self.next_u32()?), 0x1_0000),
            0xFF => (self.next_u64()?, 0x1_0000_0000),
            tag => return Ok(u64::from(tag)),
        };

        if value < min {
            return Err(DecodeError::IrregularVarUint { value });
        }
        Ok(value)
    }

    pub fn next_address(&mut self) -> Result<Address, DecodeError> {
        self.next_array::<ADDRESS_LEN>("address").map(Address::from)
    }

    /// Read a 128-bit two's complement integer.
    pub fn next_i128(&mut self) -> Result<i128, DecodeError> {
        self.next_array("i128").map(i128::from_le_bytes)
    }

    pub fn next_var_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.next_var_uint()?;
        let remaining = self.remaining();
        let len = usize::try_from(len).map_err(|_| {
            DecodeError::UnexpectedEof {
                what: "var-bytes",
                needed: usize::MAX,
                remaining,
            }
        })?;
        self.next_bytes(len, "var-bytes")
    }
}

/// Growable writer producing the same encoding [`Source`] reads.
#[derive(Debug, Clone, Default)]
pub struct Sink {
    buf: Vec<u8>,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(u8::from(value))
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i128(&mut self, value: i128) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_var_uint(&mut self, value: u64) -> &mut Self {
        match value {
            0..=0xFC => self.write_u8(value as u8),
            0xFD..=0xFFFF => {
                self.write_u8(0xFD).write_bytes(&(value as u16).to_le_bytes())
            }
            0x1_0000..=0xFFFF_FFFF => {
                self.write_u8(0xFE).write_bytes(&(value as u32).to_le_bytes())
            }
            _ => self.write_u8(0xFF).write_u64(value),
        }
    }

    pub fn write_address(&mut self, address: &Address) -> &mut Self {
        self.write_bytes(address.as_slice())
    }

    /// Raw bytes, no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn write_var_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_var_uint(bytes.len() as u64).write_bytes(bytes)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// aPLib interleaved bit stream.
//
// Control bits are packed MSB-first into tag bytes that live inline in the
// byte stream.  A new tag byte is reserved at the current output position the
// moment the first bit of it is written, which is exactly the moment the
// decoder pulls it.  Data bytes are written/read in stream order around them.
//
// Variable-length values use the Elias-gamma-2 code (`gamma`): for v >= 2,
// every bit of v below the leading one is followed by a continuation bit.

use super::decoder::DecodeError;

/// Number of bits the gamma-2 code spends on `value` (`value >= 2`).
#[inline]
pub fn gamma_bits(value: u32) -> u32 {
    debug_assert!(value >= 2, "gamma-2 values start at 2");
    2 * (31 - value.leading_zeros())
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Bit/byte writer over a caller-provided buffer.
///
/// Writes past the end of the buffer are counted but not stored, so the exact
/// size an encoding needs is known even when it does not fit.
pub struct BitWriter<'a> {
    out: &'a mut [u8],
    /// Logical number of bytes produced so far.
    len: usize,
    /// Index of the tag byte currently being filled.
    tag_pos: usize,
    tag: u8,
    /// Free bits left in the current tag byte (0 = none reserved).
    bits_left: u32,
}

impl<'a> BitWriter<'a> {
    pub fn new(out: &'a mut [u8]) -> Self {
        Self {
            out,
            len: 0,
            tag_pos: 0,
            tag: 0,
            bits_left: 0,
        }
    }

    #[inline]
    fn store(&mut self, index: usize, byte: u8) {
        if let Some(slot) = self.out.get_mut(index) {
            *slot = byte;
        }
    }

    /// Append a raw data byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.store(self.len, byte);
        self.len += 1;
    }

    /// Append one control bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        if self.bits_left == 0 {
            self.tag_pos = self.len;
            self.tag = 0;
            self.bits_left = 8;
            self.len += 1;
        }
        self.bits_left -= 1;
        if bit {
            self.tag |= 1 << self.bits_left;
        }
        self.store(self.tag_pos, self.tag);
    }

    /// Append the low `count` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u32, count: u32) {
        for shift in (0..count).rev() {
            self.write_bit((value >> shift) & 1 != 0);
        }
    }

    /// Append `value` (>= 2) as Elias-gamma-2.
    pub fn write_gamma(&mut self, value: u32) {
        debug_assert!(value >= 2, "gamma-2 values start at 2");
        let top = 31 - value.leading_zeros();
        for shift in (0..top).rev() {
            self.write_bit((value >> shift) & 1 != 0);
            self.write_bit(shift > 0);
        }
    }

    /// Bytes produced so far, including any that did not fit.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether everything written so far fit in the buffer.
    pub fn fits(&self) -> bool {
        self.len <= self.out.len()
    }

    pub fn capacity(&self) -> usize {
        self.out.len()
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Bit/byte reader mirroring [`BitWriter`].
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    tag: u8,
    bits_left: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            tag: 0,
            bits_left: 0,
        }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(DecodeError::Truncated { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    pub fn read_bit(&mut self) -> Result<bool, DecodeError> {
        if self.bits_left == 0 {
            self.tag = self.read_byte()?;
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        Ok((self.tag >> self.bits_left) & 1 != 0)
    }

    pub fn read_bits(&mut self, count: u32) -> Result<u32, DecodeError> {
        let mut value = 0u32;
        for _ in 0..count {
            value = (value << 1) | u32::from(self.read_bit()?);
        }
        Ok(value)
    }

    /// Read an Elias-gamma-2 value.
    pub fn read_gamma(&mut self) -> Result<u32, DecodeError> {
        let mut value = 1u32;
        loop {
            if value & 0x8000_0000 != 0 {
                return Err(DecodeError::GammaOverflow { offset: self.pos });
            }
            value = (value << 1) | u32::from(self.read_bit()?);
            if !self.read_bit()? {
                return Ok(value);
            }
        }
    }
}

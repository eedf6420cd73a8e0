//! Adaptive binary range coder and bit-model pricing.
//!
//! Probabilities are 11-bit estimates of a zero bit, stored as `u16` and
//! updated in place by whichever coder touches them. Prices are measured in
//! 1/64 bit so the optimal parser can compare alternatives in integers.

use super::{LzmaError, Result};
use std::io::{self, Write};

pub const NUM_BIT_MODEL_TOTAL_BITS: u32 = 11;
pub const BIT_MODEL_TOTAL: u32 = 1 << NUM_BIT_MODEL_TOTAL_BITS;
pub const NUM_MOVE_BITS: u32 = 5;

/// Initial value of every probability (p = 0.5).
pub const PROB_INIT: u16 = (BIT_MODEL_TOTAL >> 1) as u16;

/// Renormalisation threshold: the range never stays below this.
pub const TOP_VALUE: u32 = 1 << 24;

const NUM_MOVE_REDUCING_BITS: u32 = 2;
pub const NUM_BIT_PRICE_SHIFT_BITS: u32 = 6;

/// `-log2(p)` in 1/64 bit, sampled every 4 probability steps.
static PROB_PRICES: [u32; (BIT_MODEL_TOTAL >> NUM_MOVE_REDUCING_BITS) as usize] = {
    const NUM_BITS: u32 = NUM_BIT_MODEL_TOTAL_BITS - NUM_MOVE_REDUCING_BITS;
    let mut table = [0u32; 1 << NUM_BITS];
    let mut i = NUM_BITS;
    while i > 0 {
        i -= 1;
        let start = 1u32 << (NUM_BITS - i - 1);
        let end = 1u32 << (NUM_BITS - i);
        let mut j = start;
        while j < end {
            table[j as usize] = (i << NUM_BIT_PRICE_SHIFT_BITS)
                + (((end - j) << NUM_BIT_PRICE_SHIFT_BITS) >> (NUM_BITS - i - 1));
            j += 1;
        }
    }
    table
};

/// Price of coding `bit` with probability `prob`.
#[inline(always)]
pub fn price(prob: u16, bit: u32) -> u32 {
    if bit == 0 {
        price0(prob)
    } else {
        price1(prob)
    }
}

#[inline(always)]
pub fn price0(prob: u16) -> u32 {
    PROB_PRICES[(prob as u32 >> NUM_MOVE_REDUCING_BITS) as usize]
}

#[inline(always)]
pub fn price1(prob: u16) -> u32 {
    PROB_PRICES[((BIT_MODEL_TOTAL - prob as u32) >> NUM_MOVE_REDUCING_BITS) as usize]
}

/// Range encoder.
///
/// Output accumulates in an internal buffer that the owner drains with
/// [`RangeEncoder::drain_to`]; coding a bit never fails.
pub struct RangeEncoder {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64,
    buffer: Vec<u8>,
    /// Bytes already handed to a sink
    drained: u64,
}

impl RangeEncoder {
    pub fn new() -> Self {
        Self {
            low: 0,
            range: 0xFFFF_FFFF,
            cache: 0,
            cache_size: 1,
            buffer: Vec::with_capacity(1 << 16),
            drained: 0,
        }
    }

    /// Reset for a new stream, keeping the buffer allocation.
    pub fn reset(&mut self) {
        self.low = 0;
        self.range = 0xFFFF_FFFF;
        self.cache = 0;
        self.cache_size = 1;
        self.buffer.clear();
        self.drained = 0;
    }

    #[inline]
    pub fn range(&self) -> u32 {
        self.range
    }

    fn shift_low(&mut self) {
        if (self.low as u32) < 0xFF00_0000 || (self.low >> 32) == 1 {
            let carry = (self.low >> 32) as u8;
            let mut temp = self.cache;
            loop {
                self.buffer.push(temp.wrapping_add(carry));
                temp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = ((self.low as u32) >> 24) as u8;
        }
        self.cache_size += 1;
        self.low = ((self.low as u32) << 8) as u64;
    }

    /// Encode one bit with an adaptive probability.
    #[inline]
    pub fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = (self.range >> NUM_BIT_MODEL_TOTAL_BITS) * (*prob as u32);
        if bit == 0 {
            self.range = bound;
            *prob += ((BIT_MODEL_TOTAL - *prob as u32) >> NUM_MOVE_BITS) as u16;
        } else {
            self.low += bound as u64;
            self.range -= bound;
            *prob -= *prob >> NUM_MOVE_BITS;
        }
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.shift_low();
        }
    }

    /// Encode the low `num_bits` of `value`, MSB first, at p = 0.5.
    pub fn encode_direct_bits(&mut self, value: u32, num_bits: u32) {
        for i in (0..num_bits).rev() {
            self.range >>= 1;
            if (value >> i) & 1 == 1 {
                self.low += self.range as u64;
            }
            if self.range < TOP_VALUE {
                self.range <<= 8;
                self.shift_low();
            }
        }
    }

    /// Push out every pending byte. The stream is complete afterwards.
    pub fn flush(&mut self) {
        for _ in 0..5 {
            self.shift_low();
        }
    }

    /// Compressed size so far, counting bytes still held back for carries.
    pub fn processed_size(&self) -> u64 {
        self.drained + self.buffer.len() as u64 + self.cache_size + 4
    }

    /// Bytes emitted so far, drained or not.
    pub fn bytes_written(&self) -> u64 {
        self.drained + self.buffer.len() as u64
    }

    /// Move finished output bytes into `sink`.
    pub fn drain_to<W: Write + ?Sized>(&mut self, sink: &mut W) -> io::Result<()> {
        sink.write_all(&self.buffer)?;
        self.drained += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Range decoder over an in-memory compressed stream.
pub struct RangeDecoder<'a> {
    input: &'a [u8],
    pos: usize,
    range: u32,
    code: u32,
}

impl<'a> RangeDecoder<'a> {
    /// Prime the decoder with the 5 initial bytes of `input`.
    pub fn new(input: &'a [u8]) -> Result<Self> {
        if input.len() < 5 {
            return Err(LzmaError::TruncatedStream);
        }
        let code = input[1..5]
            .iter()
            .fold(0u32, |code, &b| (code << 8) | b as u32);
        Ok(Self {
            input,
            pos: 5,
            range: 0xFFFF_FFFF,
            code,
        })
    }

    /// Bytes consumed from the input so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn range(&self) -> u32 {
        self.range
    }

    #[inline]
    fn next_byte(&mut self) -> Result<u32> {
        let byte = *self.input.get(self.pos).ok_or(LzmaError::TruncatedStream)?;
        self.pos += 1;
        Ok(byte as u32)
    }

    #[inline]
    fn normalize(&mut self) -> Result<()> {
        if self.range < TOP_VALUE {
            self.code = (self.code << 8) | self.next_byte()?;
            self.range <<= 8;
        }
        Ok(())
    }

    /// Decode one bit with an adaptive probability.
    #[inline]
    pub fn decode_bit(&mut self, prob: &mut u16) -> Result<u32> {
        let bound = (self.range >> NUM_BIT_MODEL_TOTAL_BITS) * (*prob as u32);
        let bit = if self.code < bound {
            self.range = bound;
            *prob += ((BIT_MODEL_TOTAL - *prob as u32) >> NUM_MOVE_BITS) as u16;
            0
        } else {
            self.code -= bound;
            self.range -= bound;
            *prob -= *prob >> NUM_MOVE_BITS;
            1
        };
        self.normalize()?;
        Ok(bit)
    }

    /// Decode `num_bits` bits coded at p = 0.5, MSB first.
    pub fn decode_direct_bits(&mut self, num_bits: u32) -> Result<u32> {
        let mut result = 0u32;
        for _ in 0..num_bits {
            self.range >>= 1;
            let t = self.code.wrapping_sub(self.range) >> 31;
            self.code = self.code.wrapping_sub(self.range & t.wrapping_sub(1));
            result = (result << 1) | (1 - t);
            self.normalize()?;
        }
        Ok(result)
    }
}

//! Literal coder.
//!
//! Each literal is coded with one of `1 << (lc + lp)` banks of 0x300 bit
//! models. The bank is chosen from the low `lp` bits of the position and the
//! high `lc` bits of the previous byte. Entries 0x001..0x100 form the plain
//! 8-bit tree; entries 0x100..0x300 are used while the coded bits still agree
//! with the byte at distance `rep0` (the "match byte").

use super::range_coder::{price, RangeDecoder, RangeEncoder, PROB_INIT};
use super::Result;

const BANK_SIZE: usize = 0x300;

pub struct LiteralCoder {
    probs: Vec<u16>,
    lc: u32,
    pos_mask: u32,
}

impl LiteralCoder {
    pub fn new(lc: u32, lp: u32) -> Self {
        Self {
            probs: vec![PROB_INIT; BANK_SIZE << (lc + lp)],
            lc,
            pos_mask: (1 << lp) - 1,
        }
    }

    pub fn reset(&mut self) {
        self.probs.fill(PROB_INIT);
    }

    #[inline]
    fn bank(&self, pos: u32, prev_byte: u8) -> usize {
        let index = ((pos & self.pos_mask) << self.lc) + ((prev_byte as u32) >> (8 - self.lc));
        index as usize * BANK_SIZE
    }

    #[inline]
    fn bank_mut(&mut self, pos: u32, prev_byte: u8) -> &mut [u16] {
        let start = self.bank(pos, prev_byte);
        &mut self.probs[start..start + BANK_SIZE]
    }

    pub fn encode(&mut self, rc: &mut RangeEncoder, pos: u32, prev_byte: u8, symbol: u8) {
        let probs = self.bank_mut(pos, prev_byte);
        let mut context = 1usize;
        for i in (0..8).rev() {
            let bit = (symbol as u32 >> i) & 1;
            rc.encode_bit(&mut probs[context], bit);
            context = (context << 1) | bit as usize;
        }
    }

    pub fn encode_matched(
        &mut self,
        rc: &mut RangeEncoder,
        pos: u32,
        prev_byte: u8,
        match_byte: u8,
        symbol: u8,
    ) {
        let probs = self.bank_mut(pos, prev_byte);
        let mut context = 1usize;
        let mut same = true;
        for i in (0..8).rev() {
            let bit = (symbol as u32 >> i) & 1;
            let mut index = context;
            if same {
                let match_bit = (match_byte as u32 >> i) & 1;
                index += ((1 + match_bit) << 8) as usize;
                same = match_bit == bit;
            }
            rc.encode_bit(&mut probs[index], bit);
            context = (context << 1) | bit as usize;
        }
    }

    /// Cost of coding `symbol`, matched against `match_byte` when
    /// `match_mode` is set.
    pub fn price(&self, pos: u32, prev_byte: u8, match_mode: bool, match_byte: u8, symbol: u8) -> u32 {
        let start = self.bank(pos, prev_byte);
        let probs = &self.probs[start..start + BANK_SIZE];
        let mut total = 0;
        let mut context = 1usize;
        let mut i = 8;
        if match_mode {
            while i > 0 {
                i -= 1;
                let match_bit = (match_byte as u32 >> i) & 1;
                let bit = (symbol as u32 >> i) & 1;
                total += price(probs[(((1 + match_bit) << 8) as usize) + context], bit);
                context = (context << 1) | bit as usize;
                if match_bit != bit {
                    break;
                }
            }
        }
        while i > 0 {
            i -= 1;
            let bit = (symbol as u32 >> i) & 1;
            total += price(probs[context], bit);
            context = (context << 1) | bit as usize;
        }
        total
    }

    pub fn decode(&mut self, rc: &mut RangeDecoder<'_>, pos: u32, prev_byte: u8) -> Result<u8> {
        let probs = self.bank_mut(pos, prev_byte);
        let mut symbol = 1usize;
        while symbol < 0x100 {
            symbol = (symbol << 1) | rc.decode_bit(&mut probs[symbol])? as usize;
        }
        Ok(symbol as u8)
    }

    pub fn decode_matched(
        &mut self,
        rc: &mut RangeDecoder<'_>,
        pos: u32,
        prev_byte: u8,
        match_byte: u8,
    ) -> Result<u8> {
        let probs = self.bank_mut(pos, prev_byte);
        let mut symbol = 1usize;
        let mut match_byte = match_byte as u32;
        while symbol < 0x100 {
            let match_bit = (match_byte >> 7) & 1;
            match_byte <<= 1;
            let bit = rc.decode_bit(&mut probs[(((1 + match_bit) << 8) as usize) + symbol])?;
            symbol = (symbol << 1) | bit as usize;
            if match_bit != bit {
                // Diverged from the match byte: finish as a plain literal.
                while symbol < 0x100 {
                    symbol = (symbol << 1) | rc.decode_bit(&mut probs[symbol])? as usize;
                }
                break;
            }
        }
        Ok(symbol as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_matched_roundtrip() {
        let text = b"literal coder under test";
        for (lc, lp) in [(3, 0), (0, 2), (8, 0), (1, 4)] {
            let mut coder = LiteralCoder::new(lc, lp);
            let mut rc = RangeEncoder::new();
            let mut prev = 0u8;
            for (pos, &b) in text.iter().enumerate() {
                if pos % 3 == 0 {
                    coder.encode_matched(&mut rc, pos as u32, prev, b'e', b);
                } else {
                    coder.encode(&mut rc, pos as u32, prev, b);
                }
                prev = b;
            }
            rc.flush();
            let mut data = Vec::new();
            rc.drain_to(&mut data).unwrap();

            let mut coder = LiteralCoder::new(lc, lp);
            let mut rc = RangeDecoder::new(&data).unwrap();
            let mut prev = 0u8;
            for (pos, &b) in text.iter().enumerate() {
                let got = if pos % 3 == 0 {
                    coder.decode_matched(&mut rc, pos as u32, prev, b'e').unwrap()
                } else {
                    coder.decode(&mut rc, pos as u32, prev).unwrap()
                };
                assert_eq!(got, b, "lc={lc} lp={lp} pos={pos}");
                prev = got;
            }
        }
    }

    #[test]
    fn test_fresh_prices() {
        let coder = LiteralCoder::new(3, 0);
        assert_eq!(coder.price(0, 0, false, 0, b'x'), 8 * 64);
        assert_eq!(coder.price(0, 0, true, b'x', b'x'), 8 * 64);
    }

    #[test]
    fn test_matched_price_learns_match_byte() {
        let mut coder = LiteralCoder::new(3, 0);
        let mut rc = RangeEncoder::new();
        for _ in 0..64 {
            coder.encode_matched(&mut rc, 0, b'a', b'q', b'q');
        }
        let matched = coder.price(0, b'a', true, b'q', b'q');
        let plain = coder.price(0, b'a', false, 0, b'q');
        assert!(matched < plain);
    }
}

//! Bit-tree probability models.
//!
//! A `num_bits`-bit symbol is coded as a walk down a binary tree: the model
//! index starts at 1 and becomes `(m << 1) | bit` after every bit. Normal
//! order walks MSB first; reverse order walks LSB first and is used for
//! distance footers and the align bits.

use super::range_coder::{price, RangeDecoder, RangeEncoder, PROB_INIT};
use super::Result;

/// Tree of `1 << num_bits` adaptive bit models.
#[derive(Clone)]
pub struct BitTree {
    probs: Vec<u16>,
    num_bits: u32,
}

impl BitTree {
    pub fn new(num_bits: u32) -> Self {
        Self {
            probs: vec![PROB_INIT; 1 << num_bits],
            num_bits,
        }
    }

    pub fn reset(&mut self) {
        self.probs.fill(PROB_INIT);
    }

    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    pub fn encode(&mut self, rc: &mut RangeEncoder, symbol: u32) {
        let mut m = 1usize;
        for i in (0..self.num_bits).rev() {
            let bit = (symbol >> i) & 1;
            rc.encode_bit(&mut self.probs[m], bit);
            m = (m << 1) | bit as usize;
        }
    }

    pub fn reverse_encode(&mut self, rc: &mut RangeEncoder, symbol: u32) {
        reverse_encode(&mut self.probs, rc, self.num_bits, symbol);
    }

    pub fn price(&self, symbol: u32) -> u32 {
        let mut total = 0;
        let mut m = 1usize;
        for i in (0..self.num_bits).rev() {
            let bit = (symbol >> i) & 1;
            total += price(self.probs[m], bit);
            m = (m << 1) | bit as usize;
        }
        total
    }

    pub fn reverse_price(&self, symbol: u32) -> u32 {
        reverse_price(&self.probs, self.num_bits, symbol)
    }

    pub fn decode(&mut self, rc: &mut RangeDecoder<'_>) -> Result<u32> {
        let mut m = 1u32;
        for _ in 0..self.num_bits {
            m = (m << 1) | rc.decode_bit(&mut self.probs[m as usize])?;
        }
        Ok(m - (1 << self.num_bits))
    }

    pub fn reverse_decode(&mut self, rc: &mut RangeDecoder<'_>) -> Result<u32> {
        reverse_decode(&mut self.probs, rc, self.num_bits)
    }
}

/// LSB-first encode over a model slice whose index 1 is the tree root.
pub fn reverse_encode(probs: &mut [u16], rc: &mut RangeEncoder, num_bits: u32, symbol: u32) {
    let mut m = 1usize;
    let mut symbol = symbol;
    for _ in 0..num_bits {
        let bit = symbol & 1;
        rc.encode_bit(&mut probs[m], bit);
        m = (m << 1) | bit as usize;
        symbol >>= 1;
    }
}

pub fn reverse_price(probs: &[u16], num_bits: u32, symbol: u32) -> u32 {
    let mut total = 0;
    let mut m = 1usize;
    let mut symbol = symbol;
    for _ in 0..num_bits {
        let bit = symbol & 1;
        symbol >>= 1;
        total += price(probs[m], bit);
        m = (m << 1) | bit as usize;
    }
    total
}

pub fn reverse_decode(probs: &mut [u16], rc: &mut RangeDecoder<'_>, num_bits: u32) -> Result<u32> {
    let mut m = 1usize;
    let mut symbol = 0u32;
    for i in 0..num_bits {
        let bit = rc.decode_bit(&mut probs[m])?;
        m = (m << 1) | bit as usize;
        symbol |= bit << i;
    }
    Ok(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finish(mut rc: RangeEncoder) -> Vec<u8> {
        rc.flush();
        let mut out = Vec::new();
        rc.drain_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_tree_roundtrip() {
        let symbols = [0u32, 63, 17, 17, 17, 42, 1, 62];
        let mut tree = BitTree::new(6);
        let mut rev = BitTree::new(6);
        let mut rc = RangeEncoder::new();
        for &s in &symbols {
            tree.encode(&mut rc, s);
            rev.reverse_encode(&mut rc, s);
        }
        let data = finish(rc);

        let mut tree = BitTree::new(6);
        let mut rev = BitTree::new(6);
        let mut rc = RangeDecoder::new(&data).unwrap();
        for &s in &symbols {
            assert_eq!(tree.decode(&mut rc).unwrap(), s);
            assert_eq!(rev.reverse_decode(&mut rc).unwrap(), s);
        }
    }

    #[test]
    fn test_price_is_sum_of_bit_prices() {
        let tree = BitTree::new(4);
        // Fresh models: every bit costs exactly one bit.
        assert_eq!(tree.price(9), 4 * 64);
        assert_eq!(tree.reverse_price(9), 4 * 64);
    }

    #[test]
    fn test_repeated_symbol_gets_cheaper() {
        let mut tree = BitTree::new(8);
        let mut rc = RangeEncoder::new();
        let before = tree.price(0xA5);
        for _ in 0..32 {
            tree.encode(&mut rc, 0xA5);
        }
        assert!(tree.price(0xA5) < before);
        assert!(tree.price(0x5A) > before);
    }

    #[test]
    fn test_static_reverse_on_slice() {
        let mut probs = vec![PROB_INIT; 16];
        let mut rc = RangeEncoder::new();
        reverse_encode(&mut probs[3..], &mut rc, 3, 5);
        reverse_encode(&mut probs[3..], &mut rc, 3, 2);
        let data = finish(rc);

        let mut probs = vec![PROB_INIT; 16];
        let mut rc = RangeDecoder::new(&data).unwrap();
        assert_eq!(reverse_decode(&mut probs[3..], &mut rc, 3).unwrap(), 5);
        assert_eq!(reverse_decode(&mut probs[3..], &mut rc, 3).unwrap(), 2);
    }
}

//! Match length coder.
//!
//! Lengths are coded relative to [`MATCH_MIN_LEN`]:
//!
//! | Range | Coding |
//! |-------|--------|
//! | 0..8 | `choice = 0`, 3-bit low tree per position state |
//! | 8..16 | `choice = 1, choice2 = 0`, 3-bit mid tree per position state |
//! | 16..272 | `choice = 1, choice2 = 1`, shared 8-bit high tree |
//!
//! [`MATCH_MIN_LEN`]: super::MATCH_MIN_LEN

use super::bit_tree::BitTree;
use super::range_coder::{price0, price1, RangeDecoder, RangeEncoder, PROB_INIT};
use super::{
    Result, NUM_HIGH_LEN_BITS, NUM_LEN_SYMBOLS, NUM_LOW_LEN_BITS, NUM_LOW_LEN_SYMBOLS,
    NUM_MID_LEN_BITS, NUM_MID_LEN_SYMBOLS, NUM_POS_STATES_MAX,
};

/// Length models shared by the encoder and decoder.
#[derive(Clone)]
pub struct LenCoder {
    choice: u16,
    choice2: u16,
    low: Vec<BitTree>,
    mid: Vec<BitTree>,
    high: BitTree,
}

impl LenCoder {
    pub fn new() -> Self {
        Self {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: vec![BitTree::new(NUM_LOW_LEN_BITS); NUM_POS_STATES_MAX],
            mid: vec![BitTree::new(NUM_MID_LEN_BITS); NUM_POS_STATES_MAX],
            high: BitTree::new(NUM_HIGH_LEN_BITS),
        }
    }

    pub fn reset(&mut self) {
        self.choice = PROB_INIT;
        self.choice2 = PROB_INIT;
        self.low.iter_mut().for_each(BitTree::reset);
        self.mid.iter_mut().for_each(BitTree::reset);
        self.high.reset();
    }

    /// Encode `symbol` (length minus the minimum match length).
    pub fn encode(&mut self, rc: &mut RangeEncoder, symbol: u32, pos_state: usize) {
        if symbol < NUM_LOW_LEN_SYMBOLS {
            rc.encode_bit(&mut self.choice, 0);
            self.low[pos_state].encode(rc, symbol);
            return;
        }
        let symbol = symbol - NUM_LOW_LEN_SYMBOLS;
        rc.encode_bit(&mut self.choice, 1);
        if symbol < NUM_MID_LEN_SYMBOLS {
            rc.encode_bit(&mut self.choice2, 0);
            self.mid[pos_state].encode(rc, symbol);
        } else {
            rc.encode_bit(&mut self.choice2, 1);
            self.high.encode(rc, symbol - NUM_MID_LEN_SYMBOLS);
        }
    }

    pub fn decode(&mut self, rc: &mut RangeDecoder<'_>, pos_state: usize) -> Result<u32> {
        if rc.decode_bit(&mut self.choice)? == 0 {
            return self.low[pos_state].decode(rc);
        }
        if rc.decode_bit(&mut self.choice2)? == 0 {
            Ok(NUM_LOW_LEN_SYMBOLS + self.mid[pos_state].decode(rc)?)
        } else {
            Ok(NUM_LOW_LEN_SYMBOLS + NUM_MID_LEN_SYMBOLS + self.high.decode(rc)?)
        }
    }

    /// Fill `prices[..num_symbols]` with the cost of each length symbol.
    pub fn set_prices(&self, pos_state: usize, num_symbols: u32, prices: &mut [u32]) {
        let a0 = price0(self.choice);
        let a1 = price1(self.choice);
        let b0 = a1 + price0(self.choice2);
        let b1 = a1 + price1(self.choice2);
        for i in 0..num_symbols {
            prices[i as usize] = if i < NUM_LOW_LEN_SYMBOLS {
                a0 + self.low[pos_state].price(i)
            } else if i < NUM_LOW_LEN_SYMBOLS + NUM_MID_LEN_SYMBOLS {
                b0 + self.mid[pos_state].price(i - NUM_LOW_LEN_SYMBOLS)
            } else {
                b1 + self
                    .high
                    .price(i - NUM_LOW_LEN_SYMBOLS - NUM_MID_LEN_SYMBOLS)
            };
        }
    }
}

impl Default for LenCoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Length encoder with a cached price table per position state.
///
/// A position state's table is rebuilt after `table_size` encodes with
/// that state, so prices lag the models slightly.
pub struct LenPriceTableEncoder {
    coder: LenCoder,
    prices: Vec<u32>,
    table_size: u32,
    counters: [u32; NUM_POS_STATES_MAX],
}

impl LenPriceTableEncoder {
    pub fn new() -> Self {
        Self {
            coder: LenCoder::new(),
            prices: vec![0; NUM_LEN_SYMBOLS as usize * NUM_POS_STATES_MAX],
            table_size: 0,
            counters: [0; NUM_POS_STATES_MAX],
        }
    }

    pub fn reset(&mut self) {
        self.coder.reset();
    }

    pub fn set_table_size(&mut self, table_size: u32) {
        self.table_size = table_size;
    }

    #[inline]
    pub fn price(&self, symbol: u32, pos_state: usize) -> u32 {
        self.prices[pos_state * NUM_LEN_SYMBOLS as usize + symbol as usize]
    }

    fn update_table(&mut self, pos_state: usize) {
        let start = pos_state * NUM_LEN_SYMBOLS as usize;
        self.coder
            .set_prices(pos_state, self.table_size, &mut self.prices[start..]);
        self.counters[pos_state] = self.table_size;
    }

    pub fn update_tables(&mut self, num_pos_states: usize) {
        for pos_state in 0..num_pos_states {
            self.update_table(pos_state);
        }
    }

    pub fn encode(&mut self, rc: &mut RangeEncoder, symbol: u32, pos_state: usize) {
        self.coder.encode(rc, symbol, pos_state);
        self.counters[pos_state] -= 1;
        if self.counters[pos_state] == 0 {
            self.update_table(pos_state);
        }
    }

    /// Models behind the cached table.
    pub fn coder(&self) -> &LenCoder {
        &self.coder
    }
}

impl Default for LenPriceTableEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_roundtrip_all_ranges() {
        let symbols = [0u32, 7, 8, 15, 16, 100, 271, 3, 3, 3];
        let mut coder = LenCoder::new();
        let mut rc = RangeEncoder::new();
        for (i, &s) in symbols.iter().enumerate() {
            coder.encode(&mut rc, s, i % 4);
        }
        rc.flush();
        let mut data = Vec::new();
        rc.drain_to(&mut data).unwrap();

        let mut coder = LenCoder::new();
        let mut rc = RangeDecoder::new(&data).unwrap();
        for (i, &s) in symbols.iter().enumerate() {
            assert_eq!(coder.decode(&mut rc, i % 4).unwrap(), s);
        }
    }

    #[test]
    fn test_cached_prices_match_fresh_prices() {
        let table_size = 64 + 1 - 2;
        let mut enc = LenPriceTableEncoder::new();
        enc.set_table_size(table_size);
        enc.update_tables(4);

        let mut rc = RangeEncoder::new();
        // Exactly one table period for pos state 1 so it refreshes.
        for i in 0..table_size {
            enc.encode(&mut rc, i % 20, 1);
        }

        let mut fresh = vec![0u32; NUM_LEN_SYMBOLS as usize];
        enc.coder().set_prices(1, table_size, &mut fresh);
        for symbol in 0..table_size {
            assert_eq!(enc.price(symbol, 1), fresh[symbol as usize]);
        }
    }

    #[test]
    fn test_fresh_table_prices() {
        let mut enc = LenPriceTableEncoder::new();
        enc.set_table_size(NUM_LEN_SYMBOLS);
        enc.update_tables(1);
        // choice + 3 tree bits, all at p = 0.5.
        assert_eq!(enc.price(0, 0), 4 * 64);
        // choice + choice2 + 3 tree bits.
        assert_eq!(enc.price(9, 0), 5 * 64);
        // choice + choice2 + 8 tree bits.
        assert_eq!(enc.price(200, 0), 10 * 64);
    }
}

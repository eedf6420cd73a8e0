//! LZMA encoder with optimal parsing.
//!
//! ## Parsing
//!
//! For each position the encoder prices every way of covering the next few
//! bytes and picks the cheapest path:
//!
//! | Candidate | Coding |
//! |-----------|--------|
//! | Literal | `is_match = 0`, plain or matched against the `rep0` byte |
//! | Short rep | one byte from `rep0` |
//! | Rep match | length from one of the 4 recent distances |
//! | Match | length + distance slot + footer |
//! | Combos | literal + rep0, rep/match + literal + rep0 |
//!
//! Paths are kept in an arena of [`NUM_OPTS`] nodes. A node records the
//! cheapest way to reach its position; once the horizon is reached, a
//! backward pass turns the chain into a forward list that is replayed one
//! decision per call.
//!
//! Matches of at least `fast_bytes` are taken immediately.

use super::bit_tree::{reverse_encode, reverse_price, BitTree};
use super::length::LenPriceTableEncoder;
use super::literal::LiteralCoder;
use super::match_finder::{BinTree, MatchFinder, MATCH_DISTANCES_SIZE};
use super::range_coder::{price, price0, price1, RangeEncoder, NUM_BIT_PRICE_SHIFT_BITS, PROB_INIT};
use super::state::State;
use super::{
    len_to_pos_state, EncoderProperties, LzmaProperties, Result, ALIGN_MASK, ALIGN_TABLE_SIZE,
    END_POS_MODEL_INDEX, MATCH_MAX_LEN, MATCH_MIN_LEN, NUM_ALIGN_BITS, NUM_FULL_DISTANCES,
    NUM_LEN_TO_POS_STATES, NUM_POS_SLOT_BITS, NUM_POS_STATES_BITS_MAX, NUM_REP_DISTANCES,
    NUM_STATES, START_POS_MODEL_INDEX,
};
use std::io::Write;
use tracing::{debug, trace};

/// Size of the optimal-parse arena (look-ahead horizon).
pub const NUM_OPTS: u32 = 1 << 12;

const INFINITY_PRICE: u32 = 0xFFF_FFFF;

/// `back` value marking a literal decision.
const LITERAL: u32 = u32::MAX;

/// Match-price refresh interval, in coded matches.
const DISTANCE_PRICE_REFRESH: u32 = 1 << 7;

/// Minimum input consumed per [`Encoder::code_one_block`] call.
const BLOCK_SIZE: u64 = 1 << 12;

/// Distance slot lookup for distances below 2^11.
static FAST_POS: [u8; 1 << 11] = {
    const FAST_SLOTS: u32 = 22;
    let mut table = [0u8; 1 << 11];
    table[1] = 1;
    let mut c = 2;
    let mut slot = 2;
    while slot < FAST_SLOTS {
        let k = 1 << ((slot >> 1) - 1);
        let mut j = 0;
        while j < k {
            table[c] = slot as u8;
            c += 1;
            j += 1;
        }
        slot += 1;
    }
    table
};

#[inline]
fn get_pos_slot(pos: u32) -> u32 {
    if pos < (1 << 11) {
        FAST_POS[pos as usize] as u32
    } else if pos < (1 << 21) {
        FAST_POS[(pos >> 10) as usize] as u32 + 20
    } else {
        FAST_POS[(pos >> 20) as usize] as u32 + 40
    }
}

#[inline]
fn get_pos_slot2(pos: u32) -> u32 {
    if pos < (1 << 17) {
        FAST_POS[(pos >> 6) as usize] as u32 + 12
    } else if pos < (1 << 27) {
        FAST_POS[(pos >> 16) as usize] as u32 + 32
    } else {
        FAST_POS[(pos >> 26) as usize] as u32 + 52
    }
}

/// Receives `(input bytes consumed, compressed bytes produced)` between
/// encoder blocks.
pub trait Progress {
    fn set_progress(&mut self, in_size: u64, out_size: u64);
}

impl<F: FnMut(u64, u64)> Progress for F {
    fn set_progress(&mut self, in_size: u64, out_size: u64) {
        self(in_size, out_size);
    }
}

/// One node of the optimal-parse arena.
#[derive(Debug, Clone, Copy, Default)]
struct Optimal {
    state: State,

    /// Reached through a literal that follows the recorded decision.
    prev1_is_char: bool,
    /// The decision before that literal was itself recorded in `*2` fields.
    prev2: bool,
    pos_prev2: u32,
    back_prev2: u32,

    price: u32,
    pos_prev: u32,
    back_prev: u32,

    backs: [u32; NUM_REP_DISTANCES],
}

impl Optimal {
    #[inline]
    fn make_as_char(&mut self) {
        self.back_prev = LITERAL;
        self.prev1_is_char = false;
    }

    #[inline]
    fn make_as_short_rep(&mut self) {
        self.back_prev = 0;
        self.prev1_is_char = false;
    }

    #[inline]
    fn is_short_rep(&self) -> bool {
        self.back_prev == 0
    }
}

/// Reusable LZMA encoder.
///
/// ```rust
/// use dat_image::lzma::{Decoder, Encoder, EncoderProperties};
///
/// let data = b"abracadabra abracadabra";
/// let mut encoder = Encoder::new(EncoderProperties::default()).unwrap();
/// let mut stream = Vec::new();
/// encoder.encode(data, &mut stream).unwrap();
///
/// let mut decoder = Decoder::new(encoder.coder_properties()).unwrap();
/// assert_eq!(decoder.decode(&stream, Some(data.len() as u64)).unwrap(), data);
/// ```
pub struct Encoder {
    props: EncoderProperties,
    pos_state_mask: u32,
    dist_table_size: u32,

    state: State,
    previous_byte: u8,
    rep_distances: [u32; NUM_REP_DISTANCES],

    optimum: Vec<Optimal>,
    range_encoder: RangeEncoder,

    is_match: [u16; NUM_STATES << NUM_POS_STATES_BITS_MAX],
    is_rep: [u16; NUM_STATES],
    is_rep_g0: [u16; NUM_STATES],
    is_rep_g1: [u16; NUM_STATES],
    is_rep_g2: [u16; NUM_STATES],
    is_rep0_long: [u16; NUM_STATES << NUM_POS_STATES_BITS_MAX],

    pos_slot_encoder: Vec<BitTree>,
    pos_encoders: [u16; (NUM_FULL_DISTANCES - END_POS_MODEL_INDEX) as usize],
    pos_align_encoder: BitTree,

    len_encoder: LenPriceTableEncoder,
    rep_match_len_encoder: LenPriceTableEncoder,
    literal_encoder: LiteralCoder,

    match_distances: [u32; MATCH_DISTANCES_SIZE],
    longest_match_length: u32,
    num_distance_pairs: u32,
    longest_match_was_found: bool,
    additional_offset: u32,

    optimum_end_index: u32,
    optimum_current_index: u32,

    pos_slot_prices: Vec<u32>,
    distances_prices: Vec<u32>,
    align_prices: [u32; ALIGN_TABLE_SIZE as usize],
    align_price_count: u32,
    match_price_count: u32,

    now_pos64: u64,
    finished: bool,
}

impl Encoder {
    pub fn new(props: EncoderProperties) -> Result<Self> {
        props.validate()?;
        Ok(Self {
            pos_state_mask: (1 << props.pb) - 1,
            dist_table_size: props.dist_table_size(),
            state: State::new(),
            previous_byte: 0,
            rep_distances: [0; NUM_REP_DISTANCES],
            optimum: vec![Optimal::default(); NUM_OPTS as usize],
            range_encoder: RangeEncoder::new(),
            is_match: [PROB_INIT; NUM_STATES << NUM_POS_STATES_BITS_MAX],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep_g0: [PROB_INIT; NUM_STATES],
            is_rep_g1: [PROB_INIT; NUM_STATES],
            is_rep_g2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [PROB_INIT; NUM_STATES << NUM_POS_STATES_BITS_MAX],
            pos_slot_encoder: vec![BitTree::new(NUM_POS_SLOT_BITS); NUM_LEN_TO_POS_STATES],
            pos_encoders: [PROB_INIT; (NUM_FULL_DISTANCES - END_POS_MODEL_INDEX) as usize],
            pos_align_encoder: BitTree::new(NUM_ALIGN_BITS),
            len_encoder: LenPriceTableEncoder::new(),
            rep_match_len_encoder: LenPriceTableEncoder::new(),
            literal_encoder: LiteralCoder::new(props.lc, props.lp),
            match_distances: [0; MATCH_DISTANCES_SIZE],
            longest_match_length: 0,
            num_distance_pairs: 0,
            longest_match_was_found: false,
            additional_offset: 0,
            optimum_end_index: 0,
            optimum_current_index: 0,
            pos_slot_prices: vec![0; 1 << (NUM_POS_SLOT_BITS as usize + 2)],
            distances_prices: vec![0; (NUM_FULL_DISTANCES as usize) * NUM_LEN_TO_POS_STATES],
            align_prices: [0; ALIGN_TABLE_SIZE as usize],
            align_price_count: 0,
            match_price_count: 0,
            now_pos64: 0,
            finished: false,
            props,
        })
    }

    pub fn properties(&self) -> &EncoderProperties {
        &self.props
    }

    /// Parameters the decoder needs, see [`LzmaProperties::to_bytes`].
    pub fn coder_properties(&self) -> LzmaProperties {
        self.props.lzma_properties()
    }

    /// Compress `input` into `out` as a raw stream. Returns the number of
    /// compressed bytes written.
    pub fn encode<W: Write + ?Sized>(&mut self, input: &[u8], out: &mut W) -> Result<u64> {
        let mut mf = BinTree::new(
            input,
            self.props.match_finder,
            self.props.dictionary_size,
            self.props.fast_bytes,
        )?;
        self.encode_with(&mut mf, out, None)
    }

    /// Like [`Encoder::encode`], reporting progress between blocks.
    pub fn encode_with_progress<W: Write + ?Sized>(
        &mut self,
        input: &[u8],
        out: &mut W,
        progress: &mut dyn Progress,
    ) -> Result<u64> {
        let mut mf = BinTree::new(
            input,
            self.props.match_finder,
            self.props.dictionary_size,
            self.props.fast_bytes,
        )?;
        self.encode_with(&mut mf, out, Some(progress))
    }

    /// Compress whatever `mf` walks over.
    pub fn encode_with<M: MatchFinder + ?Sized, W: Write + ?Sized>(
        &mut self,
        mf: &mut M,
        out: &mut W,
        mut progress: Option<&mut dyn Progress>,
    ) -> Result<u64> {
        self.init();
        loop {
            let (in_size, out_size, finished) = self.code_one_block(mf);
            self.range_encoder.drain_to(out)?;
            if finished {
                break;
            }
            trace!(in_size, out_size, "encoded block");
            if let Some(progress) = progress.as_deref_mut() {
                progress.set_progress(in_size, out_size);
            }
        }
        let written = self.range_encoder.bytes_written();
        debug!(
            input = self.now_pos64,
            output = written,
            end_marker = self.props.end_marker,
            "encoded LZMA stream"
        );
        Ok(written)
    }

    fn init(&mut self) {
        self.state = State::new();
        self.previous_byte = 0;
        self.rep_distances = [0; NUM_REP_DISTANCES];
        self.range_encoder.reset();

        self.is_match.fill(PROB_INIT);
        self.is_rep0_long.fill(PROB_INIT);
        self.is_rep.fill(PROB_INIT);
        self.is_rep_g0.fill(PROB_INIT);
        self.is_rep_g1.fill(PROB_INIT);
        self.is_rep_g2.fill(PROB_INIT);
        self.literal_encoder.reset();
        self.pos_slot_encoder.iter_mut().for_each(BitTree::reset);
        self.pos_encoders.fill(PROB_INIT);
        self.len_encoder.reset();
        self.rep_match_len_encoder.reset();
        self.pos_align_encoder.reset();

        self.longest_match_was_found = false;
        self.optimum_end_index = 0;
        self.optimum_current_index = 0;
        self.additional_offset = 0;

        self.fill_distances_prices();
        self.fill_align_prices();

        let num_pos_states = 1usize << self.props.pb;
        let table_size = self.props.fast_bytes + 1 - MATCH_MIN_LEN;
        self.len_encoder.set_table_size(table_size);
        self.len_encoder.update_tables(num_pos_states);
        self.rep_match_len_encoder.set_table_size(table_size);
        self.rep_match_len_encoder.update_tables(num_pos_states);

        self.now_pos64 = 0;
        self.finished = false;
    }

    fn read_match_distances<M: MatchFinder + ?Sized>(&mut self, mf: &mut M) -> (u32, u32) {
        let mut len_res = 0;
        let num_distance_pairs = mf.get_matches(&mut self.match_distances);
        if num_distance_pairs > 0 {
            len_res = self.match_distances[num_distance_pairs as usize - 2];
            if len_res == self.props.fast_bytes {
                len_res += mf.match_len(
                    len_res as i32 - 1,
                    self.match_distances[num_distance_pairs as usize - 1],
                    MATCH_MAX_LEN - len_res,
                );
            }
        }
        self.additional_offset += 1;
        (len_res, num_distance_pairs)
    }

    fn move_pos<M: MatchFinder + ?Sized>(&mut self, mf: &mut M, num: u32) {
        if num > 0 {
            mf.skip(num);
            self.additional_offset += num;
        }
    }

    #[inline]
    fn rep_len1_price(&self, state: State, pos_state: u32) -> u32 {
        price0(self.is_rep_g0[state.index()])
            + price0(self.is_rep0_long[(state.index() << NUM_POS_STATES_BITS_MAX) + pos_state as usize])
    }

    fn pure_rep_price(&self, rep_index: u32, state: State, pos_state: u32) -> u32 {
        let s = state.index();
        if rep_index == 0 {
            price0(self.is_rep_g0[s])
                + price1(self.is_rep0_long[(s << NUM_POS_STATES_BITS_MAX) + pos_state as usize])
        } else {
            let mut total = price1(self.is_rep_g0[s]);
            if rep_index == 1 {
                total += price0(self.is_rep_g1[s]);
            } else {
                total += price1(self.is_rep_g1[s]);
                total += price(self.is_rep_g2[s], rep_index - 2);
            }
            total
        }
    }

    #[inline]
    fn rep_price(&self, rep_index: u32, len: u32, state: State, pos_state: u32) -> u32 {
        self.rep_match_len_encoder
            .price(len - MATCH_MIN_LEN, pos_state as usize)
            + self.pure_rep_price(rep_index, state, pos_state)
    }

    fn pos_len_price(&self, pos: u32, len: u32, pos_state: u32) -> u32 {
        let len_to_pos = len_to_pos_state(len);
        let distance_price = if pos < NUM_FULL_DISTANCES {
            self.distances_prices[len_to_pos * NUM_FULL_DISTANCES as usize + pos as usize]
        } else {
            self.pos_slot_prices[(len_to_pos << NUM_POS_SLOT_BITS) + get_pos_slot2(pos) as usize]
                + self.align_prices[(pos & ALIGN_MASK) as usize]
        };
        distance_price
            + self
                .len_encoder
                .price(len - MATCH_MIN_LEN, pos_state as usize)
    }

    #[inline]
    fn literal_price(&self, position: u32, prev_byte: u8, match_mode: bool, match_byte: u8, symbol: u8) -> u32 {
        self.literal_encoder
            .price(position, prev_byte, match_mode, match_byte, symbol)
    }

    #[inline]
    fn is_match_index(state: State, pos_state: u32) -> usize {
        (state.index() << NUM_POS_STATES_BITS_MAX) + pos_state as usize
    }

    /// Extend the arena horizon to `end`, marking new nodes unreachable.
    #[inline]
    fn grow_horizon(&mut self, len_end: &mut u32, end: u32) {
        while *len_end < end {
            *len_end += 1;
            self.optimum[*len_end as usize].price = INFINITY_PRICE;
        }
    }

    /// Record `price` at `index` if it beats the node's current price.
    /// Returns the node for further updates when it does.
    #[inline]
    fn improve(&mut self, index: u32, price: u32) -> Option<&mut Optimal> {
        let node = &mut self.optimum[index as usize];
        if price < node.price {
            node.price = price;
            Some(node)
        } else {
            None
        }
    }

    fn backward(&mut self, cur: u32) -> (u32, u32) {
        let mut cur = cur;
        self.optimum_end_index = cur;
        let mut pos_mem = self.optimum[cur as usize].pos_prev;
        let mut back_mem = self.optimum[cur as usize].back_prev;
        loop {
            let node = self.optimum[cur as usize];
            if node.prev1_is_char {
                self.optimum[pos_mem as usize].make_as_char();
                self.optimum[pos_mem as usize].pos_prev = pos_mem - 1;
                if node.prev2 {
                    let before = &mut self.optimum[pos_mem as usize - 1];
                    before.prev1_is_char = false;
                    before.pos_prev = node.pos_prev2;
                    before.back_prev = node.back_prev2;
                }
            }
            let pos_prev = pos_mem;
            let back_cur = back_mem;

            back_mem = self.optimum[pos_prev as usize].back_prev;
            pos_mem = self.optimum[pos_prev as usize].pos_prev;

            self.optimum[pos_prev as usize].back_prev = back_cur;
            self.optimum[pos_prev as usize].pos_prev = cur;
            cur = pos_prev;
            if cur == 0 {
                break;
            }
        }
        self.optimum_current_index = self.optimum[0].pos_prev;
        (self.optimum_current_index, self.optimum[0].back_prev)
    }

    /// Decide how to code the data at `position`.
    ///
    /// Returns `(len, back)`: `back == LITERAL` (with `len == 1`) is a
    /// literal, `back < 4` a rep match (short rep when `len == 1`), and
    /// otherwise a match with distance `back - 4`.
    fn get_optimum<M: MatchFinder + ?Sized>(&mut self, mf: &mut M, position: u32) -> (u32, u32) {
        let mut position = position;
        if self.optimum_end_index != self.optimum_current_index {
            let node = self.optimum[self.optimum_current_index as usize];
            let len_res = node.pos_prev - self.optimum_current_index;
            self.optimum_current_index = node.pos_prev;
            return (len_res, node.back_prev);
        }
        self.optimum_current_index = 0;
        self.optimum_end_index = 0;

        let (len_main, mut num_distance_pairs) = if self.longest_match_was_found {
            self.longest_match_was_found = false;
            (self.longest_match_length, self.num_distance_pairs)
        } else {
            self.read_match_distances(mf)
        };

        let num_available_bytes = mf.available_bytes() + 1;
        if num_available_bytes < 2 {
            return (1, LITERAL);
        }

        let fast_bytes = self.props.fast_bytes;
        let mut reps = [0u32; NUM_REP_DISTANCES];
        let mut rep_lens = [0u32; NUM_REP_DISTANCES];
        let mut rep_max_index = 0;
        for i in 0..NUM_REP_DISTANCES {
            reps[i] = self.rep_distances[i];
            rep_lens[i] = mf.match_len(-1, reps[i], MATCH_MAX_LEN);
            if rep_lens[i] > rep_lens[rep_max_index] {
                rep_max_index = i;
            }
        }
        if rep_lens[rep_max_index] >= fast_bytes {
            let len_res = rep_lens[rep_max_index];
            self.move_pos(mf, len_res - 1);
            return (len_res, rep_max_index as u32);
        }

        if len_main >= fast_bytes {
            let back_res =
                self.match_distances[num_distance_pairs as usize - 1] + NUM_REP_DISTANCES as u32;
            self.move_pos(mf, len_main - 1);
            return (len_main, back_res);
        }

        let mut current_byte = mf.index_byte(-1);
        let mut match_byte = mf.index_byte(-(self.rep_distances[0] as i32) - 2);

        if len_main < 2 && current_byte != match_byte && rep_lens[rep_max_index] < 2 {
            return (1, LITERAL);
        }

        self.optimum[0].state = self.state;

        let mut pos_state = position & self.pos_state_mask;
        let state = self.state;
        let is_match_prob = self.is_match[Self::is_match_index(state, pos_state)];

        let literal_price = price0(is_match_prob)
            + self.literal_price(
                position,
                self.previous_byte,
                !state.is_char(),
                match_byte,
                current_byte,
            );
        self.optimum[1].price = literal_price;
        self.optimum[1].make_as_char();

        let mut match_price = price1(is_match_prob);
        let mut rep_match_price = match_price + price1(self.is_rep[state.index()]);

        if match_byte == current_byte {
            let short_rep_price = rep_match_price + self.rep_len1_price(state, pos_state);
            if short_rep_price < self.optimum[1].price {
                self.optimum[1].price = short_rep_price;
                self.optimum[1].make_as_short_rep();
            }
        }

        let mut len_end = len_main.max(rep_lens[rep_max_index]);
        if len_end < 2 {
            return (1, self.optimum[1].back_prev);
        }

        self.optimum[1].pos_prev = 0;
        self.optimum[0].backs = reps;

        for len in 2..=len_end {
            self.optimum[len as usize].price = INFINITY_PRICE;
        }

        for i in 0..NUM_REP_DISTANCES as u32 {
            let rep_len = rep_lens[i as usize];
            if rep_len < 2 {
                continue;
            }
            let base_price = rep_match_price + self.pure_rep_price(i, state, pos_state);
            for len in (2..=rep_len).rev() {
                let cur_and_len_price = base_price
                    + self
                        .rep_match_len_encoder
                        .price(len - MATCH_MIN_LEN, pos_state as usize);
                if let Some(node) = self.improve(len, cur_and_len_price) {
                    node.pos_prev = 0;
                    node.back_prev = i;
                    node.prev1_is_char = false;
                }
            }
        }

        let mut normal_match_price = match_price + price0(self.is_rep[state.index()]);

        let mut len = if rep_lens[0] >= 2 { rep_lens[0] + 1 } else { 2 };
        if len <= len_main {
            let mut offs = 0usize;
            while len > self.match_distances[offs] {
                offs += 2;
            }
            loop {
                let distance = self.match_distances[offs + 1];
                let cur_and_len_price =
                    normal_match_price + self.pos_len_price(distance, len, pos_state);
                if let Some(node) = self.improve(len, cur_and_len_price) {
                    node.pos_prev = 0;
                    node.back_prev = distance + NUM_REP_DISTANCES as u32;
                    node.prev1_is_char = false;
                }
                if len == self.match_distances[offs] {
                    offs += 2;
                    if offs == num_distance_pairs as usize {
                        break;
                    }
                }
                len += 1;
            }
        }

        let mut cur = 0u32;
        loop {
            cur += 1;
            if cur == len_end {
                return self.backward(cur);
            }
            let (mut new_len, pairs) = self.read_match_distances(mf);
            num_distance_pairs = pairs;
            if new_len >= fast_bytes {
                self.num_distance_pairs = num_distance_pairs;
                self.longest_match_length = new_len;
                self.longest_match_was_found = true;
                return self.backward(cur);
            }
            position += 1;

            let node = self.optimum[cur as usize];
            let mut pos_prev = node.pos_prev;
            let mut state;
            if node.prev1_is_char {
                pos_prev -= 1;
                if node.prev2 {
                    state = self.optimum[node.pos_prev2 as usize].state;
                    if node.back_prev2 < NUM_REP_DISTANCES as u32 {
                        state.update_rep();
                    } else {
                        state.update_match();
                    }
                } else {
                    state = self.optimum[pos_prev as usize].state;
                }
                state.update_char();
            } else {
                state = self.optimum[pos_prev as usize].state;
            }

            if pos_prev == cur - 1 {
                if node.is_short_rep() {
                    state.update_short_rep();
                } else {
                    state.update_char();
                }
            } else {
                let pos;
                if node.prev1_is_char && node.prev2 {
                    pos_prev = node.pos_prev2;
                    pos = node.back_prev2;
                    state.update_rep();
                } else {
                    pos = node.back_prev;
                    if pos < NUM_REP_DISTANCES as u32 {
                        state.update_rep();
                    } else {
                        state.update_match();
                    }
                }
                let backs = self.optimum[pos_prev as usize].backs;
                reps = match pos {
                    0 => backs,
                    1 => [backs[1], backs[0], backs[2], backs[3]],
                    2 => [backs[2], backs[0], backs[1], backs[3]],
                    3 => [backs[3], backs[0], backs[1], backs[2]],
                    _ => [pos - NUM_REP_DISTANCES as u32, backs[0], backs[1], backs[2]],
                };
            }
            self.optimum[cur as usize].state = state;
            self.optimum[cur as usize].backs = reps;
            let cur_price = self.optimum[cur as usize].price;

            current_byte = mf.index_byte(-1);
            match_byte = mf.index_byte(-(reps[0] as i32) - 2);

            pos_state = position & self.pos_state_mask;
            let is_match_prob = self.is_match[Self::is_match_index(state, pos_state)];

            let cur_and1_price = cur_price
                + price0(is_match_prob)
                + self.literal_price(
                    position,
                    mf.index_byte(-2),
                    !state.is_char(),
                    match_byte,
                    current_byte,
                );

            let next = cur as usize + 1;
            let mut next_is_char = false;
            if cur_and1_price < self.optimum[next].price {
                let node = &mut self.optimum[next];
                node.price = cur_and1_price;
                node.pos_prev = cur;
                node.make_as_char();
                next_is_char = true;
            }

            match_price = cur_price + price1(is_match_prob);
            rep_match_price = match_price + price1(self.is_rep[state.index()]);

            if match_byte == current_byte
                && !(self.optimum[next].pos_prev < cur && self.optimum[next].back_prev == 0)
            {
                let short_rep_price = rep_match_price + self.rep_len1_price(state, pos_state);
                if short_rep_price <= self.optimum[next].price {
                    let node = &mut self.optimum[next];
                    node.price = short_rep_price;
                    node.pos_prev = cur;
                    node.make_as_short_rep();
                    next_is_char = true;
                }
            }

            let num_available_bytes_full = (mf.available_bytes() + 1).min(NUM_OPTS - 1 - cur);
            let mut num_available_bytes = num_available_bytes_full;

            if num_available_bytes < 2 {
                continue;
            }
            if num_available_bytes > fast_bytes {
                num_available_bytes = fast_bytes;
            }

            if !next_is_char && match_byte != current_byte {
                // Literal followed by rep0
                let t = (num_available_bytes_full - 1).min(fast_bytes);
                let len_test2 = mf.match_len(0, reps[0], t);
                if len_test2 >= 2 {
                    let mut state2 = state;
                    state2.update_char();
                    let pos_state_next = (position + 1) & self.pos_state_mask;
                    let next_rep_match_price = cur_and1_price
                        + price1(self.is_match[Self::is_match_index(state2, pos_state_next)])
                        + price1(self.is_rep[state2.index()]);
                    let offset = cur + 1 + len_test2;
                    self.grow_horizon(&mut len_end, offset);
                    let cur_and_len_price = next_rep_match_price
                        + self.rep_price(0, len_test2, state2, pos_state_next);
                    if let Some(node) = self.improve(offset, cur_and_len_price) {
                        node.pos_prev = cur + 1;
                        node.back_prev = 0;
                        node.prev1_is_char = true;
                        node.prev2 = false;
                    }
                }
            }

            let mut start_len = 2;

            for rep_index in 0..NUM_REP_DISTANCES as u32 {
                let rep = reps[rep_index as usize];
                let len_test = mf.match_len(-1, rep, num_available_bytes);
                if len_test < 2 {
                    continue;
                }
                for len in (2..=len_test).rev() {
                    self.grow_horizon(&mut len_end, cur + len);
                    let cur_and_len_price =
                        rep_match_price + self.rep_price(rep_index, len, state, pos_state);
                    if let Some(node) = self.improve(cur + len, cur_and_len_price) {
                        node.pos_prev = cur;
                        node.back_prev = rep_index;
                        node.prev1_is_char = false;
                    }
                }

                if rep_index == 0 {
                    start_len = len_test + 1;
                }

                if len_test < num_available_bytes_full {
                    // Rep match, literal, rep0
                    let t = (num_available_bytes_full - 1 - len_test).min(fast_bytes);
                    let len_test2 = mf.match_len(len_test as i32, rep, t);
                    if len_test2 >= 2 {
                        let mut state2 = state;
                        state2.update_rep();
                        let mut pos_state_next = (position + len_test) & self.pos_state_mask;
                        let cur_and_len_char_price = rep_match_price
                            + self.rep_price(rep_index, len_test, state, pos_state)
                            + price0(self.is_match[Self::is_match_index(state2, pos_state_next)])
                            + self.literal_price(
                                position + len_test,
                                mf.index_byte(len_test as i32 - 2),
                                true,
                                mf.index_byte(len_test as i32 - 1 - (rep as i32 + 1)),
                                mf.index_byte(len_test as i32 - 1),
                            );
                        state2.update_char();
                        pos_state_next = (position + len_test + 1) & self.pos_state_mask;
                        let next_match_price = cur_and_len_char_price
                            + price1(self.is_match[Self::is_match_index(state2, pos_state_next)]);
                        let next_rep_match_price =
                            next_match_price + price1(self.is_rep[state2.index()]);

                        let offset = len_test + 1 + len_test2;
                        self.grow_horizon(&mut len_end, cur + offset);
                        let cur_and_len_price = next_rep_match_price
                            + self.rep_price(0, len_test2, state2, pos_state_next);
                        if let Some(node) = self.improve(cur + offset, cur_and_len_price) {
                            node.pos_prev = cur + len_test + 1;
                            node.back_prev = 0;
                            node.prev1_is_char = true;
                            node.prev2 = true;
                            node.pos_prev2 = cur;
                            node.back_prev2 = rep_index;
                        }
                    }
                }
            }

            if new_len > num_available_bytes {
                new_len = num_available_bytes;
                let mut pairs = 0usize;
                while new_len > self.match_distances[pairs] {
                    pairs += 2;
                }
                self.match_distances[pairs] = new_len;
                num_distance_pairs = pairs as u32 + 2;
            }

            if new_len >= start_len {
                normal_match_price = match_price + price0(self.is_rep[state.index()]);
                self.grow_horizon(&mut len_end, cur + new_len);

                let mut offs = 0usize;
                while start_len > self.match_distances[offs] {
                    offs += 2;
                }

                let mut len_test = start_len;
                loop {
                    let cur_back = self.match_distances[offs + 1];
                    let cur_and_len_price =
                        normal_match_price + self.pos_len_price(cur_back, len_test, pos_state);
                    if let Some(node) = self.improve(cur + len_test, cur_and_len_price) {
                        node.pos_prev = cur;
                        node.back_prev = cur_back + NUM_REP_DISTANCES as u32;
                        node.prev1_is_char = false;
                    }

                    if len_test == self.match_distances[offs] {
                        if len_test < num_available_bytes_full {
                            // Match, literal, rep0
                            let t = (num_available_bytes_full - 1 - len_test).min(fast_bytes);
                            let len_test2 = mf.match_len(len_test as i32, cur_back, t);
                            if len_test2 >= 2 {
                                let mut state2 = state;
                                state2.update_match();
                                let mut pos_state_next =
                                    (position + len_test) & self.pos_state_mask;
                                let cur_and_len_char_price = cur_and_len_price
                                    + price0(
                                        self.is_match
                                            [Self::is_match_index(state2, pos_state_next)],
                                    )
                                    + self.literal_price(
                                        position + len_test,
                                        mf.index_byte(len_test as i32 - 2),
                                        true,
                                        mf.index_byte(len_test as i32 - (cur_back as i32 + 1) - 1),
                                        mf.index_byte(len_test as i32 - 1),
                                    );
                                state2.update_char();
                                pos_state_next = (position + len_test + 1) & self.pos_state_mask;
                                let next_match_price = cur_and_len_char_price
                                    + price1(
                                        self.is_match
                                            [Self::is_match_index(state2, pos_state_next)],
                                    );
                                let next_rep_match_price =
                                    next_match_price + price1(self.is_rep[state2.index()]);

                                let offset = len_test + 1 + len_test2;
                                self.grow_horizon(&mut len_end, cur + offset);
                                let combo_price = next_rep_match_price
                                    + self.rep_price(0, len_test2, state2, pos_state_next);
                                if let Some(node) = self.improve(cur + offset, combo_price) {
                                    node.pos_prev = cur + len_test + 1;
                                    node.back_prev = 0;
                                    node.prev1_is_char = true;
                                    node.prev2 = true;
                                    node.pos_prev2 = cur;
                                    node.back_prev2 = cur_back + NUM_REP_DISTANCES as u32;
                                }
                            }
                        }
                        offs += 2;
                        if offs == num_distance_pairs as usize {
                            break;
                        }
                    }
                    len_test += 1;
                }
            }
        }
    }

    fn write_end_marker(&mut self, pos_state: u32) {
        if !self.props.end_marker {
            return;
        }
        let complex = Self::is_match_index(self.state, pos_state);
        self.range_encoder.encode_bit(&mut self.is_match[complex], 1);
        self.range_encoder
            .encode_bit(&mut self.is_rep[self.state.index()], 0);
        self.state.update_match();
        let len = MATCH_MIN_LEN;
        self.len_encoder
            .encode(&mut self.range_encoder, len - MATCH_MIN_LEN, pos_state as usize);
        let pos_slot = (1 << NUM_POS_SLOT_BITS) - 1;
        self.pos_slot_encoder[len_to_pos_state(len)].encode(&mut self.range_encoder, pos_slot);
        let footer_bits = 30;
        let pos_reduced = (1u32 << footer_bits) - 1;
        self.range_encoder
            .encode_direct_bits(pos_reduced >> NUM_ALIGN_BITS, footer_bits - NUM_ALIGN_BITS);
        self.pos_align_encoder
            .reverse_encode(&mut self.range_encoder, pos_reduced & ALIGN_MASK);
    }

    fn flush(&mut self, now_pos: u32) {
        self.write_end_marker(now_pos & self.pos_state_mask);
        self.range_encoder.flush();
    }

    fn encode_match_distance(&mut self, distance: u32, len: u32) {
        let pos_slot = get_pos_slot(distance);
        self.pos_slot_encoder[len_to_pos_state(len)].encode(&mut self.range_encoder, pos_slot);

        if pos_slot >= START_POS_MODEL_INDEX {
            let footer_bits = (pos_slot >> 1) - 1;
            let base = (2 | (pos_slot & 1)) << footer_bits;
            let pos_reduced = distance - base;

            if pos_slot < END_POS_MODEL_INDEX {
                reverse_encode(
                    &mut self.pos_encoders[(base - pos_slot - 1) as usize..],
                    &mut self.range_encoder,
                    footer_bits,
                    pos_reduced,
                );
            } else {
                self.range_encoder
                    .encode_direct_bits(pos_reduced >> NUM_ALIGN_BITS, footer_bits - NUM_ALIGN_BITS);
                self.pos_align_encoder
                    .reverse_encode(&mut self.range_encoder, pos_reduced & ALIGN_MASK);
                self.align_price_count += 1;
            }
        }
    }

    /// The first byte is always a literal; its matches are unused.
    fn encode_first_byte<M: MatchFinder + ?Sized>(&mut self, mf: &mut M) {
        self.read_match_distances(mf);
        let complex = Self::is_match_index(self.state, 0);
        self.range_encoder.encode_bit(&mut self.is_match[complex], 0);
        self.state.update_char();
        let cur_byte = mf.index_byte(-(self.additional_offset as i32));
        self.literal_encoder
            .encode(&mut self.range_encoder, 0, self.previous_byte, cur_byte);
        self.previous_byte = cur_byte;
        self.additional_offset -= 1;
        self.now_pos64 += 1;
    }

    /// Code one `(len, pos)` decision from [`Encoder::get_optimum`] at the
    /// current position.
    fn encode_decision<M: MatchFinder + ?Sized>(&mut self, mf: &mut M, len: u32, pos: u32) {
        let now_pos = self.now_pos64 as u32;
        let pos_state = now_pos & self.pos_state_mask;
        let complex = Self::is_match_index(self.state, pos_state);
        if len == 1 && pos == LITERAL {
            self.range_encoder.encode_bit(&mut self.is_match[complex], 0);
            let cur_byte = mf.index_byte(-(self.additional_offset as i32));
            if self.state.is_char() {
                self.literal_encoder.encode(
                    &mut self.range_encoder,
                    now_pos,
                    self.previous_byte,
                    cur_byte,
                );
            } else {
                let match_byte = mf.index_byte(
                    -(self.rep_distances[0] as i32) - 1 - self.additional_offset as i32,
                );
                self.literal_encoder.encode_matched(
                    &mut self.range_encoder,
                    now_pos,
                    self.previous_byte,
                    match_byte,
                    cur_byte,
                );
            }
            self.previous_byte = cur_byte;
            self.state.update_char();
        } else {
            self.range_encoder.encode_bit(&mut self.is_match[complex], 1);
            let s = self.state.index();
            if pos < NUM_REP_DISTANCES as u32 {
                self.range_encoder.encode_bit(&mut self.is_rep[s], 1);
                if pos == 0 {
                    self.range_encoder.encode_bit(&mut self.is_rep_g0[s], 0);
                    self.range_encoder
                        .encode_bit(&mut self.is_rep0_long[complex], u32::from(len != 1));
                } else {
                    self.range_encoder.encode_bit(&mut self.is_rep_g0[s], 1);
                    if pos == 1 {
                        self.range_encoder.encode_bit(&mut self.is_rep_g1[s], 0);
                    } else {
                        self.range_encoder.encode_bit(&mut self.is_rep_g1[s], 1);
                        self.range_encoder.encode_bit(&mut self.is_rep_g2[s], pos - 2);
                    }
                }
                if len == 1 {
                    self.state.update_short_rep();
                } else {
                    self.rep_match_len_encoder.encode(
                        &mut self.range_encoder,
                        len - MATCH_MIN_LEN,
                        pos_state as usize,
                    );
                    self.state.update_rep();
                }
                let distance = self.rep_distances[pos as usize];
                if pos != 0 {
                    self.rep_distances.copy_within(0..pos as usize, 1);
                    self.rep_distances[0] = distance;
                }
            } else {
                self.range_encoder.encode_bit(&mut self.is_rep[s], 0);
                self.state.update_match();
                self.len_encoder.encode(
                    &mut self.range_encoder,
                    len - MATCH_MIN_LEN,
                    pos_state as usize,
                );
                let distance = pos - NUM_REP_DISTANCES as u32;
                self.encode_match_distance(distance, len);
                self.rep_distances.copy_within(0..NUM_REP_DISTANCES - 1, 1);
                self.rep_distances[0] = distance;
                self.match_price_count += 1;
            }
            self.previous_byte = mf.index_byte(len as i32 - 1 - self.additional_offset as i32);
        }
        self.additional_offset -= len;
        self.now_pos64 += len as u64;
    }

    fn refresh_prices(&mut self) {
        if self.match_price_count >= DISTANCE_PRICE_REFRESH {
            self.fill_distances_prices();
        }
        if self.align_price_count >= ALIGN_TABLE_SIZE {
            self.fill_align_prices();
        }
    }

    /// Encode at least [`BLOCK_SIZE`] input bytes (or the rest of the
    /// input). Returns `(in_size, out_size, finished)`.
    pub fn code_one_block<M: MatchFinder + ?Sized>(&mut self, mf: &mut M) -> (u64, u64, bool) {
        let mut in_size = 0;
        let mut out_size = 0;

        if self.finished {
            return (in_size, out_size, true);
        }
        self.finished = true;

        let progress_pos_prev = self.now_pos64;
        if self.now_pos64 == 0 {
            if mf.available_bytes() == 0 {
                self.flush(0);
                return (in_size, out_size, true);
            }
            self.encode_first_byte(mf);
        }
        if mf.available_bytes() == 0 {
            self.flush(self.now_pos64 as u32);
            return (in_size, out_size, true);
        }

        loop {
            let (len, pos) = self.get_optimum(mf, self.now_pos64 as u32);
            self.encode_decision(mf, len, pos);

            if self.additional_offset == 0 {
                self.refresh_prices();
                in_size = self.now_pos64;
                out_size = self.range_encoder.processed_size();
                if mf.available_bytes() == 0 {
                    self.flush(self.now_pos64 as u32);
                    return (in_size, out_size, true);
                }
                if self.now_pos64 - progress_pos_prev >= BLOCK_SIZE {
                    self.finished = false;
                    return (in_size, out_size, false);
                }
            }
        }
    }

    fn fill_distances_prices(&mut self) {
        let mut temp_prices = [0u32; NUM_FULL_DISTANCES as usize];
        for i in START_POS_MODEL_INDEX..NUM_FULL_DISTANCES {
            let pos_slot = get_pos_slot(i);
            let footer_bits = (pos_slot >> 1) - 1;
            let base = (2 | (pos_slot & 1)) << footer_bits;
            temp_prices[i as usize] = reverse_price(
                &self.pos_encoders[(base - pos_slot - 1) as usize..],
                footer_bits,
                i - base,
            );
        }

        for len_to_pos in 0..NUM_LEN_TO_POS_STATES {
            let encoder = &self.pos_slot_encoder[len_to_pos];
            let st = len_to_pos << NUM_POS_SLOT_BITS;
            for pos_slot in 0..self.dist_table_size {
                self.pos_slot_prices[st + pos_slot as usize] = encoder.price(pos_slot);
            }
            for pos_slot in END_POS_MODEL_INDEX..self.dist_table_size {
                self.pos_slot_prices[st + pos_slot as usize] +=
                    ((pos_slot >> 1) - 1 - NUM_ALIGN_BITS) << NUM_BIT_PRICE_SHIFT_BITS;
            }

            let st2 = len_to_pos * NUM_FULL_DISTANCES as usize;
            for i in 0..START_POS_MODEL_INDEX {
                self.distances_prices[st2 + i as usize] = self.pos_slot_prices[st + i as usize];
            }
            for i in START_POS_MODEL_INDEX..NUM_FULL_DISTANCES {
                self.distances_prices[st2 + i as usize] = self.pos_slot_prices
                    [st + get_pos_slot(i) as usize]
                    + temp_prices[i as usize];
            }
        }
        self.match_price_count = 0;
    }

    fn fill_align_prices(&mut self) {
        for i in 0..ALIGN_TABLE_SIZE {
            self.align_prices[i as usize] = self.pos_align_encoder.reverse_price(i);
        }
        self.align_price_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::NaiveFinder;
    use super::*;

    #[test]
    fn test_pos_slots() {
        assert_eq!(get_pos_slot(0), 0);
        assert_eq!(get_pos_slot(3), 3);
        assert_eq!(get_pos_slot(4), 4);
        assert_eq!(get_pos_slot(5), 4);
        assert_eq!(get_pos_slot(6), 5);
        assert_eq!(get_pos_slot(127), 13);
        assert_eq!(get_pos_slot(128), 14);
        assert_eq!(get_pos_slot(2047), 21);
        assert_eq!(get_pos_slot(2048), 22);
        assert_eq!(get_pos_slot((1 << 30) - 1), 59);
        assert_eq!(get_pos_slot(u32::MAX >> 1), 61);
        // The slower lookup agrees wherever the parser uses it.
        for pos in [128u32, 4096, 1 << 17, (1 << 20) + 7, (1 << 27) + 3, (1 << 30) - 1] {
            assert_eq!(get_pos_slot2(pos), get_pos_slot(pos), "pos {pos}");
        }
    }

    #[test]
    fn test_literal_only_stream_decodes() {
        let props = EncoderProperties::default().with_dictionary_size(1 << 16);
        let mut encoder = Encoder::new(props).unwrap();
        let mut out = Vec::new();
        encoder.encode(b"abcdefgh", &mut out).unwrap();
        let mut decoder = super::super::Decoder::new(encoder.coder_properties()).unwrap();
        assert_eq!(decoder.decode(&out, Some(8)).unwrap(), b"abcdefgh");
    }

    #[test]
    fn test_progress_reported_between_blocks() {
        let data: Vec<u8> = (0..40_000u32).map(|i| (i * 7 % 251) as u8).collect();
        let mut encoder = Encoder::new(EncoderProperties::default()).unwrap();
        let mut calls = Vec::new();
        let mut record = |i: u64, o: u64| calls.push((i, o));
        let mut out = Vec::new();
        encoder
            .encode_with_progress(&data, &mut out, &mut record)
            .unwrap();
        assert!(!calls.is_empty());
        for w in calls.windows(2) {
            assert!(w[0].0 < w[1].0);
            assert!(w[1].0 - w[0].0 >= BLOCK_SIZE);
        }
        assert!(calls.last().unwrap().0 < data.len() as u64);
    }

    /// Cost of one `(len, back)` decision at `pos`, built from the same
    /// models the parser reads.
    fn decision_price(
        encoder: &Encoder,
        data: &[u8],
        pos: u32,
        state: State,
        reps: &[u32; NUM_REP_DISTANCES],
        len: u32,
        back: u32,
    ) -> u32 {
        let pos_state = pos & encoder.pos_state_mask;
        let is_match = encoder.is_match[Encoder::is_match_index(state, pos_state)];
        let at = pos as usize;
        if back == LITERAL {
            let match_byte = data[at - reps[0] as usize - 1];
            return price0(is_match)
                + encoder.literal_price(pos, data[at - 1], !state.is_char(), match_byte, data[at]);
        }
        let is_rep = encoder.is_rep[state.index()];
        if back >= NUM_REP_DISTANCES as u32 {
            let distance = back - NUM_REP_DISTANCES as u32;
            return price1(is_match) + price0(is_rep) + encoder.pos_len_price(distance, len, pos_state);
        }
        let rep_match_price = price1(is_match) + price1(is_rep);
        if len == 1 {
            rep_match_price + encoder.rep_len1_price(state, pos_state)
        } else {
            rep_match_price + encoder.rep_price(back, len, state, pos_state)
        }
    }

    fn apply_decision(state: &mut State, reps: &mut [u32; NUM_REP_DISTANCES], len: u32, back: u32) {
        match back {
            LITERAL => state.update_char(),
            0..=3 => {
                if len == 1 {
                    state.update_short_rep();
                } else {
                    state.update_rep();
                }
                let distance = reps[back as usize];
                reps.copy_within(0..back as usize, 1);
                reps[0] = distance;
            }
            _ => {
                state.update_match();
                reps.copy_within(0..NUM_REP_DISTANCES - 1, 1);
                reps[0] = back - NUM_REP_DISTANCES as u32;
            }
        }
    }

    fn rep_len(data: &[u8], at: u32, distance: u32, limit: u32) -> u32 {
        let at = at as usize;
        let back = at - distance as usize - 1;
        data[at..]
            .iter()
            .zip(&data[back..])
            .take(limit as usize)
            .take_while(|(a, b)| a == b)
            .count() as u32
    }

    /// Inspect the arena after a full parse that started at `position`.
    fn check_parse(encoder: &Encoder, data: &[u8], position: u32, fast_bytes: u32) {
        let end = encoder.optimum_end_index;
        let arena = &encoder.optimum;

        // The chosen path costs exactly what the parser recorded for it.
        let mut state = encoder.state;
        let mut reps = encoder.rep_distances;
        let mut node = 0;
        let mut total = 0;
        while node != end {
            let next = arena[node as usize].pos_prev;
            let back = arena[node as usize].back_prev;
            assert!(next > node, "parse at {position}: {node} -> {next}");
            let step = decision_price(encoder, data, position + node, state, &reps, next - node, back);
            assert!(step > 0);
            total += step;
            apply_decision(&mut state, &mut reps, next - node, back);
            node = next;
        }
        assert!(total < INFINITY_PRICE);
        assert_eq!(total, arena[end as usize].price, "parse at {position}");

        // No node is dearer than a literal or rep0 from a node before it.
        for cur in 0..end {
            let node = &arena[cur as usize];
            if node.price >= INFINITY_PRICE {
                continue;
            }
            let at = position + cur;
            let literal = node.price
                + decision_price(encoder, data, at, node.state, &node.backs, 1, LITERAL);
            assert!(
                arena[cur as usize + 1].price <= literal,
                "parse at {position}: literal from {cur}"
            );

            let available = (data.len() as u32 - at).min(NUM_OPTS - 1 - cur);
            if available < 2 {
                continue;
            }
            let limit = available.min(fast_bytes);
            for len in 2..=rep_len(data, at, node.backs[0], limit) {
                let rep0 = node.price
                    + decision_price(encoder, data, at, node.state, &node.backs, len, 0);
                assert!(
                    arena[(cur + len) as usize].price <= rep0,
                    "parse at {position}: rep0 of {len} from {cur}"
                );
            }
        }
    }

    #[test]
    fn test_optimal_parse_prices() {
        let mut data = Vec::new();
        for row in 0..40u8 {
            for x in 0..48u8 {
                data.push(if (x + row) % 13 < 9 { x / 6 } else { row });
            }
        }
        data.extend_from_slice(b"abcabcabd abcabcabd xyzabcabcabd abcabcabd");

        let props = EncoderProperties::default().with_dictionary_size(1 << 16);
        let mut encoder = Encoder::new(props.clone()).unwrap();
        let mut finder = NaiveFinder::new(&data, &props);
        encoder.init();
        encoder.encode_first_byte(&mut finder);

        let mut parses = 0;
        loop {
            let position = encoder.now_pos64 as u32;
            let replaying = encoder.optimum_end_index != encoder.optimum_current_index;
            let (len, back) = encoder.get_optimum(&mut finder, position);
            if !replaying && encoder.optimum_end_index > 0 {
                assert_eq!((encoder.optimum[0].pos_prev, encoder.optimum[0].back_prev), (len, back));
                check_parse(&encoder, &data, position, props.fast_bytes);
                parses += 1;
            }
            encoder.encode_decision(&mut finder, len, back);
            if encoder.additional_offset == 0 {
                encoder.refresh_prices();
                if finder.available_bytes() == 0 {
                    break;
                }
            }
        }
        assert!(parses > 20, "{parses} parses");

        encoder.flush(encoder.now_pos64 as u32);
        let mut stream = Vec::new();
        encoder.range_encoder.drain_to(&mut stream).unwrap();
        let mut decoder = super::super::Decoder::new(encoder.coder_properties()).unwrap();
        assert_eq!(decoder.decode(&stream, Some(data.len() as u64)).unwrap(), data);
    }
}

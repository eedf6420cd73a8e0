//! LZMA decoder.

use super::bit_tree::{reverse_decode, BitTree};
use super::length::LenCoder;
use super::literal::LiteralCoder;
use super::range_coder::{RangeDecoder, PROB_INIT};
use super::state::State;
use super::window::OutWindow;
use super::{
    len_to_pos_state, LzmaError, LzmaProperties, Result, END_POS_MODEL_INDEX, MATCH_MIN_LEN,
    NUM_ALIGN_BITS, NUM_FULL_DISTANCES, NUM_LEN_TO_POS_STATES, NUM_POS_SLOT_BITS,
    NUM_POS_STATES_BITS_MAX, NUM_REP_DISTANCES, NUM_STATES, START_POS_MODEL_INDEX,
};
use tracing::{debug, trace};

/// Upper bound on output preallocated from a declared size.
const MAX_PREALLOC: u64 = 1 << 26;

/// Reusable LZMA decoder.
///
/// ```rust
/// use dat_image::lzma::{Decoder, LzmaProperties};
///
/// let props = LzmaProperties { lc: 3, lp: 0, pb: 2, dictionary_size: 1 << 16 };
/// let mut decoder = Decoder::new(props).unwrap();
/// // let output = decoder.decode(&stream, Some(expected_len))?;
/// ```
pub struct Decoder {
    props: LzmaProperties,
    dictionary_size_check: u32,
    pos_state_mask: u32,

    is_match: [u16; NUM_STATES << NUM_POS_STATES_BITS_MAX],
    is_rep: [u16; NUM_STATES],
    is_rep_g0: [u16; NUM_STATES],
    is_rep_g1: [u16; NUM_STATES],
    is_rep_g2: [u16; NUM_STATES],
    is_rep0_long: [u16; NUM_STATES << NUM_POS_STATES_BITS_MAX],

    pos_slot: Vec<BitTree>,
    pos_decoders: [u16; (NUM_FULL_DISTANCES - END_POS_MODEL_INDEX) as usize],
    align: BitTree,

    len_decoder: LenCoder,
    rep_len_decoder: LenCoder,
    literal: LiteralCoder,
}

impl Decoder {
    pub fn new(props: LzmaProperties) -> Result<Self> {
        if props.lc > 8 {
            return Err(LzmaError::InvalidParameter(format!("lc {} > 8", props.lc)));
        }
        if props.lp > 8 {
            return Err(LzmaError::InvalidParameter(format!("lp {} > 8", props.lp)));
        }
        if props.pb > NUM_POS_STATES_BITS_MAX {
            return Err(LzmaError::InvalidParameter(format!("pb {} > 4", props.pb)));
        }

        Ok(Self {
            props,
            dictionary_size_check: props.dictionary_size.max(1),
            pos_state_mask: (1 << props.pb) - 1,
            is_match: [PROB_INIT; NUM_STATES << NUM_POS_STATES_BITS_MAX],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep_g0: [PROB_INIT; NUM_STATES],
            is_rep_g1: [PROB_INIT; NUM_STATES],
            is_rep_g2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [PROB_INIT; NUM_STATES << NUM_POS_STATES_BITS_MAX],
            pos_slot: vec![BitTree::new(NUM_POS_SLOT_BITS); NUM_LEN_TO_POS_STATES],
            pos_decoders: [PROB_INIT; (NUM_FULL_DISTANCES - END_POS_MODEL_INDEX) as usize],
            align: BitTree::new(NUM_ALIGN_BITS),
            len_decoder: LenCoder::new(),
            rep_len_decoder: LenCoder::new(),
            literal: LiteralCoder::new(props.lc, props.lp),
        })
    }

    /// Create a decoder from a 5-byte property blob.
    pub fn from_properties(blob: &[u8]) -> Result<Self> {
        Self::new(LzmaProperties::from_bytes(blob)?)
    }

    pub fn properties(&self) -> &LzmaProperties {
        &self.props
    }

    fn reset(&mut self) {
        self.is_match.fill(PROB_INIT);
        self.is_rep.fill(PROB_INIT);
        self.is_rep_g0.fill(PROB_INIT);
        self.is_rep_g1.fill(PROB_INIT);
        self.is_rep_g2.fill(PROB_INIT);
        self.is_rep0_long.fill(PROB_INIT);
        self.pos_slot.iter_mut().for_each(BitTree::reset);
        self.pos_decoders.fill(PROB_INIT);
        self.align.reset();
        self.len_decoder.reset();
        self.rep_len_decoder.reset();
        self.literal.reset();
    }

    /// Decode a raw stream.
    ///
    /// With `out_size = Some(n)` decoding stops after `n` bytes; an end
    /// marker before that point is an error. With `None` the stream must end
    /// with an end marker.
    pub fn decode(&mut self, input: &[u8], out_size: Option<u64>) -> Result<Vec<u8>> {
        self.reset();
        debug!(
            lc = self.props.lc,
            lp = self.props.lp,
            pb = self.props.pb,
            dictionary_size = self.props.dictionary_size,
            input = input.len(),
            ?out_size,
            "decoding LZMA stream"
        );

        let mut rc = RangeDecoder::new(input)?;
        let capacity = out_size.unwrap_or(input.len() as u64 * 2).min(MAX_PREALLOC);
        let mut window = OutWindow::with_capacity(capacity as usize);
        let limit = out_size.unwrap_or(u64::MAX);

        let mut state = State::new();
        let mut reps = [0u32; NUM_REP_DISTANCES];
        let mut now_pos = 0u64;

        while now_pos < limit {
            let pos_state = (now_pos as u32 & self.pos_state_mask) as usize;
            let complex = (state.index() << NUM_POS_STATES_BITS_MAX) + pos_state;

            if rc.decode_bit(&mut self.is_match[complex])? == 0 {
                let prev_byte = window.get_byte(0);
                let byte = if state.is_char() {
                    self.literal.decode(&mut rc, now_pos as u32, prev_byte)?
                } else {
                    let match_byte = window.get_byte(reps[0]);
                    self.literal
                        .decode_matched(&mut rc, now_pos as u32, prev_byte, match_byte)?
                };
                window.put_byte(byte);
                state.update_char();
                now_pos += 1;
                continue;
            }

            let len = if rc.decode_bit(&mut self.is_rep[state.index()])? == 1 {
                if rc.decode_bit(&mut self.is_rep_g0[state.index()])? == 0 {
                    if rc.decode_bit(&mut self.is_rep0_long[complex])? == 0 {
                        if reps[0] as u64 >= now_pos {
                            return Err(LzmaError::DataCorruption(
                                "short rep before any output",
                            ));
                        }
                        state.update_short_rep();
                        window.put_byte(window.get_byte(reps[0]));
                        now_pos += 1;
                        continue;
                    }
                } else {
                    let distance;
                    if rc.decode_bit(&mut self.is_rep_g1[state.index()])? == 0 {
                        distance = reps[1];
                    } else {
                        if rc.decode_bit(&mut self.is_rep_g2[state.index()])? == 0 {
                            distance = reps[2];
                        } else {
                            distance = reps[3];
                            reps[3] = reps[2];
                        }
                        reps[2] = reps[1];
                    }
                    reps[1] = reps[0];
                    reps[0] = distance;
                }
                let len = MATCH_MIN_LEN + self.rep_len_decoder.decode(&mut rc, pos_state)?;
                state.update_rep();
                len
            } else {
                reps[3] = reps[2];
                reps[2] = reps[1];
                reps[1] = reps[0];
                let len = MATCH_MIN_LEN + self.len_decoder.decode(&mut rc, pos_state)?;
                state.update_match();
                reps[0] = self.decode_distance(&mut rc, len)?;
                len
            };

            if reps[0] as u64 >= now_pos || reps[0] >= self.dictionary_size_check {
                if reps[0] == u32::MAX {
                    if out_size.is_some() {
                        return Err(LzmaError::DataCorruption(
                            "end marker before declared size",
                        ));
                    }
                    trace!(position = now_pos, "end marker");
                    break;
                }
                return Err(LzmaError::DataCorruption("match distance out of range"));
            }
            if now_pos + len as u64 > limit {
                return Err(LzmaError::DataCorruption("match runs past declared size"));
            }
            window.copy_block(reps[0], len)?;
            now_pos += len as u64;
        }

        debug!(
            output = window.total_written(),
            consumed = rc.position(),
            "decoded LZMA stream"
        );
        Ok(window.into_inner())
    }

    fn decode_distance(&mut self, rc: &mut RangeDecoder<'_>, len: u32) -> Result<u32> {
        let pos_slot = self.pos_slot[len_to_pos_state(len)].decode(rc)?;
        if pos_slot < START_POS_MODEL_INDEX {
            return Ok(pos_slot);
        }
        let num_direct_bits = (pos_slot >> 1) - 1;
        let mut distance = (2 | (pos_slot & 1)) << num_direct_bits;
        if pos_slot < END_POS_MODEL_INDEX {
            let base = (distance - pos_slot - 1) as usize;
            distance += reverse_decode(&mut self.pos_decoders[base..], rc, num_direct_bits)?;
        } else {
            distance += rc.decode_direct_bits(num_direct_bits - NUM_ALIGN_BITS)? << NUM_ALIGN_BITS;
            distance += self.align.reverse_decode(rc)?;
        }
        Ok(distance)
    }
}

//! LZMA compression and decompression.
//!
//! A byte-exact implementation of the LZMA algorithm: an adaptive binary
//! range coder driving literal, length and distance probability models,
//! fed by a binary-tree match finder and an optimal parser.
//!
//! ## Components
//!
//! | Type | Role |
//! |------|------|
//! | [`RangeEncoder`] / [`RangeDecoder`] | Adaptive binary arithmetic coding |
//! | [`BitTree`] | Multi-bit symbols as a tree of bit models |
//! | [`LenCoder`] | Match lengths (2..=273) per position state |
//! | [`LiteralCoder`] | Context-modelled bytes, plain and matched |
//! | [`MatchFinder`] / [`BinTree`] | Candidate matches for the parser |
//! | [`Encoder`] | Optimal parse + range encoding |
//! | [`Decoder`] | Range decoding into an [`OutWindow`] |
//!
//! ## Stream Layout
//!
//! A raw LZMA stream carries no framing. Callers store the 5-byte property
//! blob ([`LzmaProperties`]) and either the uncompressed size or rely on the
//! end marker. [`compress`] and [`decompress`] add the common 13-byte
//! `.lzma` header:
//!
//! ```text
//! ┌────────────┬───────────────┬──────────────────────┐
//! │ props (5)  │ size u64 LE   │ range coder output   │
//! └────────────┴───────────────┴──────────────────────┘
//!                 u64::MAX = unknown, end marker present
//! ```
//!
//! ## Example
//!
//! ```rust
//! use dat_image::lzma::{self, EncoderProperties};
//!
//! let data = b"Hello, hello, hello!";
//! let packed = lzma::compress(data, &EncoderProperties::default()).unwrap();
//! assert_eq!(lzma::decompress(&packed).unwrap(), data);
//! ```

mod bit_tree;
mod decoder;
mod encoder;
mod length;
mod literal;
mod match_finder;
mod properties;
mod range_coder;
mod state;
mod window;


pub use bit_tree::BitTree;
pub use decoder::Decoder;
pub use encoder::{Encoder, Progress};
pub use length::{LenCoder, LenPriceTableEncoder};
pub use literal::LiteralCoder;
pub use match_finder::{BinTree, MatchFinder, MatchFinderKind};
pub use properties::{EncoderProperties, LzmaProperties};
pub use range_coder::{RangeDecoder, RangeEncoder};
pub use state::State;
pub use window::OutWindow;

use std::io;
use thiserror::Error;
use tracing::debug;

/// Number of most-recently-used match distances kept by the coder.
pub const NUM_REP_DISTANCES: usize = 4;
/// Number of coder states.
pub const NUM_STATES: usize = 12;

pub const NUM_POS_SLOT_BITS: u32 = 6;
pub const NUM_LEN_TO_POS_STATES: usize = 4;

pub const NUM_ALIGN_BITS: u32 = 4;
pub const ALIGN_TABLE_SIZE: u32 = 1 << NUM_ALIGN_BITS;
pub const ALIGN_MASK: u32 = ALIGN_TABLE_SIZE - 1;

pub const START_POS_MODEL_INDEX: u32 = 4;
pub const END_POS_MODEL_INDEX: u32 = 14;
pub const NUM_FULL_DISTANCES: u32 = 1 << (END_POS_MODEL_INDEX / 2);

pub const NUM_POS_STATES_BITS_MAX: u32 = 4;
pub const NUM_POS_STATES_MAX: usize = 1 << NUM_POS_STATES_BITS_MAX;

pub const NUM_LOW_LEN_BITS: u32 = 3;
pub const NUM_MID_LEN_BITS: u32 = 3;
pub const NUM_HIGH_LEN_BITS: u32 = 8;
pub const NUM_LOW_LEN_SYMBOLS: u32 = 1 << NUM_LOW_LEN_BITS;
pub const NUM_MID_LEN_SYMBOLS: u32 = 1 << NUM_MID_LEN_BITS;
pub const NUM_LEN_SYMBOLS: u32 =
    NUM_LOW_LEN_SYMBOLS + NUM_MID_LEN_SYMBOLS + (1 << NUM_HIGH_LEN_BITS);

pub const MATCH_MIN_LEN: u32 = 2;
pub const MATCH_MAX_LEN: u32 = MATCH_MIN_LEN + NUM_LEN_SYMBOLS - 1;

/// Largest dictionary the encoder accepts (1 GiB).
pub const DICTIONARY_SIZE_MAX: u32 = 1 << 30;
/// Smallest dictionary the encoder accepts (4 KiB).
pub const DICTIONARY_SIZE_MIN: u32 = 1 << 12;

/// Length of the `.lzma` header written by [`compress`].
pub const ALONE_HEADER_SIZE: usize = LzmaProperties::SIZE + 8;

/// Maps a match length to the position-slot model used for its distance.
#[inline]
pub const fn len_to_pos_state(len: u32) -> usize {
    let len = len - MATCH_MIN_LEN;
    if len < NUM_LEN_TO_POS_STATES as u32 {
        len as usize
    } else {
        NUM_LEN_TO_POS_STATES - 1
    }
}

/// LZMA codec errors.
#[derive(Debug, Error)]
pub enum LzmaError {
    /// Coder configuration out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The compressed stream violates the format while decoding.
    #[error("corrupt LZMA data: {0}")]
    DataCorruption(&'static str),

    /// The compressed stream ended before decoding finished.
    #[error("LZMA stream truncated")]
    TruncatedStream,

    /// The output sink failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, LzmaError>;

/// Compress `input` into a `.lzma` stream (header + raw stream).
///
/// With `end_marker` enabled the size field is written as unknown, which is
/// what most tools produce.
pub fn compress(input: &[u8], props: &EncoderProperties) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(props.clone())?;
    let mut out = Vec::with_capacity(ALONE_HEADER_SIZE + input.len() / 2);
    out.extend_from_slice(&encoder.coder_properties().to_bytes());
    let size = if props.end_marker {
        u64::MAX
    } else {
        input.len() as u64
    };
    out.extend_from_slice(&size.to_le_bytes());
    encoder.encode(input, &mut out)?;
    debug!(
        input = input.len(),
        output = out.len(),
        "compressed .lzma stream"
    );
    Ok(out)
}

/// Decompress a `.lzma` stream produced by [`compress`] or other tools.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < ALONE_HEADER_SIZE {
        return Err(LzmaError::TruncatedStream);
    }
    let props = LzmaProperties::from_bytes(&data[..LzmaProperties::SIZE])?;
    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(&data[LzmaProperties::SIZE..ALONE_HEADER_SIZE]);
    let size = u64::from_le_bytes(size_bytes);
    let out_size = (size != u64::MAX).then_some(size);

    let mut decoder = Decoder::new(props)?;
    decoder.decode(&data[ALONE_HEADER_SIZE..], out_size)
}

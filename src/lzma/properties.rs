//! Coder configuration.

use super::match_finder::MatchFinderKind;
use super::{
    LzmaError, Result, DICTIONARY_SIZE_MAX, DICTIONARY_SIZE_MIN, MATCH_MAX_LEN,
    NUM_POS_STATES_BITS_MAX,
};

/// Model parameters shared by encoder and decoder, serialised as the
/// 5-byte property blob: `(pb * 5 + lp) * 9 + lc`, then the dictionary
/// size as little-endian `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaProperties {
    /// Literal context bits (0..=8).
    pub lc: u32,
    /// Literal position bits.
    pub lp: u32,
    /// Position state bits (0..=4).
    pub pb: u32,
    pub dictionary_size: u32,
}

impl LzmaProperties {
    pub const SIZE: usize = 5;

    /// Parse a property blob. Extra trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(LzmaError::InvalidParameter(format!(
                "property blob needs {} bytes, have {}",
                Self::SIZE,
                bytes.len()
            )));
        }
        let d = bytes[0] as u32;
        let lc = d % 9;
        let remainder = d / 9;
        let lp = remainder % 5;
        let pb = remainder / 5;
        if pb > NUM_POS_STATES_BITS_MAX {
            return Err(LzmaError::InvalidParameter(format!(
                "pb {pb} out of range"
            )));
        }
        let dictionary_size = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        Ok(Self {
            lc,
            lp,
            pb,
            dictionary_size,
        })
    }

    pub fn to_bytes(&self) -> [u8; 5] {
        let mut out = [0u8; Self::SIZE];
        out[0] = ((self.pb * 5 + self.lp) * 9 + self.lc) as u8;
        out[1..].copy_from_slice(&self.dictionary_size.to_le_bytes());
        out
    }
}

/// Encoder settings.
///
/// ```rust
/// use dat_image::lzma::{EncoderProperties, MatchFinderKind};
///
/// let props = EncoderProperties::default()
///     .with_dictionary_size(1 << 16)
///     .with_fast_bytes(64)
///     .with_match_finder(MatchFinderKind::Bt2)
///     .with_end_marker(true);
/// assert!(props.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderProperties {
    pub dictionary_size: u32,
    pub lc: u32,
    pub lp: u32,
    pub pb: u32,
    /// Match length at which the parser stops looking for better options.
    pub fast_bytes: u32,
    pub match_finder: MatchFinderKind,
    /// Terminate the stream with an end marker.
    pub end_marker: bool,
}

impl Default for EncoderProperties {
    fn default() -> Self {
        Self {
            dictionary_size: 1 << 22,
            lc: 3,
            lp: 0,
            pb: 2,
            fast_bytes: 32,
            match_finder: MatchFinderKind::Bt4,
            end_marker: false,
        }
    }
}

impl EncoderProperties {
    pub fn with_dictionary_size(mut self, size: u32) -> Self {
        self.dictionary_size = size;
        self
    }

    pub fn with_literal_bits(mut self, lc: u32, lp: u32) -> Self {
        self.lc = lc;
        self.lp = lp;
        self
    }

    pub fn with_pos_bits(mut self, pb: u32) -> Self {
        self.pb = pb;
        self
    }

    pub fn with_fast_bytes(mut self, fast_bytes: u32) -> Self {
        self.fast_bytes = fast_bytes;
        self
    }

    pub fn with_match_finder(mut self, kind: MatchFinderKind) -> Self {
        self.match_finder = kind;
        self
    }

    pub fn with_end_marker(mut self, end_marker: bool) -> Self {
        self.end_marker = end_marker;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(DICTIONARY_SIZE_MIN..=DICTIONARY_SIZE_MAX).contains(&self.dictionary_size) {
            return Err(LzmaError::InvalidParameter(format!(
                "dictionary size {} outside {}..={}",
                self.dictionary_size, DICTIONARY_SIZE_MIN, DICTIONARY_SIZE_MAX
            )));
        }
        if self.lc > 8 {
            return Err(LzmaError::InvalidParameter(format!("lc {} > 8", self.lc)));
        }
        if self.lp > 4 {
            return Err(LzmaError::InvalidParameter(format!("lp {} > 4", self.lp)));
        }
        if self.pb > NUM_POS_STATES_BITS_MAX {
            return Err(LzmaError::InvalidParameter(format!("pb {} > 4", self.pb)));
        }
        if !(5..=MATCH_MAX_LEN).contains(&self.fast_bytes) {
            return Err(LzmaError::InvalidParameter(format!(
                "fast bytes {} outside 5..={}",
                self.fast_bytes, MATCH_MAX_LEN
            )));
        }
        Ok(())
    }

    /// Distance slots needed to reach every position in the dictionary.
    pub fn dist_table_size(&self) -> u32 {
        let mut log = 0;
        while log < 30 && self.dictionary_size > (1 << log) {
            log += 1;
        }
        log * 2
    }

    pub fn lzma_properties(&self) -> LzmaProperties {
        LzmaProperties {
            lc: self.lc,
            lp: self.lp,
            pb: self.pb,
            dictionary_size: self.dictionary_size,
        }
    }
}

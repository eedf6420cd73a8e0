//! Match finders.
//!
//! The encoder walks the input one position at a time and asks a
//! [`MatchFinder`] for the matches ending the current position. The
//! production finder is [`BinTree`], a hash-chained binary search tree over
//! the dictionary window (BT4: 2/3/4-byte hashes, BT2: 2-byte hash).
//!
//! ## Positions
//!
//! Distances follow the coder convention: a reported distance `d` means the
//! match starts `d + 1` bytes back. Byte accessors take an index relative to
//! the finder's current position, so after `get_matches` the byte just
//! searched for is at index `-1`.

use super::{LzmaError, Result, MATCH_MAX_LEN};
use crate::crc32::crc32_byte;

/// Interface the encoder uses to locate repeated data.
pub trait MatchFinder {
    /// Fill `distances` with `(length, distance)` pairs of strictly
    /// increasing length for the current position and advance by one.
    /// Returns the number of `u32` entries written (twice the pair count).
    fn get_matches(&mut self, distances: &mut [u32]) -> u32;

    /// Advance `num` positions, keeping the search structure updated.
    fn skip(&mut self, num: u32);

    /// Byte at `index` relative to the current position.
    fn index_byte(&self, index: i32) -> u8;

    /// Length of the match at `index` against the data `distance + 1` bytes
    /// earlier, capped at `limit` and at the end of input.
    fn match_len(&self, index: i32, distance: u32, limit: u32) -> u32;

    /// Bytes left after the current position.
    fn available_bytes(&self) -> u32;
}

/// Binary-tree flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchFinderKind {
    /// 2-byte hash.
    Bt2,
    /// 2, 3 and 4-byte hashes.
    #[default]
    Bt4,
}

impl MatchFinderKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bt2 => "BT2",
            Self::Bt4 => "BT4",
        }
    }
}

impl std::str::FromStr for MatchFinderKind {
    type Err = LzmaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BT2" => Ok(Self::Bt2),
            "BT4" => Ok(Self::Bt4),
            _ => Err(LzmaError::InvalidParameter(format!(
                "unknown match finder {s:?}"
            ))),
        }
    }
}

const HASH2_SIZE: u32 = 1 << 10;
const HASH3_SIZE: u32 = 1 << 16;
const BT2_HASH_SIZE: u32 = 1 << 16;
const HASH3_OFFSET: u32 = HASH2_SIZE;
const START_MAX_LEN: u32 = 1;
const EMPTY_HASH_VALUE: u32 = 0;

/// Default number of tree nodes visited per position.
pub const DEFAULT_CUT_VALUE: u32 = 0xFF;

/// Largest input a [`BinTree`] can index.
pub const MAX_INPUT_LEN: usize = (1 << 31) - 2;

/// Binary-tree match finder over an in-memory input.
///
/// Positions are 1-based internally so that 0 marks an empty hash slot.
pub struct BinTree<'a> {
    data: &'a [u8],
    /// Current position, 1-based
    pos: u32,
    /// One past the last position
    stream_pos: u32,
    cyclic_pos: u32,
    cyclic_size: u32,
    match_max_len: u32,
    son: Vec<u32>,
    hash: Vec<u32>,
    hash_mask: u32,
    cut_value: u32,
    hash_array: bool,
    num_hash_direct_bytes: u32,
    min_match_check: u32,
    fix_hash_size: u32,
}

impl<'a> BinTree<'a> {
    /// Index `data` with a window of `dictionary_size` bytes, reporting
    /// matches up to `match_max_len` (the encoder's fast-bytes setting).
    pub fn new(
        data: &'a [u8],
        kind: MatchFinderKind,
        dictionary_size: u32,
        match_max_len: u32,
    ) -> Result<Self> {
        let input_len = u32::try_from(data.len())
            .ok()
            .filter(|&len| len as usize <= MAX_INPUT_LEN)
            .ok_or_else(|| {
                LzmaError::InvalidParameter(format!(
                    "input of {} bytes exceeds the match finder limit",
                    data.len()
                ))
            })?;
        // Positions never wrap inside an in-memory input shorter than the
        // dictionary, so neither the hash nor the tree needs to cover more
        // than the input.
        let history_size = dictionary_size.min(input_len).max(1);

        let (hash_array, num_hash_direct_bytes, min_match_check, fix_hash_size) = match kind {
            MatchFinderKind::Bt4 => (true, 0, 4, HASH2_SIZE + HASH3_SIZE),
            MatchFinderKind::Bt2 => (false, 2, 3, 0),
        };

        let (hash_mask, hash_size) = if hash_array {
            let mut hs = history_size - 1;
            hs |= hs >> 1;
            hs |= hs >> 2;
            hs |= hs >> 4;
            hs |= hs >> 8;
            hs >>= 1;
            hs |= 0xFFFF;
            if hs > (1 << 24) {
                hs >>= 1;
            }
            (hs, hs + 1 + fix_hash_size)
        } else {
            (0, BT2_HASH_SIZE)
        };

        let cyclic_size = history_size + 1;

        Ok(Self {
            data,
            pos: 1,
            stream_pos: input_len + 1,
            cyclic_pos: 0,
            cyclic_size,
            match_max_len,
            son: vec![EMPTY_HASH_VALUE; cyclic_size as usize * 2],
            hash: vec![EMPTY_HASH_VALUE; hash_size as usize],
            hash_mask,
            cut_value: DEFAULT_CUT_VALUE,
            hash_array,
            num_hash_direct_bytes,
            min_match_check,
            fix_hash_size,
        })
    }

    /// Limit the number of tree nodes visited per position.
    pub fn set_cut_value(&mut self, cut_value: u32) {
        self.cut_value = cut_value;
    }

    #[inline]
    fn byte_at(&self, pos: u32) -> u8 {
        self.data[(pos - 1) as usize]
    }

    fn move_pos(&mut self) {
        self.cyclic_pos += 1;
        if self.cyclic_pos >= self.cyclic_size {
            self.cyclic_pos = 0;
        }
        self.pos += 1;
    }

    /// Hash slots touched at the current position: `(hash2, hash3, main)`.
    fn hashes(&self) -> (u32, u32, u32) {
        let cur = (self.pos - 1) as usize;
        let d = &self.data[cur..];
        if self.hash_array {
            let mut temp = crc32_byte(d[0]) ^ d[1] as u32;
            let hash2 = temp & (HASH2_SIZE - 1);
            temp ^= (d[2] as u32) << 8;
            let hash3 = temp & (HASH3_SIZE - 1);
            let main = (temp ^ (crc32_byte(d[3]) << 5)) & self.hash_mask;
            (hash2, hash3, main)
        } else {
            (0, 0, d[0] as u32 ^ ((d[1] as u32) << 8))
        }
    }

    fn len_limit(&self) -> Option<u32> {
        if self.pos + self.match_max_len <= self.stream_pos {
            Some(self.match_max_len)
        } else {
            let limit = self.stream_pos - self.pos;
            (limit >= self.min_match_check).then_some(limit)
        }
    }

    #[inline]
    fn cyclic_index(&self, delta: u32) -> usize {
        let slot = if delta <= self.cyclic_pos {
            self.cyclic_pos - delta
        } else {
            self.cyclic_pos + self.cyclic_size - delta
        };
        (slot << 1) as usize
    }

    /// Insert the current position into its tree, optionally collecting
    /// longer-and-longer matches along the search path.
    fn walk_tree(
        &mut self,
        mut cur_match: u32,
        len_limit: u32,
        match_min_pos: u32,
        mut sink: Option<(&mut [u32], &mut usize, &mut u32)>,
    ) {
        let cur = self.pos - 1;
        let mut ptr0 = ((self.cyclic_pos << 1) + 1) as usize;
        let mut ptr1 = (self.cyclic_pos << 1) as usize;
        let mut len0 = self.num_hash_direct_bytes;
        let mut len1 = self.num_hash_direct_bytes;
        let mut count = self.cut_value;

        loop {
            if cur_match <= match_min_pos || count == 0 {
                self.son[ptr0] = EMPTY_HASH_VALUE;
                self.son[ptr1] = EMPTY_HASH_VALUE;
                break;
            }
            count -= 1;
            let delta = self.pos - cur_match;
            let cyclic = self.cyclic_index(delta);
            let pby1 = (cur_match - 1) as usize;
            let cur = cur as usize;
            let mut len = len0.min(len1);

            if self.data[pby1 + len as usize] == self.data[cur + len as usize] {
                len += 1;
                while len != len_limit
                    && self.data[pby1 + len as usize] == self.data[cur + len as usize]
                {
                    len += 1;
                }
                if let Some((distances, offset, max_len)) = sink.as_mut() {
                    if **max_len < len {
                        **max_len = len;
                        distances[**offset] = len;
                        distances[**offset + 1] = delta - 1;
                        **offset += 2;
                    }
                }
                if len == len_limit {
                    self.son[ptr1] = self.son[cyclic];
                    self.son[ptr0] = self.son[cyclic + 1];
                    break;
                }
            }

            if self.data[pby1 + len as usize] < self.data[cur + len as usize] {
                self.son[ptr1] = cur_match;
                ptr1 = cyclic + 1;
                cur_match = self.son[ptr1];
                len1 = len;
            } else {
                self.son[ptr0] = cur_match;
                ptr0 = cyclic;
                cur_match = self.son[ptr0];
                len0 = len;
            }
        }
    }

    fn match_min_pos(&self) -> u32 {
        if self.pos > self.cyclic_size {
            self.pos - self.cyclic_size
        } else {
            0
        }
    }
}

impl MatchFinder for BinTree<'_> {
    fn get_matches(&mut self, distances: &mut [u32]) -> u32 {
        let Some(len_limit) = self.len_limit() else {
            self.move_pos();
            return 0;
        };

        let mut offset = 0usize;
        let match_min_pos = self.match_min_pos();
        let cur = self.pos - 1;
        let mut max_len = START_MAX_LEN;
        let (hash2, hash3, hash_value) = self.hashes();

        let cur_match = self.hash[(self.fix_hash_size + hash_value) as usize];
        if self.hash_array {
            let mut cur_match2 = self.hash[hash2 as usize];
            let cur_match3 = self.hash[(HASH3_OFFSET + hash3) as usize];
            self.hash[hash2 as usize] = self.pos;
            self.hash[(HASH3_OFFSET + hash3) as usize] = self.pos;

            let cur_byte = self.data[cur as usize];
            if cur_match2 > match_min_pos && self.byte_at(cur_match2) == cur_byte {
                max_len = 2;
                distances[offset] = 2;
                distances[offset + 1] = self.pos - cur_match2 - 1;
                offset += 2;
            }
            if cur_match3 > match_min_pos && self.byte_at(cur_match3) == cur_byte {
                if cur_match3 == cur_match2 {
                    offset -= 2;
                }
                max_len = 3;
                distances[offset] = 3;
                distances[offset + 1] = self.pos - cur_match3 - 1;
                offset += 2;
                cur_match2 = cur_match3;
            }
            if offset != 0 && cur_match2 == cur_match {
                offset -= 2;
                max_len = START_MAX_LEN;
            }
        }

        self.hash[(self.fix_hash_size + hash_value) as usize] = self.pos;

        let direct = self.num_hash_direct_bytes;
        if direct != 0
            && cur_match > match_min_pos
            && self.data[(cur_match - 1 + direct) as usize] != self.data[(cur + direct) as usize]
        {
            max_len = direct;
            distances[offset] = direct;
            distances[offset + 1] = self.pos - cur_match - 1;
            offset += 2;
        }

        self.walk_tree(
            cur_match,
            len_limit,
            match_min_pos,
            Some((distances, &mut offset, &mut max_len)),
        );
        self.move_pos();
        offset as u32
    }

    fn skip(&mut self, num: u32) {
        for _ in 0..num {
            let Some(len_limit) = self.len_limit() else {
                self.move_pos();
                continue;
            };
            let match_min_pos = self.match_min_pos();
            let (hash2, hash3, hash_value) = self.hashes();
            if self.hash_array {
                self.hash[hash2 as usize] = self.pos;
                self.hash[(HASH3_OFFSET + hash3) as usize] = self.pos;
            }
            let slot = (self.fix_hash_size + hash_value) as usize;
            let cur_match = self.hash[slot];
            self.hash[slot] = self.pos;

            self.walk_tree(cur_match, len_limit, match_min_pos, None);
            self.move_pos();
        }
    }

    #[inline]
    fn index_byte(&self, index: i32) -> u8 {
        self.data[(self.pos as i64 - 1 + index as i64) as usize]
    }

    fn match_len(&self, index: i32, distance: u32, limit: u32) -> u32 {
        let start = self.pos as i64 + index as i64;
        let limit = (limit as i64).min(self.stream_pos as i64 - start).max(0) as usize;
        let cur = (start - 1) as usize;
        let Some(back) = cur.checked_sub(distance as usize + 1) else {
            return 0;
        };
        let a = &self.data[cur..cur + limit];
        let b = &self.data[back..back + limit];
        a.iter().zip(b).take_while(|(x, y)| x == y).count() as u32
    }

    #[inline]
    fn available_bytes(&self) -> u32 {
        self.stream_pos - self.pos
    }
}

/// Upper bound on `u32` entries [`MatchFinder::get_matches`] can write.
pub const MATCH_DISTANCES_SIZE: usize = MATCH_MAX_LEN as usize * 2 + 2;

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(mf: &mut BinTree<'_>) -> Vec<(u32, u32)> {
        let mut distances = [0u32; MATCH_DISTANCES_SIZE];
        let n = mf.get_matches(&mut distances) as usize;
        distances[..n].chunks(2).map(|p| (p[0], p[1])).collect()
    }

    #[test]
    fn test_finds_repeat() {
        let data = b"abcdefgh_abcdefgh";
        for kind in [MatchFinderKind::Bt4, MatchFinderKind::Bt2] {
            let mut mf = BinTree::new(data, kind, 1 << 16, 32).unwrap();
            mf.skip(9);
            let found = pairs(&mut mf);
            let &(len, dist) = found.last().unwrap();
            assert_eq!(len, 8, "{kind:?}");
            assert_eq!(dist, 8, "{kind:?}");
            // After a search the searched byte sits at index -1.
            assert_eq!(mf.index_byte(-1), b'a');
        }
    }

    #[test]
    fn test_tables_sized_from_input() {
        let data = b"0123456789abcdef0123456789abcdef";
        let mf = BinTree::new(data, MatchFinderKind::Bt4, 1 << 30, 32).unwrap();
        assert_eq!(mf.hash_mask, 0xFFFF);
        assert_eq!(mf.hash.len(), (0xFFFF + 1 + HASH2_SIZE + HASH3_SIZE) as usize);
        assert_eq!(mf.son.len(), (data.len() + 1) * 2);

        // a short dictionary still bounds the window
        let mf = BinTree::new(data, MatchFinderKind::Bt4, 8, 32).unwrap();
        assert_eq!(mf.son.len(), 9 * 2);

        let mut mf = BinTree::new(data, MatchFinderKind::Bt4, u32::MAX, 32).unwrap();
        mf.skip(16);
        assert_eq!(pairs(&mut mf).last(), Some(&(16, 15)));
    }

    #[test]
    fn test_main_hash_mixes_crc_table() {
        let data = b"wxyz";
        let mf = BinTree::new(data, MatchFinderKind::Bt4, 1 << 16, 32).unwrap();
        let (hash2, hash3, main) = mf.hashes();
        let temp = crc32_byte(b'w') ^ b'x' as u32;
        assert_eq!(hash2, temp & (HASH2_SIZE - 1));
        let temp = temp ^ ((b'y' as u32) << 8);
        assert_eq!(hash3, temp & (HASH3_SIZE - 1));
        assert_eq!(main, (temp ^ (crc32_byte(b'z') << 5)) & 0xFFFF);
    }

    #[test]
    fn test_lengths_strictly_increase() {
        let data = b"abcXabcdYabcdeZabcdef";
        let mut mf = BinTree::new(data, MatchFinderKind::Bt4, 1 << 16, 64).unwrap();
        mf.skip(15);
        let found = pairs(&mut mf);
        assert!(!found.is_empty());
        for w in found.windows(2) {
            assert!(w[0].0 < w[1].0);
        }
        assert_eq!(found.last().unwrap().0, 5);
    }

    #[test]
    fn test_match_len_clamps_at_end() {
        let data = b"xyzxyzxyz";
        let mut mf = BinTree::new(data, MatchFinderKind::Bt4, 1 << 16, 32).unwrap();
        mf.skip(4);
        // Current byte (index -1) is data[3]; distance 2 means 3 bytes back.
        assert_eq!(mf.match_len(-1, 2, 273), 6);
        assert_eq!(mf.match_len(-1, 2, 4), 4);
        assert_eq!(mf.match_len(-1, 0, 273), 0);
        assert_eq!(mf.available_bytes(), 5);
    }

    #[test]
    fn test_short_tail_reports_nothing() {
        let data = b"aaa";
        let mut mf = BinTree::new(data, MatchFinderKind::Bt4, 1 << 16, 32).unwrap();
        assert_eq!(pairs(&mut mf), vec![]);
        assert_eq!(pairs(&mut mf), vec![]);
        assert_eq!(mf.available_bytes(), 1);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("bt2".parse::<MatchFinderKind>().unwrap(), MatchFinderKind::Bt2);
        assert_eq!("BT4".parse::<MatchFinderKind>().unwrap(), MatchFinderKind::Bt4);
        assert!("hc4".parse::<MatchFinderKind>().is_err());
    }
}

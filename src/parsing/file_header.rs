//! File header parser.
//!
//! The file header opens every archive and carries the archive-wide
//! counts. The group header table follows immediately.

use super::{le_i16, le_i32, le_i64};
use crate::error::{DatError, Result};

/// Archive magic, stored as a little-endian `i64`.
pub const DAT_MAGIC: i64 = 0x5602235657062357;

/// The only format version in existence.
pub const DAT_VERSION: i16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: i16,
    pub group_count: i16,
    pub sub_count: i16,
    /// Sum of all group lengths
    pub length: i32,
    /// Sum of all palette sizes
    pub color_count: i32,
    /// Size of the group header table
    pub data_offset: i32,
}

pub struct FileHeaderParser;

impl FileHeaderParser {
    pub const HEADER_SIZE: usize = 0x22;

    /// Quick check for the archive magic.
    pub fn is_dat(buffer: &[u8]) -> bool {
        buffer.len() >= 8 && le_i64(buffer, 0) == DAT_MAGIC
    }

    pub fn parse(buffer: &[u8]) -> Result<FileHeader> {
        if buffer.len() < Self::HEADER_SIZE {
            return Err(DatError::BufferTooSmall {
                needed: Self::HEADER_SIZE,
                have: buffer.len(),
            });
        }
        if !Self::is_dat(buffer) {
            return Err(DatError::InvalidSignature);
        }
        let version = le_i16(buffer, 8);
        if version != DAT_VERSION {
            return Err(DatError::InvalidVersion(version));
        }

        // 0x16: reserved i64
        Ok(FileHeader {
            version,
            group_count: le_i16(buffer, 0xA),
            sub_count: le_i16(buffer, 0xC),
            length: le_i32(buffer, 0xE),
            color_count: le_i32(buffer, 0x12),
            data_offset: le_i32(buffer, 0x1E),
        })
    }

    pub fn write(header: &FileHeader, out: &mut Vec<u8>) {
        out.extend_from_slice(&DAT_MAGIC.to_le_bytes());
        out.extend_from_slice(&header.version.to_le_bytes());
        out.extend_from_slice(&header.group_count.to_le_bytes());
        out.extend_from_slice(&header.sub_count.to_le_bytes());
        out.extend_from_slice(&header.length.to_le_bytes());
        out.extend_from_slice(&header.color_count.to_le_bytes());
        out.extend_from_slice(&0i64.to_le_bytes());
        out.extend_from_slice(&header.data_offset.to_le_bytes());
    }
}

//! Group header parser.
//!
//! One group header per group follows the file header. Group data is laid
//! out in the same order, each group's subs back to back.

use super::{le_i16, le_i32};
use crate::error::{DatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupHeader {
    pub id: i16,
    pub sub_count: i16,
    /// Sum of `sub.length + 0x12` over the group's subs
    pub length: i32,
    pub color_count: i32,
    /// Running sum of the lengths of the preceding groups
    pub data_offset: i32,
}

pub struct GroupHeaderParser;

impl GroupHeaderParser {
    pub const HEADER_SIZE: usize = 0x18;

    pub fn parse(buffer: &[u8]) -> Result<GroupHeader> {
        if buffer.len() < Self::HEADER_SIZE {
            return Err(DatError::BufferTooSmall {
                needed: Self::HEADER_SIZE,
                have: buffer.len(),
            });
        }

        let sub_count = le_i16(buffer, 2);
        if sub_count < 0 {
            return Err(DatError::InvalidHeader("negative sub count"));
        }

        // 0x0C: reserved i64
        Ok(GroupHeader {
            id: le_i16(buffer, 0),
            sub_count,
            length: le_i32(buffer, 4),
            color_count: le_i32(buffer, 8),
            data_offset: le_i32(buffer, 0x14),
        })
    }

    pub fn write(header: &GroupHeader, out: &mut Vec<u8>) {
        out.extend_from_slice(&header.id.to_le_bytes());
        out.extend_from_slice(&header.sub_count.to_le_bytes());
        out.extend_from_slice(&header.length.to_le_bytes());
        out.extend_from_slice(&header.color_count.to_le_bytes());
        out.extend_from_slice(&0i64.to_le_bytes());
        out.extend_from_slice(&header.data_offset.to_le_bytes());
    }
}

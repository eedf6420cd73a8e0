//! Sub header parser.
//!
//! Every sub starts with this short header; its `length` covers the image
//! header, palette and pixel payload that follow.

use super::{le_i16, le_i32};
use crate::error::{DatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubHeader {
    /// Raw image type value, see [`ImageType`](crate::image::ImageType)
    pub image_type: i16,
    pub width: i16,
    pub height: i16,
    pub group_id: i16,
    pub sub_id: i16,
    /// Image data offset + payload length
    pub length: i32,
}

pub struct SubHeaderParser;

impl SubHeaderParser {
    pub const HEADER_SIZE: usize = 0x12;

    pub fn parse(buffer: &[u8]) -> Result<SubHeader> {
        if buffer.len() < Self::HEADER_SIZE {
            return Err(DatError::BufferTooSmall {
                needed: Self::HEADER_SIZE,
                have: buffer.len(),
            });
        }

        // 0x06: reserved i32
        Ok(SubHeader {
            image_type: le_i16(buffer, 0),
            width: le_i16(buffer, 2),
            height: le_i16(buffer, 4),
            group_id: le_i16(buffer, 0xA),
            sub_id: le_i16(buffer, 0xC),
            length: le_i32(buffer, 0xE),
        })
    }

    pub fn write(header: &SubHeader, out: &mut Vec<u8>) {
        out.extend_from_slice(&header.image_type.to_le_bytes());
        out.extend_from_slice(&header.width.to_le_bytes());
        out.extend_from_slice(&header.height.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&header.group_id.to_le_bytes());
        out.extend_from_slice(&header.sub_id.to_le_bytes());
        out.extend_from_slice(&header.length.to_le_bytes());
    }
}

//! Image header parser.
//!
//! Follows the sub header. Repeats the sub's length, size and type and
//! locates the pixel payload behind the palette.

use super::le_i32;
use crate::error::{DatError, Result};

/// Required value of the reserved field at 0x24.
pub const IMAGE_HEADER_RESERVED: i32 = 0x18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub length: i32,
    /// `0x2C + colours * 3`
    pub image_data_offset: i32,
    pub width: i32,
    pub height: i32,
    pub image_type: i32,
    /// Palette size, or the encoding tag of a 32bpp image
    pub color_count: i32,
}

pub struct ImageHeaderParser;

impl ImageHeaderParser {
    pub const HEADER_SIZE: usize = 0x2C;

    pub fn parse(buffer: &[u8]) -> Result<ImageHeader> {
        if buffer.len() < Self::HEADER_SIZE {
            return Err(DatError::BufferTooSmall {
                needed: Self::HEADER_SIZE,
                have: buffer.len(),
            });
        }
        if le_i32(buffer, 4) != Self::HEADER_SIZE as i32 {
            return Err(DatError::InvalidHeader("image header length"));
        }
        if le_i32(buffer, 0x24) != IMAGE_HEADER_RESERVED {
            return Err(DatError::InvalidHeader("image header reserved field"));
        }

        // 0x0C repeats the length, 0x18 is a reserved i64
        Ok(ImageHeader {
            length: le_i32(buffer, 0),
            image_data_offset: le_i32(buffer, 8),
            width: le_i32(buffer, 0x10),
            height: le_i32(buffer, 0x14),
            image_type: le_i32(buffer, 0x20),
            color_count: le_i32(buffer, 0x28),
        })
    }

    pub fn write(header: &ImageHeader, out: &mut Vec<u8>) {
        out.extend_from_slice(&header.length.to_le_bytes());
        out.extend_from_slice(&(Self::HEADER_SIZE as i32).to_le_bytes());
        out.extend_from_slice(&header.image_data_offset.to_le_bytes());
        out.extend_from_slice(&header.length.to_le_bytes());
        out.extend_from_slice(&header.width.to_le_bytes());
        out.extend_from_slice(&header.height.to_le_bytes());
        out.extend_from_slice(&0i64.to_le_bytes());
        out.extend_from_slice(&header.image_type.to_le_bytes());
        out.extend_from_slice(&IMAGE_HEADER_RESERVED.to_le_bytes());
        out.extend_from_slice(&header.color_count.to_le_bytes());
    }
}

//! Fixed-size header parsers.
//!
//! Each parser reads its header from the start of a buffer and writes it
//! back in the same layout. All fields are little-endian.

pub mod file_header;
pub mod group_header;
pub mod image_header;
pub mod sub_header;

pub use file_header::{FileHeader, FileHeaderParser, DAT_MAGIC, DAT_VERSION};
pub use group_header::{GroupHeader, GroupHeaderParser};
pub use image_header::{ImageHeader, ImageHeaderParser, IMAGE_HEADER_RESERVED};
pub use sub_header::{SubHeader, SubHeaderParser};

// Callers check the buffer length before reading fixed offsets.

#[inline]
fn le_i16(buffer: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([buffer[offset], buffer[offset + 1]])
}

#[inline]
fn le_i32(buffer: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        buffer[offset],
        buffer[offset + 1],
        buffer[offset + 2],
        buffer[offset + 3],
    ])
}

#[inline]
fn le_i64(buffer: &[u8], offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buffer[offset..offset + 8]);
    i64::from_le_bytes(bytes)
}

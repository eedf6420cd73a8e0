//! Pixel payload codecs.
//!
//! Each sub stores its pixels in one of four layouts selected by the image
//! type. Indexed layouts reference the sub's palette; the 32bpp layout
//! carries BGRA pixels, LZMA-compressed or block-compressed.
//!
//! ## Image Types
//!
//! | Type | Value | Payload |
//! |------|-------|---------|
//! | [`Transparent`] | 7 | Run-length rows of indices, index 0 transparent |
//! | [`Blended`] | 23 | Run-length rows of indices with per-pixel alpha |
//! | [`UncompressedBlended`] | 24 | `(index, alpha)` per pixel |
//! | [`Full32bppArgb`] | 25 | Tagged BGRA (see [`ArgbEncoding`]) or the type 24 layout |
//!
//! ## Row Layout
//!
//! Types 7 and 23 code each row as an operation count followed by that many
//! operations, and end the payload with one extra `0` byte:
//!
//! ```text
//! Transparent            Blended
//! 0x80..=0xFF  skip n    0xC0..=0xFF  skip n
//! 0x00..=0x7F  n indices 0x00..=0x3F  n opaque indices
//!                        0x80..=0xBF  n (alpha, index) pairs
//! ```
//!
//! [`Transparent`]: ImageType::Transparent
//! [`Blended`]: ImageType::Blended
//! [`UncompressedBlended`]: ImageType::UncompressedBlended
//! [`Full32bppArgb`]: ImageType::Full32bppArgb

pub mod argb;
pub mod blended;
pub mod transparent;
pub mod uncompressed;

use crate::error::{DatError, Result};

/// Largest width or height the 16-bit header fields can hold.
pub const MAX_DIMENSION: u16 = i16::MAX as u16;

/// Palette entries are limited to one byte of index.
pub const MAX_COLORS: usize = 256;

/// Pixel payload layout of a sub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Transparent = 7,
    Blended = 23,
    UncompressedBlended = 24,
    Full32bppArgb = 25,
}

impl ImageType {
    pub fn value(self) -> i16 {
        self as i16
    }

    /// Row-encoded types end their payload with a `0` byte.
    pub fn has_end_marker(self) -> bool {
        matches!(self, Self::Transparent | Self::Blended)
    }
}

impl TryFrom<i16> for ImageType {
    type Error = DatError;

    fn try_from(value: i16) -> Result<Self> {
        match value {
            7 => Ok(Self::Transparent),
            23 => Ok(Self::Blended),
            24 => Ok(Self::UncompressedBlended),
            25 => Ok(Self::Full32bppArgb),
            _ => Err(DatError::InvalidImageType(value)),
        }
    }
}

/// Third-party block compression formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockFormat {
    Bc3,
    Bc5,
    Bc7,
}

/// Encoding of a tagged 32bpp payload.
///
/// The tag lives in the image header's colour count, which is why tagged
/// images carry no palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgbEncoding {
    /// 5-byte property blob + raw LZMA stream of `width * height * 4` bytes
    Lzma,
    Block(BlockFormat),
}

impl ArgbEncoding {
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(Self::Block(BlockFormat::Bc7)),
            1 => Some(Self::Lzma),
            2 => Some(Self::Block(BlockFormat::Bc3)),
            3 => Some(Self::Block(BlockFormat::Bc5)),
            _ => None,
        }
    }

    pub fn tag(self) -> i32 {
        match self {
            Self::Block(BlockFormat::Bc7) => 0,
            Self::Lzma => 1,
            Self::Block(BlockFormat::Bc3) => 2,
            Self::Block(BlockFormat::Bc5) => 3,
        }
    }
}

/// Palette entry, stored as an RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const SIZE: usize = 3;

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Decodes and encodes block-compressed payloads.
///
/// BC3/BC5/BC7 are not implemented by this crate; callers that need them
/// plug in their own codec.
pub trait BlockCodec {
    /// Expand `data` into `width * height` BGRA pixels.
    fn decode(&self, format: BlockFormat, width: u16, height: u16, data: &[u8]) -> Result<Vec<u8>>;

    fn encode(&self, format: BlockFormat, image: &BgraImage) -> Result<Vec<u8>>;
}

pub(crate) fn check_dimensions(width: u16, height: u16) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(DatError::InvalidImage(format!(
            "{width}x{height} exceeds {MAX_DIMENSION}x{MAX_DIMENSION}"
        )));
    }
    Ok(())
}

/// Palette-indexed pixels with per-pixel alpha.
///
/// Index 0 with alpha 0 is a transparent pixel in every indexed layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    width: u16,
    height: u16,
    indices: Vec<u8>,
    alpha: Vec<u8>,
}

impl IndexedImage {
    /// Opaque pixels, except index 0 which is transparent.
    pub fn new(width: u16, height: u16, indices: Vec<u8>) -> Result<Self> {
        let alpha = indices.iter().map(|&i| if i == 0 { 0 } else { 255 }).collect();
        Self::with_alpha(width, height, indices, alpha)
    }

    pub fn with_alpha(width: u16, height: u16, indices: Vec<u8>, alpha: Vec<u8>) -> Result<Self> {
        check_dimensions(width, height)?;
        let pixels = width as usize * height as usize;
        if indices.len() != pixels || alpha.len() != pixels {
            return Err(DatError::InvalidImage(format!(
                "{width}x{height} needs {pixels} pixels, have {} indices and {} alpha values",
                indices.len(),
                alpha.len()
            )));
        }
        Ok(Self {
            width,
            height,
            indices,
            alpha,
        })
    }

    /// Image of transparent pixels.
    pub(crate) fn blank(width: u16, height: u16) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            indices: vec![0; pixels],
            alpha: vec![0; pixels],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    pub fn alpha(&self) -> &[u8] {
        &self.alpha
    }

    #[inline]
    pub(crate) fn set(&mut self, offset: usize, index: u8, alpha: u8) {
        self.indices[offset] = index;
        self.alpha[offset] = alpha;
    }

    /// Largest index in use.
    pub fn max_index(&self) -> Option<u8> {
        self.indices.iter().copied().max()
    }

    /// Resolve indices through `palette`.
    pub fn to_bgra(&self, palette: &[Color]) -> Result<BgraImage> {
        let mut pixels = Vec::with_capacity(self.indices.len() * 4);
        for (&index, &alpha) in self.indices.iter().zip(&self.alpha) {
            if index == 0 && alpha == 0 {
                pixels.extend_from_slice(&[0, 0, 0, 0]);
                continue;
            }
            let color = palette.get(index as usize).ok_or_else(|| {
                DatError::InvalidImage(format!(
                    "index {index} outside palette of {}",
                    palette.len()
                ))
            })?;
            pixels.extend_from_slice(&[color.b, color.g, color.r, alpha]);
        }
        BgraImage::new(self.width, self.height, pixels)
    }

    /// Drop palette entries no pixel uses and renumber the indices.
    ///
    /// Entry 0 is always kept since it is the transparent colour.
    pub fn trim_palette(&self, palette: &[Color]) -> Result<(Self, Vec<Color>)> {
        if palette.is_empty() || palette.len() > MAX_COLORS {
            return Err(DatError::InvalidImage(format!(
                "palette must hold 1..={MAX_COLORS} colours, has {}",
                palette.len()
            )));
        }
        if let Some(max) = self.max_index() {
            if max as usize >= palette.len() {
                return Err(DatError::InvalidImage(format!(
                    "index {max} outside palette of {}",
                    palette.len()
                )));
            }
        }

        let mut used = [false; MAX_COLORS];
        used[0] = true;
        for &index in &self.indices {
            used[index as usize] = true;
        }
        let mut remap = [0u8; MAX_COLORS];
        let mut trimmed = Vec::new();
        for (index, color) in palette.iter().enumerate() {
            if used[index] {
                remap[index] = trimmed.len() as u8;
                trimmed.push(*color);
            }
        }

        let indices = self.indices.iter().map(|&i| remap[i as usize]).collect();
        Ok((
            Self {
                width: self.width,
                height: self.height,
                indices,
                alpha: self.alpha.clone(),
            },
            trimmed,
        ))
    }
}

/// 32bpp pixels in B, G, R, A byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgraImage {
    width: u16,
    height: u16,
    pixels: Vec<u8>,
}

impl BgraImage {
    pub fn new(width: u16, height: u16, pixels: Vec<u8>) -> Result<Self> {
        check_dimensions(width, height)?;
        let needed = width as usize * height as usize * 4;
        if pixels.len() != needed {
            return Err(DatError::InvalidImage(format!(
                "{width}x{height} needs {needed} BGRA bytes, have {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

/// Cursor over row-encoded payload bytes.
pub(crate) struct RowReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RowReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub(crate) fn byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(DatError::MalformedRows("row data truncated"))?;
        self.pos += 1;
        Ok(b)
    }

    #[inline]
    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(DatError::MalformedRows("row data truncated"))?;
        self.pos = end;
        Ok(bytes)
    }
}

/// Collects one row's operations and its operation count.
pub(crate) struct RowWriter<'a> {
    out: &'a mut Vec<u8>,
    count_at: usize,
    ops: usize,
}

impl<'a> RowWriter<'a> {
    pub(crate) fn new(out: &'a mut Vec<u8>) -> Self {
        let count_at = out.len();
        out.push(0);
        Self {
            out,
            count_at,
            ops: 0,
        }
    }

    pub(crate) fn op(&mut self, opcode: u8) -> &mut Vec<u8> {
        self.ops += 1;
        self.out.push(opcode);
        self.out
    }

    pub(crate) fn finish(self) -> Result<()> {
        let count = u8::try_from(self.ops).map_err(|_| {
            DatError::InvalidImage(format!("row needs {} operations, at most 255 fit", self.ops))
        })?;
        self.out[self.count_at] = count;
        Ok(())
    }
}

/// Length of the run starting at `start` of pixels in the same class,
/// capped at `max`.
#[inline]
pub(crate) fn run_length<T: PartialEq>(row: &[T], start: usize, max: usize) -> usize {
    let class = &row[start];
    row[start..].iter().take(max).take_while(|c| *c == class).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(n: usize) -> Vec<Color> {
        (0..n).map(|i| Color::new(i as u8, 0x10, 0x20)).collect()
    }

    #[test]
    fn test_image_type_values() {
        for t in [
            ImageType::Transparent,
            ImageType::Blended,
            ImageType::UncompressedBlended,
            ImageType::Full32bppArgb,
        ] {
            assert_eq!(ImageType::try_from(t.value()).unwrap(), t);
        }
        assert!(matches!(
            ImageType::try_from(8),
            Err(DatError::InvalidImageType(8))
        ));
    }

    #[test]
    fn test_argb_tags() {
        for tag in 0..4 {
            assert_eq!(ArgbEncoding::from_tag(tag).unwrap().tag(), tag);
        }
        assert_eq!(ArgbEncoding::from_tag(1), Some(ArgbEncoding::Lzma));
        assert_eq!(ArgbEncoding::from_tag(4), None);
    }

    #[test]
    fn test_indexed_dimension_checks() {
        assert!(IndexedImage::new(2, 2, vec![0; 4]).is_ok());
        assert!(IndexedImage::new(2, 2, vec![0; 3]).is_err());
        assert!(IndexedImage::new(0x8000, 1, vec![0; 0x8000]).is_err());
        assert!(BgraImage::new(1, 1, vec![0; 3]).is_err());
    }

    #[test]
    fn test_to_bgra() {
        let image =
            IndexedImage::with_alpha(3, 1, vec![0, 1, 2], vec![0, 255, 0x40]).unwrap();
        let bgra = image.to_bgra(&palette(3)).unwrap();
        assert_eq!(
            bgra.pixels(),
            &[0, 0, 0, 0, 0x20, 0x10, 1, 255, 0x20, 0x10, 2, 0x40]
        );
        assert!(image.to_bgra(&palette(2)).is_err());
    }

    #[test]
    fn test_trim_palette() {
        let image = IndexedImage::new(4, 1, vec![5, 0, 2, 5]).unwrap();
        let (trimmed, colors) = image.trim_palette(&palette(8)).unwrap();
        assert_eq!(colors, vec![palette(8)[0], palette(8)[2], palette(8)[5]]);
        assert_eq!(trimmed.indices(), &[2, 0, 1, 2]);
        assert_eq!(trimmed.alpha(), image.alpha());

        assert!(image.trim_palette(&palette(5)).is_err());
        assert!(image.trim_palette(&[]).is_err());
    }

    #[test]
    fn test_run_length() {
        let row = [1, 1, 1, 0, 0, 1];
        assert_eq!(run_length(&row, 0, 10), 3);
        assert_eq!(run_length(&row, 0, 2), 2);
        assert_eq!(run_length(&row, 3, 10), 2);
        assert_eq!(run_length(&row, 5, 10), 1);
    }
}

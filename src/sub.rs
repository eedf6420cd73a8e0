//! Sub - a single image inside a group.
//!
//! A sub keeps its pixels in encoded form (the bytes written to disk) next
//! to its palette. Setting a new image, type or palette re-encodes the
//! payload right away, so [`Sub::write`] only serialises.

use crate::error::{DatError, Result};
use crate::image::{
    argb, blended, check_dimensions, transparent, uncompressed, ArgbEncoding, BgraImage,
    BlockCodec, BlockFormat, Color, ImageType, IndexedImage, MAX_COLORS,
};
use crate::lzma::EncoderProperties;
use crate::parsing::{ImageHeader, ImageHeaderParser, SubHeader, SubHeaderParser};
use tracing::trace;

/// An image record: headers, palette and encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sub {
    group_id: i16,
    sub_id: i16,
    image_type: ImageType,
    width: u16,
    height: u16,
    colors: Vec<Color>,
    /// Set for tagged 32bpp images, which carry no palette
    encoding: Option<ArgbEncoding>,
    payload: Vec<u8>,
}

impl Sub {
    /// Parse one sub from the start of `buffer`.
    ///
    /// Returns the sub and the number of bytes it occupies.
    pub fn parse(buffer: &[u8]) -> Result<(Self, usize)> {
        let header = SubHeaderParser::parse(buffer)?;
        let image_type = ImageType::try_from(header.image_type)?;
        if header.width < 0 || header.height < 0 {
            return Err(DatError::InvalidHeader("negative image size"));
        }
        if header.length < ImageHeaderParser::HEADER_SIZE as i32 {
            return Err(DatError::InvalidHeader("sub length"));
        }

        let total = SubHeaderParser::HEADER_SIZE + header.length as usize;
        if buffer.len() < total {
            return Err(DatError::BufferTooSmall {
                needed: total,
                have: buffer.len(),
            });
        }
        let body = &buffer[SubHeaderParser::HEADER_SIZE..total];
        let image_header = ImageHeaderParser::parse(body)?;

        let encoding = match image_type {
            ImageType::Full32bppArgb => ArgbEncoding::from_tag(image_header.color_count),
            _ => None,
        };
        let color_count = if encoding.is_some() {
            0
        } else {
            usize::try_from(image_header.color_count)
                .ok()
                .filter(|&n| n <= MAX_COLORS)
                .ok_or(DatError::InvalidHeader("colour count"))?
        };
        let data_offset = ImageHeaderParser::HEADER_SIZE + color_count * Color::SIZE;
        if image_header.image_data_offset != data_offset as i32 || data_offset > body.len() {
            return Err(DatError::InvalidHeader("image data offset"));
        }

        let colors = body[ImageHeaderParser::HEADER_SIZE..data_offset]
            .chunks_exact(Color::SIZE)
            .map(|rgb| Color::new(rgb[0], rgb[1], rgb[2]))
            .collect();

        let sub = Self {
            group_id: header.group_id,
            sub_id: header.sub_id,
            image_type,
            width: header.width as u16,
            height: header.height as u16,
            colors,
            encoding,
            payload: body[data_offset..].to_vec(),
        };
        if sub.encoding.is_none() {
            // Row damage surfaces at load time rather than on first use
            sub.indexed_image()?;
        }

        trace!(
            group = sub.group_id,
            sub = sub.sub_id,
            image_type = ?sub.image_type,
            width = sub.width,
            height = sub.height,
            colors = sub.colors.len(),
            encoding = ?sub.encoding,
            "parsed sub"
        );
        Ok((sub, total))
    }

    /// Encode an indexed image. Unused palette entries are dropped and the
    /// indices renumbered.
    ///
    /// `Full32bppArgb` selects the untagged `(index, alpha)` layout.
    pub fn from_indexed(
        group_id: i16,
        sub_id: i16,
        image_type: ImageType,
        image: &IndexedImage,
        palette: &[Color],
    ) -> Result<Self> {
        let mut sub = Self::empty(group_id, sub_id, image_type, image.width(), image.height());
        sub.encode_indexed(image, palette)?;
        Ok(sub)
    }

    /// Encode BGRA pixels as an LZMA-tagged 32bpp sub.
    pub fn from_bgra(
        group_id: i16,
        sub_id: i16,
        image: &BgraImage,
        props: &EncoderProperties,
    ) -> Result<Self> {
        let mut sub = Self::empty(
            group_id,
            sub_id,
            ImageType::Full32bppArgb,
            image.width(),
            image.height(),
        );
        sub.payload = argb::encode(image, props)?;
        sub.encoding = Some(ArgbEncoding::Lzma);
        Ok(sub)
    }

    /// Block-compress BGRA pixels with `codec`.
    pub fn from_block(
        group_id: i16,
        sub_id: i16,
        format: BlockFormat,
        image: &BgraImage,
        codec: &dyn BlockCodec,
    ) -> Result<Self> {
        let data = codec.encode(format, image)?;
        Self::from_block_data(group_id, sub_id, format, image.width(), image.height(), data)
    }

    /// Wrap already block-compressed data.
    pub fn from_block_data(
        group_id: i16,
        sub_id: i16,
        format: BlockFormat,
        width: u16,
        height: u16,
        data: Vec<u8>,
    ) -> Result<Self> {
        check_dimensions(width, height)?;
        let mut sub = Self::empty(group_id, sub_id, ImageType::Full32bppArgb, width, height);
        sub.payload = data;
        sub.encoding = Some(ArgbEncoding::Block(format));
        Ok(sub)
    }

    fn empty(group_id: i16, sub_id: i16, image_type: ImageType, width: u16, height: u16) -> Self {
        Self {
            group_id,
            sub_id,
            image_type,
            width,
            height,
            colors: Vec::new(),
            encoding: None,
            payload: Vec::new(),
        }
    }

    pub fn group_id(&self) -> i16 {
        self.group_id
    }

    pub fn set_group_id(&mut self, group_id: i16) {
        self.group_id = group_id;
    }

    pub fn sub_id(&self) -> i16 {
        self.sub_id
    }

    pub fn set_sub_id(&mut self, sub_id: i16) {
        self.sub_id = sub_id;
    }

    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    /// Encoding of a tagged 32bpp sub, `None` for palette images.
    pub fn encoding(&self) -> Option<ArgbEncoding> {
        self.encoding
    }

    /// Encoded pixel data as stored on disk.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Offset of the payload from the start of the image header.
    pub fn image_data_offset(&self) -> usize {
        ImageHeaderParser::HEADER_SIZE + self.colors.len() * Color::SIZE
    }

    /// Value of the header length field: image header, palette and payload.
    pub fn length(&self) -> usize {
        self.image_data_offset() + self.payload.len()
    }

    /// Decode the palette indices of an indexed sub.
    pub fn indexed_image(&self) -> Result<IndexedImage> {
        if self.encoding.is_some() {
            return Err(DatError::UnsupportedConversion(
                "tagged 32bpp image has no palette indices".to_string(),
            ));
        }
        let (w, h) = (self.width, self.height);
        match self.image_type {
            ImageType::Transparent => transparent::decode(&self.payload, w, h),
            ImageType::Blended => blended::decode(&self.payload, w, h),
            ImageType::UncompressedBlended | ImageType::Full32bppArgb => {
                uncompressed::decode(&self.payload, w, h)
            }
        }
    }

    /// Decode to BGRA. Block-compressed subs need `codec`.
    pub fn to_bgra(&self, codec: Option<&dyn BlockCodec>) -> Result<BgraImage> {
        match self.encoding {
            None => self.indexed_image()?.to_bgra(&self.colors),
            Some(ArgbEncoding::Lzma) => argb::decode(&self.payload, self.width, self.height),
            Some(ArgbEncoding::Block(format)) => {
                let codec = codec.ok_or(DatError::BlockCodecRequired)?;
                let pixels = codec.decode(format, self.width, self.height, &self.payload)?;
                BgraImage::new(self.width, self.height, pixels)
            }
        }
    }

    /// Replace the pixels, keeping the image type.
    ///
    /// An LZMA-tagged sub resolves the indices through `palette` and is
    /// compressed with default properties.
    pub fn set_image(&mut self, image: &IndexedImage, palette: &[Color]) -> Result<()> {
        match self.encoding {
            None => self.encode_indexed(image, palette),
            Some(ArgbEncoding::Lzma) => {
                let bgra = image.to_bgra(palette)?;
                self.set_bgra_image(&bgra, &EncoderProperties::default())
            }
            Some(ArgbEncoding::Block(_)) => Err(DatError::BlockCodecRequired),
        }
    }

    /// Replace the pixels with an LZMA-tagged 32bpp payload.
    pub fn set_bgra_image(&mut self, image: &BgraImage, props: &EncoderProperties) -> Result<()> {
        let payload = argb::encode(image, props)?;
        self.image_type = ImageType::Full32bppArgb;
        self.width = image.width();
        self.height = image.height();
        self.colors.clear();
        self.encoding = Some(ArgbEncoding::Lzma);
        self.payload = payload;
        Ok(())
    }

    /// Convert to another image type.
    ///
    /// Indexed types convert freely; pixels with alpha 0 become index 0 when
    /// converting to `Transparent`. Converting to `Full32bppArgb` produces an
    /// LZMA-tagged payload. Tagged images cannot be converted back to an
    /// indexed type.
    pub fn set_type(&mut self, image_type: ImageType) -> Result<()> {
        if image_type == self.image_type {
            return Ok(());
        }
        if let Some(encoding) = self.encoding {
            return Err(DatError::UnsupportedConversion(format!(
                "{encoding:?} 32bpp image to {image_type:?}"
            )));
        }

        trace!(from = ?self.image_type, to = ?image_type, "converting sub");
        let image = self.indexed_image()?;
        if image_type == ImageType::Full32bppArgb {
            let bgra = image.to_bgra(&self.colors)?;
            return self.set_bgra_image(&bgra, &EncoderProperties::default());
        }

        let image = if image_type == ImageType::Transparent {
            let indices = image
                .indices()
                .iter()
                .zip(image.alpha())
                .map(|(&index, &alpha)| if alpha == 0 { 0 } else { index })
                .collect();
            IndexedImage::new(image.width(), image.height(), indices)?
        } else {
            image
        };
        let palette = std::mem::take(&mut self.colors);
        let previous = self.image_type;
        self.image_type = image_type;
        if let Err(e) = self.encode_indexed(&image, &palette) {
            self.image_type = previous;
            self.colors = palette;
            return Err(e);
        }
        Ok(())
    }

    /// Replace the palette. Indices stay as they are, so the palette must
    /// cover every index in use.
    pub fn set_colors(&mut self, colors: Vec<Color>) -> Result<()> {
        if self.encoding.is_some() {
            return Err(DatError::UnsupportedConversion(
                "tagged 32bpp image has no palette".to_string(),
            ));
        }
        if colors.len() > MAX_COLORS {
            return Err(DatError::InvalidImage(format!(
                "{} colours, at most {MAX_COLORS} allowed",
                colors.len()
            )));
        }
        if let Some(max) = self.indexed_image()?.max_index() {
            if max as usize >= colors.len() {
                return Err(DatError::InvalidImage(format!(
                    "index {max} outside palette of {}",
                    colors.len()
                )));
            }
        }
        check_untagged_colors(self.image_type, colors.len())?;
        self.colors = colors;
        Ok(())
    }

    fn encode_indexed(&mut self, image: &IndexedImage, palette: &[Color]) -> Result<()> {
        let (image, colors) = image.trim_palette(palette)?;
        check_untagged_colors(self.image_type, colors.len())?;
        let payload = match self.image_type {
            ImageType::Transparent => transparent::encode(&image)?,
            ImageType::Blended => blended::encode(&image)?,
            ImageType::UncompressedBlended | ImageType::Full32bppArgb => {
                uncompressed::encode(&image)
            }
        };
        trace!(
            group = self.group_id,
            sub = self.sub_id,
            image_type = ?self.image_type,
            colors = colors.len(),
            payload = payload.len(),
            "encoded sub"
        );
        self.width = image.width();
        self.height = image.height();
        self.colors = colors;
        self.encoding = None;
        self.payload = payload;
        Ok(())
    }

    /// Append sub header, image header, palette and payload to `out`.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let length =
            i32::try_from(self.length()).map_err(|_| DatError::InvalidHeader("sub length"))?;
        let color_count = match self.encoding {
            Some(encoding) => encoding.tag(),
            None => self.colors.len() as i32,
        };

        SubHeaderParser::write(
            &SubHeader {
                image_type: self.image_type.value(),
                width: self.width as i16,
                height: self.height as i16,
                group_id: self.group_id,
                sub_id: self.sub_id,
                length,
            },
            out,
        );
        ImageHeaderParser::write(
            &ImageHeader {
                length,
                image_data_offset: self.image_data_offset() as i32,
                width: self.width as i32,
                height: self.height as i32,
                image_type: self.image_type.value() as i32,
                color_count,
            },
            out,
        );
        for color in &self.colors {
            out.extend_from_slice(&color.to_bytes());
        }
        out.extend_from_slice(&self.payload);
        Ok(())
    }
}

/// An untagged 32bpp palette of 0..=3 colours would read back as a tag.
fn check_untagged_colors(image_type: ImageType, count: usize) -> Result<()> {
    if image_type == ImageType::Full32bppArgb && ArgbEncoding::from_tag(count as i32).is_some() {
        return Err(DatError::InvalidImage(format!(
            "untagged 32bpp image needs more than 3 colours, has {count}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(n: usize) -> Vec<Color> {
        (0..n)
            .map(|i| Color::new(i as u8, (i * 2) as u8, (i * 3) as u8))
            .collect()
    }

    fn checker(width: u16, height: u16) -> IndexedImage {
        let indices = (0..width as usize * height as usize)
            .map(|i| if (i / 3) % 2 == 0 { 0 } else { (i % 5 + 1) as u8 })
            .collect();
        IndexedImage::new(width, height, indices).unwrap()
    }

    fn write(sub: &Sub) -> Vec<u8> {
        let mut out = Vec::new();
        sub.write(&mut out).unwrap();
        out
    }

    struct FakeBlocks;

    impl BlockCodec for FakeBlocks {
        fn decode(&self, _: BlockFormat, width: u16, height: u16, data: &[u8]) -> Result<Vec<u8>> {
            Ok(data
                .iter()
                .cycle()
                .take(width as usize * height as usize * 4)
                .copied()
                .collect())
        }

        fn encode(&self, _: BlockFormat, image: &BgraImage) -> Result<Vec<u8>> {
            Ok(image.pixels()[..4].to_vec())
        }
    }

    #[test]
    fn test_indexed_write_parse() {
        for image_type in [
            ImageType::Transparent,
            ImageType::Blended,
            ImageType::UncompressedBlended,
        ] {
            let sub = Sub::from_indexed(3, 4, image_type, &checker(13, 7), &palette(16)).unwrap();
            assert_eq!(sub.color_count(), 6);
            let bytes = write(&sub);
            assert_eq!(bytes.len(), 0x12 + sub.length());
            let (parsed, consumed) = Sub::parse(&bytes).unwrap();
            assert_eq!(consumed, bytes.len());
            assert_eq!(parsed, sub);
            assert_eq!(parsed.indexed_image().unwrap(), checker(13, 7));
        }
    }

    #[test]
    fn test_header_fields() {
        let sub = Sub::from_indexed(9, 2, ImageType::Transparent, &checker(4, 2), &palette(6))
            .unwrap();
        let bytes = write(&sub);
        let header = SubHeaderParser::parse(&bytes).unwrap();
        assert_eq!(header.image_type, 7);
        assert_eq!((header.width, header.height), (4, 2));
        assert_eq!((header.group_id, header.sub_id), (9, 2));
        assert_eq!(header.length as usize, sub.length());

        let image = ImageHeaderParser::parse(&bytes[0x12..]).unwrap();
        assert_eq!(image.length, header.length);
        // indices 0, 1, 4 and 5 in use
        assert_eq!(image.image_data_offset, 0x2C + 4 * 3);
        assert_eq!(image.color_count, 4);
        assert_eq!(&bytes[0x12 + 0x2C..0x12 + 0x2C + 6], &[0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_lzma_sub_roundtrip() {
        let pixels: Vec<u8> = (0..20 * 10)
            .flat_map(|i: u32| [(i * 7) as u8, (i / 20) as u8, 0x33, (i % 256) as u8])
            .collect();
        let image = BgraImage::new(20, 10, pixels).unwrap();
        let props = EncoderProperties::default().with_dictionary_size(1 << 16);
        let sub = Sub::from_bgra(1, 1, &image, &props).unwrap();
        assert_eq!(sub.encoding(), Some(ArgbEncoding::Lzma));
        assert_eq!(sub.image_data_offset(), 0x2C);

        let bytes = write(&sub);
        assert_eq!(&bytes[0x12 + 0x28..0x12 + 0x2C], &[1, 0, 0, 0]);
        let (parsed, _) = Sub::parse(&bytes).unwrap();
        assert_eq!(parsed.to_bgra(None).unwrap(), image);
        assert!(matches!(
            parsed.indexed_image(),
            Err(DatError::UnsupportedConversion(_))
        ));
    }

    #[test]
    fn test_block_sub_needs_codec() {
        let sub =
            Sub::from_block_data(1, 1, BlockFormat::Bc3, 2, 2, vec![1, 2, 3, 4]).unwrap();
        let (parsed, _) = Sub::parse(&write(&sub)).unwrap();
        assert_eq!(parsed.encoding(), Some(ArgbEncoding::Block(BlockFormat::Bc3)));
        assert!(matches!(parsed.to_bgra(None), Err(DatError::BlockCodecRequired)));
        let decoded = parsed.to_bgra(Some(&FakeBlocks)).unwrap();
        assert_eq!(decoded.pixels(), [1u8, 2, 3, 4].repeat(4).as_slice());

        let image = BgraImage::new(1, 1, vec![9, 8, 7, 6]).unwrap();
        let sub = Sub::from_block(1, 2, BlockFormat::Bc7, &image, &FakeBlocks).unwrap();
        assert_eq!(sub.payload(), &[9, 8, 7, 6]);
        assert_eq!(write(&sub)[0x12 + 0x28], 0);
    }

    #[test]
    fn test_set_type_conversions() {
        let mut sub =
            Sub::from_indexed(1, 1, ImageType::Transparent, &checker(9, 4), &palette(8)).unwrap();
        let opaque = sub.to_bgra(None).unwrap();

        sub.set_type(ImageType::Blended).unwrap();
        assert_eq!(sub.to_bgra(None).unwrap(), opaque);

        sub.set_type(ImageType::UncompressedBlended).unwrap();
        assert_eq!(sub.to_bgra(None).unwrap(), opaque);

        sub.set_type(ImageType::Full32bppArgb).unwrap();
        assert_eq!(sub.encoding(), Some(ArgbEncoding::Lzma));
        assert_eq!(sub.to_bgra(None).unwrap(), opaque);

        assert!(matches!(
            sub.set_type(ImageType::Transparent),
            Err(DatError::UnsupportedConversion(_))
        ));
    }

    #[test]
    fn test_blended_to_transparent_drops_alpha() {
        let image =
            IndexedImage::with_alpha(3, 1, vec![1, 2, 3], vec![255, 0, 0x80]).unwrap();
        let mut sub = Sub::from_indexed(1, 1, ImageType::Blended, &image, &palette(4)).unwrap();
        sub.set_type(ImageType::Transparent).unwrap();
        let converted = sub.indexed_image().unwrap();
        assert_eq!(converted.indices(), &[1, 0, 2]);
        assert_eq!(sub.color_count(), 3);
    }

    #[test]
    fn test_set_colors() {
        let mut sub =
            Sub::from_indexed(1, 1, ImageType::Blended, &checker(6, 2), &palette(10)).unwrap();
        let count = sub.color_count();
        sub.set_colors(vec![Color::new(1, 1, 1); count]).unwrap();
        assert!(sub.set_colors(vec![Color::default(); count - 1]).is_err());
        assert!(sub.set_colors(vec![Color::default(); 257]).is_err());
    }

    #[test]
    fn test_untagged_32bpp() {
        let sub = Sub::from_indexed(1, 1, ImageType::Full32bppArgb, &checker(13, 7), &palette(10))
            .unwrap();
        assert_eq!(sub.encoding(), None);
        let (parsed, _) = Sub::parse(&write(&sub)).unwrap();
        assert_eq!(parsed.indexed_image().unwrap(), checker(13, 7));

        let two_colors = IndexedImage::new(2, 1, vec![0, 1]).unwrap();
        assert!(Sub::from_indexed(1, 1, ImageType::Full32bppArgb, &two_colors, &palette(2))
            .is_err());
    }

    #[test]
    fn test_parse_errors() {
        let sub =
            Sub::from_indexed(1, 1, ImageType::Transparent, &checker(5, 5), &palette(8)).unwrap();
        let bytes = write(&sub);

        assert!(matches!(
            Sub::parse(&bytes[..bytes.len() - 1]),
            Err(DatError::BufferTooSmall { .. })
        ));

        let mut bad_type = bytes.clone();
        bad_type[0] = 8;
        assert!(matches!(
            Sub::parse(&bad_type),
            Err(DatError::InvalidImageType(8))
        ));

        let mut bad_offset = bytes.clone();
        bad_offset[0x12 + 8] += 1;
        assert!(matches!(
            Sub::parse(&bad_offset),
            Err(DatError::InvalidHeader("image data offset"))
        ));

        let mut bad_rows = bytes;
        let first_row = 0x12 + sub.image_data_offset();
        bad_rows[first_row] = 0xFF;
        assert!(matches!(
            Sub::parse(&bad_rows),
            Err(DatError::MalformedRows(_))
        ));
    }
}

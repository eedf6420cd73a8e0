//! LZMA-tagged 32bpp payloads.
//!
//! The payload is the 5-byte property blob followed by a raw LZMA stream.
//! The unpacked size is implied by the image size, so no size field is
//! stored.

use super::BgraImage;
use crate::error::{DatError, Result};
use crate::lzma::{Decoder, Encoder, EncoderProperties, LzmaProperties};
use tracing::trace;

pub fn decode(data: &[u8], width: u16, height: u16) -> Result<BgraImage> {
    if data.len() < LzmaProperties::SIZE {
        return Err(DatError::BufferTooSmall {
            needed: LzmaProperties::SIZE,
            have: data.len(),
        });
    }
    let (props, stream) = data.split_at(LzmaProperties::SIZE);
    let size = width as u64 * height as u64 * 4;
    let mut decoder = Decoder::from_properties(props)?;
    let pixels = decoder.decode(stream, Some(size))?;
    trace!(width, height, packed = data.len(), "decoded LZMA image");
    BgraImage::new(width, height, pixels)
}

pub fn encode(image: &BgraImage, props: &EncoderProperties) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(props.clone())?;
    let mut out = Vec::with_capacity(LzmaProperties::SIZE + image.pixels().len() / 2);
    out.extend_from_slice(&encoder.coder_properties().to_bytes());
    encoder.encode(image.pixels(), &mut out)?;
    trace!(
        width = image.width(),
        height = image.height(),
        packed = out.len(),
        "encoded LZMA image"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lzma::LzmaError;

    fn gradient(width: u16, height: u16) -> BgraImage {
        let pixels = (0..width as usize * height as usize)
            .flat_map(|i| [i as u8, (i / 3) as u8, 0x80, 0xFF])
            .collect();
        BgraImage::new(width, height, pixels).unwrap()
    }

    #[test]
    fn test_encode_decode() {
        let image = gradient(24, 17);
        let props = EncoderProperties::default().with_dictionary_size(1 << 16);
        let packed = encode(&image, &props).unwrap();
        assert_eq!(packed[0], 0x5D);
        assert!(packed.len() < image.pixels().len());
        assert_eq!(decode(&packed, 24, 17).unwrap(), image);
    }

    #[test]
    fn test_end_marker_tolerated() {
        let image = gradient(8, 8);
        let props = EncoderProperties::default()
            .with_dictionary_size(1 << 16)
            .with_end_marker(true);
        let packed = encode(&image, &props).unwrap();
        assert_eq!(decode(&packed, 8, 8).unwrap(), image);
    }

    #[test]
    fn test_truncated_payload_fails() {
        let mut seed = 0x2545_F491u32;
        let pixels = (0..16 * 16 * 4)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                seed as u8
            })
            .collect();
        let image = BgraImage::new(16, 16, pixels).unwrap();
        let packed = encode(&image, &EncoderProperties::default()).unwrap();
        assert!(matches!(
            decode(&packed[..packed.len() / 2], 16, 16),
            Err(DatError::Lzma(LzmaError::TruncatedStream | LzmaError::DataCorruption(_)))
        ));
        assert!(matches!(
            decode(&packed[..3], 16, 16),
            Err(DatError::BufferTooSmall { .. })
        ));
    }
}

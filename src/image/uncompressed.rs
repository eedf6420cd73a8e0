//! Type 24 payload, also used by untagged type 25: one `(index, alpha)`
//! pair per pixel, no row framing and no end byte.

use super::IndexedImage;
use crate::error::{DatError, Result};

pub fn decode(data: &[u8], width: u16, height: u16) -> Result<IndexedImage> {
    let pixels = width as usize * height as usize;
    let data = data
        .get(..pixels * 2)
        .ok_or(DatError::MalformedRows("row data truncated"))?;
    let (indices, alpha): (Vec<u8>, Vec<u8>) =
        data.chunks_exact(2).map(|pair| (pair[0], pair[1])).unzip();
    IndexedImage::with_alpha(width, height, indices, alpha)
}

pub fn encode(image: &IndexedImage) -> Vec<u8> {
    image
        .indices()
        .iter()
        .zip(image.alpha())
        .flat_map(|(&index, &alpha)| [index, alpha])
        .collect()
}

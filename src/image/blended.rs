//! Type 23 rows: skips, opaque index runs and `(alpha, index)` runs.

use super::{run_length, IndexedImage, RowReader, RowWriter};
use crate::error::{DatError, Result};

const ALPHA: u8 = 0x80;
const SKIP: u8 = 0xC0;
const MAX_RUN: usize = 0x3F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Transparent,
    Opaque,
    Alpha,
}

fn classify(index: u8, alpha: u8) -> Class {
    match (index, alpha) {
        (0, _) | (_, 0) => Class::Transparent,
        (_, 255) => Class::Opaque,
        _ => Class::Alpha,
    }
}

pub fn decode(data: &[u8], width: u16, height: u16) -> Result<IndexedImage> {
    let mut image = IndexedImage::blank(width, height);
    let width = width as usize;
    let mut reader = RowReader::new(data);

    for y in 0..height as usize {
        let ops = reader.byte()?;
        let row = y * width;
        let mut x = 0usize;
        for _ in 0..ops {
            let op = reader.byte()?;
            let len = match op {
                SKIP..=0xFF => (op - SKIP) as usize,
                ALPHA..=0xBF => (op - ALPHA) as usize,
                0x40..=0x7F => return Err(DatError::MalformedRows("reserved row opcode")),
                _ => op as usize,
            };
            if x + len > width {
                return Err(DatError::MalformedRows("row overruns image width"));
            }
            if op < ALPHA {
                for (i, &index) in reader.take(len)?.iter().enumerate() {
                    image.set(row + x + i, index, 255);
                }
            } else if op < SKIP {
                for (i, pair) in reader.take(len * 2)?.chunks_exact(2).enumerate() {
                    image.set(row + x + i, pair[1], pair[0]);
                }
            }
            x += len;
        }
    }
    Ok(image)
}

/// Encode rows plus the trailing end byte.
///
/// Pixels with index 0 or alpha 0 are written as skips, so they decode as
/// index 0 with alpha 0.
pub fn encode(image: &IndexedImage) -> Result<Vec<u8>> {
    let width = image.width() as usize;
    let mut out = Vec::with_capacity(image.indices().len() * 2 + image.height() as usize + 1);

    if width > 0 {
        let rows = image.indices().chunks(width).zip(image.alpha().chunks(width));
        for (indices, alpha) in rows {
            let classes: Vec<Class> = indices
                .iter()
                .zip(alpha)
                .map(|(&i, &a)| classify(i, a))
                .collect();
            let mut writer = RowWriter::new(&mut out);
            let mut x = 0;
            while x < width {
                let len = run_length(&classes, x, MAX_RUN);
                match classes[x] {
                    Class::Transparent => {
                        writer.op(SKIP + len as u8);
                    }
                    Class::Opaque => {
                        writer.op(len as u8).extend_from_slice(&indices[x..x + len]);
                    }
                    Class::Alpha => {
                        let bytes = writer.op(ALPHA + len as u8);
                        for p in x..x + len {
                            bytes.push(alpha[p]);
                            bytes.push(indices[p]);
                        }
                    }
                }
                x += len;
            }
            writer.finish()?;
        }
    } else {
        out.extend(std::iter::repeat(0).take(image.height() as usize));
    }
    out.push(0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_rows() {
        let image = IndexedImage::with_alpha(
            6,
            1,
            vec![0, 2, 3, 4, 5, 6],
            vec![0, 255, 255, 0x40, 0x41, 0],
        )
        .unwrap();
        let data = encode(&image).unwrap();
        assert_eq!(
            data,
            vec![4, 0xC1, 0x02, 2, 3, 0x82, 0x40, 4, 0x41, 5, 0xC1, 0]
        );
        let decoded = decode(&data, 6, 1).unwrap();
        assert_eq!(decoded.indices(), &[0, 2, 3, 4, 5, 0]);
        assert_eq!(decoded.alpha(), &[0, 255, 255, 0x40, 0x41, 0]);
    }

    #[test]
    fn test_index_zero_is_transparent() {
        let image = IndexedImage::with_alpha(2, 1, vec![0, 1], vec![255, 255]).unwrap();
        let data = encode(&image).unwrap();
        assert_eq!(data, vec![2, 0xC1, 0x01, 1, 0]);
    }

    #[test]
    fn test_runs_capped_at_63() {
        let image = IndexedImage::new(100, 1, vec![7; 100]).unwrap();
        let data = encode(&image).unwrap();
        assert_eq!(data[0], 2);
        assert_eq!(data[1], 63);
        assert_eq!(data[2 + 63], 37);
        assert_eq!(decode(&data, 100, 1).unwrap(), image);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode(&[1, 0x40], 4, 1),
            Err(DatError::MalformedRows("reserved row opcode"))
        ));
        assert!(matches!(
            decode(&[1, 0xC5], 4, 1),
            Err(DatError::MalformedRows("row overruns image width"))
        ));
        assert!(matches!(
            decode(&[1, 0x82, 0x10, 1, 0x20], 4, 1),
            Err(DatError::MalformedRows("row data truncated"))
        ));
    }
}

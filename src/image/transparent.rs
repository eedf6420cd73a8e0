//! Type 7 rows: skips of index 0 and literal index runs.

use super::{run_length, IndexedImage, RowReader, RowWriter};
use crate::error::{DatError, Result};

const SKIP: u8 = 0x80;
const MAX_RUN: usize = 0x7F;

/// Decode row data into indices. Skipped pixels are index 0, alpha 0.
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
            let len = if op >= SKIP { (op - SKIP) as usize } else { op as usize };
            if x + len > width {
                return Err(DatError::MalformedRows("row overruns image width"));
            }
            if op < SKIP {
                for (i, &index) in reader.take(len)?.iter().enumerate() {
                    image.set(row + x + i, index, if index == 0 { 0 } else { 255 });
                }
            }
            x += len;
        }
    }
    Ok(image)
}

/// Encode indices as rows plus the trailing end byte. Alpha is ignored.
pub fn encode(image: &IndexedImage) -> Result<Vec<u8>> {
    let width = image.width() as usize;
    let mut out = Vec::with_capacity(image.indices().len() + image.height() as usize + 1);

    if width > 0 {
        for row in image.indices().chunks(width) {
            let opaque: Vec<bool> = row.iter().map(|&i| i != 0).collect();
            let mut writer = RowWriter::new(&mut out);
            let mut x = 0;
            while x < width {
                let len = run_length(&opaque, x, MAX_RUN);
                if opaque[x] {
                    writer.op(len as u8).extend_from_slice(&row[x..x + len]);
                } else {
                    writer.op(SKIP + len as u8);
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
        let image = IndexedImage::new(5, 2, vec![0, 0, 3, 4, 0, 1, 1, 1, 1, 1]).unwrap();
        let data = encode(&image).unwrap();
        assert_eq!(
            data,
            vec![
                3, 0x82, 2, 3, 4, 0x81, // row 0
                1, 5, 1, 1, 1, 1, 1, // row 1
                0, // end
            ]
        );
        assert_eq!(decode(&data, 5, 2).unwrap(), image);
    }

    #[test]
    fn test_long_runs_split() {
        let mut indices = vec![0u8; 200];
        indices.extend(std::iter::repeat(9).take(200));
        let image = IndexedImage::new(400, 1, indices).unwrap();
        let data = encode(&image).unwrap();
        // 0x7F + 0x49 skips, 0x7F + 0x49 literals
        assert_eq!(data[0], 4);
        assert_eq!(&data[1..3], &[0xFF, 0x80 + 0x49]);
        assert_eq!(data[3], 0x7F);
        assert_eq!(decode(&data, 400, 1).unwrap(), image);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode(&[1, 0x85], 4, 1),
            Err(DatError::MalformedRows("row overruns image width"))
        ));
        assert!(matches!(
            decode(&[1, 3, 1, 2], 4, 1),
            Err(DatError::MalformedRows("row data truncated"))
        ));
        assert!(decode(&[], 1, 1).is_err());
    }

    #[test]
    fn test_short_rows_leave_transparent_tail() {
        let image = decode(&[1, 2, 7, 8, 0], 4, 1).unwrap();
        assert_eq!(image.indices(), &[7, 8, 0, 0]);
        assert_eq!(image.alpha(), &[255, 255, 0, 0]);
    }
}

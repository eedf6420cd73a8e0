//! Reader and writer for grouped `*.DAT` image archives.
//!
//! An archive holds groups of images ("subs"). Palette images are stored as
//! run-length rows or raw `(index, alpha)` pairs; 32bpp images are either
//! LZMA-compressed BGRA or block-compressed data handed to a caller-supplied
//! [`BlockCodec`](image::BlockCodec).
//!
//! The LZMA codec lives in [`lzma`] and is usable on its own.
//!
//! ## Features
//! - `async` - Async archive loading with tokio
//!
//! ## Example
//!
//! ```rust
//! use dat_image::image::{Color, ImageType, IndexedImage};
//! use dat_image::{DatFile, Group, Sub};
//!
//! let image = IndexedImage::new(2, 1, vec![0, 1]).unwrap();
//! let palette = [Color::new(0, 0, 0), Color::new(255, 0, 0)];
//! let sub = Sub::from_indexed(1, 1, ImageType::Transparent, &image, &palette).unwrap();
//!
//! let mut dat = DatFile::new();
//! dat.groups_mut().push(Group::with_subs(1, vec![sub]));
//! let bytes = dat.to_bytes().unwrap();
//! assert_eq!(DatFile::from_bytes(&bytes).unwrap(), dat);
//! ```

mod crc32;
pub mod dat_file;
pub mod error;
mod file_media;
pub mod group;
pub mod image;
pub mod lzma;
pub mod parsing;
pub mod sub;

pub use dat_file::DatFile;
pub use error::DatError;
pub use file_media::{LocalFileMedia, ReadInterval};
pub use group::Group;
pub use lzma::LzmaError;
pub use sub::Sub;

#[cfg(feature = "async")]
pub use file_media::FileMedia;

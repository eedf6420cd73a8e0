//! Error types for archive parsing and image coding.
//!
//! This module provides the [`DatError`] type which covers everything that
//! can go wrong between raw archive bytes and decoded pixels. Codec failures
//! from the embedded LZMA coder arrive wrapped in [`DatError::Lzma`].
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Format | [`InvalidSignature`], [`InvalidVersion`], [`InvalidHeader`], [`InvalidImageType`] | Not a recognised archive |
//! | Payload | [`MalformedRows`], [`Lzma`] | Recognised, but the data is damaged |
//! | Image | [`InvalidImage`], [`UnsupportedConversion`], [`BlockCodecRequired`] | Pixels do not fit the requested encoding |
//! | I/O | [`Io`], [`BufferTooSmall`], [`InvalidExtension`] | Read/write errors |
//!
//! ## Example
//!
//! ```rust,no_run
//! use dat_image::{DatError, DatFile};
//!
//! match DatFile::open("HUD.DAT") {
//!     Ok(dat) => println!("{} groups", dat.groups().len()),
//!     Err(DatError::InvalidSignature) => eprintln!("not a DAT archive"),
//!     Err(DatError::Lzma(e)) => eprintln!("damaged image data: {e}"),
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! ```
//!
//! [`InvalidSignature`]: DatError::InvalidSignature
//! [`InvalidVersion`]: DatError::InvalidVersion
//! [`InvalidHeader`]: DatError::InvalidHeader
//! [`InvalidImageType`]: DatError::InvalidImageType
//! [`MalformedRows`]: DatError::MalformedRows
//! [`Lzma`]: DatError::Lzma
//! [`InvalidImage`]: DatError::InvalidImage
//! [`UnsupportedConversion`]: DatError::UnsupportedConversion
//! [`BlockCodecRequired`]: DatError::BlockCodecRequired
//! [`Io`]: DatError::Io
//! [`BufferTooSmall`]: DatError::BufferTooSmall
//! [`InvalidExtension`]: DatError::InvalidExtension

use crate::lzma::LzmaError;
use std::io;
use thiserror::Error;

/// Error type for archive operations.
#[derive(Debug, Error)]
pub enum DatError {
    /// The file does not start with the archive magic
    /// `0x5602235657062357`.
    #[error("invalid DAT signature")]
    InvalidSignature,

    /// The format version is not `1`.
    #[error("unsupported DAT version: {0}")]
    InvalidVersion(i16),

    /// A fixed header field does not hold its required value.
    #[error("invalid or malformed header: {0}")]
    InvalidHeader(&'static str),

    /// A sub declares an image type this crate does not know.
    ///
    /// Known types are 7, 23, 24 and 25.
    #[error("invalid image type: {0}")]
    InvalidImageType(i16),

    /// The pixel payload of a row-encoded image is damaged.
    #[error("malformed row data: {0}")]
    MalformedRows(&'static str),

    /// Image dimensions, pixels or palette are inconsistent.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The requested type change would need colour quantisation or another
    /// conversion this crate does not perform.
    #[error("unsupported conversion: {0}")]
    UnsupportedConversion(String),

    /// A block-compressed (BC3/BC5/BC7) payload needs a [`BlockCodec`].
    ///
    /// [`BlockCodec`]: crate::image::BlockCodec
    #[error("a block codec is required for this image")]
    BlockCodecRequired,

    /// Archives must carry a `.dat` extension.
    #[error("invalid file extension, must be *.DAT: {0}")]
    InvalidExtension(String),

    /// The provided buffer is too small.
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall {
        /// Number of bytes needed.
        needed: usize,
        /// Number of bytes available.
        have: usize,
    },

    /// The embedded LZMA codec failed.
    #[error("LZMA error: {0}")]
    Lzma(#[from] LzmaError),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, DatError>;

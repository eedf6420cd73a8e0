//! DatFile - a whole archive: file header, group table and group data.
//!
//! ```text
//! ┌──────────────┬──────────────────────┬─────────────────────────────┐
//! │ file header  │ group headers        │ subs of group 0, 1, ...     │
//! │ 0x22 bytes   │ 0x18 bytes per group │ sub header + image + data   │
//! └──────────────┴──────────────────────┴─────────────────────────────┘
//! ```
//!
//! Subs are read back to back in group order. The group data offsets are
//! written on save but not needed for reading.

use crate::error::{DatError, Result};
use crate::file_media::LocalFileMedia;
use crate::group::Group;
use crate::parsing::{FileHeader, FileHeaderParser, GroupHeaderParser, DAT_VERSION};
use crate::sub::Sub;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[cfg(feature = "async")]
use crate::file_media::{FileMedia, ReadInterval};

/// An archive of image groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatFile {
    path: Option<PathBuf>,
    groups: Vec<Group>,
}

impl DatFile {
    /// Empty archive with no backing file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an archive from disk. The file name must end in `.dat`, in
    /// any case.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        check_extension(path)?;
        let media = LocalFileMedia::new(path)?;
        let mut dat = Self::from_bytes(&media.read_all()?)?;
        dat.path = Some(path.to_path_buf());
        Ok(dat)
    }

    /// Load an archive from disk without blocking the runtime.
    #[cfg(feature = "async")]
    #[cfg_attr(docsrs, doc(cfg(feature = "async")))]
    pub async fn open_async(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        check_extension(path)?;
        let media = LocalFileMedia::new(path)?;
        let mut dat = Self::from_media(&media).await?;
        dat.path = Some(path.to_path_buf());
        Ok(dat)
    }

    /// Load an archive from any async byte source.
    #[cfg(feature = "async")]
    #[cfg_attr(docsrs, doc(cfg(feature = "async")))]
    pub async fn from_media(media: &dyn FileMedia) -> Result<Self> {
        let bytes = match ReadInterval::whole(media.length()) {
            Some(interval) => media.read_range(interval).await?,
            None => Vec::new(),
        };
        Self::from_bytes(&bytes)
    }

    /// Parse a complete archive image.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = FileHeaderParser::parse(data)?;
        if header.group_count < 0 {
            return Err(DatError::InvalidHeader("negative group count"));
        }

        let mut offset = FileHeaderParser::HEADER_SIZE;
        let mut group_headers = Vec::with_capacity(header.group_count as usize);
        for _ in 0..header.group_count {
            let buffer = data.get(offset..).unwrap_or_default();
            group_headers.push(GroupHeaderParser::parse(buffer)?);
            offset += GroupHeaderParser::HEADER_SIZE;
        }

        let mut groups = Vec::with_capacity(group_headers.len());
        for group_header in &group_headers {
            let mut subs = Vec::with_capacity(group_header.sub_count as usize);
            for _ in 0..group_header.sub_count {
                let (sub, consumed) = Sub::parse(&data[offset..])?;
                subs.push(sub);
                offset += consumed;
            }
            // Stored sub group ids are not trusted
            groups.push(Group::with_subs(group_header.id, subs));
        }

        let dat = Self { path: None, groups };
        if header.sub_count as usize != dat.sub_count() {
            warn!(
                header = header.sub_count,
                actual = dat.sub_count(),
                "file header sub count mismatch"
            );
        }
        if offset < data.len() {
            warn!(trailing = data.len() - offset, "bytes after last sub");
        }
        debug!(
            groups = dat.groups.len(),
            subs = dat.sub_count(),
            size = data.len(),
            "parsed DAT archive"
        );
        Ok(dat)
    }

    /// Serialise the archive, recomputing every count, length and offset.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let group_count = i16::try_from(self.groups.len())
            .map_err(|_| DatError::InvalidHeader("group count"))?;
        let sub_count =
            i16::try_from(self.sub_count()).map_err(|_| DatError::InvalidHeader("sub count"))?;
        let length =
            i32::try_from(self.length()).map_err(|_| DatError::InvalidHeader("archive length"))?;
        let color_count = i32::try_from(self.color_count())
            .map_err(|_| DatError::InvalidHeader("colour count"))?;
        let data_offset = (self.groups.len() * GroupHeaderParser::HEADER_SIZE) as i32;

        let mut out = Vec::with_capacity(
            FileHeaderParser::HEADER_SIZE + data_offset as usize + length as usize,
        );
        FileHeaderParser::write(
            &FileHeader {
                version: DAT_VERSION,
                group_count,
                sub_count,
                length,
                color_count,
                data_offset,
            },
            &mut out,
        );

        let mut group_offset = 0i32;
        for group in &self.groups {
            let header = group.header(group_offset)?;
            GroupHeaderParser::write(&header, &mut out);
            group_offset += header.length;
        }
        for sub in self.groups.iter().flat_map(Group::subs) {
            sub.write(&mut out)?;
        }

        debug!(
            groups = self.groups.len(),
            subs = self.sub_count(),
            size = out.len(),
            "serialised DAT archive"
        );
        Ok(out)
    }

    /// Write the archive to `path` and remember it as the backing file.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "saved DAT archive");
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut Vec<Group> {
        &mut self.groups
    }

    /// First group with `id`.
    pub fn group(&self, id: i16) -> Option<&Group> {
        self.groups.iter().find(|g| g.id() == id)
    }

    pub fn group_mut(&mut self, id: i16) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id() == id)
    }

    pub fn sub_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    /// Palette entries over all subs.
    pub fn color_count(&self) -> usize {
        self.groups.iter().map(Group::color_count).sum()
    }

    /// Size of the group data, excluding file and group headers.
    pub fn length(&self) -> usize {
        self.groups.iter().map(Group::length).sum()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.as_deref()?.file_name()?.to_str()
    }
}

fn check_extension(path: &Path) -> Result<()> {
    let is_dat = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("dat"));
    if is_dat {
        Ok(())
    } else {
        Err(DatError::InvalidExtension(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{BgraImage, Color, ImageType, IndexedImage};
    use crate::lzma::EncoderProperties;
    use crate::parsing::GroupHeader;

    fn palette() -> Vec<Color> {
        (0..8).map(|i| Color::new(i * 30, 255 - i, i)).collect()
    }

    fn indexed(width: u16, height: u16, seed: u8) -> IndexedImage {
        let indices = (0..width as usize * height as usize)
            .map(|i| ((i as u8).wrapping_mul(seed) >> 5) & 7)
            .collect();
        IndexedImage::new(width, height, indices).unwrap()
    }

    fn sample() -> DatFile {
        let mut dat = DatFile::new();
        let mut hud = Group::new(9998);
        hud.push(
            Sub::from_indexed(0, 1, ImageType::Transparent, &indexed(12, 5, 3), &palette())
                .unwrap(),
        );
        hud.push(
            Sub::from_indexed(0, 2, ImageType::Blended, &indexed(7, 7, 5), &palette()).unwrap(),
        );
        let mut icons = Group::new(9999);
        icons.push(
            Sub::from_indexed(0, 1, ImageType::UncompressedBlended, &indexed(3, 3, 7), &palette())
                .unwrap(),
        );
        let bgra = BgraImage::new(4, 4, (0..64).collect()).unwrap();
        let props = EncoderProperties::default().with_dictionary_size(1 << 16);
        icons.push(Sub::from_bgra(0, 2, &bgra, &props).unwrap());
        dat.groups_mut().push(hud);
        dat.groups_mut().push(icons);
        dat
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dat-image-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_bytes_roundtrip() {
        let dat = sample();
        let bytes = dat.to_bytes().unwrap();
        let parsed = DatFile::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, dat);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_header_counts() {
        let dat = sample();
        let bytes = dat.to_bytes().unwrap();
        let header = FileHeaderParser::parse(&bytes).unwrap();
        assert_eq!(header.group_count, 2);
        assert_eq!(header.sub_count, 4);
        assert_eq!(header.data_offset, 2 * 0x18);
        assert_eq!(header.length as usize, dat.length());
        assert_eq!(header.color_count as usize, dat.color_count());
        assert_eq!(
            bytes.len(),
            FileHeaderParser::HEADER_SIZE + 2 * GroupHeaderParser::HEADER_SIZE + dat.length()
        );

        let first = GroupHeaderParser::parse(&bytes[0x22..]).unwrap();
        let second = GroupHeaderParser::parse(&bytes[0x22 + 0x18..]).unwrap();
        assert_eq!(
            first,
            GroupHeader {
                id: 9998,
                sub_count: 2,
                length: dat.groups()[0].length() as i32,
                color_count: dat.groups()[0].color_count() as i32,
                data_offset: 0,
            }
        );
        assert_eq!(second.data_offset, first.length);
    }

    #[test]
    fn test_validation_errors() {
        let bytes = sample().to_bytes().unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] ^= 1;
        assert!(matches!(
            DatFile::from_bytes(&bad_magic),
            Err(DatError::InvalidSignature)
        ));

        let mut bad_version = bytes.clone();
        bad_version[8] = 2;
        assert!(matches!(
            DatFile::from_bytes(&bad_version),
            Err(DatError::InvalidVersion(2))
        ));

        let mut bad_reserved = bytes.clone();
        bad_reserved[0x22 + 2 * 0x18 + 0x12 + 0x24] = 0;
        assert!(matches!(
            DatFile::from_bytes(&bad_reserved),
            Err(DatError::InvalidHeader(_))
        ));

        assert!(matches!(
            DatFile::from_bytes(&bytes[..bytes.len() - 10]),
            Err(DatError::BufferTooSmall { .. })
        ));
        assert!(matches!(
            DatFile::from_bytes(&bytes[..0x30]),
            Err(DatError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_group_ids_follow_group_header() {
        let mut bytes = sample().to_bytes().unwrap();
        // group id of the first sub
        bytes[0x22 + 2 * 0x18 + 0xA] = 0x55;
        let parsed = DatFile::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.groups()[0].subs()[0].group_id(), 9998);
    }

    #[test]
    fn test_empty_archive() {
        let bytes = DatFile::new().to_bytes().unwrap();
        assert_eq!(bytes.len(), 0x22);
        let parsed = DatFile::from_bytes(&bytes).unwrap();
        assert!(parsed.groups().is_empty());
    }

    #[test]
    fn test_save_and_open() {
        let path = temp_path("roundtrip.DAT");
        let mut dat = sample();
        dat.save(&path).unwrap();
        assert_eq!(dat.path(), Some(path.as_path()));

        let opened = DatFile::open(&path).unwrap();
        assert_eq!(opened.groups(), dat.groups());
        assert!(opened.file_name().unwrap().ends_with("roundtrip.DAT"));
        assert_eq!(opened.group(9999).unwrap().len(), 2);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_requires_dat_extension() {
        assert!(matches!(
            DatFile::open(temp_path("image.png")),
            Err(DatError::InvalidExtension(_))
        ));
        assert!(matches!(
            DatFile::open(temp_path("missing.dat")),
            Err(DatError::Io(_))
        ));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_open_async() {
        let path = temp_path("async.dat");
        let mut dat = sample();
        dat.save(&path).unwrap();
        let opened = DatFile::open_async(&path).await.unwrap();
        assert_eq!(opened.groups(), dat.groups());
        std::fs::remove_file(&path).unwrap();
    }
}

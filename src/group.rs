//! Group - an ordered set of subs sharing one group id.

use crate::error::{DatError, Result};
use crate::parsing::{GroupHeader, SubHeaderParser};
use crate::sub::Sub;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: i16,
    subs: Vec<Sub>,
}

impl Group {
    pub fn new(id: i16) -> Self {
        Self {
            id,
            subs: Vec::new(),
        }
    }

    /// Group owning `subs`; their group ids are rewritten to `id`.
    pub fn with_subs(id: i16, subs: Vec<Sub>) -> Self {
        let mut group = Self { id, subs };
        group.set_id(id);
        group
    }

    pub fn id(&self) -> i16 {
        self.id
    }

    /// Change the id of the group and all of its subs.
    pub fn set_id(&mut self, id: i16) {
        self.id = id;
        for sub in &mut self.subs {
            sub.set_group_id(id);
        }
    }

    pub fn subs(&self) -> &[Sub] {
        &self.subs
    }

    pub fn subs_mut(&mut self) -> &mut [Sub] {
        &mut self.subs
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Append `sub`, taking over its group id.
    pub fn push(&mut self, mut sub: Sub) {
        sub.set_group_id(self.id);
        self.subs.push(sub);
    }

    /// First sub with `sub_id`.
    pub fn sub(&self, sub_id: i16) -> Option<&Sub> {
        self.subs.iter().find(|s| s.sub_id() == sub_id)
    }

    pub fn sub_mut(&mut self, sub_id: i16) -> Option<&mut Sub> {
        self.subs.iter_mut().find(|s| s.sub_id() == sub_id)
    }

    /// Remove and return the first sub with `sub_id`.
    pub fn remove(&mut self, sub_id: i16) -> Option<Sub> {
        let index = self.subs.iter().position(|s| s.sub_id() == sub_id)?;
        Some(self.subs.remove(index))
    }

    /// Bytes taken by the group's subs, headers included.
    pub fn length(&self) -> usize {
        self.subs
            .iter()
            .map(|s| s.length() + SubHeaderParser::HEADER_SIZE)
            .sum()
    }

    /// Palette entries over all subs.
    pub fn color_count(&self) -> usize {
        self.subs.iter().map(Sub::color_count).sum()
    }

    /// Header for this group with its data starting at `data_offset`.
    pub fn header(&self, data_offset: i32) -> Result<GroupHeader> {
        Ok(GroupHeader {
            id: self.id,
            sub_count: i16::try_from(self.subs.len())
                .map_err(|_| DatError::InvalidHeader("group sub count"))?,
            length: i32::try_from(self.length())
                .map_err(|_| DatError::InvalidHeader("group length"))?,
            color_count: self.color_count() as i32,
            data_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Color, ImageType, IndexedImage};

    fn sub(sub_id: i16, colors: usize) -> Sub {
        let indices = (0..colors as u8).collect();
        let image = IndexedImage::new(colors as u16, 1, indices).unwrap();
        let palette = vec![Color::new(1, 2, 3); colors];
        Sub::from_indexed(0, sub_id, ImageType::Transparent, &image, &palette).unwrap()
    }

    #[test]
    fn test_ids_propagate() {
        let mut group = Group::with_subs(5, vec![sub(1, 2), sub(2, 3)]);
        assert!(group.subs().iter().all(|s| s.group_id() == 5));

        group.set_id(7);
        group.push(sub(3, 1));
        assert!(group.subs().iter().all(|s| s.group_id() == 7));
        assert_eq!(group.len(), 3);
    }

    #[test]
    fn test_lookup_and_remove() {
        let mut group = Group::with_subs(1, vec![sub(10, 2), sub(20, 2)]);
        assert_eq!(group.sub(20).map(Sub::sub_id), Some(20));
        assert!(group.sub(30).is_none());

        let removed = group.remove(10).unwrap();
        assert_eq!(removed.sub_id(), 10);
        assert!(group.remove(10).is_none());
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_header() {
        let group = Group::with_subs(9, vec![sub(1, 2), sub(2, 4)]);
        let header = group.header(0x30).unwrap();
        assert_eq!(header.id, 9);
        assert_eq!(header.sub_count, 2);
        assert_eq!(header.color_count, 6);
        assert_eq!(
            header.length as usize,
            group.subs()[0].length() + group.subs()[1].length() + 2 * 0x12
        );
        assert_eq!(header.data_offset, 0x30);
        assert!(Group::new(1).is_empty());
        assert_eq!(Group::new(1).length(), 0);
    }
}

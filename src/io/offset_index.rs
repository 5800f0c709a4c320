use std::collections::HashMap;

use indexmap::map::{Iter, Keys};
use indexmap::IndexMap;

use crate::spectrum::scan_number_from_id;

/**
An ordered mapping from spectrum ID to byte offset into the source
file it resides in, with a secondary lookup from scan number to position.

A wrapper around [`indexmap::IndexMap`].
*/
#[derive(Default, Debug, Clone)]
pub struct OffsetIndex {
    /// The name of the index. There may potentially be more than one
    /// index per file
    pub name: String,

    /// The mapping from ID to byte offset, ordered by occurrence
    pub offsets: IndexMap<Box<str>, u64>,

    /// The position of the first entry carrying each scan number
    scan_numbers: HashMap<u32, usize>,

    /// Whether the index has been initalized explicitly or not, as
    /// it may be initially empty or read as empty.
    pub init: bool,
}

impl OffsetIndex {
    pub fn new(name: String) -> OffsetIndex {
        OffsetIndex {
            name,
            ..Default::default()
        }
    }

    /// Get the offset of the specified key
    #[inline]
    pub fn get(&self, key: &str) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    /// Get the associated key and offset for the specified index position
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<(&str, u64)> {
        self.offsets
            .get_index(index)
            .map(|(key, offset)| (key.as_ref(), *offset))
    }

    /// Get the position in the index for a specific key
    #[inline]
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.offsets.get_index_of(key)
    }

    /// Get the position of the first entry with scan number `scan_number`
    #[inline]
    pub fn index_of_scan_number(&self, scan_number: u32) -> Option<usize> {
        self.scan_numbers.get(&scan_number).copied()
    }

    /// Insert `key` into the index with an offset value. The scan number is
    /// parsed from `key` when possible.
    #[inline]
    pub fn insert<T: Into<Box<str>>>(&mut self, key: T, offset: u64) -> Option<u64> {
        let key: Box<str> = key.into();
        let scan_number = scan_number_from_id(&key);
        self.insert_with_scan_number(key, offset, scan_number)
    }

    /// Insert `key` into the index with an offset value and an explicit scan number
    pub fn insert_with_scan_number<T: Into<Box<str>>>(
        &mut self,
        key: T,
        offset: u64,
        scan_number: Option<u32>,
    ) -> Option<u64> {
        let (position, previous) = self.offsets.insert_full(key.into(), offset);
        if let Some(scan_number) = scan_number {
            self.scan_numbers.entry(scan_number).or_insert(position);
        }
        previous
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn keys(&self) -> Keys<'_, Box<str>, u64> {
        self.offsets.keys()
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
        self.scan_numbers.clear();
    }

    /// Iterate over the keys and indices
    pub fn iter(&self) -> Iter<'_, Box<str>, u64> {
        self.offsets.iter()
    }

    /// Check if the key is in the index
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.offsets.contains_key(key)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scan_number_lookup() {
        let mut index = OffsetIndex::new("spectrum".into());
        index.insert("controllerType=0 controllerNumber=1 scan=10", 0);
        index.insert("run.12.12.2", 120);
        index.insert_with_scan_number("untitled", 300, Some(40));
        index.insert("no scan number", 400);

        assert_eq!(index.len(), 4);
        assert_eq!(index.index_of_scan_number(10), Some(0));
        assert_eq!(index.index_of_scan_number(12), Some(1));
        assert_eq!(index.index_of_scan_number(40), Some(2));
        assert_eq!(index.index_of_scan_number(41), None);
        assert_eq!(index.get_index(1), Some(("run.12.12.2", 120)));
        assert_eq!(index.get("untitled"), Some(300));

        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.index_of_scan_number(10), None);
    }
}

//! Global scan identities.
//!
//! A [`ScanId`] names one scan across every file taking part in a merge. The
//! [`ScanIdIndex`] owns the assignment of file indices, so two identities are
//! only comparable when they come from the same index.
use std::fmt::Display;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;

/// A (file index, scan number) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ScanId {
    pub file_idx: u32,
    pub scan_nr: u32,
}

impl ScanId {
    pub const fn new(file_idx: u32, scan_nr: u32) -> Self {
        Self { file_idx, scan_nr }
    }

    /// Pack the identity into one integer, invertible with [`ScanId::from_hash`]
    pub const fn hash_value(&self) -> u64 {
        ((self.file_idx as u64) << 32) | self.scan_nr as u64
    }

    pub const fn from_hash(value: u64) -> Self {
        Self {
            file_idx: (value >> 32) as u32,
            scan_nr: (value & 0xFFFF_FFFF) as u32,
        }
    }

    /// The native id a spectrum carries while it sits in an intermediate file
    pub fn relabeled_id(&self) -> String {
        format!("scan={}", self.hash_value())
    }
}

impl Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file_idx, self.scan_nr)
    }
}

/// Assigns each file path a stable index in order of first appearance
#[derive(Debug, Default, Clone)]
pub struct ScanIdIndex {
    paths: IndexSet<PathBuf>,
}

impl ScanIdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The index of `path`, registering it if it has not been seen before
    pub fn file_index<P: AsRef<Path>>(&mut self, path: P) -> u32 {
        let (idx, _) = self.paths.insert_full(path.as_ref().to_path_buf());
        idx as u32
    }

    pub fn find_file_index<P: AsRef<Path>>(&self, path: P) -> Option<u32> {
        self.paths.get_index_of(path.as_ref()).map(|i| i as u32)
    }

    pub fn get_scan_id<P: AsRef<Path>>(&mut self, path: P, scan_nr: u32) -> ScanId {
        ScanId::new(self.file_index(path), scan_nr)
    }

    pub fn find_scan_id<P: AsRef<Path>>(&self, path: P, scan_nr: u32) -> Option<ScanId> {
        self.find_file_index(path).map(|idx| ScanId::new(idx, scan_nr))
    }

    pub fn path_of(&self, file_idx: u32) -> Option<&Path> {
        self.paths.get_index(file_idx as usize).map(|p| p.as_path())
    }

    pub fn file_path(&self, scan_id: ScanId) -> Option<&Path> {
        self.path_of(scan_id.file_idx)
    }

    /// The number of registered files, including any output file
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Path)> {
        self.paths
            .iter()
            .enumerate()
            .map(|(i, p)| (i as u32, p.as_path()))
    }

    /// The registered files other than `output`
    pub fn input_files<'a>(&'a self, output: &'a Path) -> impl Iterator<Item = (u32, &'a Path)> {
        self.iter().filter(move |(_, p)| *p != output)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hash_round_trip() {
        for id in [
            ScanId::new(0, 1),
            ScanId::new(3, 48213),
            ScanId::new(u32::MAX, u32::MAX),
        ] {
            assert_eq!(ScanId::from_hash(id.hash_value()), id);
        }
        assert_eq!(ScanId::new(1, 5).hash_value(), (1u64 << 32) + 5);
        assert_eq!(ScanId::new(0, 12).relabeled_id(), "scan=12");
    }

    #[test]
    fn test_ordering() {
        let mut ids = vec![ScanId::new(1, 2), ScanId::new(0, 9), ScanId::new(1, 1)];
        ids.sort();
        assert_eq!(
            ids,
            vec![ScanId::new(0, 9), ScanId::new(1, 1), ScanId::new(1, 2)]
        );
    }

    #[test]
    fn test_index_assignment() {
        let mut index = ScanIdIndex::new();
        let a = index.get_scan_id("a.mgf", 10);
        let b = index.get_scan_id("b.mgf", 10);
        let a2 = index.get_scan_id("a.mgf", 11);
        assert_eq!(a.file_idx, 0);
        assert_eq!(b.file_idx, 1);
        assert_eq!(a2.file_idx, 0);
        assert_ne!(a, b);
        assert_eq!(index.len(), 2);
        assert_eq!(index.file_path(b), Some(Path::new("b.mgf")));
        assert_eq!(index.find_scan_id("c.mgf", 1), None);

        let out = Path::new("out.mgf");
        index.file_index(out);
        let inputs: Vec<u32> = index.input_files(out).map(|(i, _)| i).collect();
        assert_eq!(inputs, vec![0, 1]);
    }
}

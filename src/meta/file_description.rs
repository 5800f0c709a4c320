use std::io;
use std::path::Path;

use crate::impl_param_described;
use crate::io::{checksum_file, MassSpectrometryFormat};
use crate::params::{ControlledVocabulary, Param, ParamDescribed, ParamList};

/// A file that a spectrum file was derived from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub location: String,
    pub id: String,
    pub file_format: Option<Param>,
    pub id_format: Option<Param>,
    pub params: ParamList,
}

impl SourceFile {
    /// Describe the file at `path`, splitting it into a file name and a `file://` location
    pub fn from_path(path: &Path, format: MassSpectrometryFormat) -> SourceFile {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let parent = path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        SourceFile {
            id: format!("SF_{}", name),
            location: format!("file://{}", parent),
            name,
            file_format: format.as_param(),
            id_format: Some(
                ControlledVocabulary::MS.const_param("scan number only nativeID format", 1000776),
            ),
            params: ParamList::new(),
        }
    }

    /// Compute the MD5 digest of the file at `path` and record it as a parameter
    pub fn add_checksum(&mut self, path: &Path) -> io::Result<()> {
        let digest = checksum_file(path)?;
        self.add_param(ControlledVocabulary::MS.param_val("MD5", 1000568, digest));
        Ok(())
    }

    /// The location joined with the name, used to detect duplicate records
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.location.trim_end_matches('/'), self.name)
    }
}

impl_param_described!(SourceFile);

/// The file-level description: what kind of spectra the file holds and
/// where they came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileDescription {
    pub contents: ParamList,
    pub source_files: Vec<SourceFile>,
}

impl FileDescription {
    pub fn new(contents: ParamList, source_files: Vec<SourceFile>) -> Self {
        Self {
            contents,
            source_files,
        }
    }

    /// Add `source_file` unless a record with the same location and name is already present.
    /// Returns whether the record was added.
    pub fn add_source_file(&mut self, source_file: SourceFile) -> bool {
        let key = source_file.full_path();
        if self.source_files.iter().any(|sf| sf.full_path() == key) {
            false
        } else {
            self.source_files.push(source_file);
            true
        }
    }

    /// Fold the first source file of `other` into this description, the way a
    /// merged file records each of the files it drew spectra from
    pub fn absorb_provenance(&mut self, other: &FileDescription) -> bool {
        match other.source_files.first() {
            Some(sf) => self.add_source_file(sf.clone()),
            None => false,
        }
    }

    /// The description of a file holding MSn spectra
    pub fn msn_spectra() -> Self {
        let mut fd = Self::default();
        fd.add_param(ControlledVocabulary::MS.const_param("MSn spectrum", 1000580));
        fd
    }
}

impl ParamDescribed for FileDescription {
    fn params(&self) -> &ParamList {
        &self.contents
    }

    fn params_mut(&mut self) -> &mut ParamList {
        &mut self.contents
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_absorb_provenance_dedupes() {
        let a = SourceFile::from_path(&PathBuf::from("/data/a.mgf"), MassSpectrometryFormat::MGF);
        let b = SourceFile::from_path(&PathBuf::from("/data/b.mgf"), MassSpectrometryFormat::MGF);
        assert_eq!(a.name, "a.mgf");
        assert_eq!(a.location, "file:///data");

        let fa = FileDescription::new(Vec::new(), vec![a.clone()]);
        let fb = FileDescription::new(Vec::new(), vec![b, a]);

        let mut merged = FileDescription::msn_spectra();
        assert!(merged.absorb_provenance(&fa));
        assert!(!merged.absorb_provenance(&fa));
        assert!(merged.absorb_provenance(&fb));
        assert_eq!(merged.source_files.len(), 2);
        assert!(!merged.absorb_provenance(&FileDescription::default()));
    }
}

use super::FileDescription;

/// Access to the file level metadata of a spectrum reader or writer
pub trait MSDataFileMetadata {
    fn file_description(&self) -> &FileDescription;
    fn file_description_mut(&mut self) -> &mut FileDescription;

    /// The name of the first source file, if one is known
    fn source_file_name(&self) -> Option<&str> {
        self.file_description()
            .source_files
            .first()
            .map(|f| f.name.as_str())
    }
}

#[macro_export]
macro_rules! impl_metadata_trait {
    () => {
        fn file_description(&self) -> &$crate::meta::FileDescription {
            &self.file_description
        }

        fn file_description_mut(&mut self) -> &mut $crate::meta::FileDescription {
            &mut self.file_description
        }
    };
}

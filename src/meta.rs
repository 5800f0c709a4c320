//! Descriptive metadata attached to spectrum files, reduced to the provenance
//! records that survive a merge.
#[macro_use]
pub mod file_description;
mod traits;

pub use crate::meta::file_description::{FileDescription, SourceFile};
pub use crate::meta::traits::MSDataFileMetadata;

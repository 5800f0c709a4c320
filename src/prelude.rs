//! Traits needed to read, write and merge spectra, in one import
pub use crate::io::{SeekRead, SpectrumSource, SpectrumWriter};
pub use crate::meta::MSDataFileMetadata;
pub use crate::params::ParamDescribed;
pub use std::io::prelude::*;

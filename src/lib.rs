pub mod io;
pub mod merge;
pub mod meta;
pub mod params;
pub mod prelude;
pub mod spectrum;
pub mod utils;

pub use mzpeaks::{CentroidPeak, Tolerance};

pub use crate::io::mgf::MGFReader;
pub use crate::io::ms2::MS2Reader;
pub use crate::io::mzml::MzMLReader;
pub use crate::io::mzxml::MzXMLReader;
pub use crate::io::{MZReader, MZWriter};

pub use crate::merge::{MergeConfig, MergeError, SpectrumMerger};
pub use crate::meta::MSDataFileMetadata;
pub use crate::params::ParamDescribed;
pub use crate::spectrum::{MassChargeCandidate, Spectrum, SpectrumDescription};

//! Reading and writing mass spectrometry data file formats and abstractions over them.
//!
//! Four peak list formats are supported for both reading and writing: MGF, MS2, mzML
//! and mzXML. [`MZReader`] and [`MZWriter`] choose the right implementation from a
//! file's name or content.

pub mod binary;
pub(crate) mod compression;
mod infer_format;
pub mod mgf;
pub mod ms2;
pub mod mzml;
pub mod mzxml;
mod offset_index;
pub(crate) mod traits;
mod utils;

pub use crate::io::infer_format::{
    infer_format, infer_from_path, infer_from_stream, BoxedSeekRead, MZReader, MZWriter,
    MassSpectrometryFormat,
};

pub use crate::io::mgf::{MGFError, MGFReader, MGFWriter};
pub use crate::io::ms2::{MS2Error, MS2Reader, MS2Writer};
pub use crate::io::mzml::{MzMLParserError, MzMLReader, MzMLWriter};
pub use crate::io::mzxml::{MzXMLError, MzXMLReader, MzXMLWriter};

pub use crate::io::offset_index::OffsetIndex;
pub use crate::io::traits::{SeekRead, SpectrumSource, SpectrumWriter};

pub use crate::io::utils::checksum_file;

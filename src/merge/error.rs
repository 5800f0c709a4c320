use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::io::{MGFError, MS2Error, MzMLParserError, MzXMLError};

/// Everything that can stop a merge run
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("An IO error occurred: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
    #[error(
        "Unknown output format for {0}; valid extensions are mgf, ms2, mzml and mzxml"
    )]
    UnknownOutputFormat(PathBuf),
    #[error("Unknown legacy merge method {0}")]
    UnknownMergeMethod(u32),
    #[error("Input file {0} could not be found")]
    MissingInput(PathBuf),
    #[error("Failed to parse MGF: {0}")]
    MGF(#[from] MGFError),
    #[error("Failed to parse MS2: {0}")]
    MS2(#[from] MS2Error),
    #[error("Failed to parse mzML: {0}")]
    MzML(#[from] MzMLParserError),
    #[error("Failed to parse mzXML: {0}")]
    MzXML(#[from] MzXMLError),
}

impl From<MergeError> for io::Error {
    fn from(value: MergeError) -> Self {
        match value {
            MergeError::Io(e) => e,
            MergeError::MissingInput(_) => io::Error::new(io::ErrorKind::NotFound, value),
            MergeError::UnknownOutputFormat(_) => {
                io::Error::new(io::ErrorKind::Unsupported, value)
            }
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;

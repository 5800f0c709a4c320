use std::{
    fmt::Display,
    fs,
    io::{self, prelude::*, BufReader},
    path,
};

use flate2::bufread::GzDecoder;

use crate::io::compression::{is_gzipped, is_gzipped_extension};
use crate::io::mgf::is_mgf;
use crate::io::ms2::is_ms2;
use crate::io::mzml::is_mzml;
use crate::io::mzxml::is_mzxml;
use crate::params::{ControlledVocabulary, Param};

/// Mass spectrometry file formats that [`mzmerge`](crate) reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MassSpectrometryFormat {
    MGF,
    MS2,
    MzML,
    MzXML,
    Unknown,
}

impl MassSpectrometryFormat {
    pub fn as_param(&self) -> Option<Param> {
        let p = match self {
            MassSpectrometryFormat::MGF => {
                ControlledVocabulary::MS.const_param("Mascot MGF format", 1001062)
            }
            MassSpectrometryFormat::MS2 => {
                ControlledVocabulary::MS.const_param("MS2 format", 1001466)
            }
            MassSpectrometryFormat::MzML => {
                ControlledVocabulary::MS.const_param("mzML format", 1000584)
            }
            MassSpectrometryFormat::MzXML => {
                ControlledVocabulary::MS.const_param("ISB mzXML format", 1000566)
            }
            MassSpectrometryFormat::Unknown => return None,
        };
        Some(p)
    }

    /// The canonical lower case file extension of the format
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            MassSpectrometryFormat::MGF => Some("mgf"),
            MassSpectrometryFormat::MS2 => Some("ms2"),
            MassSpectrometryFormat::MzML => Some("mzml"),
            MassSpectrometryFormat::MzXML => Some("mzxml"),
            MassSpectrometryFormat::Unknown => None,
        }
    }
}

impl Display for MassSpectrometryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Given a path, infer the file format and whether or not the file at that path is
/// GZIP compressed. The extension is compared case-insensitively.
pub fn infer_from_path<P: Into<path::PathBuf>>(path: P) -> (MassSpectrometryFormat, bool) {
    let path: path::PathBuf = path.into();
    let (is_gzipped, path) = is_gzipped_extension(path);
    if let Some(ext) = path.extension() {
        if let Some(ext) = ext.to_ascii_lowercase().to_str() {
            let form = match ext {
                "mzml" => MassSpectrometryFormat::MzML,
                "mzxml" => MassSpectrometryFormat::MzXML,
                "mgf" => MassSpectrometryFormat::MGF,
                "ms2" => MassSpectrometryFormat::MS2,
                _ => MassSpectrometryFormat::Unknown,
            };
            (form, is_gzipped)
        } else {
            (MassSpectrometryFormat::Unknown, is_gzipped)
        }
    } else {
        (MassSpectrometryFormat::Unknown, is_gzipped)
    }
}

/// Given a stream of bytes, infer the file format and whether or not the
/// stream is GZIP compressed. This assumes the stream is seekable.
pub fn infer_from_stream<R: Read + Seek>(
    stream: &mut R,
) -> io::Result<(MassSpectrometryFormat, bool)> {
    let mut buf = vec![0u8; 500];
    let current_pos = stream.stream_position()?;
    let bytes_read = stream.read(buf.as_mut_slice())?;
    buf.truncate(bytes_read);
    let is_stream_gzipped = is_gzipped(buf.as_slice());
    if is_stream_gzipped {
        // A truncated gzip member is an error for `read_to_end`, so only take what
        // decompresses cleanly from the prefix
        let mut decompressed_buf = Vec::new();
        let mut decoder = GzDecoder::new(io::Cursor::new(buf));
        let mut chunk = [0u8; 64];
        while let Ok(n) = decoder.read(&mut chunk) {
            if n == 0 {
                break;
            }
            decompressed_buf.extend_from_slice(&chunk[..n]);
        }
        buf = decompressed_buf;
    }
    stream.seek(io::SeekFrom::Start(current_pos))?;

    let format = if is_mzml(&buf) {
        MassSpectrometryFormat::MzML
    } else if is_mzxml(&buf) {
        MassSpectrometryFormat::MzXML
    } else if is_mgf(&buf) {
        MassSpectrometryFormat::MGF
    } else if is_ms2(&buf) {
        MassSpectrometryFormat::MS2
    } else {
        MassSpectrometryFormat::Unknown
    };
    Ok((format, is_stream_gzipped))
}

/// Given a path, infer the file format and whether or not the file at that path is
/// GZIP compressed, using both the file name and by trying to open and read the file
/// header
pub fn infer_format<P: Into<path::PathBuf>>(path: P) -> io::Result<(MassSpectrometryFormat, bool)> {
    let path: path::PathBuf = path.into();

    let (format, is_gzipped) = infer_from_path(&path);
    match format {
        MassSpectrometryFormat::Unknown => {
            let handle = fs::File::open(path)?;
            let mut stream = BufReader::new(handle);
            infer_from_stream(&mut stream)
        }
        _ => Ok((format, is_gzipped)),
    }
}

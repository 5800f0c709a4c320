//! Naming and writing output and intermediate part files.
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::io::{infer_from_path, MZWriter, MassSpectrometryFormat, SpectrumWriter};
use crate::meta::{FileDescription, MSDataFileMetadata};
use crate::spectrum::Spectrum;

use super::error::{MergeError, Result};

/// Check that `path` names a format spectra can be written in
pub fn output_format(path: &Path) -> Result<MassSpectrometryFormat> {
    match infer_from_path(path) {
        (MassSpectrometryFormat::Unknown, _) | (_, true) => {
            error!(
                "Unknown output format for {}; valid extensions are mgf, ms2, mzml and mzxml",
                path.display()
            );
            Err(MergeError::UnknownOutputFormat(path.to_path_buf()))
        }
        (format, false) => Ok(format),
    }
}

/// Insert `tag` before the extension of `path`, so `out.mzML` becomes `out.<tag>.mzML`
pub fn part_path(path: &Path, tag: &str) -> PathBuf {
    let mut name = OsString::new();
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            name.push(stem);
            name.push(".");
            name.push(tag);
            name.push(".");
            name.push(ext);
        }
        _ => {
            name.push(path.file_name().unwrap_or_default());
            name.push(".");
            name.push(tag);
        }
    }
    path.with_file_name(name)
}

/// Write `spectra` to `path`, renumbering their indices from zero, and record
/// the provenance in `file_description`
pub fn write_spectra(
    path: &Path,
    spectra: &mut [Spectrum],
    file_description: &FileDescription,
) -> Result<usize> {
    output_format(path)?;
    info!("Writing {} spectra to {}", spectra.len(), path.display());
    let mut writer = MZWriter::create_path(path)?;
    *writer.file_description_mut() = file_description.clone();
    writer.set_spectrum_count(spectra.len() as u64);
    for (i, spectrum) in spectra.iter_mut().enumerate() {
        spectrum.description.index = i;
        writer.write(spectrum)?;
    }
    writer.close()?;
    Ok(spectra.len())
}

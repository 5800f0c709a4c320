use std::io::{self, prelude::*};

use crate::io::traits::SpectrumWriter;
use crate::meta::{FileDescription, MSDataFileMetadata};
use crate::params::ParamDescribed;
use crate::spectrum::Spectrum;
use crate::utils::protonated_mass;

/// Writes spectra in the MS2 format. Each precursor ion becomes a `Z` line carrying
/// its charge and singly protonated mass.
pub struct MS2Writer<W: io::Write> {
    pub handle: io::BufWriter<W>,
    file_description: FileDescription,
    wrote_header: bool,
}

impl<W: io::Write> MS2Writer<W> {
    pub fn new(file: W) -> MS2Writer<W> {
        MS2Writer {
            handle: io::BufWriter::new(file),
            file_description: FileDescription::msn_spectra(),
            wrote_header: false,
        }
    }

    fn write_header(&mut self) -> io::Result<()> {
        if self.wrote_header {
            return Ok(());
        }
        writeln!(self.handle, "H\tExtractor\t{}", env!("CARGO_PKG_NAME"))?;
        writeln!(self.handle, "H\tExtractorVersion\t{}", env!("CARGO_PKG_VERSION"))?;
        for source_file in self.file_description.source_files.iter() {
            writeln!(self.handle, "H\tSourceFile\t{}", source_file.name)?;
        }
        self.wrote_header = true;
        Ok(())
    }

    pub fn write_spectrum(&mut self, spectrum: &Spectrum) -> io::Result<usize> {
        self.write_header()?;
        let desc = &spectrum.description;
        let scan = spectrum.scan_number();
        let precursor_mz = spectrum
            .precursor()
            .and_then(|p| p.ion())
            .map(|i| i.mz)
            .unwrap_or_default();
        writeln!(self.handle, "S\t{scan}\t{scan}\t{precursor_mz}")?;
        writeln!(self.handle, "I\tRTime\t{}", spectrum.start_time())?;
        writeln!(self.handle, "I\tNativeID\t{}", desc.id)?;
        if let Some(title) = desc.title() {
            writeln!(self.handle, "I\tTitle\t{title}")?;
        }
        for param in desc.params().iter().filter(|p| !p.is_controlled()) {
            writeln!(self.handle, "I\t{}\t{}", param.name, param.value)?;
        }
        if let Some(precursor) = spectrum.precursor() {
            for ion in precursor.iter() {
                if let Some(z) = ion.charge {
                    writeln!(self.handle, "Z\t{z}\t{}", protonated_mass(ion.mz, z))?;
                }
            }
        }
        for peak in spectrum.peaks() {
            writeln!(self.handle, "{} {}", peak.mz, peak.intensity)?;
        }
        Ok(1)
    }
}

impl<W: io::Write> MSDataFileMetadata for MS2Writer<W> {
    crate::impl_metadata_trait!();
}

impl<W: io::Write> SpectrumWriter for MS2Writer<W> {
    fn write(&mut self, spectrum: &Spectrum) -> io::Result<usize> {
        self.write_spectrum(spectrum)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        self.write_header()?;
        self.handle.flush()
    }
}

use std::io::{self, prelude::*};

use crate::io::traits::SpectrumWriter;
use crate::meta::{FileDescription, MSDataFileMetadata};
use crate::params::{Param, ParamDescribed};
use crate::spectrum::{Precursor, Spectrum};

/// An MGF writer that only writes centroided MSn spectra.
///
/// Each block carries `TITLE`, `NATIVEID`, `RTINSECONDS`, `PEPMASS` and `CHARGE`
/// entries followed by every uncontrolled parameter of the spectrum as `KEY=value`.
pub struct MGFWriter<W: io::Write> {
    pub handle: io::BufWriter<W>,
    pub offset: usize,
    file_description: FileDescription,
}

impl<W: io::Write> MGFWriter<W> {
    pub fn new(file: W) -> MGFWriter<W> {
        MGFWriter {
            handle: io::BufWriter::new(file),
            offset: 0,
            file_description: FileDescription::msn_spectra(),
        }
    }

    pub fn into_inner(self) -> io::BufWriter<W> {
        self.handle
    }

    /// Convert a [`Param`] into a spectrum header `KEY=value` pair.
    pub fn write_param(&mut self, param: &Param) -> io::Result<()> {
        let key = param.name.to_uppercase().replace(' ', "_");
        self.write_kv(&key, &param.value)
    }

    /// Write a spectrum header `KEY=value`
    pub fn write_kv(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.handle.write_all(key.as_bytes())?;
        self.handle.write_all(b"=")?;
        self.handle.write_all(value.as_bytes())?;
        self.handle.write_all(b"\n")?;
        Ok(())
    }

    /// MGF has room for a single precursor m/z, so only the first ion's m/z is kept
    /// while the charges of all ions are listed.
    fn write_precursor(&mut self, precursor: &Precursor) -> io::Result<()> {
        if let Some(ion) = precursor.ion() {
            self.handle.write_all(b"PEPMASS=")?;
            self.handle.write_all(ion.mz.to_string().as_bytes())?;
            if ion.intensity > 0.0 {
                self.handle.write_all(b" ")?;
                self.handle.write_all(ion.intensity.to_string().as_bytes())?;
            }
            self.handle.write_all(b"\n")?;
        }
        let charges: Vec<String> = precursor
            .iter()
            .filter_map(|ion| ion.charge)
            .map(|z| {
                if z < 0 {
                    format!("{}-", z.abs())
                } else {
                    format!("{z}+")
                }
            })
            .collect();
        if !charges.is_empty() {
            self.write_kv("CHARGE", &charges.join(" and "))?;
        }
        Ok(())
    }

    /// Write the header of a spectrum, everything after `BEGIN IONS`, before writing
    /// the peak list.
    pub fn write_header(&mut self, spectrum: &Spectrum) -> io::Result<()> {
        let desc = &spectrum.description;
        let title = desc.title().unwrap_or(&desc.id).to_string();
        self.write_kv("TITLE", &title)?;
        self.write_kv("NATIVEID", &desc.id)?;
        self.write_kv("RTINSECONDS", &(spectrum.start_time() * 60.0).to_string())?;
        if let Some(precursor) = &desc.precursor {
            self.write_precursor(precursor)?;
        }
        for param in desc.params().iter().filter(|p| !p.is_controlled()) {
            self.write_param(param)?;
        }
        Ok(())
    }

    /// Write the peak list of a spectrum, everything until the `END IONS`
    pub fn write_peaks(&mut self, spectrum: &Spectrum) -> io::Result<()> {
        for peak in spectrum.peaks() {
            self.handle.write_all(peak.mz.to_string().as_bytes())?;
            self.handle.write_all(b" ")?;
            self.handle.write_all(peak.intensity.to_string().as_bytes())?;
            self.handle.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Write a spectrum from start to finish. It will skip spectra where `ms_level() == 1`
    pub fn write_spectrum(&mut self, spectrum: &Spectrum) -> io::Result<usize> {
        if spectrum.ms_level() == 1 {
            log::warn!(
                "Attempted to write an MS1 spectrum to MGF, {}, skipping.",
                spectrum.id()
            );
            return Ok(0);
        }
        self.handle.write_all(b"BEGIN IONS\n")?;
        self.write_header(spectrum)?;
        self.write_peaks(spectrum)?;
        self.handle.write_all(b"END IONS\n\n")?;
        self.offset += 1;
        Ok(1)
    }
}

impl<W: io::Write> MSDataFileMetadata for MGFWriter<W> {
    crate::impl_metadata_trait!();
}

impl<W: io::Write> SpectrumWriter for MGFWriter<W> {
    fn write(&mut self, spectrum: &Spectrum) -> io::Result<usize> {
        self.write_spectrum(spectrum)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        self.handle.flush()
    }
}

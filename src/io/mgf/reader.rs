use std::{
    io::{self, prelude::*, SeekFrom},
    str,
};

use log::{trace, warn};
use thiserror::Error;

use crate::io::offset_index::OffsetIndex;
use crate::io::traits::{SeekRead, SpectrumSource};
use crate::meta::{FileDescription, MSDataFileMetadata};
use crate::params::{Param, ParamDescribed};
use crate::spectrum::{scan_number_from_id, Precursor, SelectedIon, Spectrum, SpectrumDescription};

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum MGFParserState {
    Start,
    FileHeader,
    ScanHeaders,
    Peaks,
    Between,
    Done,
    Error,
}

#[derive(Debug, Error)]
pub enum MGFError {
    #[error("No error occurred")]
    NoError,
    #[error("Encountered a malformed peak line: {0}")]
    MalformedPeakLine(String),
    #[error("Encountered a malformed header line: {0}")]
    MalformedHeaderLine(String),
    #[error("Too few columns for peak line encountered")]
    NotEnoughColumnsForPeakLine,
    #[error("Encountered an IO error: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

impl From<MGFError> for io::Error {
    fn from(value: MGFError) -> Self {
        match value {
            MGFError::IOError(e) => e,
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// The identifier an MGF block is known by, both in the offset index and on the
/// spectrum read from it.
pub(crate) fn block_identifier(
    native_id: Option<&str>,
    title: Option<&str>,
    scans: Option<&str>,
    index: usize,
) -> String {
    if let Some(native_id) = native_id {
        native_id.to_string()
    } else if let Some(title) = title {
        title.to_string()
    } else if let Some(scans) = scans {
        format!("scan={scans}")
    } else {
        format!("index={index}")
    }
}

/// Parse a `CHARGE` value such as `2+`, `3-` or `2+ and 3+`
pub(crate) fn parse_charge_list(value: &str) -> Result<Vec<i32>, MGFError> {
    value
        .split(|c: char| c == ',' || c.is_ascii_whitespace())
        .filter(|tok| !tok.is_empty() && *tok != "and")
        .map(parse_charge)
        .collect()
}

fn parse_charge(value: &str) -> Result<i32, MGFError> {
    let (sign, value, tail_sign) = if let Some(stripped) = value.strip_suffix('+') {
        (1, stripped, true)
    } else if let Some(stripped) = value.strip_suffix('-') {
        (-1, stripped, true)
    } else {
        (1, value, false)
    };

    if tail_sign && (value.starts_with('-') || value.starts_with('+')) {
        return Err(MGFError::MalformedHeaderLine(format!(
            "Could not parse charge value {value}"
        )));
    }

    value.parse::<i32>().map(|z| sign * z).map_err(|e| {
        MGFError::MalformedHeaderLine(format!("Could not parse charge value {value} : {e}"))
    })
}

#[derive(Debug, Default)]
struct SpectrumBuilder {
    description: SpectrumDescription,
    pairs: Vec<(f64, f32)>,
    native_id: Option<String>,
    title: Option<String>,
    scans: Option<String>,
    pepmass: Option<(f64, f32)>,
    pepmass_charge: Option<i32>,
    charges: Vec<i32>,
}

impl SpectrumBuilder {
    fn into_spectrum(mut self, index: usize) -> Spectrum {
        self.description.index = index;
        self.description.id = block_identifier(
            self.native_id.as_deref(),
            self.title.as_deref(),
            self.scans.as_deref(),
            index,
        );
        if let Some(title) = self.title.take() {
            self.description.set_title(title);
        }
        if let Some(scans) = self.scans.take() {
            self.description.add_param(Param::new_key_value("scans", scans));
        }
        if let Some((mz, intensity)) = self.pepmass {
            let charges = if self.charges.is_empty() {
                self.pepmass_charge.into_iter().collect()
            } else {
                self.charges
            };
            let ions = if charges.is_empty() {
                vec![SelectedIon::new(mz, intensity, None)]
            } else {
                charges
                    .into_iter()
                    .map(|z| SelectedIon::new(mz, intensity, Some(z)))
                    .collect()
            };
            self.description.precursor = Some(Precursor {
                ions,
                ..Default::default()
            });
        }
        let mut spectrum = Spectrum::new(self.description, Vec::new());
        spectrum.set_mz_intensity_pairs(self.pairs);
        spectrum
    }
}

/// An MGF (Mascot Generic Format) file parser that supports iteration and random access.
///
/// The spectrum id is taken from `NATIVEID=`, then `TITLE=`, then `SCANS=`, falling back
/// to the ordinal position of the block.
pub struct MGFReader<R: io::Read> {
    pub handle: io::BufReader<R>,
    pub state: MGFParserState,
    pub error: Option<MGFError>,
    index: OffsetIndex,
    file_description: FileDescription,
    spectrum_index: usize,
}

impl<R: io::Read> MGFReader<R> {
    fn parse_peak_from_line(&mut self, line: &str, builder: &mut SpectrumBuilder) -> Option<bool> {
        let first = line.chars().next()?;
        if !(first.is_numeric() || first == '.') {
            return None;
        }
        let mut it = line.split_ascii_whitespace();
        let (mz_token, intensity_token) = match (it.next(), it.next()) {
            (Some(mz), Some(intensity)) => (mz, intensity),
            _ => {
                self.state = MGFParserState::Error;
                self.error = Some(MGFError::NotEnoughColumnsForPeakLine);
                return None;
            }
        };
        match (mz_token.parse::<f64>(), intensity_token.parse::<f32>()) {
            (Ok(mz), Ok(intensity)) => {
                builder.pairs.push((mz, intensity));
                Some(true)
            }
            _ => {
                self.state = MGFParserState::Error;
                self.error = Some(MGFError::MalformedPeakLine(line.to_string()));
                None
            }
        }
    }

    fn handle_scan_header(&mut self, line: &str, builder: &mut SpectrumBuilder) -> bool {
        let peak_line = self.parse_peak_from_line(line, builder).unwrap_or(false);
        if peak_line {
            self.state = MGFParserState::Peaks;
            true
        } else if self.state == MGFParserState::Error {
            false
        } else if line == "END IONS" {
            self.state = MGFParserState::Between;
            false
        } else if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            match key {
                "TITLE" => builder.title = Some(value.to_string()),
                "NATIVEID" => builder.native_id = Some(value.to_string()),
                "SCANS" => builder.scans = Some(value.to_string()),
                "RTINSECONDS" => match value.parse::<f64>() {
                    Ok(rt) => {
                        if let Some(scan_ev) = builder.description.acquisition.first_scan_mut() {
                            scan_ev.start_time = rt / 60.0;
                        }
                    }
                    Err(e) => warn!("Failed to parse RTINSECONDS {value}: {e}"),
                },
                "PEPMASS" => {
                    let mut parts = value.split_ascii_whitespace();
                    let mz: f64 = match parts.next().map(|s| s.parse()) {
                        Some(Ok(mz)) => mz,
                        Some(Err(e)) => {
                            self.state = MGFParserState::Error;
                            self.error = Some(MGFError::MalformedHeaderLine(format!(
                                "Malformed m/z value in PEPMASS header {value}: {e}"
                            )));
                            return false;
                        }
                        None => {
                            self.state = MGFParserState::Error;
                            self.error = Some(MGFError::MalformedHeaderLine(
                                "No m/z value in PEPMASS header".into(),
                            ));
                            return false;
                        }
                    };
                    let intensity: f32 = parts
                        .next()
                        .map(|v| v.parse())
                        .unwrap_or_else(|| Ok(0.0))
                        .map_err(|e| warn!("Failed to parse PEPMASS intensity {value}: {e}"))
                        .unwrap_or_default();
                    if let Some(z) = parts.next() {
                        match parse_charge(z) {
                            Ok(z) => builder.pepmass_charge = Some(z),
                            Err(e) => {
                                self.state = MGFParserState::Error;
                                self.error = Some(e);
                                return false;
                            }
                        }
                    }
                    builder.pepmass = Some((mz, intensity));
                }
                "CHARGE" => match parse_charge_list(value) {
                    Ok(charges) => builder.charges = charges,
                    Err(e) => {
                        self.state = MGFParserState::Error;
                        self.error = Some(e);
                        return false;
                    }
                },
                _ => {
                    builder
                        .description
                        .add_param(Param::new_key_value(key.to_lowercase(), value));
                }
            };
            true
        } else {
            self.state = MGFParserState::Error;
            self.error = Some(MGFError::MalformedHeaderLine(format!(
                "No '=' in header line {line}"
            )));
            false
        }
    }

    fn handle_peak(&mut self, line: &str, builder: &mut SpectrumBuilder) -> bool {
        let peak_line = self.parse_peak_from_line(line, builder).unwrap_or(false);
        if peak_line {
            true
        } else if self.state == MGFParserState::Error {
            false
        } else if line == "END IONS" {
            self.state = MGFParserState::Between;
            false
        } else {
            self.state = MGFParserState::Error;
            self.error = Some(MGFError::MalformedPeakLine(line.to_string()));
            false
        }
    }

    fn handle_start(&mut self, line: &str) -> bool {
        if line == "BEGIN IONS" {
            self.state = MGFParserState::ScanHeaders;
        } else if line.contains('=') {
            self.state = MGFParserState::FileHeader;
        }
        true
    }

    /// Read the next spectrum block into `builder`. Returns whether a block was started.
    fn parse_into(&mut self, builder: &mut SpectrumBuilder) -> Result<bool, MGFError> {
        let mut buffer = String::new();
        let mut work = true;
        let mut had_begin_ions = false;

        while work {
            buffer.clear();
            let b = match self.handle.read_line(&mut buffer) {
                Ok(b) => b,
                Err(err) => {
                    self.state = MGFParserState::Error;
                    return Err(MGFError::IOError(err));
                }
            };
            if b == 0 {
                self.state = MGFParserState::Done;
                break;
            }

            let line = buffer.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            work = match self.state {
                MGFParserState::Start | MGFParserState::FileHeader | MGFParserState::Between => {
                    self.handle_start(line)
                }
                MGFParserState::ScanHeaders => {
                    had_begin_ions = true;
                    self.handle_scan_header(line, builder)
                }
                MGFParserState::Peaks => self.handle_peak(line, builder),
                MGFParserState::Done => false,
                MGFParserState::Error => {
                    return Err(self.error.take().unwrap_or(MGFError::NoError));
                }
            };

            if self.state == MGFParserState::Error {
                return Err(self.error.take().unwrap_or(MGFError::NoError));
            }
        }
        Ok(had_begin_ions)
    }

    /// Read the next spectrum from the file, if there is one.
    pub fn read_next(&mut self) -> Option<Spectrum> {
        let mut builder = SpectrumBuilder::default();
        match self.parse_into(&mut builder) {
            Ok(true) => {
                let spectrum = builder.into_spectrum(self.spectrum_index);
                self.spectrum_index += 1;
                Some(spectrum)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to read MGF spectrum {}: {e}", self.spectrum_index);
                None
            }
        }
    }

    /// Create a new, unindexed MGF parser
    pub fn new(file: R) -> MGFReader<R> {
        MGFReader {
            handle: io::BufReader::new(file),
            state: MGFParserState::Start,
            error: None,
            index: OffsetIndex::new("spectrum".to_owned()),
            file_description: FileDescription::msn_spectra(),
            spectrum_index: 0,
        }
    }
}

impl<R: io::Read> Iterator for MGFReader<R> {
    type Item = Spectrum;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next()
    }
}

impl<R: SeekRead> MGFReader<R> {
    /// Construct a new reader and build an offset index using [`Self::build_index`]
    pub fn new_indexed(file: R) -> io::Result<MGFReader<R>> {
        let mut reader = Self::new(file);
        reader.build_index()?;
        Ok(reader)
    }

    pub fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.handle.seek(pos)
    }

    /// Builds an offset index to each `BEGIN IONS` line by doing a fast pre-scan of the text file.
    pub fn build_index(&mut self) -> io::Result<u64> {
        let mut offset: u64 = 0;
        let mut block_start: Option<u64> = None;
        let mut native_id: Option<String> = None;
        let mut title: Option<String> = None;
        let mut scans: Option<String> = None;

        let start = self.handle.stream_position()?;
        self.seek(SeekFrom::Start(0))?;
        self.index.clear();

        let mut buffer: Vec<u8> = Vec::new();
        let header_value = |buffer: &[u8], prefix: &[u8]| -> Option<String> {
            str::from_utf8(&buffer[prefix.len()..])
                .ok()
                .map(|s| s.trim().to_string())
        };

        loop {
            buffer.clear();
            let b = self.handle.read_until(b'\n', &mut buffer)?;
            if b == 0 {
                break;
            }
            let line = buffer.trim_ascii_start();
            if line.starts_with(b"BEGIN IONS") {
                block_start = Some(offset);
                native_id = None;
                title = None;
                scans = None;
            } else if block_start.is_some() {
                if line.starts_with(b"NATIVEID=") {
                    native_id = header_value(line, b"NATIVEID=");
                } else if line.starts_with(b"TITLE=") {
                    title = header_value(line, b"TITLE=");
                } else if line.starts_with(b"SCANS=") {
                    scans = header_value(line, b"SCANS=");
                } else if line.starts_with(b"END IONS") {
                    let position = self.index.len();
                    let key = block_identifier(
                        native_id.as_deref(),
                        title.as_deref(),
                        scans.as_deref(),
                        position,
                    );
                    let scan_number = scan_number_from_id(&key)
                        .or_else(|| title.as_deref().and_then(scan_number_from_id))
                        .or_else(|| scans.as_deref().and_then(|s| s.trim().parse().ok()));
                    if let Some(start) = block_start.take() {
                        if self
                            .index
                            .insert_with_scan_number(key.clone(), start, scan_number)
                            .is_some()
                        {
                            warn!("Duplicate MGF spectrum identifier {key}");
                        }
                    }
                }
            }
            offset += b as u64;
        }
        self.seek(SeekFrom::Start(start))?;
        self.index.init = true;
        if self.index.is_empty() {
            warn!("An index was built but no entries were found")
        }
        trace!("Indexed {} MGF spectra", self.index.len());
        Ok(offset)
    }

    /// Read the block starting at `offset`, then restore the stream and iteration state
    fn read_at(&mut self, offset: u64, index: usize) -> Option<Spectrum> {
        let start = self.handle.stream_position().ok()?;
        let state = self.state;
        let spectrum_index = self.spectrum_index;

        self.seek(SeekFrom::Start(offset)).ok()?;
        self.state = MGFParserState::Between;
        self.spectrum_index = index;
        let result = self.read_next();

        self.spectrum_index = spectrum_index;
        self.state = state;
        if let Err(e) = self.seek(SeekFrom::Start(start)) {
            warn!("Failed to restore MGF stream position: {e}");
        }
        result
    }
}

impl<R: SeekRead> SpectrumSource for MGFReader<R> {
    fn reset(&mut self) {
        if let Err(e) = self.seek(SeekFrom::Start(0)) {
            warn!("Failed to reset MGF stream: {e}");
        }
        self.state = MGFParserState::Start;
        self.spectrum_index = 0;
    }

    fn get_spectrum_by_id(&mut self, id: &str) -> Option<Spectrum> {
        let offset = self.index.get(id)?;
        let index = self.index.index_of(id)?;
        self.read_at(offset, index)
    }

    fn get_spectrum_by_index(&mut self, index: usize) -> Option<Spectrum> {
        let (_id, offset) = self.index.get_index(index)?;
        self.read_at(offset, index)
    }

    fn get_index(&self) -> &OffsetIndex {
        if !self.index.init {
            warn!("Attempting to use an uninitialized offset index on MGFReader")
        }
        &self.index
    }
}

/// The MGF format does not contain any consistent metadata, but additional
/// information can be included after creation.
impl<R: io::Read> MSDataFileMetadata for MGFReader<R> {
    crate::impl_metadata_trait!();
}

pub fn is_mgf(buf: &[u8]) -> bool {
    let needle = b"BEGIN IONS";
    buf.windows(needle.len()).any(|window| window == needle)
}

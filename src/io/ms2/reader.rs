use std::io::{self, prelude::*, SeekFrom};
use std::str;

use log::{trace, warn};
use thiserror::Error;

use crate::io::offset_index::OffsetIndex;
use crate::io::traits::{SeekRead, SpectrumSource};
use crate::meta::{FileDescription, MSDataFileMetadata};
use crate::params::{Param, ParamDescribed};
use crate::spectrum::{scan_number_from_id, Precursor, SelectedIon, Spectrum, SpectrumDescription};
use crate::utils::{mass_charge_ratio, PROTON};

#[derive(Debug, Error)]
pub enum MS2Error {
    #[error("Encountered a malformed {0} line: {1}")]
    MalformedLine(char, String),
    #[error("Encountered a peak line before any S line")]
    PeaksBeforeScan,
    #[error("Encountered an IO error: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

impl From<MS2Error> for io::Error {
    fn from(value: MS2Error) -> Self {
        match value {
            MS2Error::IOError(e) => e,
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

fn scan_identifier(native_id: Option<&str>, scan: &str) -> String {
    match native_id {
        Some(native_id) => native_id.to_string(),
        None => format!("scan={scan}"),
    }
}

#[derive(Debug, Default)]
struct ScanBlock {
    description: SpectrumDescription,
    scan: String,
    native_id: Option<String>,
    precursor_mz: f64,
    charges: Vec<(i32, f64)>,
    pairs: Vec<(f64, f32)>,
}

impl ScanBlock {
    fn parse_line(&mut self, line: &str) -> Result<(), MS2Error> {
        let malformed = |tag: char| MS2Error::MalformedLine(tag, line.to_string());
        let mut tokens = line.split_ascii_whitespace();
        match line.chars().next() {
            Some('S') => {
                tokens.next();
                let scan = tokens.next().ok_or_else(|| malformed('S'))?;
                tokens.next();
                self.scan = scan.to_string();
                self.precursor_mz = match tokens.next() {
                    Some(mz) => mz.parse().map_err(|_| malformed('S'))?,
                    None => 0.0,
                };
            }
            Some('I') => {
                tokens.next();
                let key = tokens.next().ok_or_else(|| malformed('I'))?;
                let value = line
                    .splitn(3, '\t')
                    .nth(2)
                    .map(|v| v.trim().to_string())
                    .unwrap_or_else(|| tokens.collect::<Vec<_>>().join(" "));
                match key {
                    "RTime" => match value.parse::<f64>() {
                        Ok(rt) => {
                            if let Some(event) = self.description.acquisition.first_scan_mut() {
                                event.start_time = rt;
                            }
                        }
                        Err(_) => warn!("Failed to parse retention time {value}"),
                    },
                    "NativeID" => self.native_id = Some(value),
                    "Title" => self.description.set_title(value),
                    _ => self
                        .description
                        .add_param(Param::new_key_value(key.to_lowercase(), value)),
                }
            }
            Some('Z') => {
                tokens.next();
                let z: i32 = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| malformed('Z'))?;
                let mh: f64 = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| malformed('Z'))?;
                self.charges.push((z, mh));
            }
            Some('D') | Some('H') => {}
            Some(_) => {
                let mz: f64 = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| malformed('P'))?;
                let intensity: f32 = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| malformed('P'))?;
                self.pairs.push((mz, intensity));
            }
            None => {}
        }
        Ok(())
    }

    fn into_spectrum(mut self, index: usize) -> Spectrum {
        self.description.index = index;
        self.description.id = scan_identifier(self.native_id.as_deref(), &self.scan);
        let ions = if self.charges.is_empty() {
            vec![SelectedIon::new(self.precursor_mz, 0.0, None)]
        } else {
            self.charges
                .iter()
                .map(|(z, mh)| {
                    let mz = if *z != 0 {
                        mass_charge_ratio(mh - PROTON, *z)
                    } else {
                        self.precursor_mz
                    };
                    SelectedIon::new(mz, 0.0, Some(*z))
                })
                .collect()
        };
        self.description.precursor = Some(Precursor {
            ions,
            ..Default::default()
        });
        let mut spectrum = Spectrum::new(self.description, Vec::new());
        spectrum.set_mz_intensity_pairs(self.pairs);
        spectrum
    }
}

/// A reader for the line oriented MS2 format (`H`, `S`, `I`, `Z` and peak lines).
///
/// The spectrum id is the `I NativeID` value when present, otherwise `scan=<S scan>`.
/// Spectra are read one `S` block at a time through the offset index.
pub struct MS2Reader<R: io::Read> {
    pub handle: io::BufReader<R>,
    index: OffsetIndex,
    file_description: FileDescription,
    position: usize,
}

impl<R: SeekRead> MS2Reader<R> {
    pub fn new_indexed(file: R) -> io::Result<MS2Reader<R>> {
        let mut reader = MS2Reader {
            handle: io::BufReader::new(file),
            index: OffsetIndex::new("spectrum".to_owned()),
            file_description: FileDescription::msn_spectra(),
            position: 0,
        };
        reader.build_index()?;
        Ok(reader)
    }

    /// Record the offset of every `S` line, keyed by the id of the block it starts
    pub fn build_index(&mut self) -> io::Result<u64> {
        let mut offset: u64 = 0;
        let mut open: Option<(u64, String, Option<String>)> = None;
        let mut buffer = Vec::new();
        self.index.clear();
        self.handle.seek(SeekFrom::Start(0))?;

        loop {
            buffer.clear();
            let b = self.handle.read_until(b'\n', &mut buffer)?;
            let line = str::from_utf8(&buffer).unwrap_or_default();
            if b == 0 || line.starts_with('S') {
                if let Some((start, scan, native_id)) = open.take() {
                    let key = scan_identifier(native_id.as_deref(), &scan);
                    let scan_number =
                        scan_number_from_id(&key).or_else(|| scan.parse::<u32>().ok());
                    if self
                        .index
                        .insert_with_scan_number(key.clone(), start, scan_number)
                        .is_some()
                    {
                        warn!("Duplicate MS2 spectrum identifier {key}");
                    }
                }
                if b == 0 {
                    break;
                }
                let scan = line.split_ascii_whitespace().nth(1).unwrap_or_default();
                open = Some((offset, scan.to_string(), None));
            } else if line.starts_with("I") {
                let mut tokens = line.split_ascii_whitespace().skip(1);
                if tokens.next() == Some("NativeID") {
                    if let Some((_, _, native_id)) = open.as_mut() {
                        *native_id = line.splitn(3, '\t').nth(2).map(|v| v.trim().to_string());
                    }
                }
            }
            offset += b as u64;
        }
        self.handle.seek(SeekFrom::Start(0))?;
        self.index.init = true;
        trace!("Indexed {} MS2 spectra", self.index.len());
        Ok(offset)
    }

    fn read_block(&mut self, offset: u64, index: usize) -> Result<Spectrum, MS2Error> {
        self.handle.seek(SeekFrom::Start(offset))?;
        let mut block = ScanBlock::default();
        let mut buffer = String::new();
        let mut seen_scan = false;
        loop {
            buffer.clear();
            if self.handle.read_line(&mut buffer)? == 0 {
                break;
            }
            let line = buffer.trim_end();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('S') {
                if seen_scan {
                    break;
                }
                seen_scan = true;
            } else if !seen_scan && !line.starts_with('H') {
                return Err(MS2Error::PeaksBeforeScan);
            }
            block.parse_line(line)?;
        }
        Ok(block.into_spectrum(index))
    }

    fn read_at(&mut self, offset: u64, index: usize) -> Option<Spectrum> {
        match self.read_block(offset, index) {
            Ok(spectrum) => Some(spectrum),
            Err(e) => {
                warn!("Failed to read MS2 spectrum {index}: {e}");
                None
            }
        }
    }
}

impl<R: SeekRead> Iterator for MS2Reader<R> {
    type Item = Spectrum;

    fn next(&mut self) -> Option<Self::Item> {
        let spectrum = self.get_spectrum_by_index(self.position)?;
        self.position += 1;
        Some(spectrum)
    }
}

impl<R: SeekRead> SpectrumSource for MS2Reader<R> {
    fn reset(&mut self) {
        self.position = 0;
    }

    fn get_spectrum_by_id(&mut self, id: &str) -> Option<Spectrum> {
        let offset = self.index.get(id)?;
        let index = self.index.index_of(id)?;
        self.read_at(offset, index)
    }

    fn get_spectrum_by_index(&mut self, index: usize) -> Option<Spectrum> {
        let (_, offset) = self.index.get_index(index)?;
        self.read_at(offset, index)
    }

    fn get_index(&self) -> &OffsetIndex {
        &self.index
    }
}

impl<R: io::Read> MSDataFileMetadata for MS2Reader<R> {
    crate::impl_metadata_trait!();
}

/// MS2 files open with `H` header lines and their first spectrum with an `S` line
pub fn is_ms2(buf: &[u8]) -> bool {
    buf.split(|b| *b == b'\n')
        .find(|line| !line.is_empty())
        .map(|line| line.starts_with(b"H\t") || line.starts_with(b"S\t"))
        .unwrap_or_default()
}

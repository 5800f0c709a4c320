use std::io::{self, prelude::*, SeekFrom};

use log::{trace, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::io::binary::{decode_network_order_pairs, BinaryCompressionType, BinaryDataArrayType};
use crate::io::mzml::attribute_value;
use crate::io::offset_index::OffsetIndex;
use crate::io::traits::{SeekRead, SpectrumSource};
use crate::meta::{FileDescription, MSDataFileMetadata, SourceFile};
use crate::params::{Param, ParamDescribed};
use crate::spectrum::{
    scan_number_from_id, Precursor, SelectedIon, SignalContinuity, Spectrum, SpectrumDescription,
};

/// All the ways that reading or writing mzXML can go wrong
#[derive(Debug, Error)]
pub enum MzXMLError {
    #[error("An XML error occurred: {0}")]
    XMLError(
        #[from]
        #[source]
        quick_xml::Error,
    ),
    #[error("Malformed {0} attribute: {1}")]
    MalformedAttribute(&'static str, String),
    #[error("A scan element was not closed")]
    IncompleteScan,
    #[error("An IO error occurred: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

impl From<MzXMLError> for io::Error {
    fn from(value: MzXMLError) -> Self {
        match value {
            MzXMLError::IOError(e) => e,
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// Parse an `xs:duration` retention time such as `PT12.5S` into minutes
pub(crate) fn parse_retention_time(value: &str) -> Option<f64> {
    let body = value.trim().strip_prefix("PT")?;
    if let Some(seconds) = body.strip_suffix('S') {
        seconds.parse::<f64>().ok().map(|s| s / 60.0)
    } else if let Some(minutes) = body.strip_suffix('M') {
        minutes.parse::<f64>().ok()
    } else {
        None
    }
}

fn required_attribute(event: &BytesStart, key: &'static str) -> Result<String, MzXMLError> {
    attribute_value(event, key.as_bytes())?
        .ok_or_else(|| MzXMLError::MalformedAttribute(key, String::new()))
}

fn source_file_from_uri(uri: &str) -> SourceFile {
    let (location, name) = match uri.rsplit_once('/') {
        Some((location, name)) => (location.to_string(), name.to_string()),
        None => (String::new(), uri.to_string()),
    };
    SourceFile {
        id: format!("SF_{name}"),
        name,
        location,
        ..Default::default()
    }
}

#[derive(Debug, Default)]
struct ScanBuilder {
    description: SpectrumDescription,
    num: String,
    native_id: Option<String>,
    precursor: Option<Precursor>,
    ion: Option<(SelectedIon, Vec<i32>)>,
    peaks: Option<(BinaryDataArrayType, BinaryCompressionType, Vec<u8>)>,
    pairs: Vec<(f64, f32)>,
}

impl ScanBuilder {
    fn start_scan(&mut self, event: &BytesStart) -> Result<(), MzXMLError> {
        self.num = required_attribute(event, "num")?;
        if let Some(level) = attribute_value(event, b"msLevel")? {
            self.description.ms_level = level
                .parse()
                .map_err(|_| MzXMLError::MalformedAttribute("msLevel", level.clone()))?;
        }
        if let Some(rt) = attribute_value(event, b"retentionTime")? {
            let minutes = parse_retention_time(&rt)
                .ok_or_else(|| MzXMLError::MalformedAttribute("retentionTime", rt.clone()))?;
            if let Some(scan) = self.description.acquisition.first_scan_mut() {
                scan.start_time = minutes;
            }
        }
        if let Some(centroided) = attribute_value(event, b"centroided")? {
            self.description.signal_continuity = if centroided == "1" {
                SignalContinuity::Centroid
            } else {
                SignalContinuity::Profile
            };
        }
        Ok(())
    }

    fn start_precursor(&mut self, event: &BytesStart) -> Result<(), MzXMLError> {
        let mut ion = SelectedIon::default();
        if let Some(z) = attribute_value(event, b"precursorCharge")? {
            ion.charge = Some(
                z.parse()
                    .map_err(|_| MzXMLError::MalformedAttribute("precursorCharge", z.clone()))?,
            );
        }
        if let Some(intensity) = attribute_value(event, b"precursorIntensity")? {
            ion.intensity = intensity.parse().unwrap_or_default();
        }
        let possible = attribute_value(event, b"possibleCharges")?
            .map(|v| v.split(',').filter_map(|z| z.trim().parse().ok()).collect())
            .unwrap_or_default();
        self.ion = Some((ion, possible));
        Ok(())
    }

    fn finish_precursor(&mut self, text: &str) -> Result<(), MzXMLError> {
        let Some((mut ion, possible)) = self.ion.take() else {
            return Ok(());
        };
        let text = text.trim();
        ion.mz = text
            .parse()
            .map_err(|_| MzXMLError::MalformedAttribute("precursorMz", text.to_string()))?;
        let precursor = self.precursor.get_or_insert_with(Precursor::default);
        if ion.charge.is_none() && !possible.is_empty() {
            for z in possible {
                let mut alt = ion.clone();
                alt.charge = Some(z);
                precursor.add_ion(alt);
            }
        } else {
            precursor.add_ion(ion);
        }
        Ok(())
    }

    fn start_peaks(&mut self, event: &BytesStart) -> Result<(), MzXMLError> {
        let dtype = match attribute_value(event, b"precision")?.as_deref() {
            Some("32") => BinaryDataArrayType::Float32,
            Some("64") | None => BinaryDataArrayType::Float64,
            Some(other) => {
                return Err(MzXMLError::MalformedAttribute("precision", other.to_string()))
            }
        };
        let compression = match attribute_value(event, b"compressionType")?.as_deref() {
            Some("zlib") => BinaryCompressionType::Zlib,
            _ => BinaryCompressionType::NoCompression,
        };
        if let Some(order) = attribute_value(event, b"byteOrder")? {
            if order != "network" {
                warn!("Unsupported mzXML byte order {order}, assuming network order");
            }
        }
        self.peaks = Some((dtype, compression, Vec::new()));
        Ok(())
    }

    fn finish_peaks(&mut self) -> Result<(), MzXMLError> {
        if let Some((dtype, compression, text)) = self.peaks.take() {
            self.pairs = decode_network_order_pairs(&text, dtype, compression)?;
        }
        Ok(())
    }

    fn name_value(&mut self, event: &BytesStart) -> Result<(), MzXMLError> {
        let name = attribute_value(event, b"name")?.unwrap_or_default();
        let value = attribute_value(event, b"value")?.unwrap_or_default();
        if name == "nativeID" {
            self.native_id = Some(value);
        } else if name == "title" {
            self.description.set_title(value);
        } else {
            self.description.add_param(Param::new_key_value(name, value));
        }
        Ok(())
    }

    fn into_spectrum(mut self, index: usize) -> Spectrum {
        self.description.index = index;
        self.description.id = match self.native_id {
            Some(native_id) => {
                // Keep the scan number reachable when the native id does not carry it
                if scan_number_from_id(&native_id).is_none() {
                    self.description
                        .set_param(Param::new_key_value("scans", self.num.clone()));
                }
                native_id
            }
            None => format!("scan={}", self.num),
        };
        self.description.precursor = self.precursor;
        let mut spectrum = Spectrum::new(self.description, Vec::new());
        spectrum.set_mz_intensity_pairs(self.pairs);
        spectrum
    }
}

/// An indexed mzXML reader.
///
/// A spectrum's id is its `nativeID` name-value pair when present, otherwise
/// `scan=<num>`. Scans nested inside other scans are indexed on their own.
pub struct MzXMLReader<R: io::Read> {
    pub handle: io::BufReader<R>,
    index: OffsetIndex,
    file_description: FileDescription,
    position: usize,
}

impl<R: SeekRead> MzXMLReader<R> {
    pub fn new_indexed(file: R) -> io::Result<MzXMLReader<R>> {
        let mut reader = MzXMLReader {
            handle: io::BufReader::new(file),
            index: OffsetIndex::new("scan".to_owned()),
            file_description: FileDescription::msn_spectra(),
            position: 0,
        };
        reader.build_index()?;
        Ok(reader)
    }

    /// Record where every `<scan>` starts and collect the `<parentFile>` records
    pub fn build_index(&mut self) -> Result<usize, MzXMLError> {
        self.handle.seek(SeekFrom::Start(0))?;
        self.index.clear();
        let mut file_description = FileDescription::msn_spectra();
        // (offset, num, native id) of every scan that is still open
        let mut open: Vec<(u64, String, Option<String>)> = Vec::new();
        let mut found: Vec<(u64, String, Option<u32>)> = Vec::new();

        let mut reader = Reader::from_reader(&mut self.handle);
        reader.trim_text(true);
        reader.check_end_names(false);
        let mut buf = Vec::new();
        loop {
            let offset = reader.buffer_position() as u64;
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) if e.name().as_ref() == b"scan" => {
                    open.push((offset, required_attribute(e, "num")?, None));
                }
                Event::Empty(ref e) => match e.name().as_ref() {
                    b"parentFile" => {
                        if let Some(uri) = attribute_value(e, b"fileName")? {
                            file_description.add_source_file(source_file_from_uri(&uri));
                        }
                    }
                    b"nameValue" => {
                        if attribute_value(e, b"name")?.as_deref() == Some("nativeID") {
                            if let Some(scan) = open.last_mut() {
                                scan.2 = attribute_value(e, b"value")?;
                            }
                        }
                    }
                    b"scan" => {
                        let num = required_attribute(e, "num")?;
                        let scan_number = num.parse().ok();
                        found.push((offset, format!("scan={num}"), scan_number));
                    }
                    _ => {}
                },
                Event::End(ref e) => match e.name().as_ref() {
                    b"scan" => {
                        if let Some((start, num, native_id)) = open.pop() {
                            let key = native_id.unwrap_or_else(|| format!("scan={num}"));
                            found.push((start, key, num.parse().ok()));
                        }
                    }
                    b"msRun" => break,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        // Nested scans close before their parents, restore document order
        found.sort_by_key(|(offset, _, _)| *offset);
        for (offset, key, scan_number) in found {
            if self
                .index
                .insert_with_scan_number(key.clone(), offset, scan_number)
                .is_some()
            {
                warn!("Duplicate mzXML scan identifier {key}");
            }
        }
        self.file_description = file_description;
        self.index.init = true;
        trace!("Indexed {} mzXML scans", self.index.len());
        Ok(self.index.len())
    }

    fn parse_scan_at(&mut self, offset: u64, index: usize) -> Result<Spectrum, MzXMLError> {
        self.handle.seek(SeekFrom::Start(offset))?;
        let mut reader = Reader::from_reader(&mut self.handle);
        reader.trim_text(true);
        reader.check_end_names(false);
        let mut builder = ScanBuilder::default();
        let mut depth = 0usize;
        let mut text = String::new();
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => match e.name().as_ref() {
                    b"scan" => {
                        if depth == 0 {
                            builder.start_scan(e)?;
                        }
                        depth += 1;
                    }
                    b"precursorMz" if depth == 1 => {
                        builder.start_precursor(e)?;
                        text.clear();
                    }
                    b"peaks" if depth == 1 => builder.start_peaks(e)?,
                    _ => {}
                },
                Event::Empty(ref e) => match e.name().as_ref() {
                    b"scan" if depth == 0 => {
                        builder.start_scan(e)?;
                        break;
                    }
                    b"peaks" if depth == 1 => {
                        builder.start_peaks(e)?;
                        builder.finish_peaks()?;
                    }
                    b"nameValue" if depth == 1 => builder.name_value(e)?,
                    _ => {}
                },
                Event::Text(ref t) if depth == 1 => {
                    if let Some((_, _, payload)) = builder.peaks.as_mut() {
                        payload.extend_from_slice(t);
                    } else if builder.ion.is_some() {
                        text.push_str(&t.unescape()?);
                    }
                }
                Event::End(ref e) => match e.name().as_ref() {
                    b"scan" => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            break;
                        }
                    }
                    b"precursorMz" if depth == 1 => builder.finish_precursor(&text)?,
                    b"peaks" if depth == 1 => builder.finish_peaks()?,
                    _ => {}
                },
                Event::Eof => return Err(MzXMLError::IncompleteScan),
                _ => {}
            }
            buf.clear();
        }
        Ok(builder.into_spectrum(index))
    }

    fn read_at(&mut self, offset: u64, index: usize) -> Option<Spectrum> {
        match self.parse_scan_at(offset, index) {
            Ok(spectrum) => Some(spectrum),
            Err(e) => {
                warn!("Failed to read mzXML scan {index}: {e}");
                None
            }
        }
    }
}

impl<R: SeekRead> Iterator for MzXMLReader<R> {
    type Item = Spectrum;

    fn next(&mut self) -> Option<Self::Item> {
        let spectrum = self.get_spectrum_by_index(self.position)?;
        self.position += 1;
        Some(spectrum)
    }
}

impl<R: SeekRead> SpectrumSource for MzXMLReader<R> {
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

impl<R: io::Read> MSDataFileMetadata for MzXMLReader<R> {
    crate::impl_metadata_trait!();
}

/// Look for the root element of an mzXML document
pub fn is_mzxml(buf: &[u8]) -> bool {
    String::from_utf8_lossy(buf).contains("<mzXML")
}

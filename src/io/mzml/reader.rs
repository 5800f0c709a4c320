use std::io::{self, prelude::*, SeekFrom};

use log::{trace, warn};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

use crate::io::binary::{decode_array, BinaryCompressionType, BinaryDataArrayType};
use crate::io::infer_format::MassSpectrometryFormat;
use crate::io::offset_index::OffsetIndex;
use crate::io::traits::{SeekRead, SpectrumSource};
use crate::meta::{FileDescription, MSDataFileMetadata, SourceFile};
use crate::params::{ControlledVocabulary, Param, ParamDescribed, Unit};
use crate::spectrum::{
    Precursor, ScanEvent, SelectedIon, SignalContinuity, Spectrum, SpectrumDescription,
};

use super::reading_shared::{
    attribute_value, handle_param, MzMLParserError, MzMLParserState, ParserResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayKind {
    MZ,
    Intensity,
    Other,
}

#[derive(Debug, Default)]
struct ArrayState {
    dtype: BinaryDataArrayType,
    compression: BinaryCompressionType,
    kind: Option<ArrayKind>,
    text: Vec<u8>,
}

/// Accumulates the pieces of one `<spectrum>` element as they are parsed
#[derive(Debug, Default)]
struct MzMLSpectrumBuilder {
    state: MzMLParserState,
    description: SpectrumDescription,
    precursor: Option<Precursor>,
    isolation_offsets: (Option<f32>, Option<f32>),
    ion: Option<SelectedIon>,
    possible_charges: Vec<i32>,
    array: ArrayState,
    mzs: Vec<f64>,
    intensities: Vec<f64>,
}

impl MzMLSpectrumBuilder {
    fn handle_start(&mut self, event: &BytesStart) -> ParserResult {
        let state = self.state;
        let xml_err = |e| MzMLParserError::XMLError(state, e);
        let next = match event.name().as_ref() {
            b"spectrum" => {
                if let Some(id) = attribute_value(event, b"id").map_err(xml_err)? {
                    self.description.id = id;
                }
                if let Some(index) = attribute_value(event, b"index").map_err(xml_err)? {
                    self.description.index = index.parse().unwrap_or_default();
                }
                MzMLParserState::Spectrum
            }
            b"scanList" => MzMLParserState::ScanList,
            b"scan" => {
                self.description.acquisition.scans.push(ScanEvent::default());
                MzMLParserState::Scan
            }
            b"scanWindowList" => MzMLParserState::ScanWindowList,
            b"precursorList" => MzMLParserState::PrecursorList,
            b"precursor" => {
                self.precursor = Some(Precursor {
                    precursor_id: attribute_value(event, b"spectrumRef").map_err(xml_err)?,
                    ..Default::default()
                });
                MzMLParserState::Precursor
            }
            b"isolationWindow" => MzMLParserState::IsolationWindow,
            b"selectedIonList" => MzMLParserState::SelectedIonList,
            b"selectedIon" => {
                self.ion = Some(SelectedIon::default());
                self.possible_charges.clear();
                MzMLParserState::SelectedIon
            }
            b"activation" => MzMLParserState::Activation,
            b"binaryDataArrayList" => MzMLParserState::BinaryDataArrayList,
            b"binaryDataArray" => {
                self.array = ArrayState::default();
                MzMLParserState::BinaryDataArray
            }
            b"binary" => MzMLParserState::Binary,
            _ => state,
        };
        Ok(next)
    }

    fn handle_empty(&mut self, event: &BytesStart) -> ParserResult {
        match event.name().as_ref() {
            b"cvParam" | b"userParam" => {
                let param = handle_param(event, self.state)?;
                self.fill_param(param);
            }
            b"binary" => {
                self.array.text.clear();
                self.finish_array()?;
            }
            _ => {}
        }
        Ok(self.state)
    }

    fn handle_text(&mut self, event: &BytesText) {
        if self.state == MzMLParserState::Binary {
            self.array.text.extend_from_slice(event);
        }
    }

    fn handle_end(&mut self, name: &[u8]) -> ParserResult {
        let next = match name {
            b"spectrum" => MzMLParserState::SpectrumDone,
            b"scanList" => MzMLParserState::Spectrum,
            b"scan" => MzMLParserState::ScanList,
            b"scanWindowList" => MzMLParserState::Scan,
            b"isolationWindow" => {
                if let Some(precursor) = self.precursor.as_mut() {
                    let window = &mut precursor.isolation_window;
                    let (lower, upper) = self.isolation_offsets;
                    window.lower_bound = window.target - lower.unwrap_or_default();
                    window.upper_bound = window.target + upper.unwrap_or_default();
                }
                MzMLParserState::Precursor
            }
            b"selectedIon" => {
                self.finish_ion();
                MzMLParserState::SelectedIonList
            }
            b"selectedIonList" | b"activation" => MzMLParserState::Precursor,
            b"precursor" => MzMLParserState::PrecursorList,
            b"precursorList" => MzMLParserState::Spectrum,
            b"binary" => {
                self.finish_array()?;
                MzMLParserState::BinaryDataArray
            }
            b"binaryDataArray" => MzMLParserState::BinaryDataArrayList,
            b"binaryDataArrayList" => MzMLParserState::Spectrum,
            _ => self.state,
        };
        Ok(next)
    }

    fn finish_ion(&mut self) {
        let Some(ion) = self.ion.take() else {
            return;
        };
        let precursor = self.precursor.get_or_insert_with(Precursor::default);
        if ion.charge.is_none() && !self.possible_charges.is_empty() {
            for z in self.possible_charges.drain(..) {
                let mut alt = ion.clone();
                alt.charge = Some(z);
                precursor.add_ion(alt);
            }
        } else {
            precursor.add_ion(ion);
        }
    }

    fn finish_array(&mut self) -> Result<(), MzMLParserError> {
        let state = self.state;
        let values = decode_array(&self.array.text, self.array.dtype, self.array.compression)
            .map_err(|e| MzMLParserError::IOError(state, e))?;
        match self.array.kind {
            Some(ArrayKind::MZ) => self.mzs = values,
            Some(ArrayKind::Intensity) => self.intensities = values,
            Some(ArrayKind::Other) | None => {}
        }
        self.array.text.clear();
        Ok(())
    }

    fn fill_param(&mut self, param: Param) {
        let accession = match (param.controlled_vocabulary, param.accession) {
            (Some(ControlledVocabulary::MS), Some(acc)) => Some(acc),
            _ => None,
        };
        match self.state {
            MzMLParserState::Spectrum => match accession {
                Some(1000511) => {
                    self.description.ms_level = param.coerce().unwrap_or(2);
                }
                Some(1000127) => self.description.signal_continuity = SignalContinuity::Centroid,
                Some(1000128) => self.description.signal_continuity = SignalContinuity::Profile,
                Some(1000579) | Some(1000580) => {}
                _ => self.description.add_param(param),
            },
            MzMLParserState::Scan => {
                if let Some(event) = self.description.acquisition.scans.last_mut() {
                    match accession {
                        Some(1000016) => {
                            let value: f64 = param.coerce().unwrap_or_default();
                            event.start_time = match param.unit {
                                Unit::Second => value / 60.0,
                                _ => value,
                            };
                        }
                        Some(1000927) => event.injection_time = param.coerce().unwrap_or_default(),
                        _ => event.params.push(param),
                    }
                }
            }
            MzMLParserState::IsolationWindow => {
                if let Some(precursor) = self.precursor.as_mut() {
                    let value: Option<f32> = param.coerce().ok();
                    match accession {
                        Some(1000827) => precursor.isolation_window.target = value.unwrap_or_default(),
                        Some(1000828) => self.isolation_offsets.0 = value,
                        Some(1000829) => self.isolation_offsets.1 = value,
                        _ => {}
                    }
                }
            }
            MzMLParserState::SelectedIon => {
                if let Some(ion) = self.ion.as_mut() {
                    match accession {
                        Some(1000744) => ion.mz = param.coerce().unwrap_or_default(),
                        Some(1000041) => ion.charge = param.coerce().ok(),
                        Some(1000042) => ion.intensity = param.coerce().unwrap_or_default(),
                        Some(1000633) => {
                            if let Ok(z) = param.coerce() {
                                self.possible_charges.push(z)
                            }
                        }
                        _ => ion.add_param(param),
                    }
                }
            }
            MzMLParserState::BinaryDataArray => match accession {
                Some(1000521) => self.array.dtype = BinaryDataArrayType::Float32,
                Some(1000523) => self.array.dtype = BinaryDataArrayType::Float64,
                Some(1000574) => self.array.compression = BinaryCompressionType::Zlib,
                Some(1000576) => self.array.compression = BinaryCompressionType::NoCompression,
                Some(1000514) => self.array.kind = Some(ArrayKind::MZ),
                Some(1000515) => self.array.kind = Some(ArrayKind::Intensity),
                _ => {
                    if self.array.kind.is_none() && param.name.ends_with("array") {
                        self.array.kind = Some(ArrayKind::Other)
                    }
                }
            },
            _ => {}
        }
    }

    fn into_spectrum(mut self) -> Result<Spectrum, MzMLParserError> {
        if self.mzs.len() != self.intensities.len() {
            warn!(
                "Spectrum {} has {} m/z values but {} intensities",
                self.description.id,
                self.mzs.len(),
                self.intensities.len()
            );
            return Err(MzMLParserError::IncompleteSpectrum);
        }
        self.description.precursor = self.precursor;
        let mut spectrum = Spectrum::new(self.description, Vec::new());
        spectrum.set_mz_intensity_pairs(
            self.mzs
                .into_iter()
                .zip(self.intensities)
                .map(|(mz, i)| (mz, i as f32)),
        );
        Ok(spectrum)
    }
}

fn fill_source_file_param(source_file: &mut SourceFile, param: Param) {
    let known_format = [
        MassSpectrometryFormat::MGF,
        MassSpectrometryFormat::MS2,
        MassSpectrometryFormat::MzML,
        MassSpectrometryFormat::MzXML,
    ]
    .iter()
    .filter_map(|f| f.as_param())
    .any(|p| p.accession == param.accession);
    if known_format || (param.name.ends_with(" format") && !param.name.contains("nativeID")) {
        source_file.file_format = Some(param);
    } else if param.name.ends_with("nativeID format") {
        source_file.id_format = Some(param);
    } else {
        source_file.add_param(param);
    }
}

/// An indexed mzML reader.
///
/// Opening the reader makes one pass over the document to read the file description
/// and record where each `<spectrum>` element starts. Spectra are then parsed on demand.
pub struct MzMLReader<R: io::Read> {
    pub handle: io::BufReader<R>,
    index: OffsetIndex,
    file_description: FileDescription,
    position: usize,
}

impl<R: SeekRead> MzMLReader<R> {
    pub fn new_indexed(file: R) -> io::Result<MzMLReader<R>> {
        let mut reader = MzMLReader {
            handle: io::BufReader::new(file),
            index: OffsetIndex::new("spectrum".to_owned()),
            file_description: FileDescription::default(),
            position: 0,
        };
        reader.build_index()?;
        Ok(reader)
    }

    /// Scan the whole document, reading the `<fileDescription>` and indexing each
    /// `<spectrum>` by its id
    pub fn build_index(&mut self) -> Result<usize, MzMLParserError> {
        let mut state = MzMLParserState::Start;
        self.handle
            .seek(SeekFrom::Start(0))
            .map_err(|e| MzMLParserError::IOError(state, e))?;
        self.index.clear();
        let mut file_description = FileDescription::default();
        let mut source_file: Option<SourceFile> = None;

        let mut reader = Reader::from_reader(&mut self.handle);
        reader.trim_text(true);
        reader.check_end_names(false);
        let mut buf = Vec::new();
        loop {
            let offset = reader.buffer_position() as u64;
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => match e.name().as_ref() {
                    b"fileDescription" => state = MzMLParserState::FileDescription,
                    b"fileContents" => state = MzMLParserState::FileContents,
                    b"sourceFileList" => state = MzMLParserState::SourceFileList,
                    b"sourceFile" => {
                        let xml_err = |e| MzMLParserError::XMLError(state, e);
                        source_file = Some(SourceFile {
                            id: attribute_value(e, b"id").map_err(xml_err)?.unwrap_or_default(),
                            name: attribute_value(e, b"name").map_err(xml_err)?.unwrap_or_default(),
                            location: attribute_value(e, b"location")
                                .map_err(xml_err)?
                                .unwrap_or_default(),
                            ..Default::default()
                        });
                        state = MzMLParserState::SourceFile;
                    }
                    b"run" => state = MzMLParserState::Run,
                    b"spectrumList" => state = MzMLParserState::SpectrumList,
                    b"spectrum" => {
                        let id = attribute_value(e, b"id")
                            .map_err(|e| MzMLParserError::XMLError(state, e))?
                            .ok_or_else(|| {
                                MzMLParserError::IncompleteElementError(
                                    "spectrum".to_string(),
                                    state,
                                )
                            })?;
                        if self.index.insert(id.clone(), offset).is_some() {
                            warn!("Duplicate mzML spectrum identifier {id}");
                        }
                    }
                    _ => {}
                },
                Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                    b"cvParam" | b"userParam" => match state {
                        MzMLParserState::FileContents => {
                            file_description.add_param(handle_param(e, state)?)
                        }
                        MzMLParserState::SourceFile => {
                            if let Some(sf) = source_file.as_mut() {
                                fill_source_file_param(sf, handle_param(e, state)?);
                            }
                        }
                        _ => {}
                    },
                    _ => {}
                },
                Ok(Event::End(ref e)) => match e.name().as_ref() {
                    b"fileContents" | b"sourceFileList" => {
                        state = MzMLParserState::FileDescription
                    }
                    b"sourceFile" => {
                        if let Some(sf) = source_file.take() {
                            file_description.source_files.push(sf);
                        }
                        state = MzMLParserState::SourceFileList;
                    }
                    b"fileDescription" => state = MzMLParserState::Start,
                    b"spectrumList" => break,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(MzMLParserError::XMLError(state, e)),
                _ => {}
            }
            buf.clear();
        }
        self.file_description = file_description;
        self.index.init = true;
        trace!("Indexed {} mzML spectra", self.index.len());
        Ok(self.index.len())
    }

    fn parse_spectrum_at(&mut self, offset: u64) -> Result<Spectrum, MzMLParserError> {
        self.handle
            .seek(SeekFrom::Start(offset))
            .map_err(|e| MzMLParserError::IOError(MzMLParserState::Start, e))?;
        let mut builder = MzMLSpectrumBuilder::default();
        let mut reader = Reader::from_reader(&mut self.handle);
        reader.trim_text(true);
        reader.check_end_names(false);
        let mut buf = Vec::new();
        loop {
            builder.state = match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => builder.handle_start(e)?,
                Ok(Event::Empty(ref e)) => builder.handle_empty(e)?,
                Ok(Event::Text(ref t)) => {
                    builder.handle_text(t);
                    builder.state
                }
                Ok(Event::End(ref e)) => builder.handle_end(e.name().as_ref())?,
                Ok(Event::Eof) => return Err(MzMLParserError::IncompleteSpectrum),
                Err(e) => return Err(MzMLParserError::XMLError(builder.state, e)),
                _ => builder.state,
            };
            if builder.state == MzMLParserState::SpectrumDone {
                break;
            }
            buf.clear();
        }
        builder.into_spectrum()
    }

    fn read_at(&mut self, offset: u64, index: usize) -> Option<Spectrum> {
        match self.parse_spectrum_at(offset) {
            Ok(mut spectrum) => {
                spectrum.description.index = index;
                Some(spectrum)
            }
            Err(e) => {
                warn!("Failed to read mzML spectrum {index}: {e}");
                None
            }
        }
    }
}

impl<R: SeekRead> Iterator for MzMLReader<R> {
    type Item = Spectrum;

    fn next(&mut self) -> Option<Self::Item> {
        let spectrum = self.get_spectrum_by_index(self.position)?;
        self.position += 1;
        Some(spectrum)
    }
}

impl<R: SeekRead> SpectrumSource for MzMLReader<R> {
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

impl<R: io::Read> MSDataFileMetadata for MzMLReader<R> {
    crate::impl_metadata_trait!();
}

/// Look for the root element of an mzML document, indexed or not
pub fn is_mzml(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    text.contains("<mzML") || text.contains("<indexedmzML")
}

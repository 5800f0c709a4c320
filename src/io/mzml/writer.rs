use std::fmt::Debug;
use std::io::{self, prelude::*, BufWriter};

use log::warn;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::{Error as XMLError, Writer};
use thiserror::Error;

use crate::io::binary::{encode_array, BinaryCompressionType};
use crate::io::offset_index::OffsetIndex;
use crate::io::traits::SpectrumWriter;
use crate::io::utils::MD5HashingStream;
use crate::meta::{FileDescription, MSDataFileMetadata};
use crate::params::{ControlledVocabulary, Param, ParamDescribed, Unit};
use crate::spectrum::{
    Acquisition, IsolationWindow, Precursor, ScanEvent, SignalContinuity, Spectrum,
};

macro_rules! bstart {
    ($e:tt) => {
        BytesStart::from_content($e, $e.len())
    };
}

macro_rules! attrib {
    ($name:expr, $value:expr, $elt:ident) => {
        let key = $name.as_bytes();
        let value = $value.as_bytes();
        $elt.push_attribute((key, value));
    };
}

macro_rules! start_event {
    ($writer:ident, $target:ident) => {
        $writer.handle.write_event(Event::Start($target.borrow()))?;
    };
}

macro_rules! end_event {
    ($writer:ident, $target:ident) => {
        $writer.handle.write_event(Event::End($target.to_end()))?;
    };
}

const INSTRUMENT_CONFIGURATION_ID: &str = "IC1";
const SOFTWARE_ID: &str = env!("CARGO_PKG_NAME");
const DATA_PROCESSING_ID: &str = "DP1";

#[derive(Debug, Error)]
pub enum MzMLWriterError {
    #[error("An XML error occurred: {0}")]
    XMLError(#[from] XMLError),
    #[error("Cannot move from {from_state:?} to {to_state:?}")]
    StateTransitionError {
        from_state: MzMLWriterState,
        to_state: MzMLWriterState,
    },
    #[error("An IO error occurred: {0}")]
    IOError(#[from] io::Error),
    #[error("Cannot perform that action in state {0:?}")]
    InvalidActionError(MzMLWriterState),
}

impl From<MzMLWriterError> for io::Error {
    fn from(value: MzMLWriterError) -> Self {
        match value {
            MzMLWriterError::IOError(e) => e,
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

pub type WriterResult = Result<(), MzMLWriterError>;

pub(crate) struct InnerXMLWriter<W: io::Write> {
    pub handle: Writer<MD5HashingStream<BufWriter<W>>>,
}

impl<W: Write> Debug for InnerXMLWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InnerXMLWriter")
            .field("handle", &"...")
            .finish()
    }
}

impl<W: io::Write> InnerXMLWriter<W> {
    pub const INDENT_SIZE: u64 = 2;

    pub fn new(file: W) -> InnerXMLWriter<W> {
        let handle = MD5HashingStream::new(BufWriter::new(file));
        Self {
            handle: Writer::new_with_indent(handle, b' ', Self::INDENT_SIZE as usize),
        }
    }

    pub fn digest(&mut self) -> String {
        let digest = self.handle.get_ref().compute();
        format!("{:x}", digest)
    }

    /// The number of bytes written so far
    pub fn position(&self) -> u64 {
        self.handle.get_ref().position
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.handle.get_mut().flush()
    }

    pub fn write_param(&mut self, param: &Param) -> WriterResult {
        let mut elt = match param.curie() {
            None => bstart!("userParam"),
            Some(accession) => {
                let mut elt = bstart!("cvParam");
                attrib!("accession", accession, elt);
                if let Some(cv) = param.controlled_vocabulary {
                    let cv_ref = cv.prefix();
                    attrib!("cvRef", cv_ref, elt);
                }
                elt
            }
        };

        attrib!("name", param.name, elt);
        if !param.value.is_empty() {
            attrib!("value", param.value, elt);
        }
        match param.unit {
            Unit::Unknown => {}
            unit => {
                let (unit_acc, unit_name) = unit.for_param();
                let prefix = unit_acc.split(':').next().unwrap_or("UO");
                attrib!("unitCvRef", prefix, elt);
                attrib!("unitAccession", unit_acc, elt);
                attrib!("unitName", unit_name, elt);
            }
        }
        self.handle.write_event(Event::Empty(elt))?;
        Ok(())
    }

    pub fn write_event(&mut self, event: Event) -> WriterResult {
        self.handle.write_event(event)?;
        Ok(())
    }

    pub fn write_param_list<'a, T: Iterator<Item = &'a Param>>(&mut self, params: T) -> WriterResult {
        for param in params {
            self.write_param(param)?
        }
        Ok(())
    }
}

/**
The different states that [`MzMLWriter`] can enter while
writing an mzML document. This is only necessary for the module
consumer when determining where something may have gone wrong.
*/
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord)]
pub enum MzMLWriterState {
    Start,
    DocumentOpen,
    Header,
    Run,
    SpectrumList,
    SpectrumListClosed,
    RunClosed,
    MzMLClosed,
    IndexList,
    IndexListClosed,
    End,
}

/**
An indexed mzML writer. Spectra are written out as soon as they are received,
followed by an offset index and a file checksum when the document is closed.

The peak list is written as a 64-bit m/z array and a 32-bit intensity array.
*/
#[derive(Debug)]
pub struct MzMLWriter<W: io::Write> {
    /// The total number of spectra this mzML document will contain.
    /// This value will appear in the `spectrumList` element's count attribute
    pub spectrum_count: u64,
    /// The number of `spectrum` elements written so far.
    pub spectrum_counter: u64,

    /// The compression type to use when generating binary data arrays.
    pub data_array_compression: BinaryCompressionType,

    /// The file-level metadata describing the provenance of the original data
    pub file_description: FileDescription,

    pub state: MzMLWriterState,
    pub offset_index: OffsetIndex,

    handle: InnerXMLWriter<W>,
    ms_cv: ControlledVocabulary,
}

impl<W: io::Write> MSDataFileMetadata for MzMLWriter<W> {
    crate::impl_metadata_trait!();
}

impl<W: io::Write> MzMLWriter<W> {
    const PSIMS_VERSION: &'static str = "4.1.57";
    const UNIT_VERSION: &'static str = "releases/2020-03-10";

    /// Wrap a new [`std::io::Write`]-able type, constructing a new [`MzMLWriter`]
    pub fn new(file: W) -> MzMLWriter<W> {
        MzMLWriter {
            handle: InnerXMLWriter::new(file),
            file_description: FileDescription::msn_spectra(),
            offset_index: OffsetIndex::new("spectrum".into()),
            state: MzMLWriterState::Start,
            spectrum_count: 0,
            spectrum_counter: 0,
            ms_cv: ControlledVocabulary::MS,
            data_array_compression: BinaryCompressionType::Zlib,
        }
    }

    fn transition_err(&self, to_state: MzMLWriterState) -> WriterResult {
        Err(MzMLWriterError::StateTransitionError {
            from_state: self.state,
            to_state,
        })
    }

    fn write_cv_list(&mut self) -> WriterResult {
        let mut cv_list = bstart!("cvList");
        attrib!("count", "2", cv_list);
        start_event!(self, cv_list);

        let mut cv = bstart!("cv");
        attrib!("id", "MS", cv);
        attrib!("fullName", "PSI-MS", cv);
        attrib!("URI", "http://purl.obolibrary.org/obo/ms.obo", cv);
        attrib!("version", Self::PSIMS_VERSION, cv);
        self.handle.write_event(Event::Empty(cv))?;

        let mut cv = bstart!("cv");
        attrib!("id", "UO", cv);
        attrib!("fullName", "UNIT-ONTOLOGY", cv);
        attrib!("URI", "http://ontologies.berkeleybop.org/uo.obo", cv);
        attrib!("version", Self::UNIT_VERSION, cv);
        self.handle.write_event(Event::Empty(cv))?;

        end_event!(self, cv_list);
        Ok(())
    }

    fn start_document(&mut self) -> WriterResult {
        self.handle
            .handle
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        let mut indexed = bstart!("indexedmzML");
        attrib!("xmlns", "http://psi.hupo.org/ms/mzml", indexed);
        attrib!("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance", indexed);
        attrib!(
            "xsi:schemaLocation",
            "http://psi.hupo.org/ms/mzml http://psidev.info/files/ms/mzML/xsd/mzML1.1.3_idx.xsd",
            indexed
        );
        self.handle.handle.write_event(Event::Start(indexed))?;

        let mut mzml = bstart!("mzML");
        attrib!("xmlns", "http://psi.hupo.org/ms/mzml", mzml);
        attrib!("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance", mzml);
        attrib!(
            "xsi:schemaLocation",
            "http://psi.hupo.org/ms/mzml http://psidev.info/files/ms/mzML/xsd/mzML1.1.1.xsd",
            mzml
        );
        attrib!("version", "1.1.1", mzml);
        self.handle.handle.write_event(Event::Start(mzml))?;

        self.state = MzMLWriterState::DocumentOpen;
        Ok(())
    }

    fn write_header(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::DocumentOpen {
            self.start_document()?;
        } else {
            return self.transition_err(MzMLWriterState::Header);
        }
        self.write_cv_list()?;
        self.write_file_description()?;
        self.write_software_list()?;
        self.write_instrument_configuration()?;
        self.write_data_processing()?;

        self.state = MzMLWriterState::Header;
        Ok(())
    }

    fn write_file_description(&mut self) -> WriterResult {
        let fd = bstart!("fileDescription");
        let handle = &mut self.handle;
        start_event!(handle, fd);

        let fc_tag = bstart!("fileContents");
        start_event!(handle, fc_tag);
        handle.write_param_list(self.file_description.params().iter())?;
        end_event!(handle, fc_tag);

        if !self.file_description.source_files.is_empty() {
            let mut outer = bstart!("sourceFileList");
            let count = self.file_description.source_files.len().to_string();
            attrib!("count", count, outer);
            start_event!(handle, outer);
            for sf in self.file_description.source_files.iter() {
                let mut tag = bstart!("sourceFile");
                attrib!("id", sf.id, tag);
                attrib!("name", sf.name, tag);
                attrib!("location", sf.location, tag);
                start_event!(handle, tag);
                if let Some(param) = sf.file_format.as_ref() {
                    handle.write_param(param)?;
                }
                if let Some(param) = sf.id_format.as_ref() {
                    handle.write_param(param)?;
                }
                handle.write_param_list(sf.params().iter())?;
                end_event!(handle, tag);
            }
            end_event!(handle, outer);
        }

        end_event!(handle, fd);
        Ok(())
    }

    fn write_software_list(&mut self) -> WriterResult {
        let mut outer = bstart!("softwareList");
        attrib!("count", "1", outer);
        start_event!(self, outer);
        let mut tag = bstart!("software");
        attrib!("id", SOFTWARE_ID, tag);
        attrib!("version", env!("CARGO_PKG_VERSION"), tag);
        start_event!(self, tag);
        self.handle
            .write_param(&Param::new_key_value(SOFTWARE_ID, ""))?;
        end_event!(self, tag);
        end_event!(self, outer);
        Ok(())
    }

    fn write_instrument_configuration(&mut self) -> WriterResult {
        let mut outer = bstart!("instrumentConfigurationList");
        attrib!("count", "1", outer);
        start_event!(self, outer);
        let mut tag = bstart!("instrumentConfiguration");
        attrib!("id", INSTRUMENT_CONFIGURATION_ID, tag);
        self.handle.handle.write_event(Event::Empty(tag))?;
        end_event!(self, outer);
        Ok(())
    }

    fn write_data_processing(&mut self) -> WriterResult {
        let mut outer = bstart!("dataProcessingList");
        attrib!("count", "1", outer);
        start_event!(self, outer);
        let mut tag = bstart!("dataProcessing");
        attrib!("id", DATA_PROCESSING_ID, tag);
        start_event!(self, tag);
        let mut mtag = bstart!("processingMethod");
        attrib!("order", "0", mtag);
        attrib!("softwareRef", SOFTWARE_ID, mtag);
        start_event!(self, mtag);
        let param = self.ms_cv.const_param("data transformation", 1000452);
        self.handle.write_param(&param)?;
        end_event!(self, mtag);
        end_event!(self, tag);
        end_event!(self, outer);
        Ok(())
    }

    fn start_run(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::Run {
            self.write_header()?;
        } else {
            return self.transition_err(MzMLWriterState::Run);
        }
        let mut run = bstart!("run");
        attrib!("id", "1", run);
        attrib!(
            "defaultInstrumentConfigurationRef",
            INSTRUMENT_CONFIGURATION_ID,
            run
        );
        if let Some(sf_ref) = self.file_description.source_files.first() {
            attrib!("defaultSourceFileRef", sf_ref.id, run);
        };
        self.handle.handle.write_event(Event::Start(run))?;
        self.state = MzMLWriterState::Run;
        Ok(())
    }

    fn start_spectrum_list(&mut self) -> WriterResult {
        match self.state {
            state if state < MzMLWriterState::Run => self.start_run()?,
            MzMLWriterState::Run => {}
            _ => return self.transition_err(MzMLWriterState::SpectrumList),
        }
        let mut list = bstart!("spectrumList");
        let count = self.spectrum_count.to_string();
        attrib!("count", count, list);
        attrib!("defaultDataProcessingRef", DATA_PROCESSING_ID, list);
        self.handle.handle.write_event(Event::Start(list))?;
        self.state = MzMLWriterState::SpectrumList;
        Ok(())
    }

    fn close_spectrum_list(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::SpectrumList {
            self.start_spectrum_list()?;
        }
        if self.spectrum_count != self.spectrum_counter {
            warn!(
                "Declared {} spectra but wrote {}",
                self.spectrum_count, self.spectrum_counter
            );
        }
        let tag = bstart!("spectrumList");
        end_event!(self, tag);
        self.state = MzMLWriterState::SpectrumListClosed;
        Ok(())
    }

    fn close_run(&mut self) -> WriterResult {
        if self.state <= MzMLWriterState::SpectrumList {
            self.close_spectrum_list()?;
        } else if self.state > MzMLWriterState::SpectrumListClosed {
            return self.transition_err(MzMLWriterState::RunClosed);
        }
        let tag = bstart!("run");
        end_event!(self, tag);
        self.state = MzMLWriterState::RunClosed;
        Ok(())
    }

    fn close_mzml(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::RunClosed {
            self.close_run()?;
        }
        let tag = bstart!("mzML");
        end_event!(self, tag);
        self.state = MzMLWriterState::MzMLClosed;
        Ok(())
    }

    fn close_indexed_mzml(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::MzMLClosed {
            self.close_mzml()?;
        }
        self.write_index_list()?;
        let tag = bstart!("indexedmzML");
        end_event!(self, tag);
        self.state = MzMLWriterState::End;
        self.handle.flush()?;
        Ok(())
    }

    /**
    Close the wrapping `<indexedmzML>` document, which will trigger writing
    out the offset indices and file checksum at the tail of the document.
    */
    pub fn close(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::End {
            self.close_indexed_mzml()
        } else {
            Ok(())
        }
    }

    fn write_scan_list(&mut self, acq: &Acquisition) -> WriterResult {
        let mut scan_list_tag = bstart!("scanList");
        let count = acq.scans.len().max(1).to_string();
        attrib!("count", count, scan_list_tag);
        start_event!(self, scan_list_tag);
        self.handle
            .write_param(&self.ms_cv.const_param("no combination", 1000795))?;

        let default_scan = ScanEvent::default();
        let scans = if acq.scans.is_empty() {
            std::slice::from_ref(&default_scan)
        } else {
            acq.scans.as_slice()
        };
        for scan in scans {
            let mut scan_tag = bstart!("scan");
            attrib!("instrumentConfigurationRef", INSTRUMENT_CONFIGURATION_ID, scan_tag);
            start_event!(self, scan_tag);
            self.handle.write_param(
                &self
                    .ms_cv
                    .param_val("scan start time", 1000016, scan.start_time)
                    .with_unit_t(&Unit::Minute),
            )?;
            self.handle.write_param_list(scan.params.iter())?;
            end_event!(self, scan_tag);
        }
        end_event!(self, scan_list_tag);
        Ok(())
    }

    fn write_isolation_window(&mut self, iw: &IsolationWindow) -> WriterResult {
        let iw_tag = bstart!("isolationWindow");
        start_event!(self, iw_tag);
        self.handle.write_param(
            &self
                .ms_cv
                .param_val("isolation window target m/z", 1000827, iw.target)
                .with_unit_t(&Unit::MZ),
        )?;
        self.handle.write_param(
            &self
                .ms_cv
                .param_val(
                    "isolation window lower offset",
                    1000828,
                    iw.target - iw.lower_bound,
                )
                .with_unit_t(&Unit::MZ),
        )?;
        self.handle.write_param(
            &self
                .ms_cv
                .param_val(
                    "isolation window upper offset",
                    1000829,
                    iw.upper_bound - iw.target,
                )
                .with_unit_t(&Unit::MZ),
        )?;
        end_event!(self, iw_tag);
        Ok(())
    }

    fn write_selected_ions(&mut self, precursor: &Precursor) -> WriterResult {
        let mut outer = bstart!("selectedIonList");
        let count = precursor.ions.len().to_string();
        attrib!("count", count, outer);
        start_event!(self, outer);
        for ion in precursor.iter() {
            let tag = bstart!("selectedIon");
            start_event!(self, tag);
            self.handle.write_param(
                &self
                    .ms_cv
                    .param_val("selected ion m/z", 1000744, ion.mz)
                    .with_unit_t(&Unit::MZ),
            )?;
            if let Some(charge) = ion.charge {
                self.handle
                    .write_param(&self.ms_cv.param_val("charge state", 1000041, charge))?;
            }
            if ion.intensity > 0.0 {
                self.handle.write_param(
                    &self
                        .ms_cv
                        .param_val("peak intensity", 1000042, ion.intensity)
                        .with_unit_t(&Unit::DetectorCounts),
                )?;
            }
            self.handle.write_param_list(ion.params().iter())?;
            end_event!(self, tag);
        }
        end_event!(self, outer);
        Ok(())
    }

    fn write_precursor(&mut self, precursor: &Precursor) -> WriterResult {
        let mut precursor_list_tag = bstart!("precursorList");
        attrib!("count", "1", precursor_list_tag);
        start_event!(self, precursor_list_tag);

        let mut precursor_tag = bstart!("precursor");
        if let Some(prec_id) = precursor.precursor_id() {
            attrib!("spectrumRef", prec_id, precursor_tag);
        }
        start_event!(self, precursor_tag);

        self.write_isolation_window(&precursor.isolation_window)?;
        if !precursor.ions.is_empty() {
            self.write_selected_ions(precursor)?;
        }
        let activation = bstart!("activation");
        start_event!(self, activation);
        self.handle
            .write_param(&self.ms_cv.const_param("collision-induced dissociation", 1000133))?;
        end_event!(self, activation);

        end_event!(self, precursor_tag);
        end_event!(self, precursor_list_tag);
        Ok(())
    }

    fn write_binary_data_array(&mut self, encoded: &str, dtype: Param, kind: Param) -> WriterResult {
        let mut outer = bstart!("binaryDataArray");
        let encoded_len = encoded.len().to_string();
        attrib!("encodedLength", encoded_len, outer);
        start_event!(self, outer);
        self.handle.write_param(&dtype)?;
        match self.data_array_compression {
            BinaryCompressionType::NoCompression => self
                .handle
                .write_param(&self.ms_cv.const_param("no compression", 1000576))?,
            BinaryCompressionType::Zlib => self
                .handle
                .write_param(&self.ms_cv.const_param("zlib compression", 1000574))?,
        }
        self.handle.write_param(&kind)?;

        let bin = bstart!("binary");
        start_event!(self, bin);
        self.handle
            .handle
            .write_event(Event::Text(BytesText::new(encoded)))?;
        end_event!(self, bin);
        end_event!(self, outer);
        Ok(())
    }

    fn write_binary_data_arrays(&mut self, spectrum: &Spectrum) -> WriterResult {
        let mzs: Vec<f64> = spectrum.peaks().iter().map(|p| p.mz).collect();
        let intensities: Vec<f32> = spectrum.peaks().iter().map(|p| p.intensity).collect();
        let compression = self.data_array_compression;

        let mut outer = bstart!("binaryDataArrayList");
        attrib!("count", "2", outer);
        start_event!(self, outer);
        self.write_binary_data_array(
            &encode_array(&mzs, compression)?,
            self.ms_cv.const_param("64-bit float", 1000523),
            self.ms_cv
                .const_param("m/z array", 1000514)
                .with_unit_t(&Unit::MZ),
        )?;
        self.write_binary_data_array(
            &encode_array(&intensities, compression)?,
            self.ms_cv.const_param("32-bit float", 1000521),
            self.ms_cv
                .const_param("intensity array", 1000515)
                .with_unit_t(&Unit::DetectorCounts),
        )?;
        end_event!(self, outer);
        Ok(())
    }

    /**
    Write a [`Spectrum`] out to the mzML file.

    ## Side-Effects
    If the writer has not already started writing the spectra, this will cause all the metadata
    to be written out and the `<spectrumList>` element will be opened, preventing no new metadata
    from being written to this stream. Furthermore, this writes the spectrum count out, so the value
    may no longer be changed.
    */
    pub fn write_spectrum(&mut self, spectrum: &Spectrum) -> WriterResult {
        match self.state {
            MzMLWriterState::SpectrumList => {}
            state if state < MzMLWriterState::SpectrumList => {
                self.start_spectrum_list()?;
            }
            _ => return Err(MzMLWriterError::InvalidActionError(self.state)),
        }
        // The next start tag is preceded by a newline and four levels of indentation
        let pos = self.handle.position() + 1 + (4 * InnerXMLWriter::<W>::INDENT_SIZE);
        self.offset_index.insert(spectrum.id().to_string(), pos);

        let mut outer = bstart!("spectrum");
        attrib!("id", spectrum.id(), outer);
        let count = self.spectrum_counter.to_string();
        attrib!("index", count, outer);
        let default_array_len = spectrum.peaks().len().to_string();
        attrib!("defaultArrayLength", default_array_len, outer);
        start_event!(self, outer);
        self.spectrum_counter += 1;

        let ms_level = spectrum.ms_level();
        if ms_level == 1 {
            self.handle
                .write_param(&self.ms_cv.const_param("MS1 spectrum", 1000579))?;
        } else {
            self.handle
                .write_param(&self.ms_cv.const_param("MSn spectrum", 1000580))?;
        }
        self.handle
            .write_param(&self.ms_cv.param_val("ms level", 1000511, ms_level))?;
        match spectrum.description.signal_continuity {
            SignalContinuity::Profile => self
                .handle
                .write_param(&self.ms_cv.const_param("profile spectrum", 1000128))?,
            _ => self
                .handle
                .write_param(&self.ms_cv.const_param("centroid spectrum", 1000127))?,
        }
        self.handle
            .write_param_list(spectrum.description.params().iter())?;

        self.write_scan_list(&spectrum.description.acquisition)?;
        if let Some(precursor) = spectrum.precursor() {
            self.write_precursor(precursor)?;
        }
        self.write_binary_data_arrays(spectrum)?;

        end_event!(self, outer);
        Ok(())
    }

    fn write_index(&mut self) -> WriterResult {
        let mut outer = bstart!("index");
        attrib!("name", self.offset_index.name, outer);
        self.handle.handle.write_event(Event::Start(outer.borrow()))?;
        for (id, offset) in self.offset_index.iter() {
            let mut tag = bstart!("offset");
            attrib!("idRef", id, tag);
            self.handle.handle.write_event(Event::Start(tag.borrow()))?;
            let content = offset.to_string();
            self.handle
                .handle
                .write_event(Event::Text(BytesText::new(&content)))?;
            self.handle.handle.write_event(Event::End(tag.to_end()))?;
        }
        self.handle.handle.write_event(Event::End(outer.to_end()))?;
        Ok(())
    }

    fn write_index_list(&mut self) -> WriterResult {
        if self.state < MzMLWriterState::MzMLClosed {
            self.close_mzml()?;
        }
        self.state = MzMLWriterState::IndexList;
        let offset = self.handle.position() + 1 + InnerXMLWriter::<W>::INDENT_SIZE;
        let mut outer = bstart!("indexList");
        attrib!("count", "1", outer);
        start_event!(self, outer);
        self.write_index()?;
        end_event!(self, outer);
        self.state = MzMLWriterState::IndexListClosed;

        let tag = bstart!("indexListOffset");
        start_event!(self, tag);
        let content = offset.to_string();
        self.handle
            .handle
            .write_event(Event::Text(BytesText::new(&content)))?;
        end_event!(self, tag);

        let tag = bstart!("fileChecksum");
        start_event!(self, tag);
        let content = self.handle.digest();
        self.handle
            .handle
            .write_event(Event::Text(BytesText::new(&content)))?;
        end_event!(self, tag);
        Ok(())
    }

    /// Get a reference to the mzML writer's spectrum count.
    pub fn spectrum_count(&self) -> &u64 {
        &self.spectrum_count
    }

    /// Set the mzML writer's spectrum count.
    pub fn set_spectrum_count(&mut self, spectrum_count: u64) {
        self.spectrum_count = spectrum_count;
    }
}

impl<W: io::Write> SpectrumWriter for MzMLWriter<W> {
    fn write(&mut self, spectrum: &Spectrum) -> io::Result<usize> {
        self.write_spectrum(spectrum)?;
        Ok(self.handle.position() as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        MzMLWriter::close(self)?;
        Ok(())
    }
}

impl<W: io::Write> Drop for MzMLWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = MzMLWriter::close(self) {
            warn!("Failed to close mzML document: {e}");
        }
    }
}

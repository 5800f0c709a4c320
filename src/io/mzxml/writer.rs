use std::io::{self, prelude::*};

use log::warn;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::io::binary::{encode_network_order_pairs, BinaryCompressionType};
use crate::io::mzml::InnerXMLWriter;
use crate::io::offset_index::OffsetIndex;
use crate::io::traits::SpectrumWriter;
use crate::meta::{FileDescription, MSDataFileMetadata};
use crate::params::ParamDescribed;
use crate::spectrum::{SignalContinuity, Spectrum};

use super::reader::MzXMLError;

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

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord)]
pub enum MzXMLWriterState {
    Start,
    MsRun,
    MsRunClosed,
    End,
}

/// Writes spectra as an indexed mzXML 3.2 document.
///
/// Each spectrum becomes a `<scan>` whose `num` is the spectrum's scan number, or its
/// position when that number repeats. The native id and title travel in `<nameValue>` elements so they survive a round trip.
pub struct MzXMLWriter<W: io::Write> {
    /// The value written to the `scanCount` attribute of `<msRun>`
    pub spectrum_count: u64,
    pub spectrum_counter: u64,
    pub data_array_compression: BinaryCompressionType,
    pub file_description: FileDescription,
    pub state: MzXMLWriterState,
    pub offset_index: OffsetIndex,
    handle: InnerXMLWriter<W>,
}

impl<W: io::Write> MSDataFileMetadata for MzXMLWriter<W> {
    crate::impl_metadata_trait!();
}

impl<W: io::Write> MzXMLWriter<W> {
    pub fn new(file: W) -> MzXMLWriter<W> {
        MzXMLWriter {
            spectrum_count: 0,
            spectrum_counter: 0,
            data_array_compression: BinaryCompressionType::NoCompression,
            file_description: FileDescription::msn_spectra(),
            state: MzXMLWriterState::Start,
            offset_index: OffsetIndex::new("scan".into()),
            handle: InnerXMLWriter::new(file),
        }
    }

    pub fn set_spectrum_count(&mut self, spectrum_count: u64) {
        self.spectrum_count = spectrum_count;
    }

    fn write_event(&mut self, event: Event) -> Result<(), MzXMLError> {
        self.handle.handle.write_event(event)?;
        Ok(())
    }

    fn start_run(&mut self) -> Result<(), MzXMLError> {
        self.write_event(Event::Decl(BytesDecl::new("1.0", Some("ISO-8859-1"), None)))?;
        let mut root = bstart!("mzXML");
        attrib!(
            "xmlns",
            "http://sashimi.sourceforge.net/schema_revision/mzXML_3.2",
            root
        );
        attrib!("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance", root);
        attrib!(
            "xsi:schemaLocation",
            "http://sashimi.sourceforge.net/schema_revision/mzXML_3.2 http://sashimi.sourceforge.net/schema_revision/mzXML_3.2/mzXML_idx_3.2.xsd",
            root
        );
        self.write_event(Event::Start(root))?;

        let mut run = bstart!("msRun");
        let count = self.spectrum_count.to_string();
        attrib!("scanCount", count, run);
        self.write_event(Event::Start(run))?;

        let source_files = self.file_description.source_files.clone();
        for sf in source_files.iter() {
            let mut parent = bstart!("parentFile");
            let uri = format!("{}/{}", sf.location.trim_end_matches('/'), sf.name);
            attrib!("fileName", uri, parent);
            attrib!("fileType", "RAWData", parent);
            let checksum = sf
                .get_param_by_name("MD5")
                .map(|p| p.value.clone())
                .unwrap_or_default();
            attrib!("fileSha1", checksum, parent);
            self.write_event(Event::Empty(parent))?;
        }

        let mut processing = bstart!("dataProcessing");
        attrib!("centroided", "1", processing);
        self.write_event(Event::Start(processing.borrow()))?;
        let mut software = bstart!("software");
        attrib!("type", "processing", software);
        attrib!("name", env!("CARGO_PKG_NAME"), software);
        attrib!("version", env!("CARGO_PKG_VERSION"), software);
        self.write_event(Event::Empty(software))?;
        self.write_event(Event::End(processing.to_end()))?;

        self.state = MzXMLWriterState::MsRun;
        Ok(())
    }

    fn write_name_value(&mut self, name: &str, value: &str) -> Result<(), MzXMLError> {
        let mut tag = bstart!("nameValue");
        attrib!("name", name, tag);
        attrib!("value", value, tag);
        self.write_event(Event::Empty(tag))
    }

    /// The spectrum's scan number, or its position in the file when that number was
    /// already written. `num` keys the scan index so it must not repeat.
    fn next_scan_num(&self, spectrum: &Spectrum) -> String {
        let num = spectrum.scan_number().to_string();
        if !self.offset_index.contains_key(&num) {
            return num;
        }
        let mut position = self.spectrum_counter + 1;
        while self.offset_index.contains_key(&position.to_string()) {
            position += 1;
        }
        warn!(
            "Scan number {num} of {} was already written, numbering it {position}",
            spectrum.id()
        );
        position.to_string()
    }

    pub fn write_spectrum(&mut self, spectrum: &Spectrum) -> Result<(), MzXMLError> {
        match self.state {
            MzXMLWriterState::Start => self.start_run()?,
            MzXMLWriterState::MsRun => {}
            _ => {
                return Err(MzXMLError::IOError(io::Error::new(
                    io::ErrorKind::Other,
                    "Cannot write a scan after the run was closed",
                )))
            }
        }
        let num = self.next_scan_num(spectrum);
        // The next start tag is preceded by a newline and two levels of indentation
        let pos = self.handle.position() + 1 + 2 * InnerXMLWriter::<W>::INDENT_SIZE;
        self.offset_index.insert(num.as_str(), pos);

        let mut scan = bstart!("scan");
        attrib!("num", num, scan);
        let ms_level = spectrum.ms_level().to_string();
        attrib!("msLevel", ms_level, scan);
        let peaks_count = spectrum.peaks().len().to_string();
        attrib!("peaksCount", peaks_count, scan);
        let rt = format!("PT{}S", spectrum.start_time() * 60.0);
        attrib!("retentionTime", rt, scan);
        let centroided = match spectrum.description.signal_continuity {
            SignalContinuity::Profile => "0",
            _ => "1",
        };
        attrib!("centroided", centroided, scan);
        self.write_event(Event::Start(scan.borrow()))?;
        self.spectrum_counter += 1;

        if let Some(precursor) = spectrum.precursor() {
            for ion in precursor.iter() {
                let mut tag = bstart!("precursorMz");
                let intensity = ion.intensity.to_string();
                attrib!("precursorIntensity", intensity, tag);
                if let Some(z) = ion.charge {
                    let z = z.to_string();
                    attrib!("precursorCharge", z, tag);
                }
                attrib!("activationMethod", "CID", tag);
                self.write_event(Event::Start(tag.borrow()))?;
                let mz = ion.mz.to_string();
                self.write_event(Event::Text(BytesText::new(&mz)))?;
                self.write_event(Event::End(tag.to_end()))?;
            }
        }

        let encoded = encode_network_order_pairs(
            &spectrum.mz_intensity_pairs(),
            self.data_array_compression,
        )?;
        let mut peaks = bstart!("peaks");
        attrib!("precision", "64", peaks);
        attrib!("byteOrder", "network", peaks);
        attrib!("pairOrder", "m/z-int", peaks);
        match self.data_array_compression {
            BinaryCompressionType::Zlib => {
                attrib!("compressionType", "zlib", peaks);
                let compressed_len = encoded.len().to_string();
                attrib!("compressedLen", compressed_len, peaks);
            }
            BinaryCompressionType::NoCompression => {
                attrib!("compressionType", "none", peaks);
                attrib!("compressedLen", "0", peaks);
            }
        }
        self.write_event(Event::Start(peaks.borrow()))?;
        self.write_event(Event::Text(BytesText::new(&encoded)))?;
        self.write_event(Event::End(peaks.to_end()))?;

        self.write_name_value("nativeID", spectrum.id())?;
        if let Some(title) = spectrum.description.title() {
            self.write_name_value("title", title)?;
        }
        for param in spectrum.description.params().iter().filter(|p| !p.is_controlled()) {
            self.write_name_value(&param.name, &param.value)?;
        }

        self.write_event(Event::End(scan.to_end()))?;
        Ok(())
    }

    /// Close `<msRun>` and write the scan offset index
    pub fn close(&mut self) -> Result<(), MzXMLError> {
        match self.state {
            MzXMLWriterState::Start => self.start_run()?,
            MzXMLWriterState::MsRun => {}
            _ => return Ok(()),
        }
        if self.spectrum_count != 0 && self.spectrum_count != self.spectrum_counter {
            warn!(
                "Declared {} scans but wrote {}",
                self.spectrum_count, self.spectrum_counter
            );
        }
        self.write_event(Event::End(BytesEnd::new("msRun")))?;
        self.state = MzXMLWriterState::MsRunClosed;

        let index_offset = self.handle.position() + 1 + InnerXMLWriter::<W>::INDENT_SIZE;
        let mut index = bstart!("index");
        attrib!("name", "scan", index);
        self.write_event(Event::Start(index.borrow()))?;
        let offsets: Vec<(String, u64)> = self
            .offset_index
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        for (num, offset) in offsets {
            let mut tag = bstart!("offset");
            attrib!("id", num, tag);
            self.write_event(Event::Start(tag.borrow()))?;
            let content = offset.to_string();
            self.write_event(Event::Text(BytesText::new(&content)))?;
            self.write_event(Event::End(tag.to_end()))?;
        }
        self.write_event(Event::End(index.to_end()))?;

        let tag = bstart!("indexOffset");
        self.write_event(Event::Start(tag.borrow()))?;
        let content = index_offset.to_string();
        self.write_event(Event::Text(BytesText::new(&content)))?;
        self.write_event(Event::End(tag.to_end()))?;

        self.write_event(Event::End(BytesEnd::new("mzXML")))?;
        self.state = MzXMLWriterState::End;
        self.handle.flush()?;
        Ok(())
    }
}

impl<W: io::Write> SpectrumWriter for MzXMLWriter<W> {
    fn write(&mut self, spectrum: &Spectrum) -> io::Result<usize> {
        self.write_spectrum(spectrum)?;
        Ok(self.handle.position() as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        MzXMLWriter::close(self)?;
        Ok(())
    }
}

impl<W: io::Write> Drop for MzXMLWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = MzXMLWriter::close(self) {
            warn!("Failed to close mzXML document: {e}");
        }
    }
}

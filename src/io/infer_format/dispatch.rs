use std::{fmt::Debug, fs, io, path};

use log::debug;

use crate::io::compression::decompress_to_cursor;
use crate::io::mgf::{MGFReader, MGFWriter};
use crate::io::ms2::{MS2Reader, MS2Writer};
use crate::io::mzml::{MzMLReader, MzMLWriter};
use crate::io::mzxml::{MzXMLReader, MzXMLWriter};
use crate::io::offset_index::OffsetIndex;
use crate::io::traits::{SeekRead, SpectrumSource, SpectrumWriter};
use crate::meta::{FileDescription, MSDataFileMetadata, SourceFile};
use crate::spectrum::Spectrum;

use super::{infer_format, MassSpectrometryFormat};

/// A boxed readable, seekable byte stream, either a file or a decompressed buffer
pub type BoxedSeekRead = Box<dyn SeekRead + Send>;

/// An explicit file format dispatching ADT that provides the complete [`SpectrumSource`]
/// and [`MSDataFileMetadata`] APIs. The preferred means of creating an instance is
/// through the [`MZReader::open_path`] function.
pub enum MZReader<R: SeekRead = BoxedSeekRead> {
    MGF(MGFReader<R>),
    MS2(MS2Reader<R>),
    MzML(MzMLReader<R>),
    MzXML(MzXMLReader<R>),
}

macro_rules! msfmt_dispatch {
    ($d:ident, $r:ident, $e:expr) => {
        match $d {
            Self::MGF($r) => $e,
            Self::MS2($r) => $e,
            Self::MzML($r) => $e,
            Self::MzXML($r) => $e,
        }
    };
}

impl<R: SeekRead> Debug for MZReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple(&self.as_format().to_string())
            .field(&self.source_file_name())
            .finish()
    }
}

impl<R: SeekRead> MZReader<R> {
    /// Build an indexed reader of `format` over `stream`
    pub fn open_stream(stream: R, format: MassSpectrometryFormat) -> io::Result<Self> {
        match format {
            MassSpectrometryFormat::MGF => Ok(Self::MGF(MGFReader::new_indexed(stream)?)),
            MassSpectrometryFormat::MS2 => Ok(Self::MS2(MS2Reader::new_indexed(stream)?)),
            MassSpectrometryFormat::MzML => Ok(Self::MzML(MzMLReader::new_indexed(stream)?)),
            MassSpectrometryFormat::MzXML => Ok(Self::MzXML(MzXMLReader::new_indexed(stream)?)),
            MassSpectrometryFormat::Unknown => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "File format not supported",
            )),
        }
    }

    pub fn as_format(&self) -> MassSpectrometryFormat {
        match self {
            Self::MGF(_) => MassSpectrometryFormat::MGF,
            Self::MS2(_) => MassSpectrometryFormat::MS2,
            Self::MzML(_) => MassSpectrometryFormat::MzML,
            Self::MzXML(_) => MassSpectrometryFormat::MzXML,
        }
    }
}

impl MZReader<BoxedSeekRead> {
    /// Open the file at `path`, inferring its format from its extension or content.
    ///
    /// Gzip compressed files are decompressed into memory first so that they can be
    /// indexed like any other file. A source file record for `path` is added unless the
    /// file carries its own provenance.
    pub fn open_path<P: AsRef<path::Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let mut reader = Self::open_path_untracked(path)?;
        reader.record_source_file(path)?;
        Ok(reader)
    }

    /// Open and index the file at `path` like [`MZReader::open_path`], without
    /// adding a source file record
    pub fn open_path_untracked<P: AsRef<path::Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let (format, is_gzipped) = infer_format(path)?;
        let handle = fs::File::open(path)?;
        let stream: BoxedSeekRead = if is_gzipped {
            debug!("Decompressing {} into memory", path.display());
            Box::new(decompress_to_cursor(io::BufReader::new(handle))?)
        } else {
            Box::new(handle)
        };
        let reader = Self::open_stream(stream, format)?;
        debug!(
            "Opened {} as {format} with {} spectra",
            path.display(),
            reader.len()
        );
        Ok(reader)
    }
}

impl<R: SeekRead> MZReader<R> {
    /// Describe `path` as this reader's source file, with its MD5 checksum, unless
    /// the file already lists its own source files. Returns whether a record was added.
    pub fn record_source_file(&mut self, path: &path::Path) -> io::Result<bool> {
        if !self.file_description().source_files.is_empty() {
            return Ok(false);
        }
        let mut source_file = SourceFile::from_path(path, self.as_format());
        source_file.add_checksum(path)?;
        Ok(self.file_description_mut().add_source_file(source_file))
    }
}

impl<R: SeekRead> Iterator for MZReader<R> {
    type Item = Spectrum;

    fn next(&mut self) -> Option<Self::Item> {
        msfmt_dispatch!(self, reader, reader.next())
    }
}

impl<R: SeekRead> MSDataFileMetadata for MZReader<R> {
    fn file_description(&self) -> &FileDescription {
        msfmt_dispatch!(self, reader, reader.file_description())
    }

    fn file_description_mut(&mut self) -> &mut FileDescription {
        msfmt_dispatch!(self, reader, reader.file_description_mut())
    }
}

impl<R: SeekRead> SpectrumSource for MZReader<R> {
    fn reset(&mut self) {
        msfmt_dispatch!(self, reader, reader.reset())
    }

    fn get_spectrum_by_id(&mut self, id: &str) -> Option<Spectrum> {
        msfmt_dispatch!(self, reader, reader.get_spectrum_by_id(id))
    }

    fn get_spectrum_by_index(&mut self, index: usize) -> Option<Spectrum> {
        msfmt_dispatch!(self, reader, reader.get_spectrum_by_index(index))
    }

    fn get_index(&self) -> &OffsetIndex {
        msfmt_dispatch!(self, reader, reader.get_index())
    }
}

/// The writing counterpart of [`MZReader`]
pub enum MZWriter<W: io::Write> {
    MGF(MGFWriter<W>),
    MS2(MS2Writer<W>),
    MzML(MzMLWriter<W>),
    MzXML(MzXMLWriter<W>),
}

impl<W: io::Write> MZWriter<W> {
    pub fn new(stream: W, format: MassSpectrometryFormat) -> io::Result<Self> {
        match format {
            MassSpectrometryFormat::MGF => Ok(Self::MGF(MGFWriter::new(stream))),
            MassSpectrometryFormat::MS2 => Ok(Self::MS2(MS2Writer::new(stream))),
            MassSpectrometryFormat::MzML => Ok(Self::MzML(MzMLWriter::new(stream))),
            MassSpectrometryFormat::MzXML => Ok(Self::MzXML(MzXMLWriter::new(stream))),
            MassSpectrometryFormat::Unknown => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "File format not supported",
            )),
        }
    }

    /// Declare how many spectra will be written, for formats that record the count up front
    pub fn set_spectrum_count(&mut self, count: u64) {
        match self {
            Self::MzML(writer) => writer.set_spectrum_count(count),
            Self::MzXML(writer) => writer.set_spectrum_count(count),
            Self::MGF(_) | Self::MS2(_) => {}
        }
    }
}

impl MZWriter<io::BufWriter<fs::File>> {
    /// Create a writer for `path`, choosing the format from its extension. Nothing is
    /// created on disk when the extension is not a supported format.
    pub fn create_path<P: AsRef<path::Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let (format, _) = super::infer_from_path(path);
        if format == MassSpectrometryFormat::Unknown {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("Unknown output format for {}", path.display()),
            ));
        }
        let handle = io::BufWriter::new(fs::File::create(path)?);
        Self::new(handle, format)
    }
}

impl<W: io::Write> MSDataFileMetadata for MZWriter<W> {
    fn file_description(&self) -> &FileDescription {
        msfmt_dispatch!(self, writer, writer.file_description())
    }

    fn file_description_mut(&mut self) -> &mut FileDescription {
        msfmt_dispatch!(self, writer, writer.file_description_mut())
    }
}

impl<W: io::Write> SpectrumWriter for MZWriter<W> {
    fn write(&mut self, spectrum: &Spectrum) -> io::Result<usize> {
        msfmt_dispatch!(self, writer, SpectrumWriter::write(writer, spectrum))
    }

    fn flush(&mut self) -> io::Result<()> {
        msfmt_dispatch!(self, writer, SpectrumWriter::flush(writer))
    }

    fn close(&mut self) -> io::Result<()> {
        msfmt_dispatch!(self, writer, SpectrumWriter::close(writer))
    }
}

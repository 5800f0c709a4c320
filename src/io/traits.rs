use std::io;

use crate::meta::MSDataFileMetadata;
use crate::spectrum::Spectrum;

use super::OffsetIndex;

pub trait SeekRead: io::Read + io::Seek {}
impl<T: io::Read + io::Seek> SeekRead for T {}

/// A random access source of [`Spectrum`] values backed by an [`OffsetIndex`].
///
/// Iterating a source yields its spectra in file order, starting from the most recent
/// [`SpectrumSource::reset`].
pub trait SpectrumSource: Iterator<Item = Spectrum> + MSDataFileMetadata {
    /// Return the data stream to the beginning
    fn reset(&mut self);

    /// Retrieve a spectrum by its native ID
    fn get_spectrum_by_id(&mut self, id: &str) -> Option<Spectrum>;

    /// Retrieve a spectrum by its integer index
    fn get_spectrum_by_index(&mut self, index: usize) -> Option<Spectrum>;

    fn get_index(&self) -> &OffsetIndex;

    /// Retrieve a spectrum by the scan number of its source file.
    ///
    /// A `scan=N` native id is tried first, then any spectrum whose id or title
    /// encodes the scan number.
    fn get_spectrum_by_scan_number(&mut self, scan_number: u32) -> Option<Spectrum> {
        let id = format!("scan={scan_number}");
        if self.get_index().contains_key(&id) {
            return self.get_spectrum_by_id(&id);
        }
        let index = self.get_index().index_of_scan_number(scan_number)?;
        self.get_spectrum_by_index(index)
    }

    /// Retrieve the number of spectra in source file
    fn len(&self) -> usize {
        self.get_index().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Common interface for spectrum writing
pub trait SpectrumWriter {
    /// Write out a single spectrum
    fn write(&mut self, spectrum: &Spectrum) -> io::Result<usize>;

    /// Write out a single owned spectrum.
    fn write_owned(&mut self, spectrum: Spectrum) -> io::Result<usize> {
        self.write(&spectrum)
    }

    /// As [`std::io::Write::flush`]
    fn flush(&mut self) -> io::Result<()>;

    /// Consume an [`Iterator`] over [`Spectrum`] references
    fn write_all<'b, T: Iterator<Item = &'b Spectrum>>(&mut self, iterator: T) -> io::Result<usize>
    where
        Self: Sized,
    {
        let mut n = 0;
        for spectrum in iterator {
            n += self.write(spectrum)?;
        }
        Ok(n)
    }

    /// Complete writing any final content and close the underlying stream
    fn close(&mut self) -> io::Result<()>;
}

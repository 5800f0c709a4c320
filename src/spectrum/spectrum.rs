use std::sync::LazyLock;

use mzpeaks::CentroidPeak;
use regex::Regex;

use crate::impl_param_described;
use crate::params::{ControlledVocabulary, Param, ParamDescribed, ParamList};

use super::scan_properties::{Acquisition, Precursor, SignalContinuity};

/// `spectrum title`, the free text label MGF writers put in `TITLE=`
pub const SPECTRUM_TITLE_ACCESSION: u32 = 1000796;

static SCAN_EQ_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)scan=(\d+)").unwrap());

// Trans-Proteomic Pipeline titles: <run>.<start scan>.<end scan>.<charge>
static TPP_TITLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S*?\.(\d+)\.(\d+)\.\d*(?:\s|$)").unwrap());

/// The metadata of a spectrum, everything except its peak list
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumDescription {
    /// The native id of the spectrum, unique within its file
    pub id: String,
    /// The ordinal position of the spectrum within its file
    pub index: usize,
    pub ms_level: u8,
    pub signal_continuity: SignalContinuity,
    pub params: ParamList,
    pub acquisition: Acquisition,
    pub precursor: Option<Precursor>,
}

impl Default for SpectrumDescription {
    fn default() -> Self {
        Self {
            id: String::new(),
            index: 0,
            ms_level: 2,
            signal_continuity: SignalContinuity::Centroid,
            params: ParamList::new(),
            acquisition: Acquisition::default(),
            precursor: None,
        }
    }
}

impl_param_described!(SpectrumDescription);

impl SpectrumDescription {
    pub fn start_time(&self) -> f64 {
        self.acquisition.start_time()
    }

    pub fn title(&self) -> Option<&str> {
        self.params
            .iter()
            .find(|p| {
                p.accession == Some(SPECTRUM_TITLE_ACCESSION)
                    && p.controlled_vocabulary == Some(ControlledVocabulary::MS)
            })
            .map(|p| p.value.as_str())
    }

    pub fn set_title<S: Into<String>>(&mut self, title: S) {
        let title = title.into();
        match self.params.iter_mut().find(|p| {
            p.accession == Some(SPECTRUM_TITLE_ACCESSION)
                && p.controlled_vocabulary == Some(ControlledVocabulary::MS)
        }) {
            Some(p) => p.value = title,
            None => self.add_param(ControlledVocabulary::MS.param_val(
                "spectrum title",
                SPECTRUM_TITLE_ACCESSION,
                title,
            )),
        }
    }
}

/// Recover a scan number from a native id or title.
///
/// Understands `scan=N` style native ids and TPP-style `run.N.N.z` titles. A number
/// too large for a scan number does not count as a match.
pub fn scan_number_from_id(id: &str) -> Option<u32> {
    let first_number = |pattern: &Regex| -> Option<u32> {
        pattern
            .captures(id)
            .and_then(|cap| cap.get(1))
            .and_then(|m| m.as_str().parse().ok())
    };
    first_number(&*SCAN_EQ_PATTERN)
        .or_else(|| first_number(&*TPP_TITLE_PATTERN))
        .or_else(|| id.trim().parse().ok())
}

/// A centroided MSn spectrum: a [`SpectrumDescription`] and a peak list sorted by m/z.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    pub description: SpectrumDescription,
    peaks: Vec<CentroidPeak>,
}

impl Spectrum {
    pub fn new(description: SpectrumDescription, peaks: Vec<CentroidPeak>) -> Self {
        let mut this = Self {
            description,
            peaks: Vec::new(),
        };
        this.set_peaks(peaks);
        this
    }

    pub fn id(&self) -> &str {
        &self.description.id
    }

    pub fn set_id<S: Into<String>>(&mut self, id: S) {
        self.description.id = id.into();
    }

    pub fn index(&self) -> usize {
        self.description.index
    }

    pub fn ms_level(&self) -> u8 {
        self.description.ms_level
    }

    pub fn start_time(&self) -> f64 {
        self.description.start_time()
    }

    pub fn precursor(&self) -> Option<&Precursor> {
        self.description.precursor.as_ref()
    }

    /// Get the precursor, creating an empty one if the spectrum has none
    pub fn precursor_mut(&mut self) -> &mut Precursor {
        self.description.precursor.get_or_insert_with(Precursor::default)
    }

    pub fn peaks(&self) -> &[CentroidPeak] {
        &self.peaks
    }

    pub fn into_peaks(self) -> Vec<CentroidPeak> {
        self.peaks
    }

    /// Replace the peak list, sorting it by m/z and renumbering each peak's index
    pub fn set_peaks(&mut self, mut peaks: Vec<CentroidPeak>) {
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        for (i, p) in peaks.iter_mut().enumerate() {
            p.index = i as u32;
        }
        self.peaks = peaks;
    }

    /// Replace the peak list from parallel m/z and intensity values
    pub fn set_mz_intensity_pairs<I: IntoIterator<Item = (f64, f32)>>(&mut self, pairs: I) {
        let peaks = pairs
            .into_iter()
            .map(|(mz, intensity)| CentroidPeak::new(mz, intensity, 0))
            .collect();
        self.set_peaks(peaks);
    }

    pub fn mz_intensity_pairs(&self) -> Vec<(f64, f32)> {
        self.peaks.iter().map(|p| (p.mz, p.intensity)).collect()
    }

    /// Total ion current
    pub fn tic(&self) -> f32 {
        self.peaks.iter().map(|p| p.intensity).sum()
    }

    /// The scan number of this spectrum within its source file.
    ///
    /// The native id is tried first, then the spectrum title, then a `scans`
    /// parameter. Falls back to the one-based index of the spectrum.
    pub fn scan_number(&self) -> u32 {
        scan_number_from_id(&self.description.id)
            .or_else(|| self.description.title().and_then(scan_number_from_id))
            .or_else(|| {
                self.description
                    .get_param_by_name("scans")
                    .and_then(|p| p.coerce::<u32>().ok())
            })
            .unwrap_or(self.description.index as u32 + 1)
    }

    pub fn add_param(&mut self, param: Param) {
        self.description.add_param(param);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scan_number_from_id() {
        assert_eq!(
            scan_number_from_id("controllerType=0 controllerNumber=1 scan=48"),
            Some(48)
        );
        assert_eq!(scan_number_from_id("scan=12"), Some(12));
        assert_eq!(
            scan_number_from_id("MouseBrain-Z-T-1.25740.25740.2 File:\"x.raw\""),
            Some(25740)
        );
        assert_eq!(scan_number_from_id("17"), Some(17));
        assert_eq!(scan_number_from_id("nothing here"), None);
        // Packed ids of later files overflow a scan number
        assert_eq!(scan_number_from_id("scan=4294967298"), None);
    }

    #[test]
    fn test_scan_number_fallbacks() {
        let mut spec = Spectrum::default();
        spec.description.index = 4;
        assert_eq!(spec.scan_number(), 5);

        spec.add_param(Param::new_key_value("scans", "99"));
        assert_eq!(spec.scan_number(), 99);

        spec.description.set_title("run.33.33.2");
        assert_eq!(spec.scan_number(), 33);

        spec.set_id("scan=7");
        assert_eq!(spec.scan_number(), 7);

        spec.set_id("scan=8589934593");
        assert_eq!(spec.scan_number(), 33);
    }

    #[test]
    fn test_peaks_sorted_and_indexed() {
        let mut spec = Spectrum::default();
        spec.set_mz_intensity_pairs(vec![(300.0, 5.0), (100.0, 1.0), (200.0, 2.0)]);
        let mzs: Vec<f64> = spec.peaks().iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![100.0, 200.0, 300.0]);
        assert_eq!(spec.peaks()[2].index, 2);
        assert_eq!(spec.tic(), 8.0);
    }
}

//! Single-pass merging by folding member spectra into the first one, pair by pair.
//!
//! These are the merge methods that predate the binned consensus. Each is
//! addressed by a numeric code that the command line exposes as `--merge-method`.
use std::fmt::Display;

use mzpeaks::CentroidPeak;

use crate::spectrum::Spectrum;

use super::binning::normalize_intensities;
use super::error::MergeError;

pub mod cluster;
pub mod interpolation;
pub mod rank;

use interpolation::Combination;

/// The weight given to the incoming spectrum in every pairwise merge
pub const MERGE_WEIGHT: f64 = 1.0;

/// The peak-cluster merge keeps only this many of the most intense peaks
pub const MAX_CLUSTER_PEAKS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyMergeMethod {
    Concatenate = 1,
    InterpolateAffine = 2,
    InterpolateViceVersa = 5,
    InterpolateMin = 6,
    InterpolateMax = 7,
    GlobalRank = 9,
    RegionRank = 10,
    PeakCluster = 11,
}

impl LegacyMergeMethod {
    pub const fn code(&self) -> u32 {
        *self as u32
    }

    /// Fold the peaks of `from` into `into`
    pub fn merge_two(&self, into: &mut Vec<CentroidPeak>, from: &[CentroidPeak], weight: f64) {
        match self {
            Self::Concatenate => {
                into.extend(
                    from.iter()
                        .map(|p| CentroidPeak::new(p.mz, (p.intensity as f64 * weight) as f32, 0)),
                );
                into.sort_by(|a, b| a.mz.total_cmp(&b.mz));
            }
            Self::InterpolateAffine => {
                let (shift, scale) = interpolation::find_best_affine_transform(into, from, weight);
                interpolation::merge(into, from, weight, Combination::Average, shift, scale);
            }
            Self::InterpolateViceVersa => interpolation::merge_vice_versa(into, from, weight),
            Self::InterpolateMin => {
                interpolation::merge(into, from, weight, Combination::Min, 0.0, 1.0)
            }
            Self::InterpolateMax => {
                interpolation::merge(into, from, weight, Combination::Max, 0.0, 1.0)
            }
            Self::GlobalRank => rank::merge_min_max(into, from, weight, false),
            Self::RegionRank => rank::merge_min_max(into, from, weight, true),
            Self::PeakCluster => {
                // Clusters come back intensity ordered, restore m/z order for the next fold
                cluster::merge(into, from, weight);
                into.sort_by(|a, b| a.mz.total_cmp(&b.mz));
            }
        }
    }

    /// Merge a whole set: copy the first member and fold every other member into it.
    ///
    /// Returns `None` for an empty set.
    pub fn merge_spectra_set(&self, members: &[Spectrum], normalize: bool) -> Option<Spectrum> {
        let (first, rest) = members.split_first()?;
        let prepare = |spectrum: &Spectrum| {
            let mut peaks = spectrum.peaks().to_vec();
            if normalize {
                normalize_intensities(&mut peaks);
            }
            peaks
        };

        let mut merged = first.clone();
        let mut peaks = prepare(first);
        for member in rest {
            self.merge_two(&mut peaks, &prepare(member), MERGE_WEIGHT);
        }
        if *self == Self::PeakCluster {
            peaks.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
            peaks.truncate(MAX_CLUSTER_PEAKS);
        }
        merged.set_peaks(peaks);
        Some(merged)
    }
}

impl TryFrom<u32> for LegacyMergeMethod {
    type Error = MergeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        let method = match value {
            1 => Self::Concatenate,
            2 => Self::InterpolateAffine,
            5 => Self::InterpolateViceVersa,
            6 => Self::InterpolateMin,
            7 => Self::InterpolateMax,
            9 => Self::GlobalRank,
            10 => Self::RegionRank,
            11 => Self::PeakCluster,
            _ => return Err(MergeError::UnknownMergeMethod(value)),
        };
        Ok(method)
    }
}

impl Display for LegacyMergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::SpectrumDescription;

    fn spectrum(id: &str, pairs: &[(f64, f32)]) -> Spectrum {
        let mut spec = Spectrum::new(SpectrumDescription::default(), Vec::new());
        spec.set_id(id);
        spec.set_mz_intensity_pairs(pairs.iter().copied());
        spec
    }

    #[test]
    fn test_codes() {
        for code in [1, 2, 5, 6, 7, 9, 10, 11] {
            let method = LegacyMergeMethod::try_from(code).unwrap();
            assert_eq!(method.code(), code);
        }
        for code in [0, 3, 4, 8, 12] {
            assert!(matches!(
                LegacyMergeMethod::try_from(code),
                Err(MergeError::UnknownMergeMethod(c)) if c == code
            ));
        }
    }

    #[test]
    fn test_concatenate_set() {
        let a = spectrum("scan=1", &[(100.0, 1.0), (300.0, 3.0)]);
        let b = spectrum("scan=2", &[(200.0, 2.0)]);
        let merged = LegacyMergeMethod::Concatenate
            .merge_spectra_set(&[a, b], false)
            .unwrap();
        assert_eq!(merged.id(), "scan=1");
        assert_eq!(
            merged.mz_intensity_pairs(),
            vec![(100.0, 1.0), (200.0, 2.0), (300.0, 3.0)]
        );
        assert!(LegacyMergeMethod::Concatenate
            .merge_spectra_set(&[], false)
            .is_none());
    }

    #[test]
    fn test_peak_cluster_set_truncates() {
        let a_pairs: Vec<(f64, f32)> = (0..150).map(|i| (100.0 + i as f64 * 2.0, i as f32)).collect();
        let a = spectrum("scan=1", &a_pairs);
        let b = spectrum("scan=2", &[(100.1, 1000.0)]);
        let merged = LegacyMergeMethod::PeakCluster
            .merge_spectra_set(&[a, b], false)
            .unwrap();
        assert_eq!(merged.peaks().len(), MAX_CLUSTER_PEAKS);
        assert!(merged.peaks().windows(2).all(|w| w[0].mz <= w[1].mz));
        // The boosted first peak survives truncation
        assert!((merged.peaks()[0].mz - 100.1).abs() < 1e-6);
    }

    #[test]
    fn test_region_rank_set() {
        let a = spectrum("scan=1", &[(100.0, 1.0), (200.0, 5.0)]);
        let b = spectrum("scan=2", &[(100.0, 1.0), (200.0, 5.0)]);
        let merged = LegacyMergeMethod::RegionRank
            .merge_spectra_set(&[a, b], true)
            .unwrap();
        let intensities: Vec<f32> = merged.peaks().iter().map(|p| p.intensity).collect();
        assert_eq!(intensities, vec![2.0, 2.0]);
    }
}

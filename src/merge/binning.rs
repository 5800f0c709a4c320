//! Fixed-width m/z binning for consensus spectra.
use std::collections::BTreeMap;

use mzpeaks::CentroidPeak;

/// The total intensity of a spectrum after [`normalize_intensities`]
pub const NORMALIZED_TOTAL_INTENSITY: f32 = 1000.0;

/// Square-root transform the intensities, then scale them so they sum to
/// [`NORMALIZED_TOTAL_INTENSITY`]. Peaks with no total intensity are left alone.
pub fn normalize_intensities(peaks: &mut [CentroidPeak]) {
    let total: f64 = peaks.iter().map(|p| (p.intensity.max(0.0) as f64).sqrt()).sum();
    if total <= 0.0 {
        return;
    }
    let scale = NORMALIZED_TOTAL_INTENSITY as f64 / total;
    for p in peaks.iter_mut() {
        p.intensity = ((p.intensity.max(0.0) as f64).sqrt() * scale) as f32;
    }
}

/// All the signal of one spectrum that fell into one bin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinnedPeak {
    pub bin: i64,
    pub mz: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MzBinning {
    pub width: f64,
    pub offset: f64,
}

impl MzBinning {
    pub fn new(width: f64, offset: f64) -> Self {
        Self { width, offset }
    }

    pub fn bin_of(&self, mz: f64) -> i64 {
        (mz / self.width + self.offset).floor() as i64
    }

    /// Bin a peak list, combining peaks of the same bin into their summed intensity
    /// at their intensity weighted m/z. The result is sorted by bin.
    pub fn bin_peaks(&self, peaks: &[CentroidPeak]) -> Vec<BinnedPeak> {
        let mut binned: Vec<BinnedPeak> = Vec::with_capacity(peaks.len());
        let mut mz_weight = 0.0;
        for peak in peaks {
            let bin = self.bin_of(peak.mz);
            let intensity = peak.intensity as f64;
            match binned.last_mut() {
                Some(last) if last.bin == bin => {
                    mz_weight += peak.mz * intensity;
                    last.intensity += intensity;
                    last.mz = if last.intensity > 0.0 {
                        mz_weight / last.intensity
                    } else {
                        last.mz
                    };
                }
                _ => {
                    mz_weight = peak.mz * intensity;
                    binned.push(BinnedPeak {
                        bin,
                        mz: peak.mz,
                        intensity,
                    });
                }
            }
        }
        binned.sort_by_key(|b| b.bin);
        binned
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct BinTotals {
    intensity: f64,
    weighted_mz: f64,
    mz: f64,
    votes: u32,
}

/// Sums binned peak lists of any number of spectra
#[derive(Debug, Default, Clone)]
pub struct BinAccumulator {
    bins: BTreeMap<i64, BinTotals>,
    members: usize,
}

impl BinAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, binned: &[BinnedPeak]) {
        self.members += 1;
        for peak in binned {
            let totals = self.bins.entry(peak.bin).or_default();
            totals.intensity += peak.intensity;
            totals.weighted_mz += peak.mz * peak.intensity;
            totals.mz += peak.mz;
            totals.votes += 1;
        }
    }

    /// The number of peak lists added so far
    pub fn members(&self) -> usize {
        self.members
    }

    /// How many members contributed to `bin`
    pub fn votes(&self, bin: i64) -> u32 {
        self.bins.get(&bin).map(|t| t.votes).unwrap_or_default()
    }

    /// Convert back to a continuous peak list: the mean intensity over all members
    /// at the intensity weighted m/z of each bin
    pub fn into_peaks(self) -> Vec<CentroidPeak> {
        let n = self.members.max(1) as f64;
        self.bins
            .into_values()
            .enumerate()
            .map(|(i, totals)| {
                let mz = if totals.intensity > 0.0 {
                    totals.weighted_mz / totals.intensity
                } else {
                    totals.mz / totals.votes as f64
                };
                CentroidPeak::new(mz, (totals.intensity / n) as f32, i as u32)
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn peaks(pairs: &[(f64, f32)]) -> Vec<CentroidPeak> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (mz, int))| CentroidPeak::new(*mz, *int, i as u32))
            .collect()
    }

    #[test]
    fn test_normalize() {
        let mut ps = peaks(&[(100.0, 4.0), (200.0, 16.0), (300.0, 0.0)]);
        normalize_intensities(&mut ps);
        let total: f32 = ps.iter().map(|p| p.intensity).sum();
        assert!((total - 1000.0).abs() < 1e-2);
        assert!((ps[1].intensity / ps[0].intensity - 2.0).abs() < 1e-5);
        assert_eq!(ps[2].intensity, 0.0);

        let mut empty = peaks(&[(100.0, 0.0)]);
        normalize_intensities(&mut empty);
        assert_eq!(empty[0].intensity, 0.0);
    }

    #[test]
    fn test_bin_of() {
        let binning = MzBinning::new(1.000508, 0.32);
        assert_eq!(binning.bin_of(0.0), 0);
        assert_eq!(binning.bin_of(500.2), 500);
        assert_eq!(binning.bin_of(501.0), 501);
    }

    #[test]
    fn test_bin_peaks_combines_within_bin() {
        let binning = MzBinning::new(1.0, 0.0);
        let binned = binning.bin_peaks(&peaks(&[(100.2, 1.0), (100.6, 3.0), (101.5, 2.0)]));
        assert_eq!(binned.len(), 2);
        assert_eq!(binned[0].bin, 100);
        assert_eq!(binned[0].intensity, 4.0);
        assert!((binned[0].mz - 100.5).abs() < 1e-9);
        assert_eq!(binned[1].bin, 101);
    }

    #[test]
    fn test_accumulate_and_unbin() {
        let binning = MzBinning::new(1.0, 0.0);
        let mut acc = BinAccumulator::new();
        acc.add(&binning.bin_peaks(&peaks(&[(100.2, 2.0), (250.0, 4.0)])));
        acc.add(&binning.bin_peaks(&peaks(&[(100.4, 6.0)])));
        assert_eq!(acc.members(), 2);
        assert_eq!(acc.votes(100), 2);
        assert_eq!(acc.votes(250), 1);
        assert_eq!(acc.votes(7), 0);

        let out = acc.into_peaks();
        assert_eq!(out.len(), 2);
        assert!((out[0].mz - 100.35).abs() < 1e-9);
        assert_eq!(out[0].intensity, 4.0);
        assert_eq!(out[1].intensity, 2.0);
        assert_eq!(out[1].index, 1);
    }

    #[test]
    fn test_zero_intensity_bins_keep_mean_mz() {
        let binning = MzBinning::new(1.0, 0.0);
        let mut acc = BinAccumulator::new();
        acc.add(&binning.bin_peaks(&peaks(&[(100.2, 0.0)])));
        acc.add(&binning.bin_peaks(&peaks(&[(100.4, 0.0)])));
        let out = acc.into_peaks();
        assert!((out[0].mz - 100.3).abs() < 1e-9);
        assert_eq!(out[0].intensity, 0.0);
    }
}

use mzpeaks::CentroidPeak;

use super::interpolation::interpolate;

/// The number of equal-width m/z regions used for region-local ranking
pub const XCORR_REGIONS: usize = 10;

fn region_of(mz: f64, low: f64, high: f64) -> usize {
    if high <= low {
        return 0;
    }
    let region = ((mz - low) / (high - low) * XCORR_REGIONS as f64).floor() as usize;
    region.min(XCORR_REGIONS - 1)
}

/// Score each peak by its intensity rank, from 1 for the most intense peak down to 0
/// for the least intense. With `use_regions` peaks are only ranked against peaks of
/// the same m/z region.
pub fn rank_scores(peaks: &[CentroidPeak], use_regions: bool) -> Vec<f32> {
    let mut scores = vec![0.0f32; peaks.len()];
    let (Some(first), Some(last)) = (peaks.first(), peaks.last()) else {
        return scores;
    };
    let n_groups = if use_regions { XCORR_REGIONS } else { 1 };
    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n_groups];
    for (i, p) in peaks.iter().enumerate() {
        let group = if use_regions {
            region_of(p.mz, first.mz, last.mz)
        } else {
            0
        };
        groups[group].push(i);
    }
    for mut group in groups {
        group.sort_by(|a, b| peaks[*b].intensity.total_cmp(&peaks[*a].intensity));
        let n = group.len();
        for (rank, i) in group.into_iter().enumerate() {
            scores[i] = if n == 1 {
                1.0
            } else {
                1.0 - rank as f32 / (n - 1) as f32
            };
        }
    }
    scores
}

/// Replace the intensities of `into` by its rank scores plus the interpolated rank
/// scores of `from`
pub fn merge_min_max(into: &mut [CentroidPeak], from: &[CentroidPeak], weight: f64, use_regions: bool) {
    let from_scores = rank_scores(from, use_regions);
    let from_ranked: Vec<CentroidPeak> = from
        .iter()
        .zip(from_scores)
        .map(|(p, score)| CentroidPeak::new(p.mz, score, p.index))
        .collect();
    let into_scores = rank_scores(into, use_regions);
    for (peak, score) in into.iter_mut().zip(into_scores) {
        let other = interpolate(&from_ranked, peak.mz) as f64 * weight;
        peak.intensity = (score as f64 + other) as f32;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn peaks(pairs: &[(f64, f32)]) -> Vec<CentroidPeak> {
        pairs
            .iter()
            .map(|(mz, i)| CentroidPeak::new(*mz, *i, 0))
            .collect()
    }

    #[test]
    fn test_global_ranks() {
        let ps = peaks(&[(100.0, 5.0), (200.0, 50.0), (300.0, 10.0)]);
        assert_eq!(rank_scores(&ps, false), vec![0.0, 1.0, 0.5]);
        assert!(rank_scores(&[], true).is_empty());
    }

    #[test]
    fn test_region_ranks() {
        // The first and last peak fall in different regions, so both rank first
        let ps = peaks(&[(100.0, 5.0), (101.0, 50.0), (1000.0, 1.0)]);
        assert_eq!(rank_scores(&ps, true), vec![0.0, 1.0, 1.0]);
        assert_eq!(rank_scores(&ps, false), vec![0.5, 1.0, 0.0]);
    }

    #[test]
    fn test_merge_min_max() {
        let mut into = peaks(&[(100.0, 5.0), (200.0, 50.0)]);
        let from = peaks(&[(100.0, 50.0), (200.0, 5.0)]);
        merge_min_max(&mut into, &from, 1.0, false);
        assert_eq!(into[0].intensity, 1.0);
        assert_eq!(into[1].intensity, 1.0);
    }
}

use mzpeaks::{CentroidPeak, Tolerance};

/// Peaks closer than this to the running cluster center are combined
pub const PEAK_CLUSTER_TOLERANCE: Tolerance = Tolerance::Da(0.5);

/// Pool the peaks of both spectra, `from` scaled by `weight`, and collapse
/// neighbouring peaks into their intensity-weighted centroid. The result is ordered
/// by decreasing intensity.
pub fn merge(into: &mut Vec<CentroidPeak>, from: &[CentroidPeak], weight: f64) {
    let mut pooled: Vec<CentroidPeak> = into
        .iter()
        .cloned()
        .chain(
            from.iter()
                .map(|p| CentroidPeak::new(p.mz, (p.intensity as f64 * weight) as f32, 0)),
        )
        .collect();
    pooled.sort_by(|a, b| a.mz.total_cmp(&b.mz));

    let mut clusters: Vec<(f64, f64, f64)> = Vec::new();
    for peak in pooled {
        let intensity = peak.intensity as f64;
        match clusters.last_mut() {
            Some((weighted_mz, total, center))
                if PEAK_CLUSTER_TOLERANCE.test(peak.mz, *center) =>
            {
                *weighted_mz += peak.mz * intensity;
                *total += intensity;
                if *total > 0.0 {
                    *center = *weighted_mz / *total;
                }
            }
            _ => clusters.push((peak.mz * intensity, intensity, peak.mz)),
        }
    }

    let mut merged: Vec<CentroidPeak> = clusters
        .into_iter()
        .map(|(_, total, center)| CentroidPeak::new(center, total as f32, 0))
        .collect();
    merged.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
    *into = merged;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cluster_merge() {
        let mut into = vec![
            CentroidPeak::new(100.0, 10.0, 0),
            CentroidPeak::new(300.0, 2.0, 0),
        ];
        let from = vec![
            CentroidPeak::new(100.2, 10.0, 0),
            CentroidPeak::new(200.0, 5.0, 0),
        ];
        merge(&mut into, &from, 1.0);
        assert_eq!(into.len(), 3);
        assert!((into[0].mz - 100.1).abs() < 1e-9);
        assert_eq!(into[0].intensity, 20.0);
        assert_eq!(into[1].mz, 200.0);
        assert_eq!(into[2].mz, 300.0);
    }

    #[test]
    fn test_cluster_weight() {
        let mut into = vec![CentroidPeak::new(100.0, 1.0, 0)];
        merge(&mut into, &[CentroidPeak::new(500.0, 4.0, 0)], 0.5);
        assert_eq!(into[0].mz, 500.0);
        assert_eq!(into[0].intensity, 2.0);
    }
}

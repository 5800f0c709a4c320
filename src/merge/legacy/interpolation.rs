use mzpeaks::CentroidPeak;

/// How an interpolated intensity is folded into an existing peak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combination {
    Average,
    Min,
    Max,
}

const SHIFT_STEP: f64 = 0.05;
const SHIFT_STEPS: i32 = 10;
const SCALE_STEP: f64 = 0.0005;
const SCALE_STEPS: i32 = 4;

/// The intensity of the line through `peaks` at `mz`, zero outside the peaks' span.
/// `peaks` must be sorted by m/z.
pub fn interpolate(peaks: &[CentroidPeak], mz: f64) -> f32 {
    let i = peaks.partition_point(|p| p.mz < mz);
    let Some(right) = peaks.get(i) else {
        return 0.0;
    };
    if right.mz == mz {
        return right.intensity;
    }
    if i == 0 {
        return 0.0;
    }
    let left = &peaks[i - 1];
    let t = (mz - left.mz) / (right.mz - left.mz);
    (left.intensity as f64 + t * (right.intensity as f64 - left.intensity as f64)) as f32
}

fn transformed(peaks: &[CentroidPeak], shift: f64, scale: f64) -> Vec<CentroidPeak> {
    peaks
        .iter()
        .map(|p| CentroidPeak::new(p.mz * scale + shift, p.intensity, p.index))
        .collect()
}

/// Interpolate `from`, moved by `mz * scale + shift`, at every peak of `into` and
/// combine the two intensities
pub fn merge(
    into: &mut [CentroidPeak],
    from: &[CentroidPeak],
    weight: f64,
    combination: Combination,
    shift: f64,
    scale: f64,
) {
    let from = transformed(from, shift, scale);
    for peak in into.iter_mut() {
        let own = peak.intensity as f64;
        let other = interpolate(&from, peak.mz) as f64 * weight;
        peak.intensity = match combination {
            Combination::Average => (own + other) / (1.0 + weight),
            Combination::Min => own.min(other),
            Combination::Max => own.max(other),
        } as f32;
    }
}

fn alignment_score(into: &[CentroidPeak], from: &[CentroidPeak]) -> f64 {
    into.iter()
        .map(|p| p.intensity as f64 * interpolate(from, p.mz) as f64)
        .sum()
}

/// Grid search for the shift and scale of `from` that best overlays it on `into`.
/// Ties keep the identity transform.
pub fn find_best_affine_transform(into: &[CentroidPeak], from: &[CentroidPeak], weight: f64) -> (f64, f64) {
    let mut best = (0.0, 1.0);
    let mut best_score = alignment_score(into, from) * weight;
    for scale_step in -SCALE_STEPS..=SCALE_STEPS {
        let scale = 1.0 + scale_step as f64 * SCALE_STEP;
        for shift_step in -SHIFT_STEPS..=SHIFT_STEPS {
            let shift = shift_step as f64 * SHIFT_STEP;
            let score = alignment_score(into, &transformed(from, shift, scale)) * weight;
            if score > best_score {
                best_score = score;
                best = (shift, scale);
            }
        }
    }
    best
}

/// Interpolate each spectrum at the other's peaks, add, and keep both sets of peaks
pub fn merge_vice_versa(into: &mut Vec<CentroidPeak>, from: &[CentroidPeak], weight: f64) {
    let original: &[CentroidPeak] = into.as_slice();
    let forward = original.iter().map(|p| {
        let intensity = p.intensity as f64 + weight * interpolate(from, p.mz) as f64;
        CentroidPeak::new(p.mz, intensity as f32, 0)
    });
    let backward = from.iter().map(|p| {
        let intensity = weight * p.intensity as f64 + interpolate(original, p.mz) as f64;
        CentroidPeak::new(p.mz, intensity as f32, 0)
    });
    let mut merged: Vec<CentroidPeak> = forward.chain(backward).collect();
    merged.sort_by(|a, b| a.mz.total_cmp(&b.mz));
    *into = merged;
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
    fn test_interpolate() {
        let ps = peaks(&[(100.0, 10.0), (200.0, 20.0)]);
        assert_eq!(interpolate(&ps, 150.0), 15.0);
        assert_eq!(interpolate(&ps, 100.0), 10.0);
        assert_eq!(interpolate(&ps, 200.0), 20.0);
        assert_eq!(interpolate(&ps, 50.0), 0.0);
        assert_eq!(interpolate(&ps, 250.0), 0.0);
        assert_eq!(interpolate(&[], 250.0), 0.0);
    }

    #[test]
    fn test_merge_combinations() {
        let from = peaks(&[(100.0, 10.0), (200.0, 30.0)]);
        let mut avg = peaks(&[(150.0, 40.0)]);
        merge(&mut avg, &from, 1.0, Combination::Average, 0.0, 1.0);
        assert_eq!(avg[0].intensity, 30.0);

        let mut min = peaks(&[(150.0, 40.0)]);
        merge(&mut min, &from, 1.0, Combination::Min, 0.0, 1.0);
        assert_eq!(min[0].intensity, 20.0);

        let mut max = peaks(&[(150.0, 40.0)]);
        merge(&mut max, &from, 1.0, Combination::Max, 0.0, 1.0);
        assert_eq!(max[0].intensity, 40.0);
    }

    #[test]
    fn test_best_transform_recovers_shift() {
        let into = peaks(&[(100.0, 1.0), (100.1, 0.0), (300.0, 0.0), (300.2, 5.0), (300.4, 0.0)]);
        let from = peaks(&[(299.8, 0.0), (300.0, 5.0), (300.2, 0.0)]);
        let (shift, scale) = find_best_affine_transform(&into, &from, 1.0);
        // The apex of `from` lands on the apex of `into`
        assert!((300.0 * scale + shift - 300.2).abs() < 1e-6);
        assert_eq!(find_best_affine_transform(&into, &[], 1.0), (0.0, 1.0));
    }

    #[test]
    fn test_vice_versa_keeps_both() {
        let mut into = peaks(&[(100.0, 10.0), (200.0, 10.0)]);
        let from = peaks(&[(150.0, 4.0)]);
        merge_vice_versa(&mut into, &from, 1.0);
        assert_eq!(into.len(), 3);
        assert_eq!(into[1].mz, 150.0);
        assert_eq!(into[1].intensity, 14.0);
        assert_eq!(into[0].intensity, 10.0);
    }
}

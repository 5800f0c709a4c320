use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mzmerge::merge::{ConsensusBuilder, LegacyMergeMethod, MergeConfig};
use mzmerge::spectrum::{Precursor, SelectedIon};
use mzmerge::{Spectrum, SpectrumDescription};

/// Deterministic spectra sharing most of their fragment ions, like the members of a cluster
fn cluster_members(n: usize, peaks_per_spectrum: usize) -> Vec<Spectrum> {
    (0..n)
        .map(|i| {
            let mut spec = Spectrum::new(SpectrumDescription::default(), Vec::new());
            spec.set_id(format!("scan={}", i + 1));
            spec.set_mz_intensity_pairs((0..peaks_per_spectrum).map(|j| {
                let jitter = ((i * 7 + j * 13) % 11) as f64 * 0.001;
                let mz = 150.0 + j as f64 * 3.7 + jitter;
                let intensity = (((i + 3) * (j + 5)) % 97 + 1) as f32;
                (mz, intensity)
            }));
            spec.description.precursor = Some(Precursor {
                ions: vec![SelectedIon::new(
                    652.3356 + i as f64 * 1e-4,
                    0.0,
                    if i % 3 == 0 { None } else { Some(2) },
                )],
                ..Default::default()
            });
            spec
        })
        .collect()
}

fn consensus(c: &mut Criterion) {
    let builder = ConsensusBuilder::new(&MergeConfig::default());
    let small = cluster_members(5, 200);
    let large = cluster_members(200, 200);
    c.bench_function("consensus_5x200", |b| {
        b.iter(|| builder.build(black_box(&small), 1))
    });
    c.bench_function("consensus_200x200", |b| {
        b.iter(|| builder.build(black_box(&large), 1))
    });
}

fn legacy(c: &mut Criterion) {
    let members = cluster_members(5, 200);
    for method in [
        LegacyMergeMethod::InterpolateAffine,
        LegacyMergeMethod::RegionRank,
        LegacyMergeMethod::PeakCluster,
    ] {
        c.bench_function(&format!("legacy_{method:?}_5x200"), |b| {
            b.iter(|| method.merge_spectra_set(black_box(&members), true))
        });
    }
}

criterion_group!(benches, consensus, legacy);
criterion_main!(benches);

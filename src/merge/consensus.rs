//! Building one consensus spectrum from a group of member spectra.
use log::trace;
use parking_lot::Mutex;

use crate::spectrum::{reconcile_candidates, MassChargeCandidate, Spectrum};

use super::binning::{normalize_intensities, BinAccumulator, MzBinning};
use super::config::MergeConfig;

/// Combines merge set members by binning their peaks on a shared m/z grid
#[derive(Debug, Clone)]
pub struct ConsensusBuilder {
    binning: MzBinning,
    normalize: bool,
    split_precursor_candidates: bool,
    charge_error_tolerance: u32,
    precursor_tolerance: mzpeaks::Tolerance,
}

impl ConsensusBuilder {
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            binning: MzBinning::new(config.bin_width, config.bin_offset),
            normalize: config.normalize,
            split_precursor_candidates: config.split_precursor_candidates,
            charge_error_tolerance: config.charge_error_tolerance,
            precursor_tolerance: config.precursor_tolerance,
        }
    }

    /// Merge `members` into the consensus spectra of destination scan `merged_scan_nr`.
    ///
    /// The first member provides the metadata of the result. Without precursor
    /// splitting this yields one spectrum `scan=<merged_scan_nr>` carrying every
    /// reconciled precursor hypothesis, with splitting one spectrum per hypothesis
    /// numbered `scan=<merged_scan_nr * 100 + k>`. No members means no spectra.
    pub fn build(&self, members: &[Spectrum], merged_scan_nr: u32) -> Vec<Spectrum> {
        let Some(template) = members.first() else {
            return Vec::new();
        };

        let mut accumulator = BinAccumulator::new();
        let mut candidates: Vec<MassChargeCandidate> = Vec::new();
        for member in members {
            candidates.extend(member.mass_charge_candidates());
            let mut peaks = member.peaks().to_vec();
            if self.normalize {
                normalize_intensities(&mut peaks);
            }
            accumulator.add(&self.binning.bin_peaks(&peaks));
        }
        let candidates = reconcile_candidates(
            &candidates,
            self.charge_error_tolerance,
            self.precursor_tolerance,
        );

        let mut consensus = template.clone();
        consensus.set_peaks(accumulator.into_peaks());
        consensus
            .description
            .params
            .retain(|p| p.name != "scans");
        trace!(
            "Merged {} spectra into scan {merged_scan_nr} with {} peaks and {} precursor candidates",
            members.len(),
            consensus.peaks().len(),
            candidates.len()
        );

        self.assign_identity(consensus, &candidates, merged_scan_nr as u64)
    }

    /// Give `spectrum` the identity of destination scan `scan_nr` with `candidates`
    /// as its precursor hypotheses, one copy per candidate in split mode
    pub fn assign_identity(
        &self,
        mut spectrum: Spectrum,
        candidates: &[MassChargeCandidate],
        scan_nr: u64,
    ) -> Vec<Spectrum> {
        if self.split_precursor_candidates {
            return split_by_candidate(&spectrum, candidates, scan_nr);
        }
        label_consensus(&mut spectrum, scan_nr);
        if candidates.is_empty() {
            if let Some(precursor) = spectrum.description.precursor.as_mut() {
                precursor.ions.clear();
            }
        } else {
            spectrum.set_mass_charge_candidates(candidates);
        }
        vec![spectrum]
    }

    /// [`ConsensusBuilder::build`] and append the result to a shared output list
    /// in a single critical section
    pub fn build_into(&self, members: &[Spectrum], merged_scan_nr: u32, output: &Mutex<Vec<Spectrum>>) {
        let spectra = self.build(members, merged_scan_nr);
        if !spectra.is_empty() {
            output.lock().extend(spectra);
        }
    }
}

/// One copy of `spectrum` per precursor candidate, numbered `scan=<scan_nr * 100 + k>`
/// with `k` counting from 1
fn split_by_candidate(
    spectrum: &Spectrum,
    candidates: &[MassChargeCandidate],
    scan_nr: u64,
) -> Vec<Spectrum> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, mcc)| {
            let mut copy = spectrum.clone();
            label_consensus(&mut copy, scan_nr * 100 + i as u64 + 1);
            copy.set_mass_charge_candidates(std::slice::from_ref(mcc));
            copy
        })
        .collect()
}

fn label_consensus(spectrum: &mut Spectrum, scan_nr: u64) {
    let id = format!("scan={scan_nr}");
    spectrum.description.set_title(id.clone());
    spectrum.set_id(id);
}

//! Precursor mass/charge hypotheses.
//!
//! A spectrum whose precursor charge could not be determined carries several
//! [`MassChargeCandidate`]s. Consensus building pools the candidates of every
//! member and collapses near-duplicates with [`reconcile_candidates`].
use mzpeaks::Tolerance;

use crate::params::ControlledVocabulary;
use crate::utils::{mass_charge_ratio, neutral_mass};

use super::scan_properties::{IsolationWindow, SelectedIon};
use super::spectrum::Spectrum;

/// Charge states assumed for a precursor reported without a charge
pub const DEFAULT_CHARGE_HYPOTHESES: [i32; 2] = [2, 3];

const ACCURATE_MASS_ACCESSION: u32 = 1000921;

/// A (neutral mass, charge, precursor m/z) hypothesis for a spectrum's precursor ion
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassChargeCandidate {
    pub mass: f64,
    pub charge: i32,
    pub precursor_mz: f64,
}

impl MassChargeCandidate {
    pub fn new(mass: f64, charge: i32, precursor_mz: f64) -> Self {
        Self {
            mass,
            charge,
            precursor_mz,
        }
    }

    pub fn from_precursor_mz(precursor_mz: f64, charge: i32) -> Self {
        Self::new(neutral_mass(precursor_mz, charge), charge, precursor_mz)
    }

    /// Build a [`SelectedIon`] annotating this hypothesis
    pub fn to_selected_ion(&self) -> SelectedIon {
        let mut ion = SelectedIon::new(self.precursor_mz, 0.0, Some(self.charge));
        ion.params.push(ControlledVocabulary::MS.param_val(
            "accurate mass",
            ACCURATE_MASS_ACCESSION,
            self.mass,
        ));
        ion
    }
}

impl Spectrum {
    /// Every precursor hypothesis this spectrum supports.
    ///
    /// A selected ion with a known charge gives one candidate, one without gives one
    /// candidate per [`DEFAULT_CHARGE_HYPOTHESES`] entry.
    pub fn mass_charge_candidates(&self) -> Vec<MassChargeCandidate> {
        let mut candidates = Vec::new();
        if let Some(precursor) = self.precursor() {
            for ion in precursor.iter() {
                match ion.charge {
                    Some(z) if z != 0 => {
                        candidates.push(MassChargeCandidate::from_precursor_mz(ion.mz, z))
                    }
                    _ => candidates.extend(
                        DEFAULT_CHARGE_HYPOTHESES
                            .iter()
                            .map(|z| MassChargeCandidate::from_precursor_mz(ion.mz, *z)),
                    ),
                }
            }
        }
        candidates
    }

    /// Replace the selected ions of the precursor with one ion per candidate.
    /// The isolation window is centered on the last candidate's m/z.
    pub fn set_mass_charge_candidates(&mut self, candidates: &[MassChargeCandidate]) {
        let precursor = self.precursor_mut();
        precursor.ions.clear();
        for mcc in candidates {
            precursor.add_ion(mcc.to_selected_ion());
            precursor.isolation_window = IsolationWindow {
                target: mcc.precursor_mz as f32,
                ..precursor.isolation_window.clone()
            };
        }
    }
}

/// Collapse duplicate precursor hypotheses.
///
/// Candidates are ordered by (charge, mass). Two candidates are duplicates when their
/// charges differ by at most `charge_error_tolerance` and their neutral masses agree
/// within `mass_tolerance`. A run of duplicates is replaced by one candidate carrying
/// the charge of the first member of the run and the mean mass and precursor m/z.
pub fn reconcile_candidates(
    candidates: &[MassChargeCandidate],
    charge_error_tolerance: u32,
    mass_tolerance: Tolerance,
) -> Vec<MassChargeCandidate> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| a.charge.cmp(&b.charge).then(a.mass.total_cmp(&b.mass)));

    let mut groups: Vec<Vec<MassChargeCandidate>> = Vec::new();
    for mcc in sorted {
        let slot = groups.iter_mut().find(|group| {
            let head = group[0];
            head.charge.abs_diff(mcc.charge) <= charge_error_tolerance
                && mass_tolerance.test(mcc.mass, head.mass)
        });
        match slot {
            Some(group) => group.push(mcc),
            None => groups.push(vec![mcc]),
        }
    }

    groups
        .into_iter()
        .map(|group| {
            let n = group.len() as f64;
            let charge = group[0].charge;
            let mass = group.iter().map(|c| c.mass).sum::<f64>() / n;
            let precursor_mz = if group.iter().all(|c| c.charge == charge) {
                group.iter().map(|c| c.precursor_mz).sum::<f64>() / n
            } else {
                mass_charge_ratio(mass, charge)
            };
            MassChargeCandidate::new(mass, charge, precursor_mz)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::Precursor;

    #[test]
    fn test_candidates_from_precursor() {
        let mut spec = Spectrum::default();
        assert!(spec.mass_charge_candidates().is_empty());

        spec.description.precursor = Some(Precursor {
            ions: vec![SelectedIon::new(500.0, 0.0, None)],
            ..Default::default()
        });
        let mccs = spec.mass_charge_candidates();
        assert_eq!(mccs.len(), 2);
        assert_eq!(mccs[0].charge, 2);
        assert_eq!(mccs[1].charge, 3);
        assert!((mccs[0].mass - neutral_mass(500.0, 2)).abs() < 1e-9);

        spec.set_mass_charge_candidates(&[MassChargeCandidate::from_precursor_mz(650.5, 2)]);
        let mccs = spec.mass_charge_candidates();
        assert_eq!(mccs.len(), 1);
        assert_eq!(spec.precursor().unwrap().isolation_window.target, 650.5);
    }

    #[test]
    fn test_reconcile_collapses_duplicates() {
        let a = MassChargeCandidate::from_precursor_mz(500.0, 2);
        let b = MassChargeCandidate::from_precursor_mz(500.001, 2);
        let c = MassChargeCandidate::from_precursor_mz(500.0, 3);
        let merged = reconcile_candidates(&[c, a, b], 0, Tolerance::PPM(20.0));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].charge, 2);
        assert!((merged[0].precursor_mz - 500.0005).abs() < 1e-6);
        assert_eq!(merged[1].charge, 3);
    }

    #[test]
    fn test_reconcile_keeps_distinct_hypotheses() {
        let a = MassChargeCandidate::from_precursor_mz(500.0, 2);
        let b = MassChargeCandidate::from_precursor_mz(700.0, 2);
        let merged = reconcile_candidates(&[a, b], 0, Tolerance::PPM(20.0));
        assert_eq!(merged.len(), 2);
        assert!(reconcile_candidates(&[], 1, Tolerance::PPM(20.0)).is_empty());
    }

    #[test]
    fn test_reconcile_charge_tolerance() {
        // Same neutral mass reported under two charges
        let a = MassChargeCandidate::new(1500.0, 2, mass_charge_ratio(1500.0, 2));
        let b = MassChargeCandidate::new(1500.0, 3, mass_charge_ratio(1500.0, 3));
        assert_eq!(reconcile_candidates(&[a, b], 0, Tolerance::PPM(10.0)).len(), 2);
        let merged = reconcile_candidates(&[a, b], 1, Tolerance::PPM(10.0));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].charge, 2);
        assert!((merged[0].precursor_mz - mass_charge_ratio(1500.0, 2)).abs() < 1e-9);
    }
}

//! The spectrum data model shared by the readers, writers and the merge engine.
//!
//! Spectra are always centroided MSn spectra here. The peak list is a vector of
//! [`mzpeaks::CentroidPeak`] kept sorted by m/z.
pub mod candidates;
pub mod scan_properties;
#[allow(clippy::module_inception)]
pub mod spectrum;

pub use candidates::{reconcile_candidates, MassChargeCandidate, DEFAULT_CHARGE_HYPOTHESES};
pub use scan_properties::{
    Acquisition, IsolationWindow, Precursor, ScanEvent, SelectedIon,
    SignalContinuity,
};
pub use spectrum::{scan_number_from_id, Spectrum, SpectrumDescription, SPECTRUM_TITLE_ACCESSION};

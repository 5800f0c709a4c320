use mzpeaks::Tolerance;

/// The m/z bin width used when building consensus spectra
pub const DEFAULT_BIN_WIDTH: f64 = 1.000508;
/// Shifts bin boundaries away from the mass defect of common fragment ions
pub const DEFAULT_BIN_OFFSET: f64 = 0.32;

/// Run-scoped settings of a [`SpectrumMerger`](crate::merge::SpectrumMerger).
///
/// The file and spectrum budgets decide between the in-memory and the partitioned
/// executor and bound the size of every file either of them writes. Budgets are
/// clamped to at least one.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// The most input files opened at once
    pub max_open_files: usize,
    /// The most spectra routed into one intermediate bin
    pub max_spectra_per_intermediate: usize,
    /// The most consensus spectra written to one output part
    pub max_consensus_per_output: usize,
    /// The pairwise method code used by [`SpectrumMerger::merge_legacy`](crate::merge::SpectrumMerger::merge_legacy)
    pub legacy_method: u32,
    /// Square-root transform and rescale each member before combining
    pub normalize: bool,
    /// Emit one consensus spectrum per precursor hypothesis instead of one carrying all of them
    pub split_precursor_candidates: bool,
    pub charge_error_tolerance: u32,
    pub precursor_tolerance: Tolerance,
    pub bin_width: f64,
    pub bin_offset: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_open_files: 60,
            max_spectra_per_intermediate: 500_000,
            max_consensus_per_output: 200_000,
            legacy_method: 10,
            normalize: true,
            split_precursor_candidates: false,
            charge_error_tolerance: 0,
            precursor_tolerance: Tolerance::PPM(20.0),
            bin_width: DEFAULT_BIN_WIDTH,
            bin_offset: DEFAULT_BIN_OFFSET,
        }
    }
}

impl MergeConfig {
    pub fn with_max_open_files(mut self, value: usize) -> Self {
        self.max_open_files = value.max(1);
        self
    }

    pub fn with_max_spectra_per_intermediate(mut self, value: usize) -> Self {
        self.max_spectra_per_intermediate = value.max(1);
        self
    }

    pub fn with_max_consensus_per_output(mut self, value: usize) -> Self {
        self.max_consensus_per_output = value.max(1);
        self
    }

    pub fn with_legacy_method(mut self, value: u32) -> Self {
        self.legacy_method = value;
        self
    }

    pub fn with_normalize(mut self, value: bool) -> Self {
        self.normalize = value;
        self
    }

    pub fn with_split_precursor_candidates(mut self, value: bool) -> Self {
        self.split_precursor_candidates = value;
        self
    }

    pub fn with_charge_error_tolerance(mut self, value: u32) -> Self {
        self.charge_error_tolerance = value;
        self
    }

    pub fn with_precursor_tolerance(mut self, value: Tolerance) -> Self {
        self.precursor_tolerance = value;
        self
    }

    pub fn with_bin_width(mut self, value: f64) -> Self {
        self.bin_width = value;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let config = MergeConfig::default();
        assert_eq!(config.max_open_files, 60);
        assert_eq!(config.max_spectra_per_intermediate, 500_000);
        assert_eq!(config.max_consensus_per_output, 200_000);
        assert_eq!(config.legacy_method, 10);
        assert!(config.normalize);
        assert!(!config.split_precursor_candidates);
        assert_eq!(config.charge_error_tolerance, 0);

        let config = config.with_max_open_files(0).with_max_consensus_per_output(0);
        assert_eq!(config.max_open_files, 1);
        assert_eq!(config.max_consensus_per_output, 1);

        let config = config.with_bin_width(0.02);
        assert_eq!(config.bin_width, 0.02);
        assert_eq!(config.bin_offset, DEFAULT_BIN_OFFSET);
    }
}

//! Consensus spectrum merging for clustered MS/MS spectra.
//!
//! A [`MergePlan`] lists which scans of which files belong together. The
//! [`SpectrumMerger`] resolves those scans, combines each group with a
//! [`ConsensusBuilder`] and writes the consensus spectra out in parts of bounded size.
//!
//! Two executors carry out a plan:
//!
//! - [`SmallScaleExecutor`] keeps every input file open and merges sets one after
//!   another. It is used when the input files fit in the open-file budget.
//! - [`ScalableExecutor`] first spills the planned spectra of a few files at a time
//!   into intermediate bin files, then merges one bin at a time, so that neither the
//!   open file handles nor the spectra held in memory grow with the dataset.
//!
//! ```no_run
//! use mzmerge::merge::{MergeConfig, SpectrumMerger};
//!
//! # fn main() -> mzmerge::merge::Result<()> {
//! let config = MergeConfig::default().with_max_consensus_per_output(50_000);
//! let mut merger = SpectrumMerger::new("consensus.mzML", config)?;
//! merger.read_cluster_file("clusters.tsv")?;
//! for part in merger.merge_spectra()? {
//!     println!("Wrote {}", part.display());
//! }
//! # Ok(())
//! # }
//! ```
use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::io::{MZReader, SpectrumSource};
use crate::meta::{FileDescription, MSDataFileMetadata};
use crate::spectrum::Spectrum;

pub mod binning;
pub mod config;
pub mod consensus;
pub mod error;
pub mod legacy;
pub mod output;
pub mod plan;
pub mod scalable;
pub mod scan_id;
pub mod small;

pub use binning::{normalize_intensities, BinAccumulator, MzBinning};
pub use config::MergeConfig;
pub use consensus::ConsensusBuilder;
pub use error::{MergeError, Result};
pub use legacy::LegacyMergeMethod;
pub use output::{output_format, part_path, write_spectra};
pub use plan::{MergePlan, ScanMergeInfo, ScanMergeInfoSet};
pub use scalable::{PartitionLayout, ScalableExecutor};
pub use scan_id::{ScanId, ScanIdIndex};
pub use small::SmallScaleExecutor;

/// Open and index an input spectrum file, distinguishing a missing file from an
/// unreadable one. Provenance is left to the caller, see [`MZReader::record_source_file`].
pub(crate) fn open_input(path: &Path) -> Result<MZReader> {
    if !path.exists() {
        return Err(MergeError::MissingInput(path.to_path_buf()));
    }
    Ok(MZReader::open_path_untracked(path)?)
}

/// Owns the configuration, the file index and the plan of one merge run
#[derive(Debug)]
pub struct SpectrumMerger {
    config: MergeConfig,
    scan_ids: ScanIdIndex,
    plan: MergePlan,
    output_path: PathBuf,
}

impl SpectrumMerger {
    /// Create a merger writing to `output_path`, whose extension must name one of
    /// the writable formats
    pub fn new<P: Into<PathBuf>>(output_path: P, config: MergeConfig) -> Result<Self> {
        let output_path = output_path.into();
        output_format(&output_path)?;
        let mut scan_ids = ScanIdIndex::new();
        let plan = MergePlan::new(scan_ids.file_index(&output_path));
        Ok(Self {
            config,
            scan_ids,
            plan,
            output_path,
        })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn scan_ids(&self) -> &ScanIdIndex {
        &self.scan_ids
    }

    pub fn plan(&self) -> &MergePlan {
        &self.plan
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Replace the plan with the multi-file clusters read from `path`.
    /// Returns the number of merge sets.
    pub fn read_cluster_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        info!("Reading clusters from {}", path.display());
        let reader = io::BufReader::new(fs::File::open(path)?);
        self.read_clusters_from(reader)
    }

    pub fn read_clusters_from<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        self.plan = MergePlan::from_multi_file_reader(reader, &mut self.scan_ids, &self.output_path)?;
        info!("Read {} merge sets", self.plan.len());
        Ok(self.plan.len())
    }

    /// Replace the plan with the single-file clusters read from `cluster_path`, whose
    /// scan numbers refer to `spectrum_path`. Closed clusters are echoed to `weights_path`
    /// when given.
    pub fn read_single_file_clusters<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        cluster_path: P,
        spectrum_path: Q,
        weights_path: Option<&Path>,
    ) -> Result<usize> {
        let cluster_path = cluster_path.as_ref();
        info!("Reading clusters from {}", cluster_path.display());
        let reader = io::BufReader::new(fs::File::open(cluster_path)?);
        match weights_path {
            Some(weights_path) => {
                let mut weights = io::BufWriter::new(fs::File::create(weights_path)?);
                self.read_single_file_clusters_from(reader, spectrum_path.as_ref(), Some(&mut weights))
            }
            None => self.read_single_file_clusters_from(reader, spectrum_path.as_ref(), None),
        }
    }

    pub fn read_single_file_clusters_from<R: BufRead>(
        &mut self,
        reader: R,
        spectrum_path: &Path,
        weights: Option<&mut dyn Write>,
    ) -> Result<usize> {
        self.plan = MergePlan::from_single_file_reader(
            reader,
            spectrum_path,
            &mut self.scan_ids,
            &self.output_path,
            weights,
        )?;
        info!("Read {} merge sets", self.plan.len());
        Ok(self.plan.len())
    }

    /// Append a merge set of `(file path, scan number)` members to the plan
    pub fn push_set<P: AsRef<Path>>(&mut self, label: &str, members: &[(P, u32)]) -> Option<ScanId> {
        let infos: Vec<ScanMergeInfo> = members
            .iter()
            .map(|(path, scan_nr)| ScanMergeInfo::from(self.scan_ids.get_scan_id(path, *scan_nr)))
            .collect();
        self.plan.push_set(label, infos)
    }

    /// The number of distinct files the plan reads from
    pub fn input_file_count(&self) -> usize {
        self.scan_ids.input_files(&self.output_path).count()
    }

    /// Whether [`SpectrumMerger::merge_spectra`] will spill to intermediate files
    pub fn uses_scalable_executor(&self) -> bool {
        self.input_file_count() > self.config.max_open_files
    }

    /// Carry out the plan, returning the output parts written in order
    pub fn merge_spectra(&self) -> Result<Vec<PathBuf>> {
        if self.plan.is_empty() {
            warn!("The merge plan is empty, nothing to write");
            return Ok(Vec::new());
        }
        let parts = if self.uses_scalable_executor() {
            info!(
                "{} input files exceed the budget of {} open files, merging in bins",
                self.input_file_count(),
                self.config.max_open_files
            );
            ScalableExecutor::new(&self.config, &self.scan_ids, &self.plan, &self.output_path).run()?
        } else {
            SmallScaleExecutor::new(&self.config, &self.scan_ids, &self.plan, &self.output_path).run()?
        };
        info!("Wrote {} output files", parts.len());
        Ok(parts)
    }

    fn read_spectra(&self, input: &Path) -> Result<(Vec<Spectrum>, FileDescription)> {
        let mut reader = open_input(input)?;
        reader.record_source_file(input)?;
        let mut provenance = FileDescription::msn_spectra();
        provenance.absorb_provenance(reader.file_description());
        let spectra: Vec<Spectrum> = reader.collect();
        info!("Read {} spectra from {}", spectra.len(), input.display());
        Ok((spectra, provenance))
    }

    /// Merge every spectrum of `input` into a single consensus spectrum, written to
    /// the output path as scan 1
    pub fn merge_all_spectra<P: AsRef<Path>>(&self, input: P) -> Result<PathBuf> {
        let (spectra, provenance) = self.read_spectra(input.as_ref())?;
        let mut merged = ConsensusBuilder::new(&self.config).build(&spectra, 1);
        write_spectra(&self.output_path, &mut merged, &provenance)?;
        Ok(self.output_path.clone())
    }

    /// Merge every spectrum of `input` with the configured legacy method
    pub fn merge_all_spectra_legacy<P: AsRef<Path>>(&self, input: P) -> Result<PathBuf> {
        let (spectra, provenance) = self.read_spectra(input.as_ref())?;
        let mut merged: Vec<Spectrum> = self.merge_legacy(&spectra)?.into_iter().collect();
        write_spectra(&self.output_path, &mut merged, &provenance)?;
        Ok(self.output_path.clone())
    }

    /// Fold `members` into one spectrum with the configured legacy method.
    ///
    /// Fails with [`MergeError::UnknownMergeMethod`] when the configured code does
    /// not name a method. An empty set gives `None`.
    pub fn merge_legacy(&self, members: &[Spectrum]) -> Result<Option<Spectrum>> {
        let method = LegacyMergeMethod::try_from(self.config.legacy_method)?;
        info!("Merging {} spectra with {method}", members.len());
        Ok(method.merge_spectra_set(members, self.config.normalize))
    }

    /// Rewrite `input` to the output path with every spectrum renamed `scan=<N>` and
    /// its precursor hypotheses spelled out, one copy per hypothesis when splitting
    /// by precursor is on
    pub fn expand_precursor_candidates<P: AsRef<Path>>(&self, input: P) -> Result<PathBuf> {
        let (spectra, provenance) = self.read_spectra(input.as_ref())?;
        let builder = ConsensusBuilder::new(&self.config);
        let total = spectra.len();
        let mut expanded = Vec::with_capacity(total);
        for (i, spectrum) in spectra.into_iter().enumerate() {
            if (i + 1) % 5000 == 0 {
                info!("Expanded {}/{total}", i + 1);
            }
            let candidates = spectrum.mass_charge_candidates();
            let scan_nr = spectrum.scan_number() as u64;
            expanded.extend(builder.assign_identity(spectrum, &candidates, scan_nr));
        }
        write_spectra(&self.output_path, &mut expanded, &provenance)?;
        Ok(self.output_path.clone())
    }
}

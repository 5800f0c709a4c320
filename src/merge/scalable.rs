//! The partitioned executor for inputs that exceed the open file or memory budgets.
//!
//! Input files are processed in *batches* of at most the open file budget and merge
//! sets are spread over *bins* of bounded size. The split phase reads every batch
//! once, routing each planned spectrum to the intermediate file of its bin and batch,
//! `<stem>.part<BIN>_<BATCH>.<ext>`. The merge phase then visits one bin at a time,
//! reads back the members of every set in that bin, builds the consensus spectra and
//! deletes the intermediates.
use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::io::{MZReader, SpectrumSource};
use crate::meta::{FileDescription, MSDataFileMetadata};
use crate::spectrum::Spectrum;

use super::config::MergeConfig;
use super::consensus::ConsensusBuilder;
use super::error::Result;
use super::open_input;
use super::output::{part_path, write_spectra};
use super::plan::MergePlan;
use super::scan_id::{ScanId, ScanIdIndex};

/// Merge sets handed to one worker at a time while building consensus spectra
const MERGE_CHUNK_SIZE: usize = 100;

/// The batch and bin arithmetic shared by both phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionLayout {
    pub num_files: usize,
    pub num_batches: usize,
    pub files_per_batch: usize,
    pub num_bins: usize,
}

impl PartitionLayout {
    pub fn new(num_files: usize, num_scans: usize, num_sets: usize, config: &MergeConfig) -> Self {
        let num_batches = num_files.div_ceil(config.max_open_files.max(1)).max(1);
        let files_per_batch = num_files / num_batches + 1;
        let bins_in = num_scans.div_ceil(config.max_spectra_per_intermediate.max(1));
        let bins_out = num_sets.div_ceil(config.max_consensus_per_output.max(1));
        Self {
            num_files,
            num_batches,
            files_per_batch,
            num_bins: bins_in.max(bins_out).max(1),
        }
    }

    /// The bin holding the members of the set merged into `merged_scan_id`
    pub fn bin_of(&self, merged_scan_id: ScanId) -> usize {
        merged_scan_id.scan_nr.saturating_sub(1) as usize % self.num_bins
    }

    /// The batch reading the file `scan_id` comes from
    pub fn batch_of(&self, scan_id: ScanId) -> usize {
        scan_id.file_idx as usize / self.files_per_batch
    }

    pub fn batch_files(&self, batch: usize) -> Range<u32> {
        let start = (batch * self.files_per_batch).min(self.num_files);
        let end = ((batch + 1) * self.files_per_batch).min(self.num_files);
        start as u32..end as u32
    }
}

/// Where the split phase wrote a spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpillLocation {
    pub bin: usize,
    pub batch: usize,
    pub position: usize,
}

/// Maps every routed scan to its place in the intermediate files
pub type SideTable = HashMap<ScanId, SpillLocation>;

type BinAccumulators = Vec<Vec<(ScanId, Spectrum)>>;

fn empty_bins(num_bins: usize) -> BinAccumulators {
    (0..num_bins).map(|_| Vec::new()).collect()
}

pub struct ScalableExecutor<'a> {
    config: &'a MergeConfig,
    scan_ids: &'a ScanIdIndex,
    plan: &'a MergePlan,
    output_path: &'a Path,
    destinations: HashMap<ScanId, ScanId>,
    layout: PartitionLayout,
}

impl<'a> ScalableExecutor<'a> {
    pub fn new(
        config: &'a MergeConfig,
        scan_ids: &'a ScanIdIndex,
        plan: &'a MergePlan,
        output_path: &'a Path,
    ) -> Self {
        let destinations = plan.destinations();
        let layout = PartitionLayout::new(scan_ids.len(), destinations.len(), plan.len(), config);
        info!(
            "Partitioned {} files into {} batches of {} and {} sets into {} bins",
            layout.num_files,
            layout.num_batches,
            layout.files_per_batch,
            plan.len(),
            layout.num_bins
        );
        Self {
            config,
            scan_ids,
            plan,
            output_path,
            destinations,
            layout,
        }
    }

    pub fn layout(&self) -> &PartitionLayout {
        &self.layout
    }

    pub fn intermediate_path(&self, bin: usize, batch: usize) -> PathBuf {
        part_path(self.output_path, &format!("part{bin}_{batch}"))
    }

    /// Run both phases, returning the paths of the part files written
    pub fn run(&self) -> Result<Vec<PathBuf>> {
        let (side_table, provenance) = self.split()?;
        self.merge(&side_table, &provenance)
    }

    /// Route one input file's planned spectra into file-local bins
    fn split_file(
        &self,
        file_idx: u32,
        file_open_lock: &Mutex<()>,
        bin_accumulator_lock: &Mutex<BinAccumulators>,
    ) -> Result<FileDescription> {
        let Some(path) = self.scan_ids.path_of(file_idx) else {
            return Ok(FileDescription::default());
        };
        info!(
            "Splitting {} ({}%)",
            path.display(),
            (file_idx as usize + 1) * 100 / self.layout.num_files.max(1)
        );
        let mut reader = {
            let _guard = file_open_lock.lock();
            open_input(path)?
        };
        reader.record_source_file(path)?;
        let file_description = reader.file_description().clone();

        let mut local = empty_bins(self.layout.num_bins);
        let mut routed = 0usize;
        for mut spectrum in reader {
            let scan_id = ScanId::new(file_idx, spectrum.scan_number());
            let Some(merged_scan_id) = self.destinations.get(&scan_id) else {
                continue;
            };
            spectrum.set_id(scan_id.relabeled_id());
            local[self.layout.bin_of(*merged_scan_id)].push((scan_id, spectrum));
            routed += 1;
        }
        debug!("Routed {routed} spectra from {}", path.display());

        let mut accumulators = bin_accumulator_lock.lock();
        for (acc, spectra) in accumulators.iter_mut().zip(local) {
            acc.extend(spectra);
        }
        Ok(file_description)
    }

    /// Write every planned spectrum to its intermediate file, batch by batch
    pub fn split(&self) -> Result<(SideTable, FileDescription)> {
        let output_idx = self.plan.output_file_idx();
        let mut side_table = SideTable::new();
        let mut provenance = FileDescription::msn_spectra();

        for batch in 0..self.layout.num_batches {
            let file_open_lock = Mutex::new(());
            let bin_accumulator_lock = Mutex::new(empty_bins(self.layout.num_bins));
            let files: Vec<u32> = self
                .layout
                .batch_files(batch)
                .filter(|idx| *idx != output_idx)
                .collect();
            debug!("Batch {}/{} reads {} files", batch + 1, self.layout.num_batches, files.len());

            let descriptions = files
                .par_iter()
                .with_max_len(1)
                .map(|file_idx| self.split_file(*file_idx, &file_open_lock, &bin_accumulator_lock))
                .collect::<Result<Vec<_>>>()?;
            for fd in descriptions.iter() {
                provenance.absorb_provenance(fd);
            }

            let mut pending = Vec::new();
            for (bin, entries) in bin_accumulator_lock.into_inner().into_iter().enumerate() {
                if entries.is_empty() {
                    continue;
                }
                let mut spectra = Vec::with_capacity(entries.len());
                for (position, (scan_id, spectrum)) in entries.into_iter().enumerate() {
                    side_table.insert(scan_id, SpillLocation { bin, batch, position });
                    spectra.push(spectrum);
                }
                pending.push((self.intermediate_path(bin, batch), spectra));
            }
            pending
                .into_par_iter()
                .try_for_each(|(path, mut spectra)| -> Result<()> {
                    write_spectra(&path, &mut spectra, &FileDescription::msn_spectra())?;
                    Ok(())
                })?;
        }
        info!("Finished splitting {} spectra", side_table.len());
        Ok((side_table, provenance))
    }

    /// Read back the members of every merge set of `bin` and append their consensus
    /// spectra to `output_lock`
    fn merge_bin(
        &self,
        bin: usize,
        side_table: &SideTable,
        builder: &ConsensusBuilder,
        output_lock: &Mutex<Vec<Spectrum>>,
    ) -> Result<()> {
        struct Lookup {
            position: usize,
            set: usize,
            slot: usize,
            scan_id: ScanId,
        }

        let mut lookups: Vec<Vec<Lookup>> = (0..self.layout.num_batches).map(|_| Vec::new()).collect();
        let mut groups: Vec<(u32, Vec<Option<Spectrum>>)> = Vec::new();
        for set in self
            .plan
            .iter()
            .filter(|s| self.layout.bin_of(s.merged_scan_id) == bin)
        {
            let mut slot = 0;
            for info in set.iter() {
                if !MergePlan::is_owned_by(&self.destinations, &info.scan_id, set) {
                    debug!(
                        "Scan {} of merge set {} is merged into a later set",
                        info.scan_id, set.merged_scan_id
                    );
                    continue;
                }
                let batch = self.layout.batch_of(info.scan_id);
                match side_table.get(&info.scan_id) {
                    Some(loc) if loc.bin == bin && loc.batch == batch => {
                        lookups[batch].push(Lookup {
                            position: loc.position,
                            set: groups.len(),
                            slot,
                            scan_id: info.scan_id,
                        });
                        slot += 1;
                    }
                    _ => warn!(
                        "Scan {} of merge set {} was not written to bin {bin}, it is left out",
                        info.scan_id, set.merged_scan_id
                    ),
                }
            }
            groups.push((set.merged_scan_id.scan_nr, vec![None; slot]));
        }

        info!("  Reading {} merge sets", groups.len());
        for (batch, mut batch_lookups) in lookups.into_iter().enumerate() {
            if batch_lookups.is_empty() {
                continue;
            }
            let path = self.intermediate_path(bin, batch);
            if !path.exists() {
                warn!(
                    "Intermediate file {} is missing, {} scans are left out",
                    path.display(),
                    batch_lookups.len()
                );
                continue;
            }
            debug!("  Batch {}/{}", batch + 1, self.layout.num_batches);
            let mut reader = MZReader::open_path_untracked(&path)?;
            batch_lookups.sort_by_key(|l| l.position);
            for lookup in batch_lookups {
                let expected = lookup.scan_id.relabeled_id();
                match reader.get_spectrum_by_index(lookup.position) {
                    Some(spectrum) if spectrum.id() == expected => {
                        groups[lookup.set].1[lookup.slot] = Some(spectrum);
                    }
                    Some(spectrum) => warn!(
                        "Expected {expected} at position {} of {} but found {}",
                        lookup.position,
                        path.display(),
                        spectrum.id()
                    ),
                    None => warn!(
                        "Position {} is out of bounds in {}, scan {} is left out",
                        lookup.position,
                        path.display(),
                        lookup.scan_id
                    ),
                }
            }
        }

        let groups: Vec<(u32, Vec<Spectrum>)> = groups
            .into_iter()
            .map(|(merged_scan_nr, slots)| (merged_scan_nr, slots.into_iter().flatten().collect()))
            .collect();

        info!("  Merging spectra");
        groups.par_chunks(MERGE_CHUNK_SIZE).for_each(|chunk| {
            for (merged_scan_nr, members) in chunk {
                builder.build_into(members, *merged_scan_nr, output_lock);
            }
        });

        for batch in 0..self.layout.num_batches {
            let path = self.intermediate_path(bin, batch);
            if path.exists() {
                fs::remove_file(&path)?;
                debug!("Removed {}", path.display());
            }
        }
        Ok(())
    }

    /// Build the consensus spectra bin by bin, writing output parts of at most the
    /// per-file cap as they fill up
    pub fn merge(&self, side_table: &SideTable, provenance: &FileDescription) -> Result<Vec<PathBuf>> {
        let builder = ConsensusBuilder::new(self.config);
        let cap = self.config.max_consensus_per_output.max(1);
        let output_lock: Mutex<Vec<Spectrum>> = Mutex::new(Vec::new());
        let mut written = Vec::new();

        for bin in 0..self.layout.num_bins {
            info!("Merging spectra in bin {}/{}", bin + 1, self.layout.num_bins);
            let start = output_lock.lock().len();
            self.merge_bin(bin, side_table, &builder, &output_lock)?;

            let mut merged = output_lock.lock();
            merged[start..].sort_by_key(consensus_order);
            let last = bin + 1 == self.layout.num_bins;
            while merged.len() > cap || (last && !merged.is_empty()) {
                let take = merged.len().min(cap);
                let mut part: Vec<Spectrum> = merged.drain(..take).collect();
                let path = part_path(self.output_path, &format!("part{}", written.len() + 1));
                write_spectra(&path, &mut part, provenance)?;
                written.push(path);
            }
        }
        Ok(written)
    }
}

/// Consensus spectra are appended in whatever order the workers finish
fn consensus_order(spectrum: &Spectrum) -> u64 {
    spectrum
        .id()
        .strip_prefix("scan=")
        .and_then(|n| n.parse().ok())
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_layout_arithmetic() {
        let config = MergeConfig::default()
            .with_max_open_files(2)
            .with_max_spectra_per_intermediate(10)
            .with_max_consensus_per_output(4);
        let layout = PartitionLayout::new(5, 25, 9, &config);
        assert_eq!(layout.num_batches, 3);
        assert_eq!(layout.files_per_batch, 2);
        assert_eq!(layout.num_bins, 3);
        assert_eq!(layout.batch_files(0), 0..2);
        assert_eq!(layout.batch_files(2), 4..5);
        assert_eq!(layout.batch_of(ScanId::new(4, 1)), 2);
        assert_eq!(layout.bin_of(ScanId::new(0, 1)), 0);
        assert_eq!(layout.bin_of(ScanId::new(0, 4)), 0);
        assert_eq!(layout.bin_of(ScanId::new(0, 6)), 2);

        let layout = PartitionLayout::new(1, 0, 0, &MergeConfig::default());
        assert_eq!(layout.num_batches, 1);
        assert_eq!(layout.num_bins, 1);
    }

    #[test]
    fn test_every_file_has_a_batch() {
        let config = MergeConfig::default().with_max_open_files(7);
        for num_files in 1..60 {
            let layout = PartitionLayout::new(num_files, 1, 1, &config);
            let covered: usize = (0..layout.num_batches)
                .map(|b| layout.batch_files(b).len())
                .sum();
            assert_eq!(covered, num_files);
            for idx in 0..num_files as u32 {
                let batch = layout.batch_of(ScanId::new(idx, 1));
                assert!(layout.batch_files(batch).contains(&idx));
            }
        }
    }

    #[test]
    fn test_consensus_order() {
        let mut a = Spectrum::default();
        a.set_id("scan=1201");
        assert_eq!(consensus_order(&a), 1201);
        a.set_id("merged");
        assert_eq!(consensus_order(&a), u64::MAX);
    }
}

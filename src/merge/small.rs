use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::io::{MZReader, SpectrumSource};
use crate::meta::{FileDescription, MSDataFileMetadata};
use crate::spectrum::Spectrum;

use super::config::MergeConfig;
use super::consensus::ConsensusBuilder;
use super::error::Result;
use super::output::{part_path, write_spectra};
use super::plan::{MergePlan, ScanMergeInfo, ScanMergeInfoSet};
use super::scan_id::ScanIdIndex;
use super::open_input;

/// Merges a plan with every input file held open at once.
///
/// Readers are opened the first time one of their scans is needed and kept until
/// the run ends. Consensus spectra are buffered and flushed to `<stem>.partN.<ext>`
/// whenever the buffer reaches the per-file cap.
pub struct SmallScaleExecutor<'a> {
    config: &'a MergeConfig,
    scan_ids: &'a ScanIdIndex,
    plan: &'a MergePlan,
    output_path: &'a Path,
}

impl<'a> SmallScaleExecutor<'a> {
    pub fn new(
        config: &'a MergeConfig,
        scan_ids: &'a ScanIdIndex,
        plan: &'a MergePlan,
        output_path: &'a Path,
    ) -> Self {
        Self {
            config,
            scan_ids,
            plan,
            output_path,
        }
    }

    /// Run the merge, returning the paths of the part files written
    pub fn run(&self) -> Result<Vec<PathBuf>> {
        info!("Merging {} sets in memory", self.plan.len());
        let builder = ConsensusBuilder::new(self.config);
        let cap = self.config.max_consensus_per_output.max(1);

        let mut readers: HashMap<u32, MZReader> = HashMap::new();
        let mut provenance = FileDescription::msn_spectra();
        let mut buffer: Vec<Spectrum> = Vec::new();
        let mut written = Vec::new();

        let destinations = self.plan.destinations();
        let mut sets: Vec<&ScanMergeInfoSet> = self.plan.iter().collect();
        sets.sort_by_key(|s| s.merged_scan_id);
        let total = sets.len();

        for (i, set) in sets.into_iter().enumerate() {
            let owned: Vec<&ScanMergeInfo> = set
                .iter()
                .filter(|info| MergePlan::is_owned_by(&destinations, &info.scan_id, set))
                .collect();
            if owned.len() < set.len() {
                debug!(
                    "{} scans of merge set {} are merged into a later set",
                    set.len() - owned.len(),
                    set.merged_scan_id
                );
            }
            let members = self.resolve_members(set, &owned, &mut readers, &mut provenance)?;
            if members.is_empty() && !owned.is_empty() {
                warn!(
                    "None of the scans of merge set {} could be found",
                    set.merged_scan_id
                );
            }
            buffer.extend(builder.build(&members, set.merged_scan_id.scan_nr));
            if (i + 1) % 5000 == 0 {
                info!("Merged {}/{total}", i + 1);
            }

            let last = i + 1 == total;
            while buffer.len() >= cap || (last && !buffer.is_empty()) {
                let take = buffer.len().min(cap);
                let mut part: Vec<Spectrum> = buffer.drain(..take).collect();
                let path = part_path(self.output_path, &format!("part{}", written.len() + 1));
                write_spectra(&path, &mut part, &provenance)?;
                written.push(path);
            }
        }
        Ok(written)
    }

    fn resolve_members(
        &self,
        set: &ScanMergeInfoSet,
        owned: &[&ScanMergeInfo],
        readers: &mut HashMap<u32, MZReader>,
        provenance: &mut FileDescription,
    ) -> Result<Vec<Spectrum>> {
        let mut members = Vec::with_capacity(owned.len());
        for info in owned.iter() {
            let Some(path) = self.scan_ids.file_path(info.scan_id) else {
                warn!("Scan {} does not belong to a known file", info.scan_id);
                continue;
            };
            let open_files = readers.len();
            let reader = match readers.entry(info.scan_id.file_idx) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    let mut reader = open_input(path)?;
                    reader.record_source_file(path)?;
                    provenance.absorb_provenance(reader.file_description());
                    info!(
                        "Extracting spectra from {}, open files: {}",
                        path.display(),
                        open_files + 1
                    );
                    e.insert(reader)
                }
            };
            match reader.get_spectrum_by_scan_number(info.scan_id.scan_nr) {
                Some(spectrum) => members.push(spectrum),
                None => warn!(
                    "Scan {} not found in {}, it is left out of merge set {}",
                    info.scan_id.scan_nr,
                    path.display(),
                    set.merged_scan_id
                ),
            }
        }
        debug!(
            "Resolved {}/{} members of merge set {}",
            members.len(),
            owned.len(),
            set.merged_scan_id
        );
        Ok(members)
    }
}

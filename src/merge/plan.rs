//! Merge plans, the ordered list of scan groups that each become one consensus spectrum.
//!
//! Plans are usually read from the output of a clustering tool. Two line oriented
//! layouts are understood:
//!
//! - multi-file: `<file path> <scan number>` per line, clusters separated by any line
//!   that does not parse, typically a blank one.
//! - single-file: a header line, then `<scan number> <label> <charge> <q-value>` per
//!   line, with the same separator convention. Members are kept sorted by score and the
//!   clusters can be echoed to a weights file as they close.
use std::collections::HashMap;
use std::io::{self, prelude::*};
use std::path::Path;

use log::{debug, warn};

use super::error::Result;
use super::scan_id::{ScanId, ScanIdIndex};

/// One scan's membership in a merge set
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMergeInfo {
    pub scan_id: ScanId,
    pub score: f64,
    pub is_decoy: bool,
    pub charge: i32,
    pub label: String,
}

impl ScanMergeInfo {
    pub fn new<S: Into<String>>(
        scan_id: ScanId,
        score: f64,
        is_decoy: bool,
        charge: i32,
        label: S,
    ) -> Self {
        Self {
            scan_id,
            score,
            is_decoy,
            charge,
            label: label.into(),
        }
    }
}

impl From<ScanId> for ScanMergeInfo {
    fn from(scan_id: ScanId) -> Self {
        Self::new(scan_id, 0.0, false, 0, "")
    }
}

/// The scans merged into the consensus spectrum `merged_scan_id`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanMergeInfoSet {
    pub merged_scan_id: ScanId,
    pub label: String,
    scans: Vec<ScanMergeInfo>,
}

impl ScanMergeInfoSet {
    pub fn new<S: Into<String>>(merged_scan_id: ScanId, label: S) -> Self {
        Self {
            merged_scan_id,
            label: label.into(),
            scans: Vec::new(),
        }
    }

    /// Add a member unless its scan is already part of this set.
    /// Returns whether the member was added.
    pub fn push(&mut self, info: ScanMergeInfo) -> bool {
        if self.contains(&info.scan_id) {
            false
        } else {
            self.scans.push(info);
            true
        }
    }

    /// Stable sort of the members by ascending score
    pub fn sort_by_score(&mut self) {
        self.scans.sort_by(|a, b| a.score.total_cmp(&b.score));
    }

    pub fn contains(&self, scan_id: &ScanId) -> bool {
        self.scans.iter().any(|s| s.scan_id == *scan_id)
    }

    pub fn scans(&self) -> &[ScanMergeInfo] {
        &self.scans
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScanMergeInfo> {
        self.scans.iter()
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// Write one `merged \t source \t score \t label` line per member followed by a blank line
    pub fn write_weights<W: Write + ?Sized>(&self, stream: &mut W) -> io::Result<()> {
        for info in self.scans.iter() {
            writeln!(
                stream,
                "{}\t{}\t{}\t{}",
                self.merged_scan_id.scan_nr, info.scan_id.scan_nr, info.score, info.label
            )?;
        }
        writeln!(stream)
    }
}

/// An ordered list of [`ScanMergeInfoSet`]s whose destination scan numbers run
/// `1, 2, 3, ...` in the output file's index space
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergePlan {
    output_file_idx: u32,
    sets: Vec<ScanMergeInfoSet>,
}

impl MergePlan {
    pub fn new(output_file_idx: u32) -> Self {
        Self {
            output_file_idx,
            sets: Vec::new(),
        }
    }

    pub fn output_file_idx(&self) -> u32 {
        self.output_file_idx
    }

    fn next_merged_scan_id(&self) -> ScanId {
        let scan_nr = self
            .sets
            .last()
            .map_or(1, |set| set.merged_scan_id.scan_nr + 1);
        ScanId::new(self.output_file_idx, scan_nr)
    }

    fn open_set(&mut self, label: &str) -> &mut ScanMergeInfoSet {
        let merged_scan_id = self.next_merged_scan_id();
        self.sets.push(ScanMergeInfoSet::new(merged_scan_id, label));
        // Just pushed, so the plan is not empty
        let last = self.sets.len() - 1;
        &mut self.sets[last]
    }

    /// Append a set built from `members`, skipping repeated scans. Nothing is added
    /// when `members` is empty. Returns the destination of the new set.
    pub fn push_set<I, S>(&mut self, label: S, members: I) -> Option<ScanId>
    where
        I: IntoIterator<Item = ScanMergeInfo>,
        S: AsRef<str>,
    {
        let mut members = members.into_iter().peekable();
        members.peek()?;
        let set = self.open_set(label.as_ref());
        for info in members {
            let scan_id = info.scan_id;
            if !set.push(info) {
                warn!(
                    "Scan {scan_id} is already a member of merge set {}",
                    set.merged_scan_id
                );
            }
        }
        Some(set.merged_scan_id)
    }

    pub fn sets(&self) -> &[ScanMergeInfoSet] {
        &self.sets
    }

    pub fn get(&self, index: usize) -> Option<&ScanMergeInfoSet> {
        self.sets.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScanMergeInfoSet> {
        self.sets.iter()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Map every member scan to the destination of its set. A scan listed in more
    /// than one set is routed to the last of them.
    pub fn destinations(&self) -> HashMap<ScanId, ScanId> {
        let mut map = HashMap::new();
        for set in self.sets.iter() {
            for info in set.iter() {
                if let Some(previous) = map.insert(info.scan_id, set.merged_scan_id) {
                    warn!(
                        "Scan {} appears in merge sets {previous} and {}",
                        info.scan_id, set.merged_scan_id
                    );
                }
            }
        }
        map
    }

    /// Whether `scan_id` is merged into `set`, given the plan's `destinations`.
    /// A scan listed in several sets only belongs to the last of them.
    pub fn is_owned_by(
        destinations: &HashMap<ScanId, ScanId>,
        scan_id: &ScanId,
        set: &ScanMergeInfoSet,
    ) -> bool {
        destinations.get(scan_id) == Some(&set.merged_scan_id)
    }

    /// Remove every scan from all but the last set listing it and drop the sets left
    /// without members. The remaining sets keep their destinations. Returns the number
    /// of memberships removed.
    pub fn resolve_shared_scans(&mut self) -> usize {
        let destinations = self.destinations();
        let mut removed = 0;
        for set in self.sets.iter_mut() {
            let before = set.scans.len();
            let merged_scan_id = set.merged_scan_id;
            set.scans
                .retain(|info| destinations.get(&info.scan_id) == Some(&merged_scan_id));
            removed += before - set.scans.len();
        }
        if removed > 0 {
            let before = self.sets.len();
            self.sets.retain(|set| !set.is_empty());
            warn!(
                "Removed {removed} repeated scans from earlier merge sets, {} sets were left empty",
                before - self.sets.len()
            );
        }
        removed
    }

    /// Read a multi-file plan, `<file path> <scan number>` per line
    pub fn from_multi_file_reader<R: BufRead>(
        reader: R,
        scan_ids: &mut ScanIdIndex,
        output_path: &Path,
    ) -> Result<Self> {
        let mut parser = ClusterParser::new(scan_ids.file_index(output_path), None);
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            let mut tokens = line.split_whitespace();
            let member = match (tokens.next(), tokens.next().map(str::parse::<u32>)) {
                (Some(path), Some(Ok(scan_nr))) => Some((path, scan_nr)),
                _ => None,
            };
            match member {
                Some((path, scan_nr)) => {
                    let scan_id = scan_ids.get_scan_id(path, scan_nr);
                    parser.add(ScanMergeInfo::from(scan_id), "", false);
                }
                None => {
                    debug!("Line {} closes a cluster", line_number + 1);
                    parser.close()?;
                }
            }
        }
        parser.finish()
    }

    /// Read a single-file plan, `<scan number> <label> <charge> <q-value>` per line
    /// after a header line. Each closed cluster is echoed to `weights` when given.
    pub fn from_single_file_reader<R: BufRead>(
        reader: R,
        spectrum_path: &Path,
        scan_ids: &mut ScanIdIndex,
        output_path: &Path,
        weights: Option<&mut dyn Write>,
    ) -> Result<Self> {
        let mut parser = ClusterParser::new(scan_ids.file_index(output_path), weights);
        let mut lines = reader.lines();
        if let Some(header) = lines.next() {
            header?;
        }
        for (line_number, line) in lines.enumerate() {
            let line = line?;
            match parse_single_file_line(&line) {
                Some((scan_nr, label, charge, score)) => {
                    let scan_id = scan_ids.get_scan_id(spectrum_path, scan_nr);
                    let info = ScanMergeInfo::new(scan_id, score, false, charge, label);
                    parser.add(info, label, true);
                }
                None => {
                    debug!("Line {} closes a cluster", line_number + 2);
                    parser.close()?;
                }
            }
        }
        parser.finish()
    }
}

fn parse_single_file_line(line: &str) -> Option<(u32, &str, i32, f64)> {
    let mut tokens = line.split_whitespace();
    let scan_nr = tokens.next()?.parse().ok()?;
    let label = tokens.next()?;
    let charge = tokens.next()?.parse().ok()?;
    let score = tokens.next()?.parse().ok()?;
    Some((scan_nr, label, charge, score))
}

/// Tracks whether a cluster is open while a plan is read line by line
struct ClusterParser<'a> {
    plan: MergePlan,
    open: bool,
    weights: Option<&'a mut dyn Write>,
}

impl<'a> ClusterParser<'a> {
    fn new(output_file_idx: u32, weights: Option<&'a mut dyn Write>) -> Self {
        Self {
            plan: MergePlan::new(output_file_idx),
            open: false,
            weights,
        }
    }

    fn add(&mut self, info: ScanMergeInfo, label: &str, sort_by_score: bool) {
        let set = if self.open {
            let last = self.plan.sets.len() - 1;
            &mut self.plan.sets[last]
        } else {
            self.open = true;
            self.plan.open_set(label)
        };
        let scan_id = info.scan_id;
        if !set.push(info) {
            warn!(
                "Skipping scan {scan_id}, it is already a member of merge set {}",
                set.merged_scan_id
            );
        }
        if sort_by_score {
            set.sort_by_score();
        }
    }

    fn close(&mut self) -> io::Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        if let (Some(stream), Some(set)) = (self.weights.as_mut(), self.plan.sets.last()) {
            set.write_weights(&mut **stream)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<MergePlan> {
        self.close()?;
        if let Some(stream) = self.weights.as_mut() {
            stream.flush()?;
        }
        self.plan.resolve_shared_scans();
        debug!("Read a plan of {} merge sets", self.plan.len());
        Ok(self.plan)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    #[test_log::test]
    fn test_multi_file_plan() -> Result<()> {
        let text = "\
a.mgf 10
b.mgf 4

junk line
a.mgf 11
not_a_number x
a.mgf 12
a.mgf 12
b.mgf 5
";
        let mut scan_ids = ScanIdIndex::new();
        let out = PathBuf::from("out.mgf");
        let plan = MergePlan::from_multi_file_reader(text.as_bytes(), &mut scan_ids, &out)?;
        assert_eq!(plan.len(), 3);
        let merged: Vec<u32> = plan.iter().map(|s| s.merged_scan_id.scan_nr).collect();
        assert_eq!(merged, vec![1, 2, 3]);
        assert!(plan
            .iter()
            .all(|s| s.merged_scan_id.file_idx == plan.output_file_idx()));

        let first: Vec<ScanId> = plan.sets()[0].iter().map(|s| s.scan_id).collect();
        assert_eq!(
            first,
            vec![
                scan_ids.find_scan_id("a.mgf", 10).unwrap(),
                scan_ids.find_scan_id("b.mgf", 4).unwrap()
            ]
        );
        assert_eq!(plan.sets()[1].len(), 1);
        // The repeated a.mgf 12 is skipped
        assert_eq!(plan.sets()[2].len(), 2);
        let info = &plan.sets()[0].scans()[0];
        assert_eq!((info.score, info.is_decoy, info.charge), (0.0, false, 0));
        assert!(info.label.is_empty());
        assert_eq!(plan.destinations().len(), 5);
        Ok(())
    }

    #[test_log::test]
    fn test_shared_scans_belong_to_the_last_set() -> Result<()> {
        let text = "a.mgf 1\n\na.mgf 1\na.mgf 2\n\nb.mgf 1\na.mgf 2\n";
        let mut scan_ids = ScanIdIndex::new();
        let out = PathBuf::from("out.mgf");
        let mut plan = MergePlan::from_multi_file_reader(text.as_bytes(), &mut scan_ids, &out)?;
        let a1 = scan_ids.find_scan_id("a.mgf", 1).unwrap();
        let a2 = scan_ids.find_scan_id("a.mgf", 2).unwrap();

        // The first set lost its only member and is gone, the others keep their numbers
        let merged: Vec<u32> = plan.iter().map(|s| s.merged_scan_id.scan_nr).collect();
        assert_eq!(merged, vec![2, 3]);
        assert_eq!(plan.sets()[0].scans().len(), 1);
        assert!(plan.sets()[0].contains(&a1));
        assert!(plan.sets()[1].contains(&a2));
        let destinations = plan.destinations();
        assert!(plan
            .iter()
            .all(|set| set.iter().all(|info| MergePlan::is_owned_by(&destinations, &info.scan_id, set))));
        assert_eq!(plan.resolve_shared_scans(), 0);

        let next = plan.push_set("", [ScanMergeInfo::from(a1)]).unwrap();
        assert_eq!(next.scan_nr, 4);
        let destinations = plan.destinations();
        assert!(!MergePlan::is_owned_by(&destinations, &a1, &plan.sets()[0]));
        assert_eq!(plan.resolve_shared_scans(), 1);
        assert_eq!(plan.len(), 2);
        Ok(())
    }

    #[test_log::test]
    fn test_single_file_plan_with_weights() -> Result<()> {
        let text = "\
scan\tpeptide\tcharge\tqvalue
5\tPEPTIDEK\t2\t0.01
3\tPEPTIDEK\t2\t0.001
9\tPEPTIDEK\t3\t0.01

7\tSAMPLER\t2\t0.05
";
        let mut scan_ids = ScanIdIndex::new();
        let mut weights: Vec<u8> = Vec::new();
        let plan = MergePlan::from_single_file_reader(
            text.as_bytes(),
            Path::new("in.ms2"),
            &mut scan_ids,
            Path::new("out.ms2"),
            Some(&mut weights),
        )?;
        assert_eq!(plan.len(), 2);
        let first = &plan.sets()[0];
        assert_eq!(first.label, "PEPTIDEK");
        let order: Vec<u32> = first.iter().map(|s| s.scan_id.scan_nr).collect();
        assert_eq!(order, vec![3, 5, 9]);
        assert_eq!(first.scans()[2].charge, 3);
        assert_eq!(plan.sets()[1].label, "SAMPLER");

        let weights = String::from_utf8(weights).unwrap();
        assert_eq!(
            weights,
            "1\t3\t0.001\tPEPTIDEK\n1\t5\t0.01\tPEPTIDEK\n1\t9\t0.01\tPEPTIDEK\n\n2\t7\t0.05\tSAMPLER\n\n"
        );
        Ok(())
    }

    #[test]
    fn test_consecutive_separators_close_once() -> Result<()> {
        let text = "header\n1 A 2 0.1\n\n\nbad\n2 B 2 0.2\n\n";
        let mut scan_ids = ScanIdIndex::new();
        let mut weights: Vec<u8> = Vec::new();
        let plan = MergePlan::from_single_file_reader(
            text.as_bytes(),
            Path::new("in.mgf"),
            &mut scan_ids,
            Path::new("out.mgf"),
            Some(&mut weights),
        )?;
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|s| !s.is_empty()));
        let weights = String::from_utf8(weights).unwrap();
        assert_eq!(weights.matches("\n\n").count(), 2);
        Ok(())
    }

    #[test]
    fn test_push_set() {
        let mut plan = MergePlan::new(7);
        assert_eq!(plan.push_set("empty", Vec::new()), None);
        let a = ScanId::new(0, 1);
        let b = ScanId::new(1, 1);
        let dest = plan.push_set("x", vec![a.into(), b.into(), a.into()]).unwrap();
        assert_eq!(dest, ScanId::new(7, 1));
        assert_eq!(plan.sets()[0].len(), 2);
        let dest = plan.push_set("y", vec![ScanId::new(0, 2).into()]).unwrap();
        assert_eq!(dest.scan_nr, 2);
    }

    #[test]
    fn test_duplicate_scan_across_sets_routes_to_last() {
        let mut plan = MergePlan::new(9);
        let a = ScanId::new(0, 1);
        plan.push_set("", vec![a.into()]);
        plan.push_set("", vec![a.into(), ScanId::new(0, 2).into()]);
        assert_eq!(plan.destinations()[&a], ScanId::new(9, 2));
    }
}

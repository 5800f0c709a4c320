use crate::impl_param_described;
use crate::params::ParamList;

/// Whether a spectrum's signal is a continuous profile or a list of discrete centroids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum SignalContinuity {
    #[default]
    Unknown = 0,
    Centroid = 3,
    Profile = 5,
}

#[derive(Default, Debug, Clone, PartialEq)]
/// The interval around the precursor ion that was isolated in the precursor scan.
pub struct IsolationWindow {
    pub target: f32,
    pub lower_bound: f32,
    pub upper_bound: f32,
}

impl IsolationWindow {
    pub fn around(target: f32, width: f32) -> Self {
        Self {
            target,
            lower_bound: target - width,
            upper_bound: target + width,
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq)]
/// Describes a single scan event. Unless additional post-processing is done,
/// there is usually only one event per spectrum.
pub struct ScanEvent {
    /// The retention time of the scan in minutes
    pub start_time: f64,
    pub injection_time: f32,
    pub params: ParamList,
}

#[derive(Default, Debug, Clone, PartialEq)]
/// Describe the series of acquisition events that constructed the spectrum
/// being described.
pub struct Acquisition {
    pub scans: Vec<ScanEvent>,
}

impl Acquisition {
    pub fn first_scan(&self) -> Option<&ScanEvent> {
        self.scans.first()
    }

    pub fn first_scan_mut(&mut self) -> Option<&mut ScanEvent> {
        if self.scans.is_empty() {
            self.scans.push(ScanEvent::default());
        }
        self.scans.first_mut()
    }

    pub fn start_time(&self) -> f64 {
        self.first_scan().map(|s| s.start_time).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Describes a single selected ion from a precursor isolation
pub struct SelectedIon {
    /// The selected ion's m/z as reported, may not be the monoisotopic peak.
    pub mz: f64,
    pub intensity: f32,
    /// The reported precursor ion's charge state. May be absent in
    /// some source files.
    pub charge: Option<i32>,
    pub params: ParamList,
}

impl SelectedIon {
    pub fn new(mz: f64, intensity: f32, charge: Option<i32>) -> Self {
        Self {
            mz,
            intensity,
            charge,
            params: ParamList::new(),
        }
    }
}

impl_param_described!(SelectedIon);

#[derive(Debug, Clone, Default, PartialEq)]
/// Describes the precursor ion(s) of an MSn spectrum
pub struct Precursor {
    /// The selected ions. More than one entry means the charge state or
    /// monoisotopic peak of the precursor was ambiguous.
    pub ions: Vec<SelectedIon>,
    pub isolation_window: IsolationWindow,
    /// The id of the spectrum the precursor was selected from
    pub precursor_id: Option<String>,
}

impl Precursor {
    /// The first selected ion, the one most readers treat as "the" precursor
    pub fn ion(&self) -> Option<&SelectedIon> {
        self.ions.first()
    }

    pub fn ion_mut(&mut self) -> Option<&mut SelectedIon> {
        self.ions.first_mut()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SelectedIon> {
        self.ions.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, SelectedIon> {
        self.ions.iter_mut()
    }

    pub fn add_ion(&mut self, ion: SelectedIon) {
        self.ions.push(ion);
    }

    pub fn precursor_id(&self) -> Option<&String> {
        self.precursor_id.as_ref()
    }
}

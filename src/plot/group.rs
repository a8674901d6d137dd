//! Overplot containers keyed by scan axis.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

/// Points of one run in one series collection, as `[x, y]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    /// Source run
    pub run_uid: String,
    /// Points in append order
    pub points: Vec<[f64; 2]>,
}

/// Ordered set of per-run line series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesCollection {
    series: Vec<LineSeries>,
}

impl SeriesCollection {
    fn attach(&mut self, run_uid: &str) -> bool {
        if self.get(run_uid).is_some() {
            return false;
        }
        self.series.push(LineSeries {
            run_uid: run_uid.to_string(),
            points: Vec::new(),
        });
        true
    }

    fn push(&mut self, run_uid: &str, point: [f64; 2]) -> bool {
        match self.series.iter_mut().find(|s| s.run_uid == run_uid) {
            Some(series) => {
                series.points.push(point);
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, run_uid: &str) -> bool {
        let before = self.series.len();
        self.series.retain(|s| s.run_uid != run_uid);
        self.series.len() != before
    }

    /// Series of one run.
    pub fn get(&self, run_uid: &str) -> Option<&LineSeries> {
        self.series.iter().find(|s| s.run_uid == run_uid)
    }

    /// Series in attach order.
    pub fn iter(&self) -> impl Iterator<Item = &LineSeries> {
        self.series.iter()
    }

    /// Number of series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether no run is attached.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Serializable copy of a plot group's contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotGroupSnapshot {
    /// Group axis
    pub axis: String,
    /// Attached runs, in attach order
    pub runs: Vec<String>,
    /// `[x, xas]` series
    pub xanes: SeriesCollection,
    /// `[x, xmcd]` series
    pub xmcd: SeriesCollection,
}

#[derive(Debug, Default)]
struct GroupState {
    runs: Vec<String>,
    xanes: SeriesCollection,
    xmcd: SeriesCollection,
}

/// XANES and XMCD series of every run scanned along one axis.
///
/// Groups are shared through `Arc` and lock internally, so a viewer may keep a
/// handle while the router appends points.
pub struct PlotGroup {
    axis: String,
    state: Mutex<GroupState>,
}

impl fmt::Debug for PlotGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlotGroup")
            .field("axis", &self.axis)
            .field("runs", &self.state.lock().runs)
            .finish()
    }
}

impl PlotGroup {
    pub(crate) fn new(axis: impl Into<String>) -> Self {
        Self {
            axis: axis.into(),
            state: Mutex::new(GroupState::default()),
        }
    }

    /// Positioner name the group is keyed by.
    pub fn axis(&self) -> &str {
        &self.axis
    }

    /// Runs currently attached, in attach order.
    pub fn runs(&self) -> Vec<String> {
        self.state.lock().runs.clone()
    }

    /// Whether `run_uid` is attached.
    pub fn contains_run(&self, run_uid: &str) -> bool {
        self.state.lock().runs.iter().any(|r| r == run_uid)
    }

    /// XANES points of a run.
    pub fn xanes(&self, run_uid: &str) -> Option<Vec<[f64; 2]>> {
        self.state
            .lock()
            .xanes
            .get(run_uid)
            .map(|s| s.points.clone())
    }

    /// XMCD points of a run.
    pub fn xmcd(&self, run_uid: &str) -> Option<Vec<[f64; 2]>> {
        self.state
            .lock()
            .xmcd
            .get(run_uid)
            .map(|s| s.points.clone())
    }

    /// Copy of all series, taken under one lock.
    pub fn snapshot(&self) -> PlotGroupSnapshot {
        let state = self.state.lock();
        PlotGroupSnapshot {
            axis: self.axis.clone(),
            runs: state.runs.clone(),
            xanes: state.xanes.clone(),
            xmcd: state.xmcd.clone(),
        }
    }

    /// Attach a run to both series collections. Returns `false` if already attached.
    pub(crate) fn attach(&self, run_uid: &str) -> bool {
        let mut state = self.state.lock();
        if state.runs.iter().any(|r| r == run_uid) {
            return false;
        }
        state.runs.push(run_uid.to_string());
        state.xanes.attach(run_uid);
        state.xmcd.attach(run_uid);
        true
    }

    /// Append one derived point. Returns `false` if the run is not attached.
    pub(crate) fn append(&self, run_uid: &str, x: f64, xas: f64, xmcd: f64) -> bool {
        let mut state = self.state.lock();
        let xanes_ok = state.xanes.push(run_uid, [x, xas]);
        let xmcd_ok = state.xmcd.push(run_uid, [x, xmcd]);
        xanes_ok && xmcd_ok
    }

    /// Detach a run and drop its points; other runs are untouched.
    pub(crate) fn remove(&self, run_uid: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.runs.len();
        state.runs.retain(|r| r != run_uid);
        state.xanes.remove(run_uid);
        state.xmcd.remove(run_uid);
        state.runs.len() != before
    }
}

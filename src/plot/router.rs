//! Routes dichroism runs into shared plot groups.
//!
//! A source run takes part only when its Start hints carry the configured
//! `scan_type` tag. The tag is consumed, the first scanned field becomes the
//! axis name, and the run is attached to the [`PlotGroup`] for that axis,
//! creating it on first use. Points then arrive through the relayed sub-run,
//! which is linked back to its source run by [`PARENT_RUN_KEY`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{DichroConfig, XAS_KEY, XMCD_KEY};
use crate::dichro::relay::{PARENT_RUN_KEY, POSITIONER_CONFIG_KEY};
use crate::experiment::{Document, EventDoc, StartDoc};
use crate::plot::group::PlotGroup;

/// Change applied to the plot-group map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mutation", rename_all = "snake_case")]
pub enum PlotMutation {
    /// First run scanned along `axis`
    GroupCreated {
        /// Group axis
        axis: String,
    },
    /// A source run joined the group
    RunAttached {
        /// Group axis
        axis: String,
        /// Source run
        run_uid: String,
    },
    /// One derived point for both series of a run
    PointAppended {
        /// Group axis
        axis: String,
        /// Source run
        run_uid: String,
        /// Positioner value
        x: f64,
        /// XANES ordinate
        xas: f64,
        /// XMCD ordinate
        xmcd: f64,
    },
    /// A run's series were dropped
    RunRemoved {
        /// Group axis
        axis: String,
        /// Source run
        run_uid: String,
    },
}

#[derive(Debug)]
struct SubRun {
    source_run_uid: String,
    group: Arc<PlotGroup>,
    positioner: Option<String>,
}

/// Owner of every plot group, keyed by axis name.
///
/// Shared as `Arc<PlotRouter>` between callbacks; all state is behind
/// internal locks.
#[derive(Debug)]
pub struct PlotRouter {
    scan_type_tag: String,
    groups: Mutex<HashMap<String, Arc<PlotGroup>>>,
    routes: Mutex<HashMap<String, Arc<PlotGroup>>>,
    sub_runs: Mutex<HashMap<String, SubRun>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<PlotMutation>>>,
}

impl PlotRouter {
    /// Router gating on the configured `scan_type_tag`.
    pub fn new(config: &DichroConfig) -> Self {
        Self::with_tag(config.scan_type_tag.clone())
    }

    /// Router gating on an explicit tag.
    pub fn with_tag(scan_type_tag: impl Into<String>) -> Self {
        Self {
            scan_type_tag: scan_type_tag.into(),
            groups: Mutex::new(HashMap::new()),
            routes: Mutex::new(HashMap::new()),
            sub_runs: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Receive every plot mutation from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PlotMutation> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Inspect a source run's Start and attach it to a plot group.
    ///
    /// Runs without the dichroism tag are left untouched. For tagged runs the
    /// `scan_type` hint is removed before the document travels further.
    pub fn start_run(&self, start: &mut StartDoc) -> Option<Arc<PlotGroup>> {
        if start.hints.scan_type.as_deref() != Some(self.scan_type_tag.as_str()) {
            return None;
        }
        start.hints.scan_type = None;

        let Some(axis) = start.hints.primary_axis().map(str::to_string) else {
            warn!(run = %start.uid, "Dichro run declares no scanned field; not plotting");
            return None;
        };

        let group = self.group_or_create(&axis);
        if group.attach(&start.uid) {
            self.emit(PlotMutation::RunAttached {
                axis: axis.clone(),
                run_uid: start.uid.clone(),
            });
        }
        self.routes
            .lock()
            .insert(start.uid.clone(), Arc::clone(&group));
        info!(run = %start.uid, axis = %axis, "Routing dichro run to plot group");
        Some(group)
    }

    /// Consume a relayed document.
    pub fn handle(&self, doc: &Document) {
        match doc {
            Document::Start(start) => self.link_sub_run(start),
            Document::Descriptor(desc) => {
                if let Some(sub) = self.sub_runs.lock().get_mut(&desc.run_uid) {
                    sub.positioner = desc.configuration.get(POSITIONER_CONFIG_KEY).cloned();
                }
            }
            Document::Event(event) => self.append(event),
            Document::Stop(stop) => {
                let sub = self.sub_runs.lock().remove(&stop.run_uid);
                if let Some(sub) = sub {
                    self.routes.lock().remove(&sub.source_run_uid);
                    debug!(run = %sub.source_run_uid, "Dichro run detached from live routing");
                }
            }
        }
    }

    /// Remove one run's points from every group. Groups themselves persist.
    pub fn remove_run(&self, run_uid: &str) -> bool {
        self.routes.lock().remove(run_uid);
        self.sub_runs
            .lock()
            .retain(|_, sub| sub.source_run_uid != run_uid);

        let groups: Vec<Arc<PlotGroup>> = self.groups.lock().values().cloned().collect();
        let mut removed = false;
        for group in groups {
            if group.remove(run_uid) {
                removed = true;
                self.emit(PlotMutation::RunRemoved {
                    axis: group.axis().to_string(),
                    run_uid: run_uid.to_string(),
                });
            }
        }
        removed
    }

    /// Group for `axis`, if any run has used it.
    pub fn group(&self, axis: &str) -> Option<Arc<PlotGroup>> {
        self.groups.lock().get(axis).cloned()
    }

    /// Whether points relayed for `run_uid` would still be routed.
    ///
    /// Cleared when the run's sub-run stops, however it stopped.
    pub fn is_routing(&self, run_uid: &str) -> bool {
        self.routes.lock().contains_key(run_uid)
            || self
                .sub_runs
                .lock()
                .values()
                .any(|sub| sub.source_run_uid == run_uid)
    }

    /// Axis names with a plot group, sorted.
    pub fn axes(&self) -> Vec<String> {
        let mut axes: Vec<String> = self.groups.lock().keys().cloned().collect();
        axes.sort();
        axes
    }

    fn group_or_create(&self, axis: &str) -> Arc<PlotGroup> {
        let (group, created) = {
            let mut groups = self.groups.lock();
            match groups.get(axis) {
                Some(group) => (Arc::clone(group), false),
                None => {
                    let group = Arc::new(PlotGroup::new(axis));
                    groups.insert(axis.to_string(), Arc::clone(&group));
                    (group, true)
                }
            }
        };
        if created {
            info!(axis = %axis, "Created plot group");
            self.emit(PlotMutation::GroupCreated {
                axis: axis.to_string(),
            });
        }
        group
    }

    fn link_sub_run(&self, start: &StartDoc) {
        let Some(parent) = start.metadata.get(PARENT_RUN_KEY) else {
            return;
        };
        let Some(group) = self.routes.lock().get(parent).cloned() else {
            debug!(run = %start.uid, parent = %parent, "Relayed run has no plotted source");
            return;
        };
        self.sub_runs.lock().insert(
            start.uid.clone(),
            SubRun {
                source_run_uid: parent.clone(),
                group,
                positioner: None,
            },
        );
    }

    fn append(&self, event: &EventDoc) {
        let (source_run_uid, group, positioner) = {
            let sub_runs = self.sub_runs.lock();
            let Some(sub) = sub_runs.get(&event.run_uid) else {
                return;
            };
            let positioner = sub
                .positioner
                .clone()
                .unwrap_or_else(|| sub.group.axis().to_string());
            (sub.source_run_uid.clone(), Arc::clone(&sub.group), positioner)
        };

        let scalar = |key: &str| event.data.get(key).and_then(|v| v.as_scalar());
        let (Some(x), Some(xas), Some(xmcd)) =
            (scalar(&positioner), scalar(XAS_KEY), scalar(XMCD_KEY))
        else {
            warn!(event = %event.uid, "Relayed event lacks plot fields; skipping point");
            return;
        };

        if group.append(&source_run_uid, x, xas, xmcd) {
            self.emit(PlotMutation::PointAppended {
                axis: group.axis().to_string(),
                run_uid: source_run_uid,
                x,
                xas,
                xmcd,
            });
        }
    }

    fn emit(&self, mutation: PlotMutation) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(mutation.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::DescriptorDoc;

    fn dichro_start(axis: &str) -> StartDoc {
        StartDoc::new("scan", "XMCD")
            .with_scan_type("dichro")
            .with_dimension(&[axis], "primary")
    }

    fn relayed(source: &StartDoc) -> (StartDoc, DescriptorDoc) {
        let start = StartDoc::new("dichro_stream", "relay").with_metadata(PARENT_RUN_KEY, &source.uid);
        let desc = DescriptorDoc::new(&start.uid, "primary").with_config(POSITIONER_CONFIG_KEY, "energy");
        (start, desc)
    }

    #[test]
    fn test_untagged_run_ignored() {
        let router = PlotRouter::with_tag("dichro");
        let mut rx = router.subscribe();
        let mut start = StartDoc::new("scan", "Plain")
            .with_scan_type("xanes")
            .with_dimension(&["energy"], "primary");
        let before = start.clone();

        assert!(router.start_run(&mut start).is_none());
        assert_eq!(start, before);
        assert!(router.axes().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_tag_consumed_and_group_created() {
        let router = PlotRouter::with_tag("dichro");
        let mut rx = router.subscribe();
        let mut start = dichro_start("energy");

        let group = router.start_run(&mut start).unwrap();
        assert!(start.hints.scan_type.is_none());
        assert_eq!(group.axis(), "energy");
        assert!(group.contains_run(&start.uid));
        assert_eq!(
            rx.try_recv().unwrap(),
            PlotMutation::GroupCreated { axis: "energy".into() }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            PlotMutation::RunAttached {
                axis: "energy".into(),
                run_uid: start.uid.clone()
            }
        );
    }

    #[test]
    fn test_runs_sharing_axis_share_group() {
        let router = PlotRouter::with_tag("dichro");
        let first = router.start_run(&mut dichro_start("energy")).unwrap();
        let second = router.start_run(&mut dichro_start("energy")).unwrap();
        let other = router.start_run(&mut dichro_start("field")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(first.runs().len(), 2);
        assert_eq!(router.axes(), vec!["energy".to_string(), "field".to_string()]);
    }

    #[test]
    fn test_missing_axis_ignored() {
        let router = PlotRouter::with_tag("dichro");
        let mut start = StartDoc::new("scan", "XMCD").with_scan_type("dichro");
        assert!(router.start_run(&mut start).is_none());
        assert!(router.axes().is_empty());
    }

    #[test]
    fn test_relayed_points_land_on_source_run() {
        let router = PlotRouter::with_tag("dichro");
        let mut source = dichro_start("energy");
        let group = router.start_run(&mut source).unwrap();
        let (sub_start, desc) = relayed(&source);

        router.handle(&Document::Start(sub_start.clone()));
        router.handle(&Document::Descriptor(desc.clone()));
        let event = EventDoc::new(&sub_start.uid, &desc.uid, 1)
            .with_datum("energy", 7.1)
            .with_datum(XAS_KEY, 0.95)
            .with_datum(XMCD_KEY, 0.05);
        router.handle(&Document::Event(event));

        assert_eq!(group.xanes(&source.uid), Some(vec![[7.1, 0.95]]));
        assert_eq!(group.xmcd(&source.uid), Some(vec![[7.1, 0.05]]));

        assert!(router.is_routing(&source.uid));
        router.handle(&Document::Stop(crate::experiment::StopDoc::success(&sub_start.uid, 1)));
        assert!(!router.is_routing(&source.uid));
        let late = EventDoc::new(&sub_start.uid, &desc.uid, 2)
            .with_datum("energy", 7.2)
            .with_datum(XAS_KEY, 1.0)
            .with_datum(XMCD_KEY, 0.0);
        router.handle(&Document::Event(late));
        assert_eq!(group.xanes(&source.uid).map(|p| p.len()), Some(1));
    }

    #[test]
    fn test_remove_run_keeps_group_and_others() {
        let router = PlotRouter::with_tag("dichro");
        let mut a = dichro_start("energy");
        let mut b = dichro_start("energy");
        let group = router.start_run(&mut a).unwrap();
        router.start_run(&mut b).unwrap();

        let mut rx = router.subscribe();
        assert!(router.remove_run(&a.uid));
        assert!(!router.remove_run(&a.uid));
        assert_eq!(group.runs(), vec![b.uid.clone()]);
        assert!(router.group("energy").is_some());
        assert!(matches!(rx.try_recv(), Ok(PlotMutation::RunRemoved { .. })));
    }
}

//! Primary-stream admission.
//!
//! Events do not carry their stream name; it is declared by the descriptor they
//! reference. The filter remembers every descriptor seen in the active run and
//! admits an event only when its descriptor belongs to the configured stream.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::experiment::{DescriptorDoc, EventDoc, StartDoc};

/// Run-scoped descriptor registry that admits primary-stream events.
#[derive(Debug)]
pub struct StreamFilter {
    primary_stream: String,
    run_uid: Option<String>,
    descriptors: HashMap<String, Arc<DescriptorDoc>>,
}

impl StreamFilter {
    /// Filter admitting events of descriptors named `primary_stream`.
    pub fn new(primary_stream: impl Into<String>) -> Self {
        Self {
            primary_stream: primary_stream.into(),
            run_uid: None,
            descriptors: HashMap::new(),
        }
    }

    /// Begin a run, forgetting descriptors from any earlier run.
    pub fn start(&mut self, start: &StartDoc) {
        self.descriptors.clear();
        self.run_uid = Some(start.uid.clone());
    }

    /// Remember a descriptor. Returns `true` if it declares the primary stream.
    pub fn register(&mut self, descriptor: &DescriptorDoc) -> bool {
        if !self.is_active_run(&descriptor.run_uid) {
            debug!(
                descriptor = %descriptor.uid,
                run = %descriptor.run_uid,
                "Ignoring descriptor outside the active run"
            );
            return false;
        }
        let primary = descriptor.name == self.primary_stream;
        self.descriptors
            .insert(descriptor.uid.clone(), Arc::new(descriptor.clone()));
        primary
    }

    /// Descriptor of `event` if the event belongs to the primary stream.
    pub fn admit(&self, event: &EventDoc) -> Option<Arc<DescriptorDoc>> {
        if !self.is_active_run(&event.run_uid) {
            return None;
        }
        match self.descriptors.get(&event.descriptor_uid) {
            Some(desc) if desc.name == self.primary_stream => Some(Arc::clone(desc)),
            Some(_) => None,
            None => {
                warn!(
                    event = %event.uid,
                    descriptor = %event.descriptor_uid,
                    "Dropping event for unknown descriptor"
                );
                None
            }
        }
    }

    /// Look up a registered descriptor.
    pub fn descriptor(&self, uid: &str) -> Option<&DescriptorDoc> {
        self.descriptors.get(uid).map(Arc::as_ref)
    }

    /// End the active run and drop all state.
    pub fn stop(&mut self) {
        self.descriptors.clear();
        self.run_uid = None;
    }

    /// Active run, if any.
    pub fn run_uid(&self) -> Option<&str> {
        self.run_uid.as_deref()
    }

    fn is_active_run(&self, run_uid: &str) -> bool {
        self.run_uid.as_deref() == Some(run_uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::DataKey;

    #[test]
    fn test_admits_only_primary_stream() {
        let start = StartDoc::new("scan", "Scan");
        let mut filter = StreamFilter::new("primary");
        filter.start(&start);

        let primary = DescriptorDoc::new(&start.uid, "primary")
            .with_data_key("energy", DataKey::scalar("mono", "keV"));
        let baseline = DescriptorDoc::new(&start.uid, "baseline");
        assert!(filter.register(&primary));
        assert!(!filter.register(&baseline));

        let kept = EventDoc::new(&start.uid, &primary.uid, 1);
        let dropped = EventDoc::new(&start.uid, &baseline.uid, 1);
        assert_eq!(filter.admit(&kept).map(|d| d.uid.clone()), Some(primary.uid));
        assert!(filter.admit(&dropped).is_none());
    }

    #[test]
    fn test_unknown_descriptor_and_foreign_run_dropped() {
        let start = StartDoc::new("scan", "Scan");
        let mut filter = StreamFilter::new("primary");
        filter.start(&start);

        let orphan = EventDoc::new(&start.uid, "missing", 1);
        assert!(filter.admit(&orphan).is_none());

        let foreign = DescriptorDoc::new("other-run", "primary");
        assert!(!filter.register(&foreign));
    }

    #[test]
    fn test_stop_resets_state() {
        let start = StartDoc::new("scan", "Scan");
        let mut filter = StreamFilter::new("primary");
        filter.start(&start);
        let desc = DescriptorDoc::new(&start.uid, "primary");
        filter.register(&desc);

        filter.stop();
        assert!(filter.run_uid().is_none());
        assert!(filter.descriptor(&desc.uid).is_none());
        assert!(filter.admit(&EventDoc::new(&start.uid, &desc.uid, 1)).is_none());
    }
}

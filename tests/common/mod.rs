//! Common test utilities for dichro_daq integration tests
//!
//! This module provides a small scan simulator that produces the document
//! sequence a run-engine would emit for a dichroism scan.

#![allow(dead_code)] // Utilities may not all be used by every test binary

use dichro_daq::experiment::{DataKey, DescriptorDoc, Document, EventDoc, StartDoc, StopDoc};

/// Absolute tolerance for derived-value comparisons.
pub const EPS: f64 = 1e-9;

/// One simulated run: start, a primary and a baseline descriptor, events.
pub struct SimulatedRun {
    pub start: StartDoc,
    pub primary: DescriptorDoc,
    pub baseline: DescriptorDoc,
    next_seq: u32,
}

impl SimulatedRun {
    /// A run tagged for dichroism routing along `axis`.
    pub fn dichro(axis: &str) -> Self {
        Self::from_start(
            StartDoc::new("scan", "XMCD scan")
                .with_scan_type("dichro")
                .with_dimension(&[axis], "primary"),
        )
    }

    /// A run with ordinary hints only.
    pub fn plain(axis: &str) -> Self {
        Self::from_start(StartDoc::new("scan", "XANES scan").with_dimension(&[axis], "primary"))
    }

    pub fn from_start(start: StartDoc) -> Self {
        let primary = DescriptorDoc::new(&start.uid, "primary")
            .with_data_key("energy", DataKey::scalar("mono", "keV"))
            .with_data_key("monitor", DataKey::scalar("ic0", "counts"))
            .with_data_key("detector", DataKey::scalar("ic1", "counts"));
        let baseline = DescriptorDoc::new(&start.uid, "baseline")
            .with_data_key("ring_current", DataKey::scalar("sr", "mA"));
        Self {
            start,
            primary,
            baseline,
            next_seq: 1,
        }
    }

    pub fn run_uid(&self) -> &str {
        &self.start.uid
    }

    /// Start and both descriptors.
    pub fn opening(&self) -> Vec<Document> {
        vec![
            Document::Start(self.start.clone()),
            Document::Descriptor(self.primary.clone()),
            Document::Descriptor(self.baseline.clone()),
        ]
    }

    /// A primary-stream event.
    pub fn point(&mut self, energy: f64, monitor: f64, detector: f64) -> Document {
        let seq = self.next_seq;
        self.next_seq += 1;
        Document::Event(
            EventDoc::new(&self.start.uid, &self.primary.uid, seq)
                .with_datum("energy", energy)
                .with_datum("monitor", monitor)
                .with_datum("detector", detector),
        )
    }

    /// A baseline-stream event carrying no dichro channels.
    pub fn baseline_point(&self) -> Document {
        Document::Event(
            EventDoc::new(&self.start.uid, &self.baseline.uid, 1).with_datum("ring_current", 102.0),
        )
    }

    /// Four events of one polarization cycle at `energy`, detector `[10, 9, 9, 10]`.
    pub fn cycle(&mut self, energy: f64) -> Vec<Document> {
        [10.0, 9.0, 9.0, 10.0]
            .into_iter()
            .map(|detector| self.point(energy, 10.0, detector))
            .collect()
    }

    pub fn stop(&self) -> Document {
        Document::Stop(StopDoc::success(&self.start.uid, self.next_seq - 1))
    }
}

/// Relayed Event documents, in order.
pub fn relayed_events(docs: &[Document]) -> Vec<&EventDoc> {
    docs.iter()
        .filter_map(|d| match d {
            Document::Event(e) => Some(e),
            _ => None,
        })
        .collect()
}

/// Scalar field of a relayed event.
pub fn field(event: &EventDoc, key: &str) -> f64 {
    event.data[key].as_scalar().expect("scalar field")
}

//! Re-publishes derived events as a synthetic sub-run.
//!
//! Downstream consumers receive an ordinary Start/Descriptor/Event/Stop stream
//! and need no special casing. The sub-run Start links back to its source run
//! through [`PARENT_RUN_KEY`]; the descriptor names the independent variable
//! in its configuration under [`POSITIONER_CONFIG_KEY`].

use crate::config::{DichroConfig, XAS_KEY, XMCD_KEY};
use crate::dichro::transform::DerivedEvent;
use crate::experiment::{DataKey, DescriptorDoc, Document, EventDoc, StartDoc, StopDoc};

/// Plan type of relayed sub-runs.
pub const RELAY_PLAN_TYPE: &str = "dichro_stream";
/// Start metadata key holding the source run uid.
pub const PARENT_RUN_KEY: &str = "parent_run_uid";
/// Descriptor configuration key naming the positioner field.
pub const POSITIONER_CONFIG_KEY: &str = "positioner";
/// Stream name of the relayed descriptor.
pub const RELAY_STREAM: &str = "primary";

/// Framing state of one synthetic sub-run.
#[derive(Debug)]
pub struct RunRelay {
    source_run_uid: String,
    start: StartDoc,
    descriptor: DescriptorDoc,
    positioner_key: String,
    next_seq: u32,
}

impl RunRelay {
    /// Open a sub-run for `source`, returning its Start and Descriptor documents.
    pub fn open(source: &StartDoc, config: &DichroConfig) -> (Self, Vec<Document>) {
        let start = StartDoc::new(RELAY_PLAN_TYPE, &format!("{} (dichro)", source.plan_name))
            .with_metadata(PARENT_RUN_KEY, &source.uid)
            .with_dimension(&[config.positioner_key.as_str()], RELAY_STREAM);

        let descriptor = DescriptorDoc::new(&start.uid, RELAY_STREAM)
            .with_data_key(&config.positioner_key, DataKey::scalar(RELAY_PLAN_TYPE, ""))
            .with_data_key(XAS_KEY, DataKey::scalar(RELAY_PLAN_TYPE, ""))
            .with_data_key(XMCD_KEY, DataKey::scalar(RELAY_PLAN_TYPE, ""))
            .with_config(POSITIONER_CONFIG_KEY, &config.positioner_key)
            .with_config("transmission_mode", &config.transmission_mode.to_string())
            .with_config("window_size", &config.window_size.to_string());

        let docs = vec![
            Document::Start(start.clone()),
            Document::Descriptor(descriptor.clone()),
        ];
        let relay = Self {
            source_run_uid: source.uid.clone(),
            start,
            descriptor,
            positioner_key: config.positioner_key.clone(),
            next_seq: 1,
        };
        (relay, docs)
    }

    /// Wrap one derived event as a sub-run Event document.
    pub fn relay(&mut self, derived: &DerivedEvent) -> Document {
        let mut event = EventDoc::new(&self.start.uid, &self.descriptor.uid, self.next_seq)
            .with_datum(&self.positioner_key, derived.positioner_mean)
            .with_datum(XAS_KEY, derived.xas)
            .with_datum(XMCD_KEY, derived.xmcd);
        event.time_ns = derived.time_ns;
        self.next_seq += 1;
        Document::Event(event)
    }

    /// Close the sub-run, mirroring the source run's exit status.
    pub fn close(self, source_stop: &StopDoc) -> Document {
        Document::Stop(StopDoc::with_status(
            &self.start.uid,
            &source_stop.exit_status,
            &source_stop.reason,
            self.emitted(),
        ))
    }

    /// Run the sub-run was opened for.
    pub fn source_run_uid(&self) -> &str {
        &self.source_run_uid
    }

    /// Uid of the sub-run's own Start.
    pub fn run_uid(&self) -> &str {
        &self.start.uid
    }

    /// Number of Event documents relayed so far.
    pub fn emitted(&self) -> u32 {
        self.next_seq - 1
    }
}

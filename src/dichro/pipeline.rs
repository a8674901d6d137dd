//! Per-run dichroism pipeline.
//!
//! ```text
//! Document ─► StreamFilter ─► Windower ─► ConsistencyValidator ─► DichroTransform ─► RunRelay ─► subscribers
//! ```
//!
//! Every document is processed synchronously and completely before the call
//! returns. A window error aborts only that window: it is logged, counted and
//! returned, and the next document is accepted as usual.
//!
//! A Start that arrives while a run is still open closes the open sub-run with
//! an `abort` Stop before the new sub-run is opened.

use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, DichroConfig};
use crate::dichro::filter::StreamFilter;
use crate::dichro::relay::RunRelay;
use crate::dichro::transform::{DerivedEvent, DichroTransform};
use crate::dichro::validate::ConsistencyValidator;
use crate::dichro::window::{Window, Windower};
use crate::error::WindowError;
use crate::experiment::{Document, EventDoc, StartDoc, StopDoc};

/// Stop reason of a sub-run closed because its source run never stopped.
pub const SUPERSEDED_REASON: &str = "superseded by new run";

/// Counters accumulated over the pipeline's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Source events received
    pub events_seen: u64,
    /// Events that passed the stream filter
    pub events_admitted: u64,
    /// Full windows handed to validation
    pub windows_sealed: u64,
    /// Sealed windows rejected by validation or the transform
    pub windows_failed: u64,
    /// Derived events relayed
    pub derived_emitted: u64,
    /// Events dropped in partial windows at Stop or restart
    pub partial_events_discarded: u64,
}

/// Stream filter, windower, validator, transform and relay for one run at a time.
pub struct DichroPipeline {
    config: Arc<DichroConfig>,
    filter: StreamFilter,
    windower: Windower,
    validator: ConsistencyValidator,
    transform: DichroTransform,
    relay: Option<RunRelay>,
    subscribers: Vec<mpsc::UnboundedSender<Document>>,
    stats: PipelineStats,
}

impl std::fmt::Debug for DichroPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DichroPipeline")
            .field("config", &self.config)
            .field("run_uid", &self.filter.run_uid())
            .field("subscribers", &self.subscribers.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl DichroPipeline {
    /// Build a pipeline from a validated configuration.
    pub fn new(config: Arc<DichroConfig>) -> Result<Self, ConfigError> {
        config.validate()?;
        let size = NonZeroUsize::new(config.window_size)
            .ok_or_else(|| ConfigError::Validation("window_size must be > 0".to_string()))?;
        let channels = config.channels();

        Ok(Self {
            filter: StreamFilter::new(config.primary_stream.clone()),
            windower: Windower::new(size),
            validator: ConsistencyValidator::new(channels.clone(), size.get()),
            transform: DichroTransform::new(channels, config.transmission_mode),
            relay: None,
            subscribers: Vec::new(),
            stats: PipelineStats::default(),
            config,
        })
    }

    /// Configuration the pipeline was built with.
    pub fn config(&self) -> &DichroConfig {
        &self.config
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Source run currently being processed.
    pub fn active_run(&self) -> Option<&str> {
        self.filter.run_uid()
    }

    /// Events buffered in partial windows.
    pub fn buffered(&self) -> usize {
        self.windower.buffered()
    }

    /// Receive every relayed document from now on.
    ///
    /// Dropping the receiver unsubscribes; closed channels are pruned on the
    /// next emission.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Document> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Process one source document, returning the relayed documents it produced.
    pub fn process(&mut self, doc: &Document) -> Result<Vec<Document>, WindowError> {
        let emitted = match doc {
            Document::Start(start) => self.on_start(start),
            Document::Descriptor(desc) => {
                if self.filter.register(desc) {
                    debug!(descriptor = %desc.uid, "Registered primary-stream descriptor");
                }
                Vec::new()
            }
            Document::Event(event) => self.on_event(event)?,
            Document::Stop(stop) => self.on_stop(stop),
        };
        self.publish(&emitted);
        Ok(emitted)
    }

    fn on_start(&mut self, start: &StartDoc) -> Vec<Document> {
        let mut docs = Vec::new();
        if let Some(previous) = self.filter.run_uid().map(str::to_string) {
            warn!(
                previous = %previous,
                next = %start.uid,
                "Run started before previous run stopped; discarding its state"
            );
            docs.extend(self.teardown(&previous));
        }

        info!(run = %start.uid, plan = %start.plan_name, "Dichro pipeline run started");
        self.filter.start(start);
        let (relay, opening) = RunRelay::open(start, &self.config);
        self.relay = Some(relay);
        docs.extend(opening);
        docs
    }

    fn on_event(&mut self, event: &EventDoc) -> Result<Vec<Document>, WindowError> {
        self.stats.events_seen += 1;
        if self.filter.admit(event).is_none() {
            return Ok(Vec::new());
        }
        self.stats.events_admitted += 1;

        let Some(window) = self.windower.push(event.clone()) else {
            return Ok(Vec::new());
        };
        self.stats.windows_sealed += 1;

        let derived = match self.reduce(window) {
            Ok(derived) => derived,
            Err(err) => {
                self.stats.windows_failed += 1;
                if err.is_misconfiguration() {
                    error!(kind = %err.kind(), "Dichro window rejected: {err}");
                } else {
                    warn!(kind = %err.kind(), "Dichro window rejected: {err}");
                }
                return Err(err);
            }
        };

        debug!(
            positioner = derived.positioner_mean,
            xas = derived.xas,
            xmcd = derived.xmcd,
            "Derived dichro point"
        );
        let Some(relay) = self.relay.as_mut() else {
            return Ok(Vec::new());
        };
        self.stats.derived_emitted += 1;
        Ok(vec![relay.relay(&derived)])
    }

    fn reduce(&self, window: Window) -> Result<DerivedEvent, WindowError> {
        let validated = self
            .validator
            .validate(window, |uid| self.filter.descriptor(uid))?;
        self.transform.apply(&validated)
    }

    fn on_stop(&mut self, stop: &StopDoc) -> Vec<Document> {
        if self.filter.run_uid() != Some(stop.run_uid.as_str()) {
            debug!(run = %stop.run_uid, "Ignoring stop for inactive run");
            return Vec::new();
        }

        let discarded = self.windower.clear();
        if discarded > 0 {
            warn!(
                run = %stop.run_uid,
                discarded,
                "Run stopped with a partial window; its events are dropped"
            );
            self.stats.partial_events_discarded += discarded as u64;
        }
        self.filter.stop();

        info!(run = %stop.run_uid, status = %stop.exit_status, "Dichro pipeline run stopped");
        self.relay
            .take()
            .map(|relay| relay.close(stop))
            .into_iter()
            .collect()
    }

    /// Drop the open run's state and close its sub-run as aborted.
    fn teardown(&mut self, previous: &str) -> Option<Document> {
        let discarded = self.windower.clear();
        self.stats.partial_events_discarded += discarded as u64;
        self.filter.stop();
        let relay = self.relay.take()?;
        Some(relay.close(&StopDoc::abort(previous, SUPERSEDED_REASON, 0)))
    }

    fn publish(&mut self, docs: &[Document]) {
        if docs.is_empty() {
            return;
        }
        self.subscribers
            .retain(|tx| docs.iter().all(|doc| tx.send(doc.clone()).is_ok()));
    }
}

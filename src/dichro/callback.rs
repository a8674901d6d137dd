//! Run-engine callback joining the pipeline to the plot router.

use std::sync::Arc;

use crate::config::{ConfigError, DichroConfig};
use crate::dichro::pipeline::DichroPipeline;
use crate::error::WindowError;
use crate::experiment::Document;
use crate::plot::PlotRouter;

/// Feeds source documents through a [`DichroPipeline`] and routes the results.
///
/// A source Start is offered to the router before the pipeline, so the
/// `scan_type` directive is consumed exactly once. Relayed documents are then
/// handed to the router in emission order.
#[derive(Debug)]
pub struct DichroCallback {
    pipeline: DichroPipeline,
    router: Arc<PlotRouter>,
}

impl DichroCallback {
    /// Build a pipeline and a fresh router from one configuration.
    pub fn new(config: Arc<DichroConfig>) -> Result<Self, ConfigError> {
        let router = Arc::new(PlotRouter::new(&config));
        Self::with_router(config, router)
    }

    /// Build a pipeline that routes into an existing, shared router.
    pub fn with_router(
        config: Arc<DichroConfig>,
        router: Arc<PlotRouter>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            pipeline: DichroPipeline::new(config)?,
            router,
        })
    }

    /// The wrapped pipeline.
    pub fn pipeline(&self) -> &DichroPipeline {
        &self.pipeline
    }

    /// Mutable access, e.g. to subscribe to relayed documents.
    pub fn pipeline_mut(&mut self) -> &mut DichroPipeline {
        &mut self.pipeline
    }

    /// The router, possibly shared with other callbacks.
    pub fn router(&self) -> &Arc<PlotRouter> {
        &self.router
    }

    /// Process one source document, returning the relayed documents.
    pub fn on_document(&mut self, mut doc: Document) -> Result<Vec<Document>, WindowError> {
        if let Document::Start(start) = &mut doc {
            self.router.start_run(start);
        }
        let relayed = self.pipeline.process(&doc)?;
        for relayed_doc in &relayed {
            self.router.handle(relayed_doc);
        }
        Ok(relayed)
    }
}

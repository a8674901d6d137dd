//! Dichroism event-stream aggregator
//!
//! Consumes the primary stream of a scan run in windows of four (by default)
//! events, one polarization-switching cycle each, and reduces every window
//! to a single XAS/XMCD point.
//!
//! # Architecture
//!
//! - **StreamFilter**: admits only events whose descriptor names the primary stream
//! - **Windower**: per-descriptor, non-overlapping fixed-size windows
//! - **ConsistencyValidator**: one descriptor per window, all channels declared
//! - **DichroTransform**: positioner mean, XAS and XMCD
//! - **RunRelay**: republishes derived points as a synthetic sub-run
//!
//! # Example
//!
//! ```rust,ignore
//! use dichro_daq::dichro::DichroCallback;
//!
//! let mut callback = DichroCallback::new(Arc::new(DichroConfig::default()))?;
//! for doc in documents {
//!     if let Err(err) = callback.on_document(doc) {
//!         // window dropped; the run continues
//!     }
//! }
//! let group = callback.router().group("energy");
//! ```

pub mod callback;
pub mod filter;
pub mod pipeline;
pub mod relay;
pub mod transform;
pub mod validate;
pub mod window;

pub use callback::DichroCallback;
pub use filter::StreamFilter;
pub use pipeline::{DichroPipeline, PipelineStats};
pub use relay::RunRelay;
pub use transform::{DerivedEvent, DichroTransform};
pub use validate::{ConsistencyValidator, ValidatedWindow};
pub use window::{Window, WindowState, Windower};

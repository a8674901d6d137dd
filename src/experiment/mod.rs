//! Scan document protocol
//!
//! The run-engine that produces these documents lives outside this crate. This
//! module only defines the Bluesky-inspired document types so that documents
//! can be consumed, relayed and stored as JSON lines.
//!
//! - **Documents**: Structured data streams (Start, Descriptor, Event, Stop)

pub mod document;

pub use document::{
    DataKey, DataValue, DescriptorDoc, Dimension, Document, EventDoc, Hints, StartDoc, StopDoc,
};

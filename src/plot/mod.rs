//! Plot routing for dichroism runs.
//!
//! Rendering is left to whichever viewer subscribes to [`PlotMutation`]s or
//! reads [`PlotGroup`] snapshots.

pub mod group;
pub mod router;

pub use group::{LineSeries, PlotGroup, PlotGroupSnapshot, SeriesCollection};
pub use router::{PlotMutation, PlotRouter};

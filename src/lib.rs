//! Core library for the dichro_daq pipeline.
//!
//! This library consumes Bluesky-style scan documents, reduces four-point
//! polarization-switching windows to XAS/XMCD values, relays them as a
//! synthetic sub-run and routes each dichroism run into reusable plot groups
//! keyed by scan axis. It never talks to hardware or storage.

pub mod config;
pub mod dichro;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod plot;
pub mod replay;

pub use config::DichroConfig;
pub use dichro::{DerivedEvent, DichroCallback, DichroPipeline};
pub use error::{AppResult, DichroError, WindowError, WindowErrorKind};
pub use experiment::Document;
pub use plot::{PlotGroup, PlotRouter};

//! JSON-lines replay of a recorded document stream.
//!
//! Each non-blank input line is one serialized [`Document`]. Relayed Event
//! documents are written to the output as JSON lines as they are produced,
//! followed by one [`PlotGroupSnapshot`](crate::plot::PlotGroupSnapshot) line
//! per plot group, in axis order.

use std::io::{BufRead, Write};

use serde::Serialize;
use tracing::warn;

use crate::dichro::{DichroCallback, PipelineStats};
use crate::error::{AppResult, DichroError};
use crate::experiment::Document;

/// Outcome of one replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Documents parsed from the input
    pub documents: usize,
    /// Relayed events written to the output
    pub events_written: usize,
    /// Windows skipped because they failed validation or the transform
    pub failed_windows: usize,
    /// Plot-group summary lines written
    pub groups: usize,
    /// Pipeline counters at the end of the replay
    pub stats: PipelineStats,
}

/// Feed every document in `reader` through `callback`, writing results to `out`.
///
/// A malformed line stops the replay with [`DichroError::Json`] carrying its
/// 1-based line number. Window errors are logged and counted.
pub fn replay_stream<R, W>(
    reader: R,
    mut out: W,
    callback: &mut DichroCallback,
) -> AppResult<ReplaySummary>
where
    R: BufRead,
    W: Write,
{
    let mut documents = 0;
    let mut events_written = 0;
    let mut failed_windows = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: Document = serde_json::from_str(&line).map_err(|source| DichroError::Json {
            line: index + 1,
            source,
        })?;
        documents += 1;

        match callback.on_document(doc) {
            Ok(relayed) => {
                for event in relayed.iter().filter(|d| matches!(d, Document::Event(_))) {
                    serde_json::to_writer(&mut out, event)?;
                    writeln!(out)?;
                    events_written += 1;
                }
            }
            Err(err) => {
                failed_windows += 1;
                warn!(line = index + 1, kind = %err.kind(), "Skipped window: {err}");
            }
        }
    }

    let router = callback.router();
    let mut groups = 0;
    for axis in router.axes() {
        if let Some(group) = router.group(&axis) {
            serde_json::to_writer(&mut out, &group.snapshot())?;
            writeln!(out)?;
            groups += 1;
        }
    }
    out.flush()?;

    Ok(ReplaySummary {
        documents,
        events_written,
        failed_windows,
        groups,
        stats: callback.pipeline().stats(),
    })
}

//! Fixed-size event windows.
//!
//! Each active descriptor owns at most one buffer. A buffer moves through
//! `Empty → Accumulating → Full`; on reaching `Full` it is sealed into a
//! [`Window`] and the descriptor's slot returns to `Empty`. Windows never
//! overlap and excess events are never carried over.

use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;

use crate::experiment::EventDoc;

/// Buffer state for one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// No events buffered
    Empty,
    /// Fewer than `size` events buffered
    Accumulating,
    /// `size` events buffered; sealed on the same push
    Full,
}

/// A sealed, read-only batch of consecutive events.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    events: Vec<EventDoc>,
}

impl Window {
    /// Seal an arbitrary, non-empty batch of events.
    ///
    /// The events need not share a descriptor; that is checked by the validator.
    pub fn from_events(events: Vec<EventDoc>) -> Option<Self> {
        if events.is_empty() {
            None
        } else {
            Some(Self { events })
        }
    }

    /// Events in arrival order.
    pub fn events(&self) -> &[EventDoc] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always `false` for a window built by [`Window::from_events`].
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Descriptor of the first event.
    pub fn descriptor_uid(&self) -> &str {
        &self.events[0].descriptor_uid
    }

    /// Run of the first event.
    pub fn run_uid(&self) -> &str {
        &self.events[0].run_uid
    }

    /// Every distinct descriptor referenced by the window.
    pub fn descriptor_ids(&self) -> BTreeSet<String> {
        self.events
            .iter()
            .map(|e| e.descriptor_uid.clone())
            .collect()
    }
}

/// Accumulates admitted events into per-descriptor windows of `size` events.
#[derive(Debug)]
pub struct Windower {
    size: NonZeroUsize,
    buffers: HashMap<String, Vec<EventDoc>>,
}

impl Windower {
    /// Windower sealing every `size` events per descriptor.
    pub fn new(size: NonZeroUsize) -> Self {
        Self {
            size,
            buffers: HashMap::new(),
        }
    }

    /// Events per window.
    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// Append an event, returning the sealed window if this event filled it.
    pub fn push(&mut self, event: EventDoc) -> Option<Window> {
        let size = self.size.get();
        let buffer = self
            .buffers
            .entry(event.descriptor_uid.clone())
            .or_insert_with(|| Vec::with_capacity(size));
        buffer.push(event);

        if buffer.len() < size {
            return None;
        }
        // Full: seal and reset this descriptor to empty.
        Window::from_events(std::mem::take(buffer))
    }

    /// Buffer state of one descriptor.
    pub fn state(&self, descriptor_uid: &str) -> WindowState {
        match self.buffers.get(descriptor_uid).map(Vec::len) {
            None | Some(0) => WindowState::Empty,
            Some(n) if n < self.size.get() => WindowState::Accumulating,
            Some(_) => WindowState::Full,
        }
    }

    /// Number of events currently buffered across all descriptors.
    pub fn buffered(&self) -> usize {
        self.buffers.values().map(Vec::len).sum()
    }

    /// Drop every partial window, returning how many events were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.buffered();
        self.buffers.clear();
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windower(size: usize) -> Windower {
        Windower::new(NonZeroUsize::new(size).unwrap())
    }

    fn event(descriptor: &str, seq: u32) -> EventDoc {
        EventDoc::new("run", descriptor, seq)
    }

    #[test]
    fn test_seals_every_n_events() {
        for size in [1, 3, 4, 8] {
            let mut w = windower(size);
            let mut sealed = 0;
            for seq in 0..(size * 5 + size - 1) {
                if let Some(window) = w.push(event("d", seq as u32)) {
                    assert_eq!(window.len(), size);
                    sealed += 1;
                }
            }
            assert_eq!(sealed, 5);
            assert_eq!(w.buffered(), size - 1);
        }
    }

    #[test]
    fn test_windows_do_not_overlap() {
        let mut w = windower(4);
        let mut seqs = Vec::new();
        for seq in 0..8 {
            if let Some(window) = w.push(event("d", seq)) {
                seqs.push(window.events().iter().map(|e| e.seq_num).collect::<Vec<_>>());
            }
        }
        assert_eq!(seqs, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    }

    #[test]
    fn test_state_transitions() {
        let mut w = windower(2);
        assert_eq!(w.state("d"), WindowState::Empty);
        assert!(w.push(event("d", 0)).is_none());
        assert_eq!(w.state("d"), WindowState::Accumulating);
        assert!(w.push(event("d", 1)).is_some());
        assert_eq!(w.state("d"), WindowState::Empty);
    }

    #[test]
    fn test_descriptors_buffer_independently() {
        let mut w = windower(2);
        assert!(w.push(event("a", 0)).is_none());
        assert!(w.push(event("b", 0)).is_none());
        let window = w.push(event("a", 1)).unwrap();
        assert_eq!(window.descriptor_ids().len(), 1);
        assert_eq!(window.descriptor_uid(), "a");
        assert_eq!(w.state("b"), WindowState::Accumulating);
    }

    #[test]
    fn test_clear_discards_partial() {
        let mut w = windower(4);
        w.push(event("a", 0));
        w.push(event("a", 1));
        w.push(event("b", 0));
        assert_eq!(w.clear(), 3);
        assert_eq!(w.buffered(), 0);
    }

    #[test]
    fn test_from_events_rejects_empty() {
        assert!(Window::from_events(Vec::new()).is_none());
        let window = Window::from_events(vec![event("a", 0), event("b", 1)]).unwrap();
        assert_eq!(window.descriptor_ids().len(), 2);
    }
}

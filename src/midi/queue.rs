// Delayed message queue
// Tick-indexed buckets of outbound messages (principally note-offs)

use crate::midi::event::MidiEvent;
use std::collections::HashMap;

/// Pending messages keyed by the absolute tick they are due on
///
/// Draining matches the tick exactly. A bucket whose tick is never drained
/// (the clock skipped it, or was restarted) stays until `clear_all`.
#[derive(Debug, Clone)]
pub struct DelayedMessageQueue<M = MidiEvent> {
    buckets: HashMap<u64, Vec<M>>,
}

impl<M> DelayedMessageQueue<M> {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }

    /// Append `message` to the bucket for `tick`, creating it if absent
    pub fn schedule(&mut self, tick: u64, message: M) {
        self.buckets.entry(tick).or_default().push(message);
    }

    /// Remove and return every message scheduled for exactly `tick`
    ///
    /// Messages come back in insertion order for that bucket.
    pub fn drain_and_remove(&mut self, tick: u64) -> Vec<M> {
        self.buckets.remove(&tick).unwrap_or_default()
    }

    /// Discard every pending bucket (panic / all-notes-off)
    pub fn clear_all(&mut self) {
        self.buckets.clear();
    }

    /// Total number of pending messages across all buckets
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Ticks that still have messages waiting, in ascending order
    pub fn pending_ticks(&self) -> Vec<u64> {
        let mut ticks: Vec<u64> = self.buckets.keys().copied().collect();
        ticks.sort_unstable();
        ticks
    }
}

impl<M> Default for DelayedMessageQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

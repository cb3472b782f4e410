//! Log of locally issued control changes
//!
//! Each record holds the control state in effect from its timestamp until
//! the next record. Timestamps are non-decreasing; there is one producer.

use std::collections::VecDeque;

use crate::util::time::{Millis, TICK_SIZE};

use super::Controls;

/// History kept before the start of a merge window
pub const TRIM_MARGIN: Millis = 5.0 * TICK_SIZE;

/// One control change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputRecord {
    pub at: Millis,
    pub controls: Controls,
}

#[derive(Debug, Default)]
pub struct InputLog {
    records: VecDeque<InputRecord>,
}

impl InputLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a control change. Out-of-order timestamps are pulled forward
    /// to the latest recorded time.
    pub fn record(&mut self, at: Millis, controls: Controls) {
        let at = match self.records.back() {
            Some(last) if at < last.at => last.at,
            _ => at,
        };
        self.records.push_back(InputRecord { at, controls });
    }

    /// Drop records that were superseded before `cutoff`, keeping the one in
    /// effect at `cutoff` and everything after it.
    pub fn trim(&mut self, cutoff: Millis) {
        while self.records.len() > 1 && self.records[1].at < cutoff {
            self.records.pop_front();
        }
    }

    /// Per-tick control states for the `ticks` ticks after `start`.
    ///
    /// The value for each tick is the latest record at or before that tick's
    /// boundary, so several changes inside one tick collapse to the last.
    /// Trims the log first.
    pub fn merge(&mut self, start: Millis, ticks: u32) -> Merge<'_> {
        self.trim(start - TRIM_MARGIN);
        Merge {
            records: &self.records,
            cursor: 0,
            boundary: start,
            remaining: ticks,
            current: Controls::empty(),
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Controls in effect after the most recent change
    pub fn latest(&self) -> Controls {
        self.records
            .back()
            .map(|r| r.controls)
            .unwrap_or_default()
    }

    pub fn records(&self) -> impl Iterator<Item = &InputRecord> {
        self.records.iter()
    }
}

/// Iterator returned by [`InputLog::merge`]. Yields exactly the requested
/// number of values, then ends.
#[derive(Debug)]
pub struct Merge<'a> {
    records: &'a VecDeque<InputRecord>,
    cursor: usize,
    boundary: Millis,
    remaining: u32,
    current: Controls,
}

impl Iterator for Merge<'_> {
    type Item = Controls;

    fn next(&mut self) -> Option<Controls> {
        if self.remaining == 0 {
            return None;
        }
        self.boundary += TICK_SIZE;
        while let Some(record) = self.records.get(self.cursor) {
            if record.at > self.boundary {
                break;
            }
            self.current = record.controls;
            self.cursor += 1;
        }
        self.remaining -= 1;
        Some(self.current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Merge<'_> {}

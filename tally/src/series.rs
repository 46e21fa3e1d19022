//! Step-function record of a running count.
//!
//! Every successful [`TimeSeries::increase`] appends `(timestamp, cumulative value)`. The value at
//! `keys[i]` holds until `keys[i + 1]`, or indefinitely for the last entry. Queries over this record
//! live in [`crate::window`]; the only way history shrinks is [`TimeSeries::cut`].

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};

/// A series shared between its owner (usually the registry) and at most one summarizer.
pub type SharedSeries = Arc<Mutex<TimeSeries>>;

pub struct TimeSeries {
    name: String,
    pub(crate) keys: Vec<i64>,
    pub(crate) values: Vec<i64>,
    pub(crate) last_value: i64,
    pub(crate) first_at: Option<i64>,
    pub(crate) last_at: Option<i64>,
    born_at: i64,
    recording: bool,
    destroyed: bool,
    pub(crate) clock: Arc<dyn Clock>,
}

/// History evicted by a cut, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evicted {
    pub keys: Vec<i64>,
    pub values: Vec<i64>,
}

/// Outcome of [`TimeSeries::cut`]. `evicted` is `None` when the cut changed nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cut {
    pub cut_at: i64,
    pub evicted: Option<Evicted>,
}

impl Cut {
    fn noop(cut_at: i64) -> Self {
        Cut {
            cut_at,
            evicted: None,
        }
    }
}

impl TimeSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name, Arc::new(SystemClock))
    }

    pub fn with_clock(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        TimeSeries {
            name: name.into(),
            keys: Vec::new(),
            values: Vec::new(),
            last_value: 0,
            first_at: None,
            last_at: None,
            born_at: clock.now_ms(),
            recording: true,
            destroyed: false,
            clock,
        }
    }

    pub fn shared(self) -> SharedSeries {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn born_at(&self) -> i64 {
        self.born_at
    }

    pub fn first_at(&self) -> Option<i64> {
        self.first_at
    }

    pub fn last_at(&self) -> Option<i64> {
        self.last_at
    }

    /// The net accumulated count.
    pub fn last_value(&self) -> i64 {
        self.last_value
    }

    pub fn keys(&self) -> &[i64] {
        &self.keys
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn has(&self, key: i64) -> bool {
        self.keys.binary_search(&key).is_ok()
    }

    /// Value recorded exactly at `key`. With duplicate keys the latest entry wins.
    pub fn get(&self, key: i64) -> Option<i64> {
        let idx = self.keys.partition_point(|&k| k <= key).checked_sub(1)?;
        (self.keys[idx] == key).then(|| self.values[idx])
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Pauses or resumes recording. Has no effect once the series is destroyed.
    pub fn set_recording(&mut self, recording: bool) {
        if !self.destroyed {
            self.recording = recording;
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Adds `delta` (which may be negative) at the current time.
    ///
    /// Returns `false` without touching state while recording is paused, or if the count would
    /// leave the `i64` range. Two increments in the same millisecond produce two entries with the
    /// same key; the later one is authoritative.
    pub fn increase(&mut self, delta: i64) -> bool {
        if !self.recording {
            return false;
        }
        let Some(value) = self.last_value.checked_add(delta) else {
            warn!(series = %self.name, delta, "increment out of range");
            return false;
        };
        let now = self.clock.now_ms();
        // keys never go backwards, even if the clock does or a cut landed in the future
        let at = self.last_at.map_or(now, |last| now.max(last));

        self.last_value = value;
        self.keys.push(at);
        self.values.push(self.last_value);
        self.first_at.get_or_insert(at);
        self.last_at = Some(at);
        true
    }

    pub fn increment(&mut self) -> bool {
        self.increase(1)
    }

    /// Drops all history strictly before `cut_at` (default: now).
    ///
    /// The dropped prefix is replaced by at most one boundary entry carrying the value in force at
    /// `cut_at`, so [`TimeSeries::value_at`] is unchanged for every timestamp `>= cut_at`. A
    /// non-empty series is never left empty.
    pub fn cut(&mut self, cut_at: Option<i64>) -> Cut {
        let cut_at = cut_at.unwrap_or_else(|| self.clock.now_ms());
        let (Some(first_at), Some(last_at)) = (self.first_at, self.last_at) else {
            return Cut::noop(cut_at);
        };
        if cut_at <= first_at {
            return Cut::noop(cut_at);
        }

        if cut_at >= last_at {
            let keys = std::mem::replace(&mut self.keys, vec![cut_at]);
            let values = std::mem::replace(&mut self.values, vec![self.last_value]);
            self.first_at = Some(cut_at);
            self.last_at = Some(cut_at);
            debug!(series = %self.name, cut_at, evicted = keys.len(), "cut whole series");
            return Cut {
                cut_at,
                evicted: Some(Evicted { keys, values }),
            };
        }

        let before = self.keys.partition_point(|&k| k < cut_at);
        if before == 0 {
            return Cut::noop(cut_at);
        }
        let carried = self.values[before - 1];
        let on_boundary = self.keys.get(before) == Some(&cut_at);

        let keys: Vec<i64> = self.keys.drain(..before).collect();
        let values: Vec<i64> = self.values.drain(..before).collect();
        if !on_boundary {
            self.keys.insert(0, cut_at);
            self.values.insert(0, carried);
        }
        self.first_at = Some(cut_at);

        debug!(series = %self.name, cut_at, evicted = keys.len(), remaining = self.keys.len(), "cut series");
        Cut {
            cut_at,
            evicted: Some(Evicted { keys, values }),
        }
    }

    /// Releases all entries and stops recording for good.
    pub fn destroy(&mut self) {
        self.keys = Vec::new();
        self.values = Vec::new();
        self.last_value = 0;
        self.first_at = None;
        self.last_at = None;
        self.recording = false;
        self.destroyed = true;
    }
}

impl fmt::Debug for TimeSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeSeries")
            .field("name", &self.name)
            .field("len", &self.keys.len())
            .field("last_value", &self.last_value)
            .field("first_at", &self.first_at)
            .field("last_at", &self.last_at)
            .field("recording", &self.recording)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use super::TimeSeries;
    use crate::clock::ManualClock;

    /// Builds a series by applying `(timestamp, delta)` steps on a manual clock.
    pub(crate) fn series_with(steps: &[(i64, i64)]) -> (TimeSeries, Arc<ManualClock>) {
        let start = steps.first().map_or(0, |(ts, _)| *ts);
        let clock = Arc::new(ManualClock::new(start));
        let mut series = TimeSeries::with_clock("test", clock.clone());
        for &(ts, delta) in steps {
            clock.set(ts);
            assert!(series.increase(delta));
        }
        (series, clock)
    }

    /// Steps every 500ms starting at `t0`.
    pub(crate) fn ramp(t0: i64, deltas: &[i64]) -> (TimeSeries, Arc<ManualClock>) {
        let steps: Vec<(i64, i64)> = deltas
            .iter()
            .enumerate()
            .map(|(i, d)| (t0 + 500 * i as i64, *d))
            .collect();
        series_with(&steps)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::fixtures::{ramp, series_with};
    use super::*;
    use crate::clock::ManualClock;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn new_series_is_empty() {
        let series = TimeSeries::new("idle");
        assert!(series.is_empty());
        assert_eq!(series.last_value(), 0);
        assert_eq!(series.first_at(), None);
        assert_eq!(series.last_at(), None);
        assert!(series.is_recording());
    }

    #[test]
    fn increase_appends_cumulative_entries() {
        let (series, _) = series_with(&[(T0, 1), (T0 + 10, 2), (T0 + 20, -4)]);
        assert_eq!(series.keys(), &[T0, T0 + 10, T0 + 20]);
        assert_eq!(series.values(), &[1, 3, -1]);
        assert_eq!(series.last_value(), -1);
        assert_eq!(series.first_at(), Some(T0));
        assert_eq!(series.last_at(), Some(T0 + 20));
    }

    #[test]
    fn paused_series_rejects_increments() {
        let clock = Arc::new(ManualClock::new(T0));
        let mut series = TimeSeries::with_clock("paused", clock.clone());
        series.set_recording(false);
        assert!(!series.increase(5));
        assert!(series.is_empty());
        assert_eq!(series.last_value(), 0);

        series.set_recording(true);
        assert!(series.increment());
        assert_eq!(series.last_value(), 1);
    }

    #[test]
    fn out_of_range_increments_are_rejected() {
        let (mut series, _) = series_with(&[(T0, i64::MAX)]);
        assert!(!series.increase(1));
        assert_eq!(series.last_value(), i64::MAX);
        assert_eq!(series.len(), 1);

        assert!(series.increase(i64::MIN));
        assert!(!series.increase(i64::MIN));
        assert_eq!(series.last_value(), -1);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn same_millisecond_increments_keep_both_entries() {
        let (series, _) = series_with(&[(T0, 1), (T0, 1)]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.get(T0), Some(2));
        assert!(series.has(T0));
        assert!(!series.has(T0 + 1));
    }

    #[test]
    fn keys_do_not_go_backwards() {
        let (mut series, clock) = series_with(&[(T0, 1)]);
        clock.set(T0 - 5_000);
        series.increase(1);
        assert_eq!(series.keys(), &[T0, T0]);
    }

    #[test]
    fn cut_on_empty_series_is_noop() {
        let mut series = TimeSeries::with_clock("empty", Arc::new(ManualClock::new(T0)));
        assert_eq!(series.cut(Some(T0 + 5)), Cut { cut_at: T0 + 5, evicted: None });
        assert_eq!(series.cut(None), Cut { cut_at: T0, evicted: None });
        assert!(series.is_empty());
    }

    #[test]
    fn cut_at_or_before_first_entry_is_noop() {
        let (mut series, _) = ramp(T0, &[1, 1, -1]);
        let cut = series.cut(Some(T0));
        assert_eq!(cut.cut_at, T0);
        assert!(cut.evicted.is_none());
        assert!(series.cut(Some(T0 - 100)).evicted.is_none());
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn cut_between_keys_inserts_boundary_entry() {
        // values 1 2 1 0 1 2 3 4 5 4 3 2 1
        let (mut series, _) = ramp(T0, &[1, 1, -1, -1, 1, 1, 1, 1, 1, -1, -1, -1, -1]);
        let cut_at = T0 + 750;
        let cut = series.cut(Some(cut_at));
        assert_eq!(
            cut.evicted,
            Some(Evicted {
                keys: vec![T0, T0 + 500],
                values: vec![1, 2],
            })
        );
        assert_eq!(series.len(), 12);
        assert_eq!(series.first_at(), Some(cut_at));
        assert_eq!(series.keys()[0], cut_at);
        assert_eq!(series.values()[0], 2);
    }

    #[test]
    fn cut_on_existing_key_needs_no_boundary_entry() {
        let (mut series, _) = ramp(T0, &[1, 1, -1, -1, 1, 1, 1, 1, 1, -1, -1, -1, -1]);
        series.cut(Some(T0 + 750));
        let cut_at = series.keys()[3];
        let cut = series.cut(Some(cut_at));
        let evicted = cut.evicted.expect("prefix evicted");
        assert_eq!(evicted.values, vec![2, 1, 0]);
        assert_eq!(series.len(), 9);
        assert_eq!(series.first_at(), Some(cut_at));
        assert_eq!(series.values(), &[1, 2, 3, 4, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn cut_after_last_entry_keeps_one_entry() {
        let (mut series, _) = ramp(T0, &[1, 1, -1]);
        let last_at = series.last_at().unwrap();
        let cut = series.cut(Some(last_at + 100));
        assert_eq!(
            cut.evicted,
            Some(Evicted {
                keys: vec![T0, T0 + 500, T0 + 1_000],
                values: vec![1, 2, 1],
            })
        );
        assert_eq!(series.keys(), &[last_at + 100]);
        assert_eq!(series.values(), &[1]);
        assert_eq!(series.first_at(), Some(last_at + 100));
        assert_eq!(series.last_at(), Some(last_at + 100));
    }

    #[test]
    fn cutting_twice_at_same_timestamp_is_idempotent() {
        let (mut series, _) = ramp(T0, &[1, 1, 1, -2]);
        assert!(series.cut(Some(T0 + 600)).evicted.is_some());
        let keys = series.keys().to_vec();
        assert!(series.cut(Some(T0 + 600)).evicted.is_none());
        assert_eq!(series.keys(), keys.as_slice());
    }

    #[test]
    fn cut_preserves_values_from_cut_point_onward() {
        let (mut series, _) = ramp(T0, &[2, 3, -1, 4, -6, 1]);
        let cut_at = T0 + 1_250;
        let probes: Vec<i64> = (0..40).map(|i| cut_at + i * 50).collect();
        let before: Vec<i64> = probes.iter().map(|&t| series.value_at(Some(t))).collect();
        series.cut(Some(cut_at));
        let after: Vec<i64> = probes.iter().map(|&t| series.value_at(Some(t))).collect();
        assert_eq!(before, after);
        assert!(series.keys().windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn destroy_releases_entries_and_stops_recording() {
        let (mut series, _) = ramp(T0, &[1, 1]);
        series.destroy();
        assert!(series.is_destroyed());
        assert!(series.is_empty());
        assert!(!series.increase(1));
        series.set_recording(true);
        assert!(!series.is_recording());
        assert_eq!(series.value_at(None), 0);
    }
}

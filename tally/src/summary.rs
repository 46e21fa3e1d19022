use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TallyError;

pub const MINUTES_PER_HOUR: usize = 60;

/// Hour buckets keyed by the millisecond timestamp of the top of the hour, oldest first.
pub type SummaryMap = BTreeMap<i64, HourSummary>;

/// Per-minute peaks and averages for one hour.
///
/// Slots are filled in increasing minute order, so `len()` is both the number of contiguous filled
/// slots from minute 0 and the next minute to compute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHourSummary")]
pub struct HourSummary {
    hour: i64,
    peaks: Vec<Option<i64>>,
    avgs: Vec<Option<f64>>,
    length: usize,
}

/// Serialized shape of [`HourSummary`], checked before it becomes one.
#[derive(Deserialize)]
struct RawHourSummary {
    hour: i64,
    peaks: Vec<Option<i64>>,
    avgs: Vec<Option<f64>>,
    length: usize,
}

impl TryFrom<RawHourSummary> for HourSummary {
    type Error = TallyError;

    fn try_from(raw: RawHourSummary) -> Result<Self, Self::Error> {
        if raw.peaks.len() != MINUTES_PER_HOUR || raw.avgs.len() != MINUTES_PER_HOUR {
            return Err(TallyError::InvalidSummary(format!(
                "expected {MINUTES_PER_HOUR} minute slots, got {} peaks and {} averages",
                raw.peaks.len(),
                raw.avgs.len()
            )));
        }
        let filled = raw
            .peaks
            .iter()
            .zip(&raw.avgs)
            .take_while(|(peak, avg)| peak.is_some() && avg.is_some())
            .count();
        if raw.length != filled {
            return Err(TallyError::InvalidSummary(format!(
                "length {} does not match {filled} filled minutes",
                raw.length
            )));
        }
        Ok(HourSummary {
            hour: raw.hour,
            peaks: raw.peaks,
            avgs: raw.avgs,
            length: raw.length,
        })
    }
}

/// Rollup of a whole (or partially filled) hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourRollup {
    pub hour: i64,
    pub peak: i64,
    pub avg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinuteSummary {
    pub hour: i64,
    pub minute: usize,
    pub peak: i64,
    pub avg: f64,
}

impl HourSummary {
    pub fn new(hour: i64) -> Self {
        HourSummary {
            hour,
            peaks: vec![None; MINUTES_PER_HOUR],
            avgs: vec![None; MINUTES_PER_HOUR],
            length: 0,
        }
    }

    pub fn hour(&self) -> i64 {
        self.hour
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_complete(&self) -> bool {
        self.length >= MINUTES_PER_HOUR
    }

    /// Stores one minute's aggregates. Minutes outside `0..60` are ignored.
    pub fn record(&mut self, minute: usize, peak: i64, avg: f64) {
        if minute >= MINUTES_PER_HOUR {
            return;
        }
        self.peaks[minute] = Some(peak);
        self.avgs[minute] = Some(avg);
        while self.length < MINUTES_PER_HOUR && self.peaks[self.length].is_some() {
            self.length += 1;
        }
    }

    pub fn peak(&self, minute: usize) -> Option<i64> {
        self.peaks.get(minute).copied().flatten()
    }

    pub fn avg(&self, minute: usize) -> Option<f64> {
        self.avgs.get(minute).copied().flatten()
    }

    /// Filled minute peaks, in minute order.
    pub fn peaks(&self) -> Vec<i64> {
        self.peaks[..self.length].iter().flatten().copied().collect()
    }

    /// Filled minute averages, in minute order.
    pub fn avgs(&self) -> Vec<f64> {
        self.avgs[..self.length].iter().flatten().copied().collect()
    }

    /// Max over filled minute peaks and mean over filled minute averages.
    pub fn rollup(&self) -> HourRollup {
        let peak = self.peaks().into_iter().max().unwrap_or(0);
        let avgs = self.avgs();
        let avg = if avgs.is_empty() {
            0.0
        } else {
            avgs.iter().sum::<f64>() / avgs.len() as f64
        };
        HourRollup {
            hour: self.hour,
            peak,
            avg,
        }
    }
}

//! Folds a series into per-minute hour buckets and trims the raw history behind it.

use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::{Clock, HOUR_MS, MINUTE_MS, hour_top, minute_top};
use crate::config::MINIMUM_RETENTION;
use crate::error::{Result, TallyError};
use crate::lock;
use crate::observer::{ObserverId, Observers, Signal, SummaryEvent};
use crate::series::{Cut, SharedSeries};
use crate::summary::{HourSummary, MINUTES_PER_HOUR, MinuteSummary, SummaryMap};

pub struct Summarizer {
    series: SharedSeries,
    summary: SummaryMap,
    retention: usize,
    observers: Observers,
    last_cut: Option<Cut>,
    clock: Arc<dyn Clock>,
    closed: bool,
}

impl Summarizer {
    /// Summarizes `series` on the series' own clock, keeping at most `retention` hour buckets
    /// (never fewer than 5).
    pub fn new(series: SharedSeries, retention: usize) -> Self {
        let clock = Arc::clone(&lock(&series).clock);
        Self::with_clock(series, retention, clock)
    }

    pub fn with_clock(series: SharedSeries, retention: usize, clock: Arc<dyn Clock>) -> Self {
        Summarizer {
            series,
            summary: SummaryMap::new(),
            retention: retention.max(MINIMUM_RETENTION),
            observers: Observers::new(),
            last_cut: None,
            clock,
            closed: false,
        }
    }

    pub fn on<F>(&mut self, signal: Signal, observer: F) -> ObserverId
    where
        F: Fn(&SummaryEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observers.on(signal, observer)
    }

    pub fn off(&mut self, id: ObserverId) -> bool {
        self.observers.off(id)
    }

    pub fn summary(&self) -> &SummaryMap {
        &self.summary
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn series(&self) -> &SharedSeries {
        &self.series
    }

    /// Truncation performed by the most recent pass.
    pub fn last_cut(&self) -> Option<&Cut> {
        self.last_cut.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// One summary tick.
    ///
    /// Finishes the previous hour's bucket if it exists and is incomplete, extends the current
    /// hour's bucket through the current minute, cuts the series at the previous hour boundary and
    /// evicts the oldest buckets beyond the retention count.
    pub fn run_summary_pass(&mut self) -> Result<()> {
        if self.closed {
            return Err(TallyError::Closed);
        }
        self.observers
            .emit(&SummaryEvent::BeforeSummarize(&self.summary));

        let now = self.clock.now();
        let cur_minute = minute_top(now).timestamp_millis();
        let cur_hour = hour_top(now).timestamp_millis();
        let prev_hour = cur_hour - HOUR_MS;

        if let Some(length) = self.summary.get(&prev_hour).map(HourSummary::len)
            && length < MINUTES_PER_HOUR
        {
            // the previous hour's tail may not have been reached before the hour rolled over
            self.summarize(prev_hour + length as i64 * MINUTE_MS, cur_hour - 1_000, prev_hour)?;
        }

        let length = self.bucket(cur_hour).len();
        if length < MINUTES_PER_HOUR {
            self.summarize(cur_hour + length as i64 * MINUTE_MS, cur_minute, cur_hour)?;
        }

        let cut = lock(&self.series).cut(Some(prev_hour));
        self.last_cut = Some(cut);
        self.clear_records();

        debug!(
            hour = cur_hour,
            minutes = self.summary.get(&cur_hour).map_or(0, HourSummary::len),
            buckets = self.summary.len(),
            "summary pass complete"
        );
        self.observers
            .emit(&SummaryEvent::AfterSummarize(&self.summary));
        Ok(())
    }

    fn bucket(&mut self, hour: i64) -> &mut HourSummary {
        self.summary
            .entry(hour)
            .or_insert_with(|| HourSummary::new(hour))
    }

    /// Fills the minutes of `hour` whose start lies in `[begin, end]`.
    fn summarize(&mut self, begin: i64, end: i64, hour: i64) -> Result<()> {
        let mut m = begin;
        while m <= end {
            let minute = ((m - hour) / MINUTE_MS) as usize;
            if minute < self.bucket(hour).len() {
                m += MINUTE_MS;
                continue;
            }

            let (peak, avg) = {
                let series = lock(&self.series);
                (
                    series.peak(Some(m), Some(m + MINUTE_MS))?,
                    series.average(Some(m), Some(m + MINUTE_MS))?,
                )
            };
            let bucket = self.bucket(hour);
            bucket.record(minute, peak, avg);
            let complete = bucket.is_complete();
            let rollup = bucket.rollup();

            self.observers
                .emit(&SummaryEvent::MinuteSummary(MinuteSummary {
                    hour,
                    minute,
                    peak,
                    avg,
                }));
            if minute == MINUTES_PER_HOUR - 1 {
                info!(hour, peak = rollup.peak, avg = rollup.avg, "hour summarized");
                self.observers.emit(&SummaryEvent::HourSummary(rollup));
            }
            if complete {
                break;
            }
            m += MINUTE_MS;
        }
        Ok(())
    }

    fn clear_records(&mut self) {
        self.observers.emit(&SummaryEvent::BeforeClear(&self.summary));
        while self.summary.len() > self.retention {
            if let Some((hour, _)) = self.summary.pop_first() {
                debug!(hour, "evicted hour summary");
            }
        }
        self.observers.emit(&SummaryEvent::AfterClear(&self.summary));
    }

    /// Releases the summary map. Later passes fail with [`TallyError::Closed`].
    pub fn destroy(&mut self) {
        if self.closed {
            return;
        }
        self.observers.emit(&SummaryEvent::BeforeDestroy);
        self.closed = true;
        self.summary = SummaryMap::new();
        self.last_cut = None;
        self.observers.emit(&SummaryEvent::AfterDestroy);
        self.observers.clear();
    }
}

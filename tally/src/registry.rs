use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SummarizerOptions;
use crate::error::{Result, TallyError};
use crate::lock;
use crate::schedule::{SharedSummarizer, SummaryLoop};
use crate::series::{Cut, SharedSeries, TimeSeries};
use crate::summarizer::Summarizer;
use crate::summary::{HourRollup, HourSummary};

pub const DEFAULT_COUNTER: &str = "__DEFAULT_COUNTER__";

/// Named counters and their summarizers.
///
/// Methods taking `name: Option<&str>` address the default counter when given `None`.
pub struct Registry {
    counters: HashMap<String, SharedSeries>,
    summarizers: HashMap<String, SummaryLoop>,
    clock: Arc<dyn Clock>,
    options: SummarizerOptions,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let mut registry = Registry {
            counters: HashMap::new(),
            summarizers: HashMap::new(),
            clock,
            options: SummarizerOptions::default(),
        };
        registry.create(DEFAULT_COUNTER);
        registry
    }

    /// Defaults applied by [`Registry::trigger_summarizer`].
    pub fn with_options(mut self, options: SummarizerOptions) -> Self {
        self.options = options.clamped();
        self
    }

    fn resolve(name: Option<&str>) -> &str {
        name.unwrap_or(DEFAULT_COUNTER)
    }

    /// Creates a counter, or returns the existing one with that name.
    pub fn create(&mut self, name: &str) -> SharedSeries {
        let clock = Arc::clone(&self.clock);
        let series = self
            .counters
            .entry(name.to_owned())
            .or_insert_with(|| TimeSeries::with_clock(name, clock).shared());
        Arc::clone(series)
    }

    pub fn lookup(&self, name: Option<&str>) -> Result<SharedSeries> {
        let name = Self::resolve(name);
        self.counters
            .get(name)
            .cloned()
            .ok_or_else(|| TallyError::NotFound(name.to_owned()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.counters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Destroys a counter and its summarizer. Unknown names are ignored; the default counter can't
    /// be deleted.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if name == DEFAULT_COUNTER {
            warn!("refusing to delete the default counter");
            return Err(TallyError::DeleteDefault);
        }
        if let Some(series) = self.counters.remove(name) {
            lock(&series).destroy();
        }
        if let Some(summary_loop) = self.summarizers.remove(name) {
            summary_loop.destroy();
        }
        info!(counter = name, "deleted counter");
        Ok(())
    }

    pub fn pause(&self, name: Option<&str>) -> Result<()> {
        let series = self.lookup(name)?;
        lock(&series).set_recording(false);
        Ok(())
    }

    pub fn resume(&self, name: Option<&str>) -> Result<()> {
        let series = self.lookup(name)?;
        lock(&series).set_recording(true);
        Ok(())
    }

    /// Returns `Ok(false)` if the counter is paused, and `Overflow` if the count would leave the
    /// `i64` range.
    pub fn add(&self, delta: i64, name: Option<&str>) -> Result<bool> {
        let series = self.lookup(name)?;
        let mut series = lock(&series);
        if series.last_value().checked_add(delta).is_none() {
            return Err(TallyError::Overflow(series.name().to_owned()));
        }
        Ok(series.increase(delta))
    }

    pub fn add_one(&self, name: Option<&str>) -> Result<bool> {
        self.add(1, name)
    }

    pub fn drop_by(&self, delta: i64, name: Option<&str>) -> Result<bool> {
        let delta = delta
            .checked_neg()
            .ok_or_else(|| TallyError::Overflow(Self::resolve(name).to_owned()))?;
        self.add(delta, name)
    }

    pub fn drop_one(&self, name: Option<&str>) -> Result<bool> {
        self.add(-1, name)
    }

    pub fn last_value(&self, name: Option<&str>) -> Result<i64> {
        let series = self.lookup(name)?;
        Ok(lock(&series).last_value())
    }

    pub fn value_at(&self, ts: Option<i64>, name: Option<&str>) -> Result<i64> {
        let series = self.lookup(name)?;
        Ok(lock(&series).value_at(ts))
    }

    pub fn peak(&self, begin: Option<i64>, end: Option<i64>, name: Option<&str>) -> Result<i64> {
        let series = self.lookup(name)?;
        lock(&series).peak(begin, end)
    }

    pub fn average(&self, begin: Option<i64>, end: Option<i64>, name: Option<&str>) -> Result<f64> {
        let series = self.lookup(name)?;
        lock(&series).average(begin, end)
    }

    pub fn cut(&self, cut_at: Option<i64>, name: Option<&str>) -> Result<Cut> {
        let series = self.lookup(name)?;
        Ok(lock(&series).cut(cut_at))
    }

    /// Starts summarizing a counter, or returns its running summarizer.
    ///
    /// `interval` falls back to the registry's configured interval. Must be called from within a
    /// tokio runtime.
    pub fn trigger_summarizer(
        &mut self,
        interval: Option<Duration>,
        name: Option<&str>,
    ) -> Result<SharedSummarizer> {
        let name = Self::resolve(name);
        if let Some(summary_loop) = self.summarizers.get(name) {
            return Ok(Arc::clone(summary_loop.summarizer()));
        }
        let series = self.lookup(Some(name))?;
        let summarizer =
            Summarizer::with_clock(series, self.options.retention, Arc::clone(&self.clock));
        let summary_loop =
            SummaryLoop::trigger(summarizer, interval.unwrap_or(self.options.interval));
        info!(
            counter = name,
            interval_secs = summary_loop.interval().as_secs(),
            "summarizer started"
        );

        let summarizer = Arc::clone(summary_loop.summarizer());
        self.summarizers.insert(name.to_owned(), summary_loop);
        Ok(summarizer)
    }

    pub fn summarizer(&self, name: Option<&str>) -> Result<SharedSummarizer> {
        let name = Self::resolve(name);
        self.summarizers
            .get(name)
            .map(|summary_loop| Arc::clone(summary_loop.summarizer()))
            .ok_or_else(|| TallyError::NotFound(name.to_owned()))
    }

    fn hours<T>(&self, name: Option<&str>, f: impl Fn(&HourSummary) -> T) -> Result<Vec<(i64, T)>> {
        let summarizer = self.summarizer(name)?;
        let summarizer = lock(&summarizer);
        Ok(summarizer
            .summary()
            .values()
            .map(|hour| (hour.hour(), f(hour)))
            .collect())
    }

    /// Per-minute peaks for every retained hour, oldest first.
    pub fn minute_peaks(&self, name: Option<&str>) -> Result<Vec<(i64, Vec<i64>)>> {
        self.hours(name, HourSummary::peaks)
    }

    pub fn minute_avgs(&self, name: Option<&str>) -> Result<Vec<(i64, Vec<f64>)>> {
        self.hours(name, HourSummary::avgs)
    }

    pub fn hour_peaks(&self, name: Option<&str>) -> Result<Vec<(i64, i64)>> {
        self.hours(name, |hour| hour.rollup().peak)
    }

    pub fn hour_avgs(&self, name: Option<&str>) -> Result<Vec<(i64, f64)>> {
        self.hours(name, |hour| hour.rollup().avg)
    }

    /// Peak and average of every retained hour, read under one lock.
    pub fn hour_rollups(&self, name: Option<&str>) -> Result<Vec<HourRollup>> {
        Ok(self
            .hours(name, HourSummary::rollup)?
            .into_iter()
            .map(|(_, rollup)| rollup)
            .collect())
    }

    /// Destroys every counter and summarizer, the default counter included.
    pub fn destroy_all(&mut self) {
        for (_, summary_loop) in self.summarizers.drain() {
            summary_loop.destroy();
        }
        for series in self.counters.values() {
            lock(series).destroy();
        }
    }
}

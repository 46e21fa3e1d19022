//! Synchronous, order-preserving notification of summarizer lifecycle and results.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

use crate::summary::{HourRollup, MinuteSummary, SummaryMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    BeforeSummarize,
    AfterSummarize,
    BeforeClear,
    AfterClear,
    MinuteSummary,
    HourSummary,
    BeforeDestroy,
    AfterDestroy,
}

impl Signal {
    pub fn name(self) -> &'static str {
        match self {
            Signal::BeforeSummarize => "beforeSummarize",
            Signal::AfterSummarize => "afterSummarize",
            Signal::BeforeClear => "beforeClear",
            Signal::AfterClear => "afterClear",
            Signal::MinuteSummary => "minuteSummary",
            Signal::HourSummary => "hourSummary",
            Signal::BeforeDestroy => "beforeDestroy",
            Signal::AfterDestroy => "afterDestroy",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload handed to observers. Summary maps are lent read-only for the duration of the call.
#[derive(Debug, Clone, Copy)]
pub enum SummaryEvent<'a> {
    BeforeSummarize(&'a SummaryMap),
    AfterSummarize(&'a SummaryMap),
    BeforeClear(&'a SummaryMap),
    AfterClear(&'a SummaryMap),
    MinuteSummary(MinuteSummary),
    HourSummary(HourRollup),
    BeforeDestroy,
    AfterDestroy,
}

impl SummaryEvent<'_> {
    pub fn signal(&self) -> Signal {
        match self {
            SummaryEvent::BeforeSummarize(_) => Signal::BeforeSummarize,
            SummaryEvent::AfterSummarize(_) => Signal::AfterSummarize,
            SummaryEvent::BeforeClear(_) => Signal::BeforeClear,
            SummaryEvent::AfterClear(_) => Signal::AfterClear,
            SummaryEvent::MinuteSummary(_) => Signal::MinuteSummary,
            SummaryEvent::HourSummary(_) => Signal::HourSummary,
            SummaryEvent::BeforeDestroy => Signal::BeforeDestroy,
            SummaryEvent::AfterDestroy => Signal::AfterDestroy,
        }
    }
}

pub type Observer = Box<dyn Fn(&SummaryEvent<'_>) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub struct Observers {
    next_id: u64,
    by_signal: HashMap<Signal, Vec<(ObserverId, Observer)>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, signal: Signal, observer: F) -> ObserverId
    where
        F: Fn(&SummaryEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.by_signal
            .entry(signal)
            .or_default()
            .push((id, Box::new(observer)));
        id
    }

    /// Removes an observer. Returns false if it was not registered.
    pub fn off(&mut self, id: ObserverId) -> bool {
        for observers in self.by_signal.values_mut() {
            if let Some(pos) = observers.iter().position(|(oid, _)| *oid == id) {
                drop(observers.remove(pos));
                return true;
            }
        }
        false
    }

    pub fn count(&self, signal: Signal) -> usize {
        self.by_signal.get(&signal).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.by_signal.clear();
    }

    /// Calls every observer of the event's signal in registration order.
    ///
    /// A failing or panicking observer is logged and skipped; the rest still run.
    pub fn emit(&self, event: &SummaryEvent<'_>) {
        let signal = event.signal();
        let Some(observers) = self.by_signal.get(&signal) else {
            return;
        };
        for (id, observer) in observers {
            match catch_unwind(AssertUnwindSafe(|| observer(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(%signal, observer = id.0, "observer failed: {e:#}"),
                Err(_) => warn!(%signal, observer = id.0, "observer panicked"),
            }
        }
    }
}

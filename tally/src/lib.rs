//! In-memory counters recorded as step functions of time.
//!
//! A [`TimeSeries`] answers "what is it now" and "what was its peak/average over a window"; a
//! [`Summarizer`] periodically folds it into per-minute [`HourSummary`] buckets and trims the raw
//! history it has consumed. [`Registry`] manages both by name.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod clock;
pub mod config;
pub mod error;
pub mod observer;
pub mod registry;
pub mod schedule;
pub mod series;
pub mod summarizer;
pub mod summary;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{SummarizerOptions, TallyConfig};
pub use error::{Result, TallyError};
pub use observer::{ObserverId, Signal, SummaryEvent};
pub use registry::{DEFAULT_COUNTER, Registry};
pub use schedule::{SharedSummarizer, SummaryLoop};
pub use series::{Cut, Evicted, SharedSeries, TimeSeries};
pub use summarizer::Summarizer;
pub use summary::{HourRollup, HourSummary, MinuteSummary, SummaryMap};

/// Locks shared state, recovering the guard if a previous holder panicked.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

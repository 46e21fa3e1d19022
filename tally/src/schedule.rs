//! Runs a [`Summarizer`] on a recurring tokio timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::MINIMUM_SUMMARY_INTERVAL;
use crate::error::TallyError;
use crate::lock;
use crate::summarizer::Summarizer;

pub type SharedSummarizer = Arc<Mutex<Summarizer>>;

/// A summarizer plus the single task that ticks it.
///
/// Passes run one at a time on that task; ticks missed while a pass is running are skipped rather
/// than queued. Dropping the loop stops the timer.
pub struct SummaryLoop {
    summarizer: SharedSummarizer,
    interval: Duration,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SummaryLoop {
    /// Starts ticking every `interval` (at least one minute), first tick one interval from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(summarizer: Summarizer, interval: Duration) -> Self {
        let interval = interval.max(MINIMUM_SUMMARY_INTERVAL);
        let summarizer = Arc::new(Mutex::new(summarizer));
        let (cancel, mut cancelled) = watch::channel(false);

        let task = tokio::spawn({
            let summarizer = Arc::clone(&summarizer);
            async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = cancelled.changed() => break,
                    }
                    if *cancelled.borrow() || !tick(&summarizer) {
                        break;
                    }
                }
                debug!("summary loop stopped");
            }
        });

        SummaryLoop {
            summarizer,
            interval,
            cancel,
            task,
        }
    }

    pub fn summarizer(&self) -> &SharedSummarizer {
        &self.summarizer
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Cancels the timer, then destroys the summarizer.
    pub fn destroy(self) {
        self.stop();
        lock(&self.summarizer).destroy();
    }

    fn stop(&self) {
        // receiver is gone if the task already exited
        let _ = self.cancel.send(true);
        self.task.abort();
    }
}

impl Drop for SummaryLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs one pass. Returns false once the summarizer can no longer tick.
fn tick(summarizer: &SharedSummarizer) -> bool {
    match lock(summarizer).run_summary_pass() {
        Ok(()) => true,
        Err(TallyError::Closed) => false,
        Err(e) => {
            warn!("summary pass failed: {e}");
            true
        }
    }
}

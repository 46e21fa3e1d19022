//! Point, peak and time-weighted average queries over a [`TimeSeries`].
//!
//! Window bounds may be omitted, may fall outside recorded history, and may be inverted (which is
//! an error). Lookups are binary searches over the ascending keys.

use crate::error::{Result, TallyError};
use crate::series::TimeSeries;

enum Span {
    /// The answer is known without scanning any entries.
    Settled(i64),
    Window { since: i64, till: i64 },
}

impl TimeSeries {
    /// Value in force at `ts`, or the current value when `ts` is `None`.
    pub fn value_at(&self, ts: Option<i64>) -> i64 {
        let (Some(first_at), Some(last_at)) = (self.first_at, self.last_at) else {
            return 0;
        };
        let Some(ts) = ts else {
            return self.last_value;
        };
        if ts >= last_at {
            return self.last_value;
        }
        if ts < first_at {
            return 0;
        }
        self.keys
            .partition_point(|&k| k <= ts)
            .checked_sub(1)
            .map_or(0, |idx| self.values[idx])
    }

    /// Highest recorded value in force at any point of `[begin, end]`.
    ///
    /// `begin` defaults to 0 and `end` to just past the last entry.
    pub fn peak(&self, begin: Option<i64>, end: Option<i64>) -> Result<i64> {
        let (since, till) = match self.span(begin, end, |last_at| last_at + 1)? {
            Span::Settled(value) => return Ok(value),
            Span::Window { since, till } => (since, till),
        };
        let (from, to) = self.select(since, till);
        Ok(self.values[from..=to].iter().copied().max().unwrap_or(0))
    }

    /// Time-weighted mean of the count over `[begin, end]`.
    ///
    /// `begin` defaults to 0 and `end` to now. Time before the first entry is left out of both the
    /// weighted sum and the duration rather than counted as zero.
    pub fn average(&self, begin: Option<i64>, end: Option<i64>) -> Result<f64> {
        let now = self.clock.now_ms();
        let (since, till) = match self.span(begin, end, |_| now)? {
            Span::Settled(value) => return Ok(value as f64),
            Span::Window { since, till } => (since, till),
        };
        let (from, to) = self.select(since, till);
        let keys = &self.keys[from..=to];
        let values = &self.values[from..=to];
        if keys.len() == 1 {
            return Ok(values[0] as f64);
        }

        let first_at = self.first_at.unwrap_or(keys[0]);
        let start = since.max(keys[0]).max(first_at);
        let last = values[values.len() - 1] as f64;
        let duration = till - start;
        if duration <= 0 {
            return Ok(last);
        }

        let mut weighted = 0.0;
        let mut prev = start;
        for (&key, &value) in keys[1..].iter().zip(values) {
            weighted += (key - prev) as f64 * value as f64;
            prev = key;
        }
        weighted += (till - prev) as f64 * last;
        Ok(weighted / duration as f64)
    }

    fn span(
        &self,
        begin: Option<i64>,
        end: Option<i64>,
        default_till: impl FnOnce(i64) -> i64,
    ) -> Result<Span> {
        let (Some(first_at), Some(last_at)) = (self.first_at, self.last_at) else {
            return Ok(Span::Settled(0));
        };
        if let (Some(begin), Some(end)) = (begin, end) {
            if begin == end {
                return Ok(Span::Settled(self.value_at(Some(begin))));
            }
            if begin > end {
                return Err(TallyError::InvalidRange { begin, end });
            }
        }

        let since = begin.unwrap_or(0);
        let till = end.unwrap_or_else(|| default_till(last_at));
        if since >= last_at {
            return Ok(Span::Settled(self.last_value));
        }
        if till < first_at {
            return Ok(Span::Settled(0));
        }
        Ok(Span::Window { since, till })
    }

    /// Inclusive index range covering `[since, till]`, widened to the entry in force at `since`.
    fn select(&self, since: i64, till: i64) -> (usize, usize) {
        let from = self.keys.partition_point(|&k| k <= since).saturating_sub(1);
        let to = self
            .keys
            .partition_point(|&k| k <= till)
            .checked_sub(1)
            .unwrap_or(self.keys.len() - 1);
        (from, to.max(from))
    }
}

//! Append-only instrument timeseries
//!
//! Each feed keeps one [`Timeseries`] for the whole session. Polls return
//! the instrument's entire current window, so most of every fetch has been
//! seen before; [`Timeseries::merge`] appends only rows strictly newer than
//! the last retained time tag and reports which indices were added.
//!
//! Invariant: time tags are strictly increasing and retained rows are never
//! reordered, altered or removed.

use std::ops::Range;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::Sample;

/// Ordered, append-only sequence of samples for one instrument.
#[derive(Debug, Clone)]
pub struct Timeseries<S: Sample> {
    rows: Vec<S>,
}

impl<S: Sample> Default for Timeseries<S> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<S: Sample> Timeseries<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fetch into the series.
    ///
    /// `None` means the fetch failed; the series is left untouched and an
    /// empty range is returned, exactly as for a fetch with nothing new.
    /// Rows at or before the last retained time tag are ignored, as are
    /// duplicate time tags within the fetch (first occurrence wins).
    pub fn merge(&mut self, fetched: Option<Vec<S>>) -> Range<usize> {
        let start = self.rows.len();
        let Some(mut fetched) = fetched else {
            return start..start;
        };

        fetched.sort_by_key(Sample::time_tag);

        let mut last = self.last_time_tag();
        for row in fetched {
            let t = row.time_tag();
            if last.map_or(true, |l| t > l) {
                last = Some(t);
                self.rows.push(row);
            }
        }

        let appended = start..self.rows.len();
        if !appended.is_empty() {
            debug!(appended = appended.len(), total = self.rows.len(), "Timeseries merge");
        }
        appended
    }

    pub fn last_time_tag(&self) -> Option<DateTime<Utc>> {
        self.rows.last().map(Sample::time_tag)
    }

    pub fn rows(&self) -> &[S] {
        &self.rows
    }

    pub fn get(&self, range: Range<usize>) -> &[S] {
        &self.rows[range]
    }

    pub fn last(&self) -> Option<&S> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::XrsSample;
    use chrono::{Duration, TimeZone};

    fn sample(minute: i64, xrsb: f64) -> XrsSample {
        XrsSample {
            time_tag: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
            satellite: 16,
            xrsa: xrsb / 10.0,
            xrsb,
        }
    }

    fn window(from: i64, to: i64) -> Vec<XrsSample> {
        (from..to).map(|m| sample(m, 1e-7 * (m + 1) as f64)).collect()
    }

    #[test]
    fn test_initial_merge_appends_everything() {
        let mut ts = Timeseries::new();
        assert_eq!(ts.merge(Some(window(0, 30))), 0..30);
        assert_eq!(ts.len(), 30);
    }

    #[test]
    fn test_sliding_window_appends_only_new_rows() {
        let mut ts = Timeseries::new();
        ts.merge(Some(window(0, 30)));
        let appended = ts.merge(Some(window(2, 32)));
        assert_eq!(appended, 30..32);
        assert_eq!(ts.get(appended)[0].time_tag, sample(30, 0.0).time_tag);
    }

    #[test]
    fn test_refetch_of_seen_window_is_idempotent() {
        let mut ts = Timeseries::new();
        ts.merge(Some(window(0, 30)));
        let before = ts.rows().to_vec();
        assert!(ts.merge(Some(window(0, 30))).is_empty());
        assert!(ts.merge(Some(window(10, 20))).is_empty());
        assert_eq!(ts.rows(), before.as_slice());
    }

    #[test]
    fn test_failed_fetch_leaves_series_untouched() {
        let mut ts = Timeseries::new();
        ts.merge(Some(window(0, 5)));
        assert_eq!(ts.merge(None), 5..5);
        assert_eq!(ts.len(), 5);
    }

    #[test]
    fn test_unordered_and_duplicate_rows_stay_monotonic() {
        let mut ts = Timeseries::new();
        ts.merge(Some(window(0, 3)));
        let fetched = vec![sample(5, 1.0), sample(3, 1.0), sample(5, 2.0), sample(1, 9.0), sample(4, 1.0)];
        assert_eq!(ts.merge(Some(fetched)), 3..6);
        let tags: Vec<_> = ts.rows().iter().map(|r| r.time_tag).collect();
        assert!(tags.windows(2).all(|w| w[0] < w[1]));
        // first occurrence of a duplicated time tag wins
        assert_eq!(ts.rows()[5].xrsb, 1.0);
        // retained rows unchanged
        assert_eq!(ts.rows()[1], sample(1, 2e-7));
    }
}

//! Historical replay
//!
//! Plays a stored series back the way a live product publishes it: each
//! fetch reveals the next `step` rows and returns the trailing `window` of
//! everything revealed so far.

use async_trait::async_trait;

use super::FeedAdapter;
use crate::types::{Feed, Sample};

pub struct ReplayAdapter<S> {
    feed: Feed,
    rows: Vec<S>,
    revealed: usize,
    initial: usize,
    step: usize,
    window: usize,
}

impl<S: Sample> ReplayAdapter<S> {
    /// Replay `rows` one row per fetch, returning at most `window` rows.
    pub fn new(feed: Feed, mut rows: Vec<S>, window: usize) -> Self {
        rows.sort_by_key(Sample::time_tag);
        Self {
            feed,
            rows,
            revealed: 0,
            initial: 1,
            step: 1,
            window,
        }
    }

    /// Rows revealed by each fetch after the first.
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step.max(1);
        self
    }

    /// Rows revealed by the first fetch.
    pub fn with_initial(mut self, initial: usize) -> Self {
        self.initial = initial.max(1);
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.revealed >= self.rows.len()
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl<S: Sample> FeedAdapter for ReplayAdapter<S> {
    type Sample = S;

    fn feed(&self) -> Feed {
        self.feed
    }

    async fn fetch(&mut self) -> Option<Vec<S>> {
        let step = if self.revealed == 0 { self.initial } else { self.step };
        self.revealed = (self.revealed + step).min(self.rows.len());
        let start = if self.window == 0 { 0 } else { self.revealed.saturating_sub(self.window) };
        Some(self.rows[start..self.revealed].to_vec())
    }
}

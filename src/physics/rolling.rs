//! Incremental lagged differences
//!
//! `diff[i] = raw[i] - raw[i - lag]`, with the first `lag` entries NaN.
//! Appending k values computes exactly k new differences.

/// Raw history plus its lagged difference column.
#[derive(Debug, Clone)]
pub struct RollingDiff {
    lag: usize,
    raw: Vec<f64>,
    diff: Vec<f64>,
}

impl RollingDiff {
    pub fn new(lag: usize) -> Self {
        Self {
            lag,
            raw: Vec::new(),
            diff: Vec::new(),
        }
    }

    pub fn lag(&self) -> usize {
        self.lag
    }

    /// Append raw values; returns the differences computed for them.
    pub fn extend(&mut self, values: &[f64]) -> &[f64] {
        let start = self.diff.len();
        for &v in values {
            let i = self.raw.len();
            let d = if self.lag > 0 && i >= self.lag {
                v - self.raw[i - self.lag]
            } else {
                f64::NAN
            };
            self.raw.push(v);
            self.diff.push(d);
        }
        &self.diff[start..]
    }

    pub fn values(&self) -> &[f64] {
        &self.diff
    }

    pub fn len(&self) -> usize {
        self.diff.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diff.is_empty()
    }
}

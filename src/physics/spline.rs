//! Interpolating cubic spline with not-a-knot end conditions
//!
//! Used to invert the GOES response table (ratio → temperature,
//! temperature → long-channel flux per unit emission measure). Outside the
//! knot range the end polynomials are extended, so values just beyond the
//! table still produce a finite estimate.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SplineError {
    #[error("spline needs at least 4 knots, got {0}")]
    TooFewPoints(usize),
    #[error("x has {x} values but y has {y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("knots must be strictly increasing (violated at index {0})")]
    NotIncreasing(usize),
    #[error("non-finite knot at index {0}")]
    NonFinite(usize),
}

/// Cubic spline through every knot, stored as knot values plus second
/// derivatives.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    m: Vec<f64>,
}

impl CubicSpline {
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self, SplineError> {
        if x.len() != y.len() {
            return Err(SplineError::LengthMismatch { x: x.len(), y: y.len() });
        }
        let n = x.len();
        if n < 4 {
            return Err(SplineError::TooFewPoints(n));
        }
        if let Some(i) = (0..n).find(|&i| !x[i].is_finite() || !y[i].is_finite()) {
            return Err(SplineError::NonFinite(i));
        }
        if let Some(i) = (1..n).find(|&i| x[i] <= x[i - 1]) {
            return Err(SplineError::NotIncreasing(i));
        }

        let m = not_a_knot_second_derivatives(x, y);
        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            m,
        })
    }

    /// Build from unordered knots: non-finite pairs are skipped, the rest are
    /// sorted by x and repeated x values keep their first y.
    pub fn from_unsorted(x: &[f64], y: &[f64]) -> Result<Self, SplineError> {
        if x.len() != y.len() {
            return Err(SplineError::LengthMismatch { x: x.len(), y: y.len() });
        }
        let mut pairs: Vec<(f64, f64)> = x
            .iter()
            .zip(y)
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(a, b)| (*a, *b))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        pairs.dedup_by(|later, kept| later.0 <= kept.0);

        let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        Self::new(&xs, &ys)
    }

    /// Evaluate at `t`. NaN in, NaN out.
    pub fn eval(&self, t: f64) -> f64 {
        if t.is_nan() {
            return f64::NAN;
        }
        let n = self.x.len();
        let i = self.x.partition_point(|&k| k <= t).saturating_sub(1).min(n - 2);

        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let a = x1 - t;
        let b = t - x0;

        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }
}

/// Solve for the knot second derivatives.
///
/// Not-a-knot makes the third derivative continuous at the second and
/// penultimate knots, which expresses M[0] and M[n-1] through their
/// neighbours and leaves a tridiagonal system in M[1..n-1].
fn not_a_knot_second_derivatives(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let k = n - 2;

    let mut sub = vec![0.0; k];
    let mut diag = vec![0.0; k];
    let mut sup = vec![0.0; k];
    let mut rhs = vec![0.0; k];

    for row in 0..k {
        let i = row + 1;
        sub[row] = h[i - 1];
        diag[row] = 2.0 * (h[i - 1] + h[i]);
        sup[row] = h[i];
        rhs[row] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
    }

    // M0 = (1 + r) M1 - r M2
    let r = h[0] / h[1];
    diag[0] += h[0] * (1.0 + r);
    sup[0] -= h[0] * r;
    sub[0] = 0.0;

    // M[n-1] = (1 + s) M[n-2] - s M[n-3]
    let s = h[n - 2] / h[n - 3];
    diag[k - 1] += h[n - 2] * (1.0 + s);
    sub[k - 1] -= h[n - 2] * s;
    sup[k - 1] = 0.0;

    let inner = solve_tridiagonal(&sub, &diag, &sup, &rhs);

    let mut m = Vec::with_capacity(n);
    m.push((1.0 + r) * inner[0] - r * inner[1]);
    m.extend_from_slice(&inner);
    m.push((1.0 + s) * inner[k - 1] - s * inner[k - 2]);
    m
}

/// Thomas algorithm. `sub[0]` and `sup[last]` are ignored.
fn solve_tridiagonal(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];

    c[0] = sup[0] / diag[0];
    d[0] = rhs[0] / diag[0];
    for i in 1..n {
        let denom = diag[i] - sub[i] * c[i - 1];
        c[i] = if i + 1 < n { sup[i] / denom } else { 0.0 };
        d[i] = (rhs[i] - sub[i] * d[i - 1]) / denom;
    }

    let mut out = vec![0.0; n];
    out[n - 1] = d[n - 1];
    for i in (0..n - 1).rev() {
        out[i] = d[i] - c[i] * out[i + 1];
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

//! Derived-quantity calculators
//!
//! One entry point per instrument: `derive(rows_since_last_derive)`. The
//! initial bulk load and every later append go through the same call, so
//! derived rows stay index-aligned with the merged series.

use tracing::debug;

use super::rolling::RollingDiff;
use super::thermal::{ThermalEstimate, ThermalModel};
use crate::types::{EveDerived, EveSample, LagDerived, XrsDerived, XrsSample};

// ============================================================================
// GOES XRS
// ============================================================================

/// Temperature, emission measure and lagged differences for GOES XRS.
#[derive(Debug)]
pub struct XrsDeriver {
    model: Option<ThermalModel>,
    xrsa: Vec<RollingDiff>,
    xrsb: Vec<RollingDiff>,
    rows: Vec<XrsDerived>,
}

impl XrsDeriver {
    /// Without a model, temperature and emission measure are NaN; the
    /// difference columns are still computed.
    pub fn new(model: Option<ThermalModel>, lags: &[usize]) -> Self {
        Self {
            model,
            xrsa: lags.iter().map(|&l| RollingDiff::new(l)).collect(),
            xrsb: lags.iter().map(|&l| RollingDiff::new(l)).collect(),
            rows: Vec::new(),
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    fn thermal(&self, inputs: &[(f64, f64, u32)]) -> Vec<ThermalEstimate> {
        self.model.as_ref().map_or_else(
            || vec![ThermalEstimate::NAN; inputs.len()],
            |m| m.estimate_batch(inputs),
        )
    }

    /// Derive the rows appended since the previous call.
    pub fn derive(&mut self, new_rows: &[XrsSample]) -> &[XrsDerived] {
        let start = self.rows.len();
        if new_rows.is_empty() {
            return &self.rows[start..];
        }

        let satellites: Vec<u32> = new_rows.iter().map(|r| r.satellite).collect();
        let raw_inputs: Vec<(f64, f64, u32)> = new_rows
            .iter()
            .map(|r| (r.xrsa, r.xrsb, r.satellite))
            .collect();
        let raw = self.thermal(&raw_inputs);

        let a_values: Vec<f64> = new_rows.iter().map(|r| r.xrsa).collect();
        let b_values: Vec<f64> = new_rows.iter().map(|r| r.xrsb).collect();

        let mut per_lag: Vec<Vec<LagDerived>> = Vec::with_capacity(self.xrsa.len());
        for idx in 0..self.xrsa.len() {
            let lag = self.xrsa[idx].lag();
            let da = self.xrsa[idx].extend(&a_values).to_vec();
            let db = self.xrsb[idx].extend(&b_values).to_vec();
            let inputs: Vec<(f64, f64, u32)> = da
                .iter()
                .zip(&db)
                .zip(&satellites)
                .map(|((a, b), s)| (*a, *b, *s))
                .collect();
            let est = self.thermal(&inputs);
            per_lag.push(
                (0..new_rows.len())
                    .map(|j| LagDerived {
                        lag,
                        xrsa: da[j],
                        xrsb: db[j],
                        temperature_mk: est[j].temperature_mk,
                        emission_measure: est[j].emission_measure,
                    })
                    .collect(),
            );
        }

        for (j, estimate) in raw.into_iter().enumerate() {
            self.rows.push(XrsDerived {
                temperature_mk: estimate.temperature_mk,
                emission_measure: estimate.emission_measure,
                diffs: per_lag.iter().map(|col| col[j].clone()).collect(),
            });
        }

        debug!(derived = new_rows.len(), total = self.rows.len(), "XRS derive");
        &self.rows[start..]
    }

    pub fn rows(&self) -> &[XrsDerived] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// EVE ESP
// ============================================================================

/// One-sample differences of the ESP 0-7 nm diode.
#[derive(Debug)]
pub struct EveDeriver {
    esp_0_7: RollingDiff,
    rows: Vec<EveDerived>,
}

impl Default for EveDeriver {
    fn default() -> Self {
        Self {
            esp_0_7: RollingDiff::new(1),
            rows: Vec::new(),
        }
    }
}

impl EveDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn derive(&mut self, new_rows: &[EveSample]) -> &[EveDerived] {
        let start = self.rows.len();
        let values: Vec<f64> = new_rows.iter().map(|r| r.esp_0_7).collect();
        let diffs = self.esp_0_7.extend(&values).to_vec();
        self.rows
            .extend(diffs.into_iter().map(|esp_0_7_diff| EveDerived { esp_0_7_diff }));
        &self.rows[start..]
    }

    pub fn rows(&self) -> &[EveDerived] {
        &self.rows
    }
}

// ============================================================================
// Tests
// ============================================================================

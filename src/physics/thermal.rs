//! Isothermal temperature and emission measure from the GOES XRS ratio
//!
//! temperature = spline(ratio → T) where ratio = short / long
//! EM = long / spline(T → long flux per 1e49 cm⁻³) × 1e49
//!
//! Only GOES-16 and later are supported; other satellites yield NaN.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::response::{ResponseError, ResponseTable, SatelliteResponse};
use super::spline::{CubicSpline, SplineError};
use crate::config::defaults::{
    EM_SCALE, FALLBACK_RATIO, MIN_LONG_FLUX, MIN_SHORT_FLUX, MIN_SUPPORTED_SATELLITE,
};

/// Temperature (MK) and emission measure (cm⁻³) of one reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalEstimate {
    pub temperature_mk: f64,
    pub emission_measure: f64,
}

impl ThermalEstimate {
    pub const NAN: Self = Self {
        temperature_mk: f64::NAN,
        emission_measure: f64::NAN,
    };
}

#[derive(Debug, Clone)]
struct SatelliteModel {
    ratio_to_temperature: CubicSpline,
    temperature_to_flux: CubicSpline,
}

impl SatelliteModel {
    fn build(response: &SatelliteResponse) -> Result<Self, SplineError> {
        let ratio: Vec<f64> = response
            .flux_short
            .iter()
            .zip(&response.flux_long)
            .map(|(s, l)| s / l)
            .collect();
        let flux_per_em: Vec<f64> = response
            .flux_long
            .iter()
            .enumerate()
            .map(|(i, l)| l * response.em_converter(i))
            .collect();

        Ok(Self {
            ratio_to_temperature: CubicSpline::from_unsorted(&ratio, &response.temperature_mk)?,
            temperature_to_flux: CubicSpline::from_unsorted(&response.temperature_mk, &flux_per_em)?,
        })
    }

    fn estimate(&self, short: f64, long: f64) -> ThermalEstimate {
        let ratio = if short < MIN_SHORT_FLUX || long < MIN_LONG_FLUX {
            FALLBACK_RATIO
        } else {
            short / long
        };
        let temperature_mk = self.ratio_to_temperature.eval(ratio);
        let emission_measure = long / self.temperature_to_flux.eval(temperature_mk) * EM_SCALE;

        ThermalEstimate {
            temperature_mk,
            emission_measure: if emission_measure.is_finite() {
                emission_measure
            } else {
                f64::NAN
            },
        }
    }
}

/// Per-satellite splines built once from the response table.
#[derive(Debug, Clone)]
pub struct ThermalModel {
    satellites: BTreeMap<u32, SatelliteModel>,
}

impl ThermalModel {
    pub fn from_table(table: &ResponseTable) -> Result<Self, ResponseError> {
        let mut satellites = BTreeMap::new();
        for (number, response) in table.satellites() {
            if number < MIN_SUPPORTED_SATELLITE {
                continue;
            }
            match SatelliteModel::build(response) {
                Ok(model) => {
                    satellites.insert(number, model);
                }
                Err(e) => warn!(satellite = number, error = %e, "Skipping satellite response"),
            }
        }
        if satellites.is_empty() {
            return Err(ResponseError::Empty);
        }
        Ok(Self { satellites })
    }

    pub fn supports(&self, satellite: u32) -> bool {
        self.satellites.contains_key(&satellite)
    }

    /// Estimate for a single reading.
    ///
    /// Negative or NaN flux (possible on differenced channels) gives NaN.
    pub fn estimate(&self, short: f64, long: f64, satellite: u32) -> ThermalEstimate {
        if !(short >= 0.0 && long >= 0.0) {
            return ThermalEstimate::NAN;
        }
        self.satellites
            .get(&satellite)
            .map_or(ThermalEstimate::NAN, |m| m.estimate(short, long))
    }

    /// Estimate for many `(short, long, satellite)` readings.
    ///
    /// Same result as calling [`estimate`](Self::estimate) per row; the
    /// satellite lookup is shared across consecutive rows.
    pub fn estimate_batch(&self, rows: &[(f64, f64, u32)]) -> Vec<ThermalEstimate> {
        let mut out = Vec::with_capacity(rows.len());
        let mut current: Option<(u32, Option<&SatelliteModel>)> = None;
        for &(short, long, satellite) in rows {
            let model = match current {
                Some((sat, model)) if sat == satellite => model,
                _ => {
                    let model = self.satellites.get(&satellite);
                    current = Some((satellite, model));
                    model
                }
            };
            let estimate = match model {
                Some(m) if short >= 0.0 && long >= 0.0 => m.estimate(short, long),
                _ => ThermalEstimate::NAN,
            };
            out.push(estimate);
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Instrument samples and their derived rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamped, immutable instrument reading.
///
/// Implemented by every row type a [`Timeseries`](crate::timeseries::Timeseries)
/// can hold; the time tag is the merge key.
pub trait Sample: Clone + Send + Sync + 'static {
    fn time_tag(&self) -> DateTime<Utc>;
}

// ============================================================================
// GOES XRS
// ============================================================================

/// One GOES X-Ray Sensor reading (1-minute cadence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XrsSample {
    pub time_tag: DateTime<Utc>,
    /// GOES satellite number (16+ for the response table in use)
    pub satellite: u32,
    /// Short band, 0.05-0.4 nm (W/m²)
    pub xrsa: f64,
    /// Long band, 0.1-0.8 nm (W/m²)
    pub xrsb: f64,
}

impl Sample for XrsSample {
    fn time_tag(&self) -> DateTime<Utc> {
        self.time_tag
    }
}

/// Quantities derived from one XRS sample, index-aligned with the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XrsDerived {
    /// Isothermal temperature (MK)
    pub temperature_mk: f64,
    /// Emission measure (cm⁻³)
    pub emission_measure: f64,
    /// One entry per configured lag, in configuration order.
    pub diffs: Vec<LagDerived>,
}

impl XrsDerived {
    /// Derived values of the differenced series at `lag`, if configured.
    pub fn diff(&self, lag: usize) -> Option<&LagDerived> {
        self.diffs.iter().find(|d| d.lag == lag)
    }
}

/// Lagged differences and the thermal estimate computed from them.
///
/// All fields are NaN for the first `lag` rows of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagDerived {
    pub lag: usize,
    pub xrsa: f64,
    pub xrsb: f64,
    pub temperature_mk: f64,
    pub emission_measure: f64,
}

// ============================================================================
// EVE ESP
// ============================================================================

/// One EVE ESP diode reading (10-second cadence, raw counts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EveSample {
    pub time_tag: DateTime<Utc>,
    pub esp_0_7: f64,
    pub esp_30: f64,
}

impl Sample for EveSample {
    fn time_tag(&self) -> DateTime<Utc> {
        self.time_tag
    }
}

/// One-sample difference of the ESP 0-7 nm channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EveDerived {
    pub esp_0_7_diff: f64,
}

// ============================================================================
// EOVSA
// ============================================================================

/// One row of the EOVSA flare-test table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EovsaSample {
    pub time_tag: DateTime<Utc>,
    pub flare_flag: bool,
    pub band_1_7_ghz: f64,
    pub band_7_13_ghz: f64,
    pub band_13_18_ghz: f64,
    pub mean: f64,
    pub sigma: f64,
    pub threshold: f64,
    pub count: f64,
}

impl Sample for EovsaSample {
    fn time_tag(&self) -> DateTime<Utc> {
        self.time_tag
    }
}

//! Physics Module
//!
//! Deterministic derived quantities for the GOES XRS and EVE feeds.
//! All math here is pure interpolation and differencing.
//!
//! - `spline`: not-a-knot cubic spline used to invert the response table
//! - `fits`: reader for the binary table holding the response curves
//! - `response`: response table plus its download-once local cache
//! - `thermal`: temperature / emission measure from the XRSA/XRSB ratio
//! - `rolling`: O(k) lagged differences
//! - `derive`: per-instrument calculators behind one `derive()` call

pub mod derive;
pub mod fits;
pub mod response;
pub mod rolling;
pub mod spline;
pub mod thermal;

pub use derive::{EveDeriver, XrsDeriver};
pub use response::{ensure_model, ResponseError, ResponseTable, SatelliteResponse};
pub use rolling::RollingDiff;
pub use spline::{CubicSpline, SplineError};
pub use thermal::{ThermalEstimate, ThermalModel};

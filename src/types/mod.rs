//! Shared data structures for the flare trigger loop
//!
//! - Samples: one timestamped reading per instrument (GOES XRS, EVE ESP, EOVSA)
//! - Derived rows: temperature, emission measure and lagged differences
//! - Campaign: state enum, flare episode log rows, FAI log rows
//! - Alerts: named boolean snapshot recomputed every tick
//! - Events: typed notifications emitted by the core

mod samples;
mod campaign;
mod alerts;
mod events;

pub use samples::*;
pub use campaign::*;
pub use alerts::*;
pub use events::*;

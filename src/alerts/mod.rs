//! Alert Evaluation
//!
//! - `registry`: ordered named predicates whose conjunction is the flare trigger,
//!   plus the flare-end condition
//! - `fai`: edge-triggered Flare Activity Indicator on the differenced series
//! - `eovsa`: independent radio flare-flag indicator

pub mod eovsa;
pub mod fai;
pub mod registry;

pub use eovsa::{EovsaActivity, EovsaIndicator};
pub use fai::FaiEvaluator;
pub use registry::{AlertRegistry, FlareEndCondition, Predicate, XrsView};

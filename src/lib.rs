//! flare-trigger: real-time solar flare trigger for the FOXSI/Hi-C campaign
//!
//! Ingests GOES XRS, EVE ESP and EOVSA telemetry, derives temperature and
//! emission measure, evaluates the flare alerts and drives the launch
//! campaign state machine with a CSV audit trail per session.
//!
//! ## Architecture
//!
//! - **Acquisition**: per-instrument feed adapters with bounded retry
//! - **Timeseries**: append-only merge of overlapping polls
//! - **Physics**: response-function splines, thermal model, rolling differences
//! - **Alerts**: alert registry, flare end condition, FAI, EOVSA indicator
//! - **Campaign**: searching / triggered / launched / post-launch
//! - **Storage**: session recorder
//! - **Pipeline**: one timer-driven task per feed

pub mod acquisition;
pub mod alerts;
pub mod campaign;
pub mod config;
pub mod physics;
pub mod pipeline;
pub mod storage;
pub mod timeseries;
pub mod types;

pub use alerts::AlertRegistry;
pub use campaign::{CommandOutcome, FlareCampaign, SessionClock};
pub use config::SessionConfig;
pub use pipeline::{run_feed, EovsaPipeline, EvePipeline, FeedTick, GoesPipeline, OperatorCommand};
pub use storage::SessionRecorder;
pub use timeseries::Timeseries;
pub use types::{
    AlertSnapshot, CampaignState, EventBus, FaiEvent, Feed, FlareEvent, SessionEvent, XrsSample,
};

//! Session Configuration Module
//!
//! Provides the per-session configuration loaded from TOML, replacing
//! hardcoded feed URLs, alert thresholds and campaign offsets with
//! operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `FLARE_CONFIG` environment variable (path to TOML file)
//! 3. `flare_config.toml` in the current working directory
//! 4. Built-in defaults (see [`defaults`])
//!
//! ## Usage
//!
//! There is no global: load once, then pass by reference.
//!
//! ```ignore
//! let config = SessionConfig::load(args.config.as_deref())?;
//! let campaign = FlareCampaign::new(&config.campaign, events.clone());
//! ```

mod session_config;
pub mod defaults;
pub mod validation;

pub use session_config::*;

//! Session Configuration
//!
//! Loads session parameters from a TOML file, replacing what would otherwise
//! be hardcoded URLs, thresholds and campaign offsets. Every field has a
//! default matching [`super::defaults`], so an empty file is a valid config.
//!
//! Search order for the config file:
//! 1. Explicit path (`--config` on the command line)
//! 2. `$FLARE_CONFIG` environment variable
//! 3. `./flare_config.toml` in the current working directory
//! 4. Built-in defaults

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-level Config
// ============================================================================

/// Complete configuration for one observing session.
///
/// Created once at session start and passed by reference to every component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub session: SessionSection,
    pub goes: GoesFeedConfig,
    pub eve: EveFeedConfig,
    pub eovsa: EovsaFeedConfig,
    pub response: ResponseConfig,
    pub retry: RetryConfig,
    pub campaign: CampaignTiming,
    pub flare_end: FlareEndConfig,
    pub fai: FaiConfig,
    /// Ordered trigger predicates; all must hold for a trigger.
    pub alerts: Vec<AlertRule>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session: SessionSection::default(),
            goes: GoesFeedConfig::default(),
            eve: EveFeedConfig::default(),
            eovsa: EovsaFeedConfig::default(),
            response: ResponseConfig::default(),
            retry: RetryConfig::default(),
            campaign: CampaignTiming::default(),
            flare_end: FlareEndConfig::default(),
            fai: FaiConfig::default(),
            alerts: default_alert_rules(),
        }
    }
}

impl SessionConfig {
    /// Load configuration using the standard search order.
    ///
    /// An explicit path that fails to load is an error; the implicit
    /// locations fall back to defaults with a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), session = %config.session.name, "Loaded session config");
            return Ok(config);
        }

        if let Ok(path) = std::env::var("FLARE_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), session = %config.session.name, "Loaded session config from FLARE_CONFIG");
                        return Ok(config);
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from FLARE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "FLARE_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("flare_config.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(session = %config.session.name, "Loaded session config from ./flare_config.toml");
                    return Ok(config);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./flare_config.toml, using defaults");
                }
            }
        }

        info!("No flare_config.toml found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are reported as warnings; range violations are fatal.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check invariants the rest of the system relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = super::validation::validate_ranges(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Session
// ============================================================================

/// How "now" is derived for clock-gated campaign transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// System UTC clock.
    #[default]
    Wall,
    /// Latest data time plus the feed latency; used for historical replay.
    DataDriven,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    pub name: String,
    /// Root folder; each session writes to `<output_dir>/<UTC start>`.
    pub output_dir: PathBuf,
    pub clock: ClockMode,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            name: "foxsi-hic".to_string(),
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
            clock: ClockMode::Wall,
        }
    }
}

// ============================================================================
// Feeds
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GoesFeedConfig {
    pub url: String,
    pub poll_interval_ms: u64,
    /// Trailing samples kept from each fetch.
    pub window: usize,
    /// Rolling-difference lags in samples (1-minute cadence).
    pub diff_lags: Vec<usize>,
}

impl Default for GoesFeedConfig {
    fn default() -> Self {
        Self {
            url: defaults::GOES_XRS_URL.to_string(),
            poll_interval_ms: defaults::GOES_POLL_INTERVAL_MS,
            window: defaults::GOES_FETCH_WINDOW,
            diff_lags: defaults::GOES_DIFF_LAGS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EveFeedConfig {
    pub enabled: bool,
    pub url: String,
    pub poll_interval_ms: u64,
    pub window: usize,
}

impl Default for EveFeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: defaults::EVE_ESP_URL.to_string(),
            poll_interval_ms: defaults::EVE_POLL_INTERVAL_MS,
            window: defaults::EVE_FETCH_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EovsaFeedConfig {
    pub enabled: bool,
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub header_lines: usize,
    /// Samples inspected by the flare-flag indicator.
    pub alert_window: usize,
}

impl Default for EovsaFeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: defaults::EOVSA_BASE_URL.to_string(),
            poll_interval_ms: defaults::EOVSA_POLL_INTERVAL_MS,
            header_lines: defaults::EOVSA_HEADER_LINES,
            alert_window: defaults::EOVSA_ALERT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResponseConfig {
    pub path: PathBuf,
    pub url: String,
    /// Allow the one-time download when the file is missing or corrupt.
    pub download: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::RESPONSE_FILE_NAME),
            url: defaults::RESPONSE_URL.to_string(),
            download: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            initial_backoff_ms: defaults::RETRY_INITIAL_BACKOFF_MS,
            max_backoff_ms: defaults::RETRY_MAX_BACKOFF_MS,
            timeout_secs: defaults::HTTP_TIMEOUT_SECS,
        }
    }
}

// ============================================================================
// Campaign Timing
// ============================================================================

/// Fixed offsets of the campaign, in minutes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CampaignTiming {
    pub latency_minutes: i64,
    pub hic_launch_offset_minutes: i64,
    pub foxsi_obs_start_minutes: i64,
    pub foxsi_obs_end_minutes: i64,
    pub hic_obs_start_minutes: i64,
    pub hic_obs_end_minutes: i64,
    pub deadtime_minutes: i64,
}

impl Default for CampaignTiming {
    fn default() -> Self {
        Self {
            latency_minutes: defaults::DATA_LATENCY_MINUTES,
            hic_launch_offset_minutes: defaults::HIC_LAUNCH_OFFSET_MINUTES,
            foxsi_obs_start_minutes: defaults::FOXSI_OBS_START_MINUTES,
            foxsi_obs_end_minutes: defaults::FOXSI_OBS_END_MINUTES,
            hic_obs_start_minutes: defaults::HIC_OBS_START_MINUTES,
            hic_obs_end_minutes: defaults::HIC_OBS_END_MINUTES,
            deadtime_minutes: defaults::DEADTIME_MINUTES,
        }
    }
}

impl CampaignTiming {
    pub fn latency(&self) -> Duration {
        Duration::minutes(self.latency_minutes)
    }

    pub fn hic_launch_offset(&self) -> Duration {
        Duration::minutes(self.hic_launch_offset_minutes)
    }

    pub fn foxsi_obs_start(&self) -> Duration {
        Duration::minutes(self.foxsi_obs_start_minutes)
    }

    pub fn foxsi_obs_end(&self) -> Duration {
        Duration::minutes(self.foxsi_obs_end_minutes)
    }

    pub fn hic_obs_start(&self) -> Duration {
        Duration::minutes(self.hic_obs_start_minutes)
    }

    pub fn hic_obs_end(&self) -> Duration {
        Duration::minutes(self.hic_obs_end_minutes)
    }

    pub fn deadtime(&self) -> Duration {
        Duration::minutes(self.deadtime_minutes)
    }
}

// ============================================================================
// Alerts
// ============================================================================

/// One named trigger predicate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRule {
    pub name: String,
    #[serde(flatten)]
    pub condition: AlertCondition,
}

impl AlertRule {
    pub fn new(name: impl Into<String>, condition: AlertCondition) -> Self {
        Self {
            name: name.into(),
            condition,
        }
    }
}

/// Predicate kinds available from configuration.
///
/// Flux thresholds are W/m², temperatures MK, emission measures cm⁻³.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertCondition {
    XrsbAbove { threshold: f64 },
    XrsaAbove { threshold: f64 },
    XrsbRising,
    XrsaRising,
    TemperatureAbove { threshold_mk: f64 },
    EmissionMeasureAbove { threshold: f64 },
    XrsbDiffAbove { lag: usize, threshold: f64 },
}

fn default_alert_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new(
            "xrsb_above_threshold",
            AlertCondition::XrsbAbove {
                threshold: defaults::XRSB_TRIGGER_FLUX,
            },
        ),
        AlertRule::new("xrsb_rising", AlertCondition::XrsbRising),
    ]
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlareEndConfig {
    /// Flare is over once the latest XRSB drops below this (W/m²).
    pub xrsb_below: f64,
}

impl Default for FlareEndConfig {
    fn default() -> Self {
        Self {
            xrsb_below: defaults::XRSB_FLARE_END_FLUX,
        }
    }
}

/// Flare Activity Indicator thresholds on the differenced series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FaiConfig {
    pub lag: usize,
    pub min_emission_measure: f64,
    pub min_temperature_mk: f64,
    pub max_temperature_mk: Option<f64>,
}

impl Default for FaiConfig {
    fn default() -> Self {
        Self {
            lag: defaults::FAI_LAG,
            min_emission_measure: defaults::FAI_MIN_EMISSION_MEASURE,
            min_temperature_mk: defaults::FAI_MIN_TEMPERATURE_MK,
            max_temperature_mk: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Campaign state and episode log rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the flare campaign.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CampaignState {
    #[default]
    Searching,
    Triggered,
    Launched,
    PostLaunch,
}

impl std::fmt::Display for CampaignState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignState::Searching => write!(f, "searching"),
            CampaignState::Triggered => write!(f, "triggered"),
            CampaignState::Launched => write!(f, "launched"),
            CampaignState::PostLaunch => write!(f, "post-launch"),
        }
    }
}

/// One flare episode, opened on trigger and never removed.
///
/// Unset times serialize as empty fields in the timetag summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlareEvent {
    pub index: usize,
    /// Time tag of the sample that satisfied the trigger
    pub trigger_time: DateTime<Utc>,
    /// When the trigger was observable in real time (trigger + latency)
    pub realtime_trigger_time: DateTime<Utc>,
    pub countdown_initiated_time: Option<DateTime<Utc>>,
    pub launch_time: Option<DateTime<Utc>>,
    pub hic_launch_time: Option<DateTime<Utc>>,
    pub hold_time: Option<DateTime<Utc>>,
    pub flare_end_time: Option<DateTime<Utc>>,
    pub foxsi_obs_start: Option<DateTime<Utc>>,
    pub foxsi_obs_end: Option<DateTime<Utc>>,
    pub hic_obs_start: Option<DateTime<Utc>>,
    pub hic_obs_end: Option<DateTime<Utc>>,
}

impl FlareEvent {
    pub fn new(index: usize, trigger_time: DateTime<Utc>, realtime_trigger_time: DateTime<Utc>) -> Self {
        Self {
            index,
            trigger_time,
            realtime_trigger_time,
            countdown_initiated_time: None,
            launch_time: None,
            hic_launch_time: None,
            hold_time: None,
            flare_end_time: None,
            foxsi_obs_start: None,
            foxsi_obs_end: None,
            hic_obs_start: None,
            hic_obs_end: None,
        }
    }
}

/// A false→true crossing of the flare activity indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaiEvent {
    /// Time tag of the sample where the indicator turned on
    pub time_tag: DateTime<Utc>,
    /// Episode open at the time, if any
    pub flare_index: Option<usize>,
    pub emission_measure: f64,
    pub temperature_mk: f64,
}

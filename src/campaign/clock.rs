//! Session clock for clock-gated campaign transitions

use chrono::{DateTime, Duration, Utc};

use crate::config::ClockMode;

/// Source of "now" for the campaign.
///
/// In `DataDriven` mode, now is the newest data time tag plus the feed
/// latency, which makes historical replays run on data time.
#[derive(Debug, Clone)]
pub struct SessionClock {
    mode: ClockMode,
    latency: Duration,
    latest_data: Option<DateTime<Utc>>,
}

impl SessionClock {
    pub fn new(mode: ClockMode, latency: Duration) -> Self {
        Self {
            mode,
            latency,
            latest_data: None,
        }
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Record the newest merged data time tag.
    pub fn observe_data(&mut self, time_tag: DateTime<Utc>) {
        if self.latest_data.map_or(true, |t| time_tag > t) {
            self.latest_data = Some(time_tag);
        }
    }

    /// Data time adjusted for latency, if any data has been seen.
    pub fn realtime_of_data(&self) -> Option<DateTime<Utc>> {
        self.latest_data.map(|t| t + self.latency)
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self.mode {
            ClockMode::Wall => Utc::now(),
            ClockMode::DataDriven => self.realtime_of_data().unwrap_or_else(Utc::now),
        }
    }
}

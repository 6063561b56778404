//! Flare Campaign State Machine
//!
//! ```text
//! searching ──all alerts──▶ triggered ──launch()──▶ launched ──now ≥ HiC end──▶ post-launch
//!     ▲                        │  │                                                 │
//!     ├──────flare end─────────┘  │                                                 │
//!     ├──────hold()───────────────┘                                                 │
//!     └────────────────────now ≥ HiC end + dead-time─────────────────────────────────┘
//! ```
//!
//! Data-driven transitions run through [`FlareCampaign::on_data`], timer
//! transitions through [`FlareCampaign::on_clock`] and operator actions
//! through the command methods. Each call applies at most one transition.
//! Illegal operator commands are logged and rejected without side effects.

pub mod clock;

pub use clock::SessionClock;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::CampaignTiming;
use crate::types::{CampaignState, EventBus, FlareEvent, SessionEvent};

/// A state change applied by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CampaignState,
    pub to: CampaignState,
    pub at: DateTime<Utc>,
}

/// Result of an operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    Rejected { reason: String },
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandOutcome::Accepted)
    }
}

/// Session-wide campaign context: state, flare flag and episode log.
#[derive(Debug)]
pub struct FlareCampaign {
    timing: CampaignTiming,
    state: CampaignState,
    flare_happening: bool,
    /// Index of the open episode, while one is pending or in dead-time.
    current: Option<usize>,
    episodes: Vec<FlareEvent>,
    events: EventBus,
}

impl FlareCampaign {
    pub fn new(timing: CampaignTiming, events: EventBus) -> Self {
        Self {
            timing,
            state: CampaignState::Searching,
            flare_happening: false,
            current: None,
            episodes: Vec::new(),
            events,
        }
    }

    pub fn state(&self) -> CampaignState {
        self.state
    }

    pub fn flare_happening(&self) -> bool {
        self.flare_happening
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_episode(&self) -> Option<&FlareEvent> {
        self.current.and_then(|i| self.episodes.get(i))
    }

    /// Every episode of the session, oldest first.
    pub fn episodes(&self) -> &[FlareEvent] {
        &self.episodes
    }

    pub fn timing(&self) -> &CampaignTiming {
        &self.timing
    }

    fn current_mut(&mut self) -> Option<&mut FlareEvent> {
        self.current.and_then(|i| self.episodes.get_mut(i))
    }

    fn transition(&mut self, to: CampaignState, at: DateTime<Utc>) -> Transition {
        let from = self.state;
        self.state = to;
        info!(from = %from, to = %to, at = %at, episode = ?self.current, "Campaign state changed");
        self.events.emit(SessionEvent::StateChanged {
            from,
            to,
            at,
            episode: self.current_episode().cloned(),
        });
        Transition { from, to, at }
    }

    // ========================================================================
    // Data-driven transitions
    // ========================================================================

    /// Apply the alert results of a tick that appended new data.
    ///
    /// `data_time` is the time tag of the newest sample, `trigger` is the
    /// conjunction of the alert registry and `flare_end` the end condition.
    pub fn on_data(&mut self, data_time: DateTime<Utc>, trigger: bool, flare_end: bool) -> Option<Transition> {
        match self.state {
            CampaignState::Searching if trigger => {
                let index = self.episodes.len();
                let realtime = data_time + self.timing.latency();
                self.episodes.push(FlareEvent::new(index, data_time, realtime));
                self.current = Some(index);
                self.flare_happening = true;
                info!(trigger = %data_time, realtime = %realtime, index, "FLARE TRIGGERED");
                Some(self.transition(CampaignState::Triggered, data_time))
            }
            CampaignState::Triggered if flare_end => {
                self.record_flare_end(data_time);
                info!(at = %data_time, "Flare ended before launch, DO NOT LAUNCH");
                let t = self.transition(CampaignState::Searching, data_time);
                self.current = None;
                Some(t)
            }
            CampaignState::Launched | CampaignState::PostLaunch if flare_end && self.flare_happening => {
                self.record_flare_end(data_time);
                info!(at = %data_time, "Flare ended during observation");
                None
            }
            _ => None,
        }
    }

    fn record_flare_end(&mut self, at: DateTime<Utc>) {
        self.flare_happening = false;
        if let Some(episode) = self.current_mut() {
            episode.flare_end_time = Some(at);
        }
    }

    // ========================================================================
    // Clock-gated transitions
    // ========================================================================

    /// Advance timer-driven transitions; call on every timer firing.
    pub fn on_clock(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        let hic_obs_end = self.current_episode().and_then(|e| e.hic_obs_end)?;
        match self.state {
            CampaignState::Launched if now >= hic_obs_end => {
                info!(at = %now, "Observation complete, entering dead-time");
                Some(self.transition(CampaignState::PostLaunch, now))
            }
            CampaignState::PostLaunch if now >= hic_obs_end + self.timing.deadtime() => {
                if self.flare_happening {
                    warn!(at = %now, "Flare end not seen before dead-time expired, closing episode");
                    self.record_flare_end(now);
                }
                let t = self.transition(CampaignState::Searching, now);
                self.current = None;
                info!(at = %now, "Ready to look for another flare");
                Some(t)
            }
            _ => None,
        }
    }

    // ========================================================================
    // Operator commands
    // ========================================================================

    fn reject(&self, command: &str, reason: String) -> CommandOutcome {
        warn!(command, state = %self.state, reason = %reason, "Operator command rejected");
        CommandOutcome::Rejected { reason }
    }

    /// Launch FOXSI for the triggered episode.
    pub fn trigger_launch(&mut self, now: DateTime<Utc>) -> CommandOutcome {
        if self.state != CampaignState::Triggered {
            return self.reject("launch", format!("cannot launch while {}", self.state));
        }
        let t = self.timing;
        let Some(episode) = self.current_mut() else {
            return self.reject("launch", "no open episode".to_string());
        };
        episode.launch_time = Some(now);
        episode.hic_launch_time = Some(now + t.hic_launch_offset());
        episode.foxsi_obs_start = Some(now + t.foxsi_obs_start());
        episode.foxsi_obs_end = Some(now + t.foxsi_obs_end());
        episode.hic_obs_start = Some(now + t.hic_obs_start());
        episode.hic_obs_end = Some(now + t.hic_obs_end());
        info!(launch = %now, hic_launch = %(now + t.hic_launch_offset()), "Launching FOXSI");
        self.transition(CampaignState::Launched, now);
        CommandOutcome::Accepted
    }

    /// Stand down the triggered episode without launching.
    pub fn hold_launch(&mut self, now: DateTime<Utc>) -> CommandOutcome {
        if self.state != CampaignState::Triggered {
            return self.reject("hold", format!("cannot hold while {}", self.state));
        }
        if let Some(episode) = self.current_mut() {
            episode.hold_time = Some(now);
        }
        self.flare_happening = false;
        info!(at = %now, "Launch held");
        self.transition(CampaignState::Searching, now);
        self.current = None;
        CommandOutcome::Accepted
    }

    /// Record the start of the launch countdown; once per episode.
    pub fn start_countdown(&mut self, now: DateTime<Utc>) -> CommandOutcome {
        if self.state != CampaignState::Triggered {
            return self.reject("countdown", format!("cannot start countdown while {}", self.state));
        }
        let already = self
            .current_episode()
            .and_then(|e| e.countdown_initiated_time);
        if let Some(at) = already {
            return self.reject("countdown", format!("countdown already started at {at}"));
        }
        if let Some(episode) = self.current_mut() {
            episode.countdown_initiated_time = Some(now);
        }
        info!(at = %now, "Launch countdown initiated");
        CommandOutcome::Accepted
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 18, 0, 0).unwrap()
    }

    fn campaign() -> FlareCampaign {
        FlareCampaign::new(CampaignTiming::default(), EventBus::new(64))
    }

    fn triggered() -> FlareCampaign {
        let mut c = campaign();
        c.on_data(t0(), true, false);
        c
    }

    #[test]
    fn test_trigger_opens_episode() {
        let mut c = campaign();
        assert!(c.on_data(t0(), false, false).is_none());
        let t = c.on_data(t0(), true, false).unwrap();
        assert_eq!((t.from, t.to), (CampaignState::Searching, CampaignState::Triggered));
        assert!(c.flare_happening());
        let e = c.current_episode().unwrap();
        assert_eq!(e.trigger_time, t0());
        assert_eq!(e.realtime_trigger_time, t0() + Duration::minutes(3));
    }

    #[test]
    fn test_repeated_trigger_does_not_open_second_episode() {
        let mut c = triggered();
        assert!(c.on_data(t0() + Duration::minutes(1), true, false).is_none());
        assert_eq!(c.episodes().len(), 1);
    }

    #[test]
    fn test_flare_end_aborts_triggered_episode() {
        let mut c = triggered();
        let end = t0() + Duration::minutes(2);
        let t = c.on_data(end, false, true).unwrap();
        assert_eq!(t.to, CampaignState::Searching);
        assert!(!c.flare_happening());
        assert_eq!(c.episodes()[0].flare_end_time, Some(end));
        assert!(c.episodes()[0].launch_time.is_none());
        assert!(c.current_episode().is_none());
    }

    #[test]
    fn test_flare_end_and_trigger_in_same_call_applies_one_transition() {
        let mut c = triggered();
        c.on_data(t0() + Duration::minutes(1), true, true);
        assert_eq!(c.state(), CampaignState::Searching);
        assert_eq!(c.episodes().len(), 1);
    }

    #[test]
    fn test_launch_offsets() {
        let mut c = triggered();
        let launch = t0() + Duration::minutes(5);
        assert!(c.trigger_launch(launch).is_accepted());
        assert_eq!(c.state(), CampaignState::Launched);
        let e = c.current_episode().unwrap();
        assert_eq!(e.launch_time, Some(launch));
        assert_eq!(e.hic_launch_time, Some(launch + Duration::minutes(2)));
        assert_eq!(e.foxsi_obs_start, Some(launch + Duration::minutes(2)));
        assert_eq!(e.foxsi_obs_end, Some(launch + Duration::minutes(8)));
        assert_eq!(e.hic_obs_start, Some(launch + Duration::minutes(4)));
        assert_eq!(e.hic_obs_end, Some(launch + Duration::minutes(10)));
    }

    #[test]
    fn test_duplicate_launch_is_rejected() {
        let mut c = triggered();
        let launch = t0() + Duration::minutes(5);
        assert!(c.trigger_launch(launch).is_accepted());
        let second = c.trigger_launch(launch + Duration::minutes(1));
        assert!(matches!(second, CommandOutcome::Rejected { .. }));
        assert_eq!(c.episodes().len(), 1);
        assert_eq!(c.episodes()[0].launch_time, Some(launch));
        assert_eq!(c.state(), CampaignState::Launched);
    }

    #[test]
    fn test_commands_rejected_while_searching() {
        let mut c = campaign();
        assert!(!c.trigger_launch(t0()).is_accepted());
        assert!(!c.hold_launch(t0()).is_accepted());
        assert!(!c.start_countdown(t0()).is_accepted());
        assert_eq!(c.state(), CampaignState::Searching);
        assert!(c.episodes().is_empty());
    }

    #[test]
    fn test_hold_closes_episode_without_launch() {
        let mut c = triggered();
        let hold = t0() + Duration::minutes(1);
        assert!(c.hold_launch(hold).is_accepted());
        assert_eq!(c.state(), CampaignState::Searching);
        assert_eq!(c.episodes()[0].hold_time, Some(hold));
        assert!(c.episodes()[0].launch_time.is_none());
    }

    #[test]
    fn test_countdown_once_per_episode() {
        let mut c = triggered();
        assert!(c.start_countdown(t0()).is_accepted());
        assert!(!c.start_countdown(t0() + Duration::seconds(30)).is_accepted());
        assert_eq!(c.episodes()[0].countdown_initiated_time, Some(t0()));
        assert_eq!(c.state(), CampaignState::Triggered);
    }

    #[test]
    fn test_dead_time_gating() {
        let mut c = triggered();
        let launch = t0() + Duration::minutes(5);
        c.trigger_launch(launch);
        let hic_end = launch + Duration::minutes(10);

        assert!(c.on_clock(hic_end - Duration::seconds(1)).is_none());
        assert_eq!(c.on_clock(hic_end).unwrap().to, CampaignState::PostLaunch);

        let resume = hic_end + Duration::minutes(30);
        assert!(c.on_clock(resume - Duration::minutes(1)).is_none());
        assert_eq!(c.state(), CampaignState::PostLaunch);
        assert_eq!(c.on_clock(resume).unwrap().to, CampaignState::Searching);

        // flare never ended on its own: force-closed at the resume time
        assert_eq!(c.episodes()[0].flare_end_time, Some(resume));
        assert!(!c.flare_happening());
    }

    #[test]
    fn test_one_clock_transition_per_call() {
        let mut c = triggered();
        c.trigger_launch(t0());
        let far = t0() + Duration::hours(2);
        assert_eq!(c.on_clock(far).unwrap().to, CampaignState::PostLaunch);
        assert_eq!(c.on_clock(far).unwrap().to, CampaignState::Searching);
        assert!(c.on_clock(far).is_none());
    }

    #[test]
    fn test_flare_end_during_observation_keeps_state() {
        let mut c = triggered();
        c.trigger_launch(t0());
        let end = t0() + Duration::minutes(3);
        assert!(c.on_data(end, false, true).is_none());
        assert_eq!(c.state(), CampaignState::Launched);
        assert!(!c.flare_happening());

        c.on_clock(t0() + Duration::minutes(10));
        c.on_clock(t0() + Duration::minutes(40));
        assert_eq!(c.state(), CampaignState::Searching);
        assert_eq!(c.episodes()[0].flare_end_time, Some(end));
    }

    #[test]
    fn test_state_changes_are_broadcast() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut c = FlareCampaign::new(CampaignTiming::default(), bus);
        c.on_data(t0(), true, false);
        c.start_countdown(t0());

        match rx.try_recv().unwrap() {
            SessionEvent::StateChanged { from, to, episode, .. } => {
                assert_eq!(from, CampaignState::Searching);
                assert_eq!(to, CampaignState::Triggered);
                assert_eq!(episode.unwrap().index, 0);
            }
            other => panic!("unexpected event {other:?}"),
        }
        // countdown is not a state change
        assert!(rx.try_recv().is_err());
    }
}

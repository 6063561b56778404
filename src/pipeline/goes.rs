//! GOES XRS pipeline: the trigger feed
//!
//! Owns the merged XRS table, its derived rows, the alert registry, the
//! FAI evaluator and the campaign state machine. Per tick:
//!
//! 1. merge the fetch into the series
//! 2. on new rows only: derive, evaluate alerts and the flare end
//!    condition, evaluate FAI on every new row, apply at most one data
//!    transition
//! 3. apply at most one clock transition, persisting the flare log if
//!    one fired
//! 4. persist and notify

use chrono::{DateTime, Utc};
use tracing::info;

use super::{FeedTick, OperatorCommand, StatusReport};
use crate::alerts::{AlertRegistry, FaiEvaluator, FlareEndCondition, XrsView};
use crate::campaign::{CommandOutcome, FlareCampaign, SessionClock, Transition};
use crate::config::SessionConfig;
use crate::physics::{ThermalModel, XrsDeriver};
use crate::storage::{RecorderError, SessionRecorder};
use crate::timeseries::Timeseries;
use crate::types::{AlertSnapshot, EventBus, FaiEvent, Feed, NewRows, SessionEvent, XrsDerived, XrsSample};

pub struct GoesPipeline {
    series: Timeseries<XrsSample>,
    deriver: XrsDeriver,
    lags: Vec<usize>,
    registry: AlertRegistry,
    flare_end: FlareEndCondition,
    fai: FaiEvaluator,
    fai_log: Vec<FaiEvent>,
    campaign: FlareCampaign,
    clock: SessionClock,
    snapshot: Option<AlertSnapshot>,
    recorder: Option<SessionRecorder>,
    events: EventBus,
}

impl GoesPipeline {
    pub fn new(
        config: &SessionConfig,
        model: Option<ThermalModel>,
        registry: AlertRegistry,
        recorder: Option<SessionRecorder>,
        events: EventBus,
    ) -> Self {
        if model.is_none() {
            tracing::warn!("No GOES response model; temperature and emission measure will be NaN");
        }
        info!(alerts = ?registry.names().collect::<Vec<_>>(), "Alert registry");
        Self {
            series: Timeseries::new(),
            deriver: XrsDeriver::new(model, &config.goes.diff_lags),
            lags: config.goes.diff_lags.clone(),
            registry,
            flare_end: FlareEndCondition::from(&config.flare_end),
            fai: FaiEvaluator::new(config.fai),
            fai_log: Vec::new(),
            campaign: FlareCampaign::new(config.campaign, events.clone()),
            clock: SessionClock::new(config.session.clock, config.campaign.latency()),
            snapshot: None,
            recorder,
            events,
        }
    }

    pub fn series(&self) -> &Timeseries<XrsSample> {
        &self.series
    }

    pub fn derived(&self) -> &[XrsDerived] {
        self.deriver.rows()
    }

    pub fn campaign(&self) -> &FlareCampaign {
        &self.campaign
    }

    pub fn fai_log(&self) -> &[FaiEvent] {
        &self.fai_log
    }

    /// Alert snapshot of the most recent tick with new data.
    pub fn snapshot(&self) -> Option<&AlertSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Evaluate alerts, FAI and data transitions for newly appended rows.
    fn on_new_rows(&mut self, appended: std::ops::Range<usize>) -> Option<Transition> {
        let new_rows = self.series.get(appended.clone()).to_vec();
        let derived = self.deriver.derive(&new_rows).to_vec();

        let view = XrsView::new(self.series.rows(), self.deriver.rows());
        let snapshot = self.registry.evaluate(&view);
        let trigger = snapshot.all_true();
        let flare_end = self.flare_end.holds(&view);

        if self.snapshot.as_ref() != Some(&snapshot) {
            info!(alerts = %snapshot, "GOES alerts changed");
            self.events.emit(SessionEvent::AlertsChanged {
                feed: Feed::Goes,
                snapshot: snapshot.clone(),
            });
        }
        self.snapshot = Some(snapshot);

        let latest = new_rows.last()?.time_tag;

        // a catch-up poll can cross and drop back within one batch
        for (sample, row) in new_rows.iter().zip(&derived) {
            if let Some(event) = self.fai.evaluate(sample, row, self.campaign.current_index()) {
                self.fai_log.push(event.clone());
                self.events.emit(SessionEvent::FaiLogged(event));
            }
        }

        self.clock.observe_data(latest);
        let transition = self.campaign.on_data(latest, trigger, flare_end);

        self.events.emit(SessionEvent::NewSampleAppended {
            feed: Feed::Goes,
            rows: NewRows::Goes(new_rows.into_iter().zip(derived).collect()),
        });
        transition
    }

    /// Apply clock-gated transitions at `now` and persist the flare log if one fired.
    pub fn advance_clock(&mut self, now: DateTime<Utc>) -> Result<Option<Transition>, RecorderError> {
        let transition = self.campaign.on_clock(now);
        if transition.is_some() {
            self.persist_flare_log()?;
        }
        Ok(transition)
    }

    fn persist_flare_log(&self) -> Result<(), RecorderError> {
        match &self.recorder {
            Some(r) => r.write_timetag_summary(self.campaign.episodes()),
            None => Ok(()),
        }
    }

    fn persist_all(&self) -> Result<(), RecorderError> {
        let Some(r) = &self.recorder else {
            return Ok(());
        };
        r.write_goes(self.series.rows(), self.deriver.rows(), &self.lags)?;
        r.write_timetag_summary(self.campaign.episodes())?;
        r.write_fai_summary(&self.fai_log)
    }

    /// Apply an operator command at the session clock's current time.
    pub fn apply_command(&mut self, command: OperatorCommand) -> Result<Option<CommandOutcome>, RecorderError> {
        let now = self.clock.now();
        let outcome = match command {
            OperatorCommand::Launch => self.campaign.trigger_launch(now),
            OperatorCommand::Hold => self.campaign.hold_launch(now),
            OperatorCommand::Countdown => self.campaign.start_countdown(now),
            OperatorCommand::Status { reply } => {
                let _ = reply.send(self.status());
                return Ok(None);
            }
        };
        if outcome.is_accepted() {
            self.persist_flare_log()?;
        }
        Ok(Some(outcome))
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            state: self.campaign.state(),
            flare_happening: self.campaign.flare_happening(),
            episode: self.campaign.current_episode().cloned(),
            episodes: self.campaign.episodes().len(),
            samples: self.series.len(),
            last_data: self.series.last_time_tag(),
            clock: self.clock.now(),
            alerts: self.snapshot.clone(),
        }
    }
}

impl FeedTick for GoesPipeline {
    type Sample = XrsSample;

    fn feed(&self) -> Feed {
        Feed::Goes
    }

    fn tick(&mut self, fetched: Option<Vec<XrsSample>>) -> Result<usize, RecorderError> {
        let initial = self.series.is_empty();
        let appended = self.series.merge(fetched);
        let count = appended.len();

        if count > 0 {
            if count > 1 && !initial {
                info!(rows = count, "GOES merge appended several rows");
            }
            self.on_new_rows(appended);
        }

        let now = self.clock.now();
        self.advance_clock(now)?;

        if count > 0 {
            self.persist_all()?;
        }
        Ok(count)
    }

    fn command(&mut self, command: OperatorCommand) -> Result<(), RecorderError> {
        self.apply_command(command).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClockMode;
    use crate::types::CampaignState;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 17, 0, 0).unwrap()
    }

    fn sample(i: i64, xrsb: f64) -> XrsSample {
        XrsSample {
            time_tag: t0() + Duration::minutes(i),
            satellite: 16,
            xrsa: xrsb / 10.0,
            xrsb,
        }
    }

    fn pipeline() -> GoesPipeline {
        let mut config = SessionConfig::default();
        config.session.clock = ClockMode::DataDriven;
        let registry = AlertRegistry::from_rules(&config.alerts);
        GoesPipeline::new(&config, None, registry, None, EventBus::new(64))
    }

    #[test]
    fn test_zero_new_rows_does_no_work() {
        let mut p = pipeline();
        let rows = vec![sample(0, 1e-7), sample(1, 1e-7)];
        assert_eq!(p.tick(Some(rows.clone())).unwrap(), 2);
        let snapshot = p.snapshot().cloned();

        assert_eq!(p.tick(Some(rows)).unwrap(), 0);
        assert_eq!(p.tick(None).unwrap(), 0);
        assert_eq!(p.derived().len(), 2);
        assert_eq!(p.snapshot().cloned(), snapshot);
    }

    #[test]
    fn test_trigger_uses_latest_row() {
        let mut p = pipeline();
        p.tick(Some(vec![sample(0, 1e-7), sample(1, 1e-7)])).unwrap();
        assert_eq!(p.campaign().state(), CampaignState::Searching);

        p.tick(Some(vec![sample(1, 1e-7), sample(2, 3e-6)])).unwrap();
        assert_eq!(p.campaign().state(), CampaignState::Triggered);
        let episode = p.campaign().current_episode().unwrap();
        assert_eq!(episode.trigger_time, t0() + Duration::minutes(2));
        assert_eq!(episode.realtime_trigger_time, t0() + Duration::minutes(5));
    }

    #[test]
    fn test_status_command_replies() {
        let mut p = pipeline();
        p.tick(Some(vec![sample(0, 1e-7)])).unwrap();
        let (tx, mut rx) = tokio::sync::oneshot::channel();
        assert_eq!(p.apply_command(OperatorCommand::Status { reply: tx }).unwrap(), None);
        let report = rx.try_recv().unwrap();
        assert_eq!(report.samples, 1);
        assert_eq!(report.state, CampaignState::Searching);
        assert_eq!(report.clock, t0() + Duration::minutes(3));
    }

    #[test]
    fn test_fai_crossing_inside_one_batch_is_logged() {
        let mut config = SessionConfig::default();
        config.session.clock = ClockMode::DataDriven;
        let registry = AlertRegistry::from_rules(&config.alerts);
        let model = crate::physics::thermal::tests::linear_model();
        let mut p = GoesPipeline::new(&config, Some(model), registry, None, EventBus::new(64));

        let reading = |i: i64, xrsa: f64, xrsb: f64| XrsSample {
            time_tag: t0() + Duration::minutes(i),
            satellite: 16,
            xrsa,
            xrsb,
        };
        let quiet: Vec<XrsSample> = (0..4).map(|i| reading(i, 1e-9, 1e-7)).collect();
        p.tick(Some(quiet)).unwrap();
        assert!(p.fai_log().is_empty());

        // burst at 4-5, gone again by 6-7, all in one poll
        let catch_up = vec![
            reading(4, 1e-7, 1e-6),
            reading(5, 1e-7, 1e-6),
            reading(6, 1e-9, 1e-7),
            reading(7, 1e-9, 1e-7),
        ];
        assert_eq!(p.tick(Some(catch_up)).unwrap(), 4);

        assert_eq!(p.fai_log().len(), 1);
        let event = &p.fai_log()[0];
        assert_eq!(event.time_tag, t0() + Duration::minutes(4));
        assert!((event.temperature_mk - 11.0).abs() < 1e-6);
        assert!(event.emission_measure > 5e46);
    }

    #[test]
    fn test_rejected_launch_leaves_state() {
        let mut p = pipeline();
        p.tick(Some(vec![sample(0, 1e-7)])).unwrap();
        let outcome = p.apply_command(OperatorCommand::Launch).unwrap().unwrap();
        assert!(!outcome.is_accepted());
        assert_eq!(p.campaign().state(), CampaignState::Searching);
    }
}

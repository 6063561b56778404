//! EOVSA pipeline: merged flare-test table and the radio activity indicator

use tracing::info;

use super::FeedTick;
use crate::alerts::{EovsaActivity, EovsaIndicator};
use crate::storage::{RecorderError, SessionRecorder};
use crate::timeseries::Timeseries;
use crate::types::{EovsaSample, EventBus, Feed, NewRows, SessionEvent};

pub struct EovsaPipeline {
    series: Timeseries<EovsaSample>,
    indicator: EovsaIndicator,
    activity: Option<EovsaActivity>,
    recorder: Option<SessionRecorder>,
    events: EventBus,
}

impl EovsaPipeline {
    pub fn new(alert_window: usize, recorder: Option<SessionRecorder>, events: EventBus) -> Self {
        Self {
            series: Timeseries::new(),
            indicator: EovsaIndicator::new(alert_window),
            activity: None,
            recorder,
            events,
        }
    }

    pub fn series(&self) -> &Timeseries<EovsaSample> {
        &self.series
    }

    pub fn activity(&self) -> Option<EovsaActivity> {
        self.activity
    }
}

impl FeedTick for EovsaPipeline {
    type Sample = EovsaSample;

    fn feed(&self) -> Feed {
        Feed::Eovsa
    }

    fn tick(&mut self, fetched: Option<Vec<EovsaSample>>) -> Result<usize, RecorderError> {
        let appended = self.series.merge(fetched);
        if appended.is_empty() {
            return Ok(0);
        }
        let count = appended.len();
        let new_rows = self.series.get(appended).to_vec();

        let activity = self.indicator.evaluate(self.series.rows());
        let previous = self.activity.replace(activity);
        let changed = previous.map_or(true, |p| p.snapshot() != activity.snapshot());

        if let Some(r) = &self.recorder {
            r.write_eovsa(self.series.rows())?;
        }

        self.events.emit(SessionEvent::NewSampleAppended {
            feed: Feed::Eovsa,
            rows: NewRows::Eovsa(new_rows),
        });
        if changed {
            match activity {
                EovsaActivity::Current { since } => info!(%since, "EOVSA flare flag set"),
                EovsaActivity::Recent { since } => info!(%since, "EOVSA flare flag seen recently"),
                EovsaActivity::Quiet => info!("EOVSA quiet"),
            }
            self.events.emit(SessionEvent::AlertsChanged {
                feed: Feed::Eovsa,
                snapshot: activity.snapshot(),
            });
        }
        Ok(count)
    }
}

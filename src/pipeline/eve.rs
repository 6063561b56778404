//! EVE ESP pipeline: merged diode counts with one-sample differences

use tracing::info;

use super::FeedTick;
use crate::physics::EveDeriver;
use crate::storage::{RecorderError, SessionRecorder};
use crate::timeseries::Timeseries;
use crate::types::{EveDerived, EveSample, EventBus, Feed, NewRows, SessionEvent};

pub struct EvePipeline {
    series: Timeseries<EveSample>,
    deriver: EveDeriver,
    recorder: Option<SessionRecorder>,
    events: EventBus,
}

impl EvePipeline {
    pub fn new(recorder: Option<SessionRecorder>, events: EventBus) -> Self {
        Self {
            series: Timeseries::new(),
            deriver: EveDeriver::new(),
            recorder,
            events,
        }
    }

    pub fn series(&self) -> &Timeseries<EveSample> {
        &self.series
    }

    pub fn derived(&self) -> &[EveDerived] {
        self.deriver.rows()
    }
}

impl FeedTick for EvePipeline {
    type Sample = EveSample;

    fn feed(&self) -> Feed {
        Feed::Eve
    }

    fn tick(&mut self, fetched: Option<Vec<EveSample>>) -> Result<usize, RecorderError> {
        let initial = self.series.is_empty();
        let appended = self.series.merge(fetched);
        if appended.is_empty() {
            return Ok(0);
        }
        let count = appended.len();
        if count > 1 && !initial {
            info!(rows = count, "EVE merge appended several rows");
        }

        let new_rows = self.series.get(appended).to_vec();
        let derived = self.deriver.derive(&new_rows).to_vec();

        if let Some(r) = &self.recorder {
            r.write_eve(self.series.rows(), self.deriver.rows())?;
        }
        self.events.emit(SessionEvent::NewSampleAppended {
            feed: Feed::Eve,
            rows: NewRows::Eve(new_rows.into_iter().zip(derived).collect()),
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn rows(counts: &[f64]) -> Vec<EveSample> {
        let t0 = Utc.with_ymd_and_hms(2024, 4, 1, 18, 0, 0).unwrap();
        counts
            .iter()
            .enumerate()
            .map(|(i, &c)| EveSample {
                time_tag: t0 + Duration::seconds(10 * i as i64),
                esp_0_7: c,
                esp_30: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_incremental_differences() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut p = EvePipeline::new(None, bus);

        let all = rows(&[10.0, 12.0, 15.0]);
        assert_eq!(p.tick(Some(all[..2].to_vec())).unwrap(), 2);
        assert_eq!(p.tick(Some(all.clone())).unwrap(), 1);
        assert_eq!(p.tick(Some(all)).unwrap(), 0);

        let d = p.derived();
        assert!(d[0].esp_0_7_diff.is_nan());
        assert_eq!(d[1].esp_0_7_diff, 2.0);
        assert_eq!(d[2].esp_0_7_diff, 3.0);

        let mut appended = 0;
        while let Ok(SessionEvent::NewSampleAppended { feed, rows }) = rx.try_recv() {
            assert_eq!(feed, Feed::Eve);
            appended += rows.len();
        }
        assert_eq!(appended, 3);
    }
}

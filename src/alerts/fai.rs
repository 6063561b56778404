//! Flare Activity Indicator
//!
//! Checks the temperature and emission measure computed from the lagged
//! GOES differences. Edge-triggered: an event is produced only when the
//! condition goes from false on the previous evaluation to true now.

use tracing::info;

use crate::config::FaiConfig;
use crate::types::{FaiEvent, XrsDerived, XrsSample};

#[derive(Debug, Clone)]
pub struct FaiEvaluator {
    config: FaiConfig,
    active: bool,
}

impl FaiEvaluator {
    pub fn new(config: FaiConfig) -> Self {
        Self {
            config,
            active: false,
        }
    }

    /// Level condition on one derived row; NaN is false.
    pub fn condition(&self, derived: &XrsDerived) -> bool {
        let Some(d) = derived.diff(self.config.lag) else {
            return false;
        };
        let hot_enough = d.temperature_mk >= self.config.min_temperature_mk;
        let not_too_hot = self
            .config
            .max_temperature_mk
            .map_or(true, |max| d.temperature_mk <= max);
        d.emission_measure >= self.config.min_emission_measure && hot_enough && not_too_hot
    }

    /// Evaluate the next row in time order, returning an event on a rising edge.
    pub fn evaluate(
        &mut self,
        sample: &XrsSample,
        derived: &XrsDerived,
        flare_index: Option<usize>,
    ) -> Option<FaiEvent> {
        let now = self.condition(derived);
        let rising_edge = now && !self.active;
        self.active = now;
        if !rising_edge {
            return None;
        }

        let d = derived.diff(self.config.lag)?;
        info!(
            time = %sample.time_tag,
            em = d.emission_measure,
            temperature_mk = d.temperature_mk,
            flare = ?flare_index,
            "FAI triggered"
        );
        Some(FaiEvent {
            time_tag: sample.time_tag,
            flare_index,
            emission_measure: d.emission_measure,
            temperature_mk: d.temperature_mk,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

//! Alert registry
//!
//! An ordered list of named predicates chosen once per session. The flare
//! trigger fires iff every predicate holds on the same snapshot; nothing is
//! latched between evaluations.

use crate::config::{AlertCondition, AlertRule, FlareEndConfig};
use crate::types::{AlertSnapshot, XrsDerived, XrsSample};

/// Read-only view of the merged GOES series and its derived rows.
#[derive(Debug, Clone, Copy)]
pub struct XrsView<'a> {
    pub samples: &'a [XrsSample],
    pub derived: &'a [XrsDerived],
}

impl<'a> XrsView<'a> {
    pub fn new(samples: &'a [XrsSample], derived: &'a [XrsDerived]) -> Self {
        Self { samples, derived }
    }

    pub fn latest(&self) -> Option<&'a XrsSample> {
        self.samples.last()
    }

    pub fn previous(&self) -> Option<&'a XrsSample> {
        self.samples.len().checked_sub(2).map(|i| &self.samples[i])
    }

    pub fn latest_derived(&self) -> Option<&'a XrsDerived> {
        self.derived.last()
    }
}

/// A trigger predicate. NaN inputs must evaluate to false.
pub type Predicate = Box<dyn Fn(&XrsView<'_>) -> bool + Send + Sync>;

/// Ordered `name → predicate` mapping.
#[derive(Default)]
pub struct AlertRegistry {
    rules: Vec<(String, Predicate)>,
}

impl std::fmt::Debug for AlertRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a predicate; evaluation keeps insertion order.
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&XrsView<'_>) -> bool + Send + Sync + 'static,
    {
        self.rules.push((name.into(), Box::new(predicate)));
        self
    }

    pub fn from_rules(rules: &[AlertRule]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|r| (r.name.clone(), condition_predicate(&r.condition)))
                .collect(),
        }
    }

    pub fn evaluate(&self, view: &XrsView<'_>) -> AlertSnapshot {
        AlertSnapshot::new(
            self.rules
                .iter()
                .map(|(name, predicate)| (name.clone(), predicate(view)))
                .collect(),
        )
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Build the predicate for one configured condition.
pub fn condition_predicate(condition: &AlertCondition) -> Predicate {
    match *condition {
        AlertCondition::XrsbAbove { threshold } => {
            Box::new(move |v: &XrsView<'_>| v.latest().is_some_and(|s| s.xrsb > threshold))
        }
        AlertCondition::XrsaAbove { threshold } => {
            Box::new(move |v: &XrsView<'_>| v.latest().is_some_and(|s| s.xrsa > threshold))
        }
        AlertCondition::XrsbRising => Box::new(|v: &XrsView<'_>| match (v.latest(), v.previous()) {
            (Some(now), Some(prev)) => now.xrsb - prev.xrsb > 0.0,
            _ => false,
        }),
        AlertCondition::XrsaRising => Box::new(|v: &XrsView<'_>| match (v.latest(), v.previous()) {
            (Some(now), Some(prev)) => now.xrsa - prev.xrsa > 0.0,
            _ => false,
        }),
        AlertCondition::TemperatureAbove { threshold_mk } => Box::new(move |v: &XrsView<'_>| {
            v.latest_derived().is_some_and(|d| d.temperature_mk > threshold_mk)
        }),
        AlertCondition::EmissionMeasureAbove { threshold } => Box::new(move |v: &XrsView<'_>| {
            v.latest_derived().is_some_and(|d| d.emission_measure > threshold)
        }),
        AlertCondition::XrsbDiffAbove { lag, threshold } => Box::new(move |v: &XrsView<'_>| {
            v.latest_derived()
                .and_then(|d| d.diff(lag))
                .is_some_and(|d| d.xrsb > threshold)
        }),
    }
}

/// Condition marking the end of the current flare.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlareEndCondition {
    pub xrsb_below: f64,
}

impl From<&FlareEndConfig> for FlareEndCondition {
    fn from(config: &FlareEndConfig) -> Self {
        Self {
            xrsb_below: config.xrsb_below,
        }
    }
}

impl FlareEndCondition {
    pub fn holds(&self, view: &XrsView<'_>) -> bool {
        view.latest().is_some_and(|s| s.xrsb < self.xrsb_below)
    }
}

// ============================================================================
// Tests
// ============================================================================

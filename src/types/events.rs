//! Notifications emitted by the core
//!
//! Each event carries enough payload for a listener to redraw without
//! reaching into pipeline internals.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    AlertSnapshot, CampaignState, EovsaSample, EveDerived, EveSample, FaiEvent, FlareEvent,
    XrsDerived, XrsSample,
};

/// Instrument feed identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Goes,
    Eve,
    Eovsa,
}

impl std::fmt::Display for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feed::Goes => write!(f, "GOES"),
            Feed::Eve => write!(f, "EVE"),
            Feed::Eovsa => write!(f, "EOVSA"),
        }
    }
}

/// Rows appended by one merge, with their derived values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NewRows {
    Goes(Vec<(XrsSample, XrsDerived)>),
    Eve(Vec<(EveSample, EveDerived)>),
    Eovsa(Vec<EovsaSample>),
}

impl NewRows {
    pub fn len(&self) -> usize {
        match self {
            NewRows::Goes(rows) => rows.len(),
            NewRows::Eve(rows) => rows.len(),
            NewRows::Eovsa(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    /// Campaign state changed; `episode` is the current episode row after the change.
    StateChanged {
        from: CampaignState,
        to: CampaignState,
        at: DateTime<Utc>,
        episode: Option<FlareEvent>,
    },
    NewSampleAppended { feed: Feed, rows: NewRows },
    /// Emitted only when the snapshot differs from the previous one for the feed.
    AlertsChanged { feed: Feed, snapshot: AlertSnapshot },
    FaiLogged(FaiEvent),
}

/// Fan-out channel for [`SessionEvent`]s.
///
/// Emitting never blocks and never fails; with no subscribers the event is
/// dropped. Slow subscribers observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

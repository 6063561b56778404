//! Per-feed processing loops
//!
//! ```text
//! timer ─▶ Adapter.fetch() ─▶ merge ─▶ derive ─▶ alerts ─▶ campaign ─▶ persist ─▶ events
//! ```
//!
//! Each instrument feed runs its own [`run_feed`] task with its own
//! interval. Feeds share no mutable state. Operator commands reach the
//! GOES task over an mpsc channel; everything leaves the core on the
//! [`EventBus`](crate::types::EventBus).

mod eovsa;
mod eve;
mod goes;

pub use eovsa::EovsaPipeline;
pub use eve::EvePipeline;
pub use goes::GoesPipeline;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::acquisition::FeedAdapter;
use crate::storage::RecorderError;
use crate::types::{AlertSnapshot, CampaignState, Feed, FlareEvent, Sample};

// ============================================================================
// Operator commands
// ============================================================================

/// Command from the operator console.
#[derive(Debug)]
pub enum OperatorCommand {
    Launch,
    Hold,
    Countdown,
    Status { reply: oneshot::Sender<StatusReport> },
}

impl OperatorCommand {
    /// Parse a console word; `status` is handled by the caller since it needs a reply channel.
    pub fn parse(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "launch" | "l" => Some(Self::Launch),
            "hold" | "h" => Some(Self::Hold),
            "countdown" | "c" => Some(Self::Countdown),
            _ => None,
        }
    }
}

pub type CommandSender = mpsc::Sender<OperatorCommand>;
pub type CommandReceiver = mpsc::Receiver<OperatorCommand>;

/// Campaign summary returned for a `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: CampaignState,
    pub flare_happening: bool,
    pub episode: Option<FlareEvent>,
    pub episodes: usize,
    pub samples: usize,
    pub last_data: Option<DateTime<Utc>>,
    pub clock: DateTime<Utc>,
    pub alerts: Option<AlertSnapshot>,
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "state={} flare_happening={} episodes={} samples={}",
            self.state, self.flare_happening, self.episodes, self.samples
        )?;
        if let Some(t) = self.last_data {
            write!(f, " last_data={t}")?;
        }
        if let Some(alerts) = &self.alerts {
            write!(f, " alerts=[{alerts}]")?;
        }
        if let Some(e) = &self.episode {
            write!(f, " episode={} trigger={}", e.index, e.trigger_time)?;
            if let Some(l) = e.launch_time {
                write!(f, " launch={l}")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Feed loop
// ============================================================================

/// One feed's fetch-to-persist step.
pub trait FeedTick: Send {
    type Sample: Sample;

    fn feed(&self) -> Feed;

    /// Process one fetch result and return the number of appended rows.
    fn tick(&mut self, fetched: Option<Vec<Self::Sample>>) -> Result<usize, RecorderError>;

    fn command(&mut self, command: OperatorCommand) -> Result<(), RecorderError> {
        warn!(feed = %self.feed(), ?command, "Feed does not accept operator commands");
        Ok(())
    }
}

/// Counters reported when a feed loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub ticks: u64,
    pub absent: u64,
    pub rows: u64,
}

async fn next_command(commands: &mut Option<CommandReceiver>) -> Option<OperatorCommand> {
    match commands {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Drive `pipeline` from `adapter` every `period` until cancelled.
///
/// Ticks never overlap; a slow fetch delays this feed's next tick only.
/// An in-flight fetch is allowed to finish after cancellation. Recorder
/// errors end the loop and are returned to the supervisor.
pub async fn run_feed<A, P>(
    mut adapter: A,
    mut pipeline: P,
    period: Duration,
    mut commands: Option<CommandReceiver>,
    cancel: CancellationToken,
) -> Result<FeedStats, RecorderError>
where
    A: FeedAdapter,
    P: FeedTick<Sample = A::Sample>,
{
    let feed = pipeline.feed();
    let mut stats = FeedStats::default();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(%feed, period_ms = period.as_millis() as u64, "Feed loop starting");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(%feed, ticks = stats.ticks, rows = stats.rows, absent = stats.absent, "Feed loop received shutdown signal");
                break;
            }
            Some(command) = next_command(&mut commands) => {
                pipeline.command(command)?;
            }
            _ = interval.tick() => {
                let fetched = adapter.fetch().await;
                stats.ticks += 1;
                if fetched.is_none() {
                    stats.absent += 1;
                }
                stats.rows += pipeline.tick(fetched)? as u64;
            }
        }
    }

    Ok(stats)
}

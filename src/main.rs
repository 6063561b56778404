//! flare-trigger - FOXSI/Hi-C real-time flare trigger
//!
//! Polls GOES XRS (trigger feed), EVE ESP and EOVSA, runs the flare
//! campaign state machine and records the session under
//! `<output_dir>/<UTC start>/`.
//!
//! # Usage
//!
//! ```bash
//! # Live session
//! cargo run --release
//!
//! # Replay a stored NOAA XRS JSON day, one minute per 200 ms
//! cargo run --release -- --historical goes_day.json --replay-interval-ms 200
//! ```
//!
//! Operator console on stdin: `launch`, `hold`, `countdown`, `status`.
//!
//! # Environment Variables
//!
//! - `FLARE_CONFIG`: Path to the session TOML (default: ./flare_config.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use flare_trigger::acquisition::{
    http_client, parse_esp_json, parse_xrs_json, EovsaAdapter, EveAdapter, FeedAdapter, GoesAdapter, ReplayAdapter,
    RetryPolicy,
};
use flare_trigger::config::defaults::{COMMAND_CHANNEL_CAPACITY, EVENT_CHANNEL_CAPACITY};
use flare_trigger::config::{ClockMode, SessionConfig};
use flare_trigger::physics::ensure_model;
use flare_trigger::pipeline::{run_feed, CommandReceiver, CommandSender, FeedTick, OperatorCommand};
use flare_trigger::storage::SessionRecorder;
use flare_trigger::{AlertRegistry, EovsaPipeline, EventBus, EvePipeline, Feed, GoesPipeline, SessionEvent};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "flare-trigger")]
#[command(about = "FOXSI/Hi-C real-time solar flare trigger")]
#[command(version)]
struct CliArgs {
    /// Session configuration file (TOML)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Replay a stored NOAA GOES XRS JSON file instead of polling SWPC.
    /// Switches the campaign clock to data time.
    #[arg(long, value_name = "JSON")]
    historical: Option<PathBuf>,

    /// Replay a stored EVE quicklook JSON file alongside --historical
    #[arg(long, value_name = "JSON")]
    eve_historical: Option<PathBuf>,

    /// Delay between replayed samples (default: the feed poll interval)
    #[arg(long, value_name = "MS")]
    replay_interval_ms: Option<u64>,

    /// Root folder for session summaries
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Do not poll EVE ESP
    #[arg(long)]
    no_eve: bool,

    /// Do not poll EOVSA
    #[arg(long)]
    no_eovsa: bool,
}

impl CliArgs {
    /// Fold command-line overrides into the loaded configuration.
    fn apply(&self, config: &mut SessionConfig) {
        if let Some(dir) = &self.output_dir {
            config.session.output_dir = dir.clone();
        }
        if self.no_eve {
            config.eve.enabled = false;
        }
        if self.no_eovsa {
            config.eovsa.enabled = false;
        }
        if self.historical.is_some() {
            config.session.clock = ClockMode::DataDriven;
            if config.eovsa.enabled {
                info!("EOVSA feed disabled for historical replay");
                config.eovsa.enabled = false;
            }
            if self.eve_historical.is_none() && config.eve.enabled {
                info!("EVE feed disabled for historical replay (no --eve-historical)");
                config.eve.enabled = false;
            }
        }
    }

    fn period(&self, poll_interval_ms: u64) -> Duration {
        Duration::from_millis(self.replay_interval_ms.unwrap_or(poll_interval_ms))
    }
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    GoesFeed,
    EveFeed,
    EovsaFeed,
    EventLogger,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::GoesFeed => write!(f, "GoesFeed"),
            TaskName::EveFeed => write!(f, "EveFeed"),
            TaskName::EovsaFeed => write!(f, "EovsaFeed"),
            TaskName::EventLogger => write!(f, "EventLogger"),
        }
    }
}

// ============================================================================
// Task Spawning
// ============================================================================

/// Spawn one feed loop into the JoinSet.
fn spawn_feed<A, P>(
    task_set: &mut JoinSet<Result<TaskName>>,
    name: TaskName,
    adapter: A,
    pipeline: P,
    period: Duration,
    commands: Option<CommandReceiver>,
    cancel_token: CancellationToken,
) where
    A: FeedAdapter + 'static,
    P: FeedTick<Sample = A::Sample> + 'static,
{
    task_set.spawn(async move {
        info!("[{}] Task starting", name);
        let stats = run_feed(adapter, pipeline, period, commands, cancel_token)
            .await
            .with_context(|| format!("{name} could not write the session record"))?;
        info!("[{}] Stopped after {} ticks ({} rows, {} absent fetches)", name, stats.ticks, stats.rows, stats.absent);
        Ok(name)
    });
}

/// Log every notification the core emits.
fn spawn_event_logger(task_set: &mut JoinSet<Result<TaskName>>, events: &EventBus, cancel_token: CancellationToken) {
    let mut rx = events.subscribe();
    task_set.spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel_token.cancelled() => break,
                event = rx.recv() => event,
            };
            match event {
                Ok(SessionEvent::StateChanged { from, to, at, episode }) => {
                    info!(%from, %to, %at, episode = ?episode.map(|e| e.index), "StateChanged");
                }
                Ok(SessionEvent::NewSampleAppended { feed, rows }) => {
                    debug!(%feed, rows = rows.len(), "NewSampleAppended");
                }
                Ok(SessionEvent::AlertsChanged { feed, snapshot }) => {
                    debug!(%feed, alerts = %snapshot, "AlertsChanged");
                }
                Ok(SessionEvent::FaiLogged(fai)) => {
                    debug!(time = %fai.time_tag, "FaiLogged");
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Event logger fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        Ok(TaskName::EventLogger)
    });
}

/// Read operator commands from stdin on a dedicated thread.
fn spawn_operator_console(commands: CommandSender) {
    std::thread::spawn(move || {
        info!("Operator console ready: launch | hold | countdown | status");
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let word = line.trim();
            if word.is_empty() {
                continue;
            }

            if word.eq_ignore_ascii_case("status") || word.eq_ignore_ascii_case("s") {
                let (reply, rx) = oneshot::channel();
                if commands.blocking_send(OperatorCommand::Status { reply }).is_err() {
                    break;
                }
                match rx.blocking_recv() {
                    Ok(report) => info!("STATUS {}", report),
                    Err(_) => warn!("No status reply"),
                }
                continue;
            }

            match OperatorCommand::parse(word) {
                Some(command) => {
                    if commands.blocking_send(command).is_err() {
                        break;
                    }
                }
                None => warn!("Unknown command '{}' (launch | hold | countdown | status)", word),
            }
        }
        debug!("Operator console closed");
    });
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(task_set: &mut JoinSet<Result<TaskName>>, cancel_token: CancellationToken) -> Result<()> {
    info!("Supervisor: All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: Shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: Task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: Task failed with error: {:#}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: Task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: All tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let feed loops finish their current tick
    while let Some(result) = task_set.join_next().await {
        if let Ok(Err(e)) = result {
            error!("Task failed during shutdown: {:#}", e);
        }
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut config = SessionConfig::load(args.config.as_deref()).context("Invalid session configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid session configuration")?;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  flare-trigger | session '{}'", config.session.name);
    info!("  clock: {:?} | EVE: {} | EOVSA: {}", config.session.clock, config.eve.enabled, config.eovsa.enabled);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let recorder = SessionRecorder::create(&config.session.output_dir, Utc::now())
        .context("Failed to create session directory")?;

    let client = http_client(&config.retry).context("Failed to build HTTP client")?;
    let retry = RetryPolicy::from(&config.retry);
    let model = ensure_model(&config.response, &client).await;

    let events = EventBus::new(EVENT_CHANNEL_CAPACITY);
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_event_logger(&mut task_set, &events, cancel_token.clone());

    // GOES: the trigger feed, also the only consumer of operator commands
    let goes = GoesPipeline::new(
        &config,
        model,
        AlertRegistry::from_rules(&config.alerts),
        Some(recorder.clone()),
        events.clone(),
    );
    let goes_period = args.period(config.goes.poll_interval_ms);
    match &args.historical {
        Some(path) => {
            let rows = parse_xrs_json(&read_file(path)?).with_context(|| format!("Bad GOES file {}", path.display()))?;
            info!("Replaying {} GOES samples from {}", rows.len(), path.display());
            let replay = ReplayAdapter::new(Feed::Goes, rows, config.goes.window).with_initial(config.goes.window);
            spawn_feed(&mut task_set, TaskName::GoesFeed, replay, goes, goes_period, Some(command_rx), cancel_token.clone());
        }
        None => {
            let adapter = GoesAdapter::new(client.clone(), &config.goes, retry);
            spawn_feed(&mut task_set, TaskName::GoesFeed, adapter, goes, goes_period, Some(command_rx), cancel_token.clone());
        }
    }

    if config.eve.enabled {
        let eve = EvePipeline::new(Some(recorder.clone()), events.clone());
        let period = args.period(config.eve.poll_interval_ms);
        match &args.eve_historical {
            Some(path) => {
                let rows = parse_esp_json(&read_file(path)?).with_context(|| format!("Bad EVE file {}", path.display()))?;
                let replay = ReplayAdapter::new(Feed::Eve, rows, config.eve.window).with_initial(config.eve.window);
                spawn_feed(&mut task_set, TaskName::EveFeed, replay, eve, period, None, cancel_token.clone());
            }
            None => {
                let adapter = EveAdapter::new(client.clone(), &config.eve, retry);
                spawn_feed(&mut task_set, TaskName::EveFeed, adapter, eve, period, None, cancel_token.clone());
            }
        }
    }

    if config.eovsa.enabled {
        let eovsa = EovsaPipeline::new(config.eovsa.alert_window, Some(recorder.clone()), events.clone());
        let adapter = EovsaAdapter::new(client.clone(), &config.eovsa, retry);
        let period = Duration::from_millis(config.eovsa.poll_interval_ms);
        spawn_feed(&mut task_set, TaskName::EovsaFeed, adapter, eovsa, period, None, cancel_token.clone());
    }

    spawn_operator_console(command_tx);

    info!("Session summaries: {}", recorder.dir().display());
    run_supervisor(&mut task_set, cancel_token).await
}

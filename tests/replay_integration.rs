//! Replay Integration Tests
//!
//! Run the feed loops against historical documents through the replay
//! adapter, operate the campaign over the command channel and check what
//! lands in the session directory.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use flare_trigger::acquisition::{parse_esp_json, parse_xrs_json, ReplayAdapter};
use flare_trigger::config::{ClockMode, SessionConfig};
use flare_trigger::storage::{EVE_FILE, GOES_FILE, TIMETAG_SUMMARY_FILE};
use flare_trigger::types::NewRows;
use flare_trigger::{
    run_feed, AlertRegistry, CampaignState, EventBus, EvePipeline, Feed, GoesPipeline, OperatorCommand,
    SessionEvent, SessionRecorder,
};

const TICK: StdDuration = StdDuration::from_millis(2);
const DEADLINE: StdDuration = StdDuration::from_secs(10);

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 17, 0, 0).unwrap()
}

/// SWPC-style XRS document: quiet for 12 minutes, then a flare rising through 4e-6.
fn xrs_document(minutes: i64) -> String {
    let mut records = Vec::new();
    for m in 0..minutes {
        let time_tag = (t0() + Duration::minutes(m)).format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let xrsb = if m < 12 { 1e-7 } else { 4e-6 + (m - 12) as f64 * 5e-7 };
        records.push(serde_json::json!({
            "time_tag": time_tag, "satellite": 16, "flux": xrsb * 0.05, "energy": "0.05-0.4nm"
        }));
        records.push(serde_json::json!({
            "time_tag": time_tag, "satellite": 16, "flux": xrsb, "energy": "0.1-0.8nm"
        }));
    }
    serde_json::Value::Array(records).to_string()
}

async fn wait_for<F>(rx: &mut broadcast::Receiver<SessionEvent>, mut matches: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(DEADLINE, async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .unwrap()
}

fn entered(state: CampaignState) -> impl FnMut(&SessionEvent) -> bool {
    move |event| matches!(event, SessionEvent::StateChanged { to, .. } if *to == state)
}

// ============================================================================
// GOES
// ============================================================================

#[tokio::test]
async fn goes_replay_triggers_and_launches() {
    let samples = parse_xrs_json(&xrs_document(20)).unwrap();
    assert_eq!(samples.len(), 20);

    let root = tempfile::tempdir().unwrap();
    let recorder = SessionRecorder::create(root.path(), t0()).unwrap();

    let mut config = SessionConfig::default();
    config.session.clock = ClockMode::DataDriven;
    let events = EventBus::new(1024);
    let mut rx = events.subscribe();
    let registry = AlertRegistry::from_rules(&config.alerts);
    let pipeline = GoesPipeline::new(&config, None, registry, Some(recorder.clone()), events);
    let adapter = ReplayAdapter::new(Feed::Goes, samples.clone(), config.goes.window);

    let (tx, commands) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_feed(adapter, pipeline, TICK, Some(commands), cancel.clone()));

    let triggered = wait_for(&mut rx, entered(CampaignState::Triggered)).await;
    let SessionEvent::StateChanged { episode: Some(episode), .. } = triggered else {
        panic!("trigger without episode");
    };
    assert_eq!(episode.trigger_time, samples[12].time_tag);

    tx.send(OperatorCommand::Launch).await.unwrap();
    wait_for(&mut rx, entered(CampaignState::Launched)).await;

    cancel.cancel();
    let stats = task.await.unwrap().unwrap();
    assert_eq!(stats.absent, 0);
    assert!(stats.rows >= 13 && stats.rows <= 20, "{stats:?}");

    let mut log = csv::Reader::from_path(recorder.dir().join(TIMETAG_SUMMARY_FILE)).unwrap();
    let rows: Vec<csv::StringRecord> = log.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][1], "2024-04-01T17:12:00Z");
    assert!(!rows[0][4].is_empty(), "launch_time written");

    let mut goes = csv::Reader::from_path(recorder.dir().join(GOES_FILE)).unwrap();
    assert_eq!(goes.records().count() as u64, stats.rows);
}

#[tokio::test]
async fn status_request_answers_over_the_channel() {
    let samples = parse_xrs_json(&xrs_document(5)).unwrap();
    let mut config = SessionConfig::default();
    config.session.clock = ClockMode::DataDriven;
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let registry = AlertRegistry::from_rules(&config.alerts);
    let pipeline = GoesPipeline::new(&config, None, registry, None, events);
    let adapter = ReplayAdapter::new(Feed::Goes, samples, 30).with_initial(5);

    let (tx, commands) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_feed(adapter, pipeline, TICK, Some(commands), cancel.clone()));

    wait_for(&mut rx, |e| matches!(e, SessionEvent::NewSampleAppended { feed: Feed::Goes, .. })).await;
    let (reply, answer) = tokio::sync::oneshot::channel();
    tx.send(OperatorCommand::Status { reply }).await.unwrap();
    let report = tokio::time::timeout(DEADLINE, answer).await.unwrap().unwrap();

    assert_eq!(report.state, CampaignState::Searching);
    assert_eq!(report.samples, 5);
    assert_eq!(report.last_data, Some(t0() + Duration::minutes(4)));

    cancel.cancel();
    task.await.unwrap().unwrap();
}

// ============================================================================
// EVE
// ============================================================================

#[tokio::test]
async fn eve_replay_writes_differenced_table() {
    let body = r#"[
        {"UTC_TIME": "2024-04-01 17:00:00", "ESP_0_7_COUNTS": 1000.0, "ESP_30_COUNTS": 50.0},
        {"UTC_TIME": "2024-04-01 17:00:10", "ESP_0_7_COUNTS": 1012.0, "ESP_30_COUNTS": 51.0},
        {"UTC_TIME": "2024-04-01 17:00:20", "ESP_0_7_COUNTS": 1030.0, "ESP_30_COUNTS": null}
    ]"#;
    let samples = parse_esp_json(body).unwrap();
    assert!(samples[2].esp_30.is_nan());

    let root = tempfile::tempdir().unwrap();
    let recorder = SessionRecorder::create(root.path(), t0()).unwrap();
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let pipeline = EvePipeline::new(Some(recorder.clone()), events);
    let adapter = ReplayAdapter::new(Feed::Eve, samples, 180).with_initial(3);

    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_feed(adapter, pipeline, TICK, None, cancel.clone()));

    let event = wait_for(&mut rx, |e| matches!(e, SessionEvent::NewSampleAppended { feed: Feed::Eve, .. })).await;
    let SessionEvent::NewSampleAppended { rows: NewRows::Eve(rows), .. } = event else {
        panic!("expected EVE rows");
    };
    assert_eq!(rows.len(), 3);
    assert!(rows[0].1.esp_0_7_diff.is_nan());
    assert_eq!(rows[2].1.esp_0_7_diff, 18.0);

    cancel.cancel();
    let stats = task.await.unwrap().unwrap();
    assert_eq!(stats.rows, 3);

    let mut table = csv::Reader::from_path(recorder.dir().join(EVE_FILE)).unwrap();
    assert_eq!(table.records().count(), 3);
}

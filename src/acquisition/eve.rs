//! EVE ESP feed (LASP quicklook JSON, 10-second diode counts)

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{get_text, keep_tail, FeedAdapter, FetchError, RetryPolicy};
use crate::config::EveFeedConfig;
use crate::types::{EveSample, Feed};

/// Layouts seen in the quicklook `UTC_TIME` column.
const UTC_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y%m%d %H%M%S",
    "%Y%m%d%H%M%S",
];

#[derive(Debug, Deserialize)]
struct EspRecord {
    #[serde(rename = "UTC_TIME")]
    utc_time: serde_json::Value,
    #[serde(rename = "ESP_0_7_COUNTS")]
    esp_0_7: Option<f64>,
    #[serde(rename = "ESP_30_COUNTS")]
    esp_30: Option<f64>,
}

fn parse_utc_time(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if let Ok(t) = DateTime::parse_from_rfc3339(&text) {
        return Some(t.with_timezone(&Utc));
    }
    UTC_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(&text, f).ok())
        .map(|t| t.and_utc())
}

/// Parse the quicklook JSON. Null counts become NaN; rows with an
/// unreadable time are dropped.
pub fn parse_esp_json(body: &str) -> Result<Vec<EveSample>, FetchError> {
    let records: Vec<EspRecord> = serde_json::from_str(body)?;
    let total = records.len();

    let samples: Vec<EveSample> = records
        .into_iter()
        .filter_map(|r| {
            Some(EveSample {
                time_tag: parse_utc_time(&r.utc_time)?,
                esp_0_7: r.esp_0_7.unwrap_or(f64::NAN),
                esp_30: r.esp_30.unwrap_or(f64::NAN),
            })
        })
        .collect();

    if samples.len() < total {
        debug!(dropped = total - samples.len(), "EVE rows with unreadable UTC_TIME");
    }
    Ok(samples)
}

pub struct EveAdapter {
    client: reqwest::Client,
    url: String,
    window: usize,
    retry: RetryPolicy,
}

impl EveAdapter {
    pub fn new(client: reqwest::Client, config: &EveFeedConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            url: config.url.clone(),
            window: config.window,
            retry,
        }
    }

    async fn fetch_once(&self) -> Result<Vec<EveSample>, FetchError> {
        let body = get_text(&self.client, &self.url).await?;
        Ok(keep_tail(parse_esp_json(&body)?, self.window))
    }
}

#[async_trait]
impl FeedAdapter for EveAdapter {
    type Sample = EveSample;

    fn feed(&self) -> Feed {
        Feed::Eve
    }

    async fn fetch(&mut self) -> Option<Vec<EveSample>> {
        let retry = self.retry;
        let this = &*self;
        retry.run(Feed::Eve, || this.fetch_once()).await
    }
}

//! GOES XRS feed (NOAA SWPC JSON)
//!
//! The SWPC product lists one record per (time tag, energy band). Records
//! are pivoted into one [`XrsSample`] per time tag; a time tag missing
//! either band is dropped.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{get_text, keep_tail, FeedAdapter, FetchError, RetryPolicy};
use crate::config::defaults::{XRSA_ENERGY_BAND, XRSB_ENERGY_BAND};
use crate::config::GoesFeedConfig;
use crate::types::{Feed, XrsSample};

#[derive(Debug, Deserialize)]
struct XrsRecord {
    time_tag: DateTime<Utc>,
    satellite: u32,
    flux: Option<f64>,
    energy: String,
}

#[derive(Default)]
struct Bands {
    satellite: u32,
    xrsa: Option<f64>,
    xrsb: Option<f64>,
}

/// Parse an SWPC XRS JSON document into time-ordered samples.
///
/// Null fluxes become NaN. Records for other energy bands are ignored.
pub fn parse_xrs_json(body: &str) -> Result<Vec<XrsSample>, FetchError> {
    let records: Vec<XrsRecord> = serde_json::from_str(body)?;

    let mut by_time: BTreeMap<DateTime<Utc>, Bands> = BTreeMap::new();
    for r in records {
        let flux = r.flux.unwrap_or(f64::NAN);
        let entry = by_time.entry(r.time_tag).or_default();
        if r.energy == XRSA_ENERGY_BAND {
            entry.xrsa = Some(flux);
        } else if r.energy == XRSB_ENERGY_BAND {
            entry.xrsb = Some(flux);
            entry.satellite = r.satellite;
        } else {
            continue;
        }
        if entry.satellite == 0 {
            entry.satellite = r.satellite;
        }
    }

    let total = by_time.len();
    let samples: Vec<XrsSample> = by_time
        .into_iter()
        .filter_map(|(time_tag, b)| {
            Some(XrsSample {
                time_tag,
                satellite: b.satellite,
                xrsa: b.xrsa?,
                xrsb: b.xrsb?,
            })
        })
        .collect();

    if samples.len() < total {
        debug!(dropped = total - samples.len(), "XRS time tags missing a band");
    }
    Ok(samples)
}

/// Live adapter polling the SWPC JSON product.
pub struct GoesAdapter {
    client: reqwest::Client,
    url: String,
    window: usize,
    retry: RetryPolicy,
}

impl GoesAdapter {
    pub fn new(client: reqwest::Client, config: &GoesFeedConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            url: config.url.clone(),
            window: config.window,
            retry,
        }
    }

    async fn fetch_once(&self) -> Result<Vec<XrsSample>, FetchError> {
        let body = get_text(&self.client, &self.url).await?;
        let samples = parse_xrs_json(&body)?;
        Ok(keep_tail(samples, self.window))
    }
}

#[async_trait]
impl FeedAdapter for GoesAdapter {
    type Sample = XrsSample;

    fn feed(&self) -> Feed {
        Feed::Goes
    }

    async fn fetch(&mut self) -> Option<Vec<XrsSample>> {
        let retry = self.retry;
        let this = &*self;
        retry.run(Feed::Goes, || this.fetch_once()).await
    }
}

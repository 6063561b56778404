//! EOVSA flare-test feed
//!
//! The observatory publishes one text table per day under
//! `<base>/<YYYY>/<MM>/`. The adapter reads the month listing, takes the
//! last `.txt` link and parses the table. Columns sit at fixed positions
//! of the single-space separated line:
//!
//! | token | column |
//! |---|---|
//! | 1 | date `YYYYmmdd` |
//! | 2 | time `HHMMSS` |
//! | 3 | flare flag |
//! | 6, 13, 20 | 1-7, 7-13, 13-18 GHz |
//! | 27, 34, 41, 48 | mean, sigma, threshold, count |

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use tracing::debug;

use super::{get_text, FeedAdapter, FetchError, RetryPolicy};
use crate::config::EovsaFeedConfig;
use crate::types::{EovsaSample, Feed};

const DATE_TOKEN: usize = 1;
const TIME_TOKEN: usize = 2;
const FLAG_TOKEN: usize = 3;
const VALUE_TOKENS: [usize; 7] = [6, 13, 20, 27, 34, 41, 48];

const TXT_HREF: &str = r#"(?i)href\s*=\s*["']?([^"'\s>]+\.txt)"#;

/// Listing URL for the month containing `now`.
pub fn month_url(base: &str, now: DateTime<Utc>) -> String {
    format!("{}/{:04}/{:02}/", base.trim_end_matches('/'), now.year(), now.month())
}

/// Last `.txt` link of a directory listing.
pub fn latest_txt_link(html: &str) -> Option<String> {
    let re = Regex::new(TXT_HREF).ok()?;
    re.captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .last()
}

fn parse_flag(token: &str) -> Option<bool> {
    match token {
        "True" | "true" | "T" => Some(true),
        "False" | "false" | "F" => Some(false),
        other => other.parse::<f64>().ok().map(|v| v != 0.0),
    }
}

fn parse_row(line: &str) -> Option<EovsaSample> {
    let tokens: Vec<&str> = line.split(' ').collect();
    let token = |i: usize| tokens.get(i).copied();

    let date = NaiveDate::parse_from_str(token(DATE_TOKEN)?, "%Y%m%d").ok()?;
    let time = NaiveTime::parse_from_str(&format!("{:0>6}", token(TIME_TOKEN)?), "%H%M%S").ok()?;
    let flare_flag = parse_flag(token(FLAG_TOKEN)?)?;

    let mut values = [0.0f64; VALUE_TOKENS.len()];
    for (slot, &i) in values.iter_mut().zip(VALUE_TOKENS.iter()) {
        *slot = token(i)?.parse().ok()?;
    }
    let [band_1_7_ghz, band_7_13_ghz, band_13_18_ghz, mean, sigma, threshold, count] = values;

    Some(EovsaSample {
        time_tag: date.and_time(time).and_utc(),
        flare_flag,
        band_1_7_ghz,
        band_7_13_ghz,
        band_13_18_ghz,
        mean,
        sigma,
        threshold,
        count,
    })
}

/// Parse a flare-test table, skipping `header_lines` leading lines.
///
/// Blank lines are ignored. Any other line that does not parse is an error,
/// since it means the published layout changed.
pub fn parse_eovsa_table(text: &str, header_lines: usize) -> Result<Vec<EovsaSample>, FetchError> {
    text.lines()
        .enumerate()
        .skip(header_lines)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            parse_row(line.trim_end()).ok_or_else(|| FetchError::Parse(format!("EOVSA line {}: {:?}", n + 1, line)))
        })
        .collect()
}

pub struct EovsaAdapter {
    client: reqwest::Client,
    base_url: String,
    header_lines: usize,
    retry: RetryPolicy,
}

impl EovsaAdapter {
    pub fn new(client: reqwest::Client, config: &EovsaFeedConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            header_lines: config.header_lines,
            retry,
        }
    }

    async fn fetch_once(&self) -> Result<Vec<EovsaSample>, FetchError> {
        let listing_url = month_url(&self.base_url, Utc::now());
        let listing = get_text(&self.client, &listing_url).await?;
        let link = latest_txt_link(&listing).ok_or_else(|| FetchError::NotFound(listing_url.clone()))?;

        let file_url = if link.starts_with("http://") || link.starts_with("https://") {
            link
        } else {
            format!("{}{}", listing_url, link.trim_start_matches("./"))
        };
        debug!(url = %file_url, "Fetching EOVSA table");

        let table = get_text(&self.client, &file_url).await?;
        parse_eovsa_table(&table, self.header_lines)
    }
}

#[async_trait]
impl FeedAdapter for EovsaAdapter {
    type Sample = EovsaSample;

    fn feed(&self) -> Feed {
        Feed::Eovsa
    }

    async fn fetch(&mut self) -> Option<Vec<EovsaSample>> {
        let retry = self.retry;
        let this = &*self;
        retry.run(Feed::Eovsa, || this.fetch_once()).await
    }
}

//! Instrument data acquisition
//!
//! One [`FeedAdapter`] per instrument. An adapter returns the instrument's
//! whole currently published window on every call; the merger keeps only
//! the rows it has not seen. A failed fetch is `None`, never an error: the
//! adapter retries with bounded backoff and then reports absent data.

mod eovsa;
mod eve;
mod goes;
mod replay;
mod retry;

pub use eovsa::{latest_txt_link, month_url, parse_eovsa_table, EovsaAdapter};
pub use eve::{parse_esp_json, EveAdapter};
pub use goes::{parse_xrs_json, GoesAdapter};
pub use replay::ReplayAdapter;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::RetryConfig;
use crate::types::{Feed, Sample};

/// Errors from a single fetch attempt. Never leaves the adapter.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No data file listed at {0}")]
    NotFound(String),
}

/// Pull-based source for one instrument feed.
#[async_trait]
pub trait FeedAdapter: Send {
    type Sample: Sample;

    fn feed(&self) -> Feed;

    /// All currently available samples, or `None` when the fetch failed.
    async fn fetch(&mut self) -> Option<Vec<Self::Sample>>;
}

/// HTTP client shared by the live adapters.
pub fn http_client(retry: &RetryConfig) -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(retry.timeout_secs))
        .user_agent(concat!("flare-trigger/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// GET `url` and return the body, treating non-2xx as an error.
async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }
    Ok(resp.text().await?)
}

/// Keep the most recent `window` rows (0 keeps everything).
fn keep_tail<T>(mut rows: Vec<T>, window: usize) -> Vec<T> {
    if window > 0 && rows.len() > window {
        rows.drain(..rows.len() - window);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_tail() {
        assert_eq!(keep_tail(vec![1, 2, 3, 4], 2), vec![3, 4]);
        assert_eq!(keep_tail(vec![1, 2], 5), vec![1, 2]);
        assert_eq!(keep_tail(vec![1, 2], 0), vec![1, 2]);
    }
}

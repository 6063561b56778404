//! GOES temperature-response table and its local cache
//!
//! The CHIANTI response file holds one row per GOES satellite number with
//! tabulated temperature (MK), short/long channel flux per unit emission
//! measure, and the log10 emission measure the fluxes were computed for.
//!
//! The file is cached on disk. A missing file is downloaded once before
//! first use; a file that fails to parse is downloaded again exactly once.
//! If that still fails the caller gets `None` and derived values stay NaN.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use super::fits::{BinTable, FitsError};
use super::thermal::ThermalModel;
use crate::config::ResponseConfig;

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("response file is not a valid table: {0}")]
    Fits(#[from] FitsError),
    #[error("response table has no column {0}")]
    MissingColumn(&'static str),
    #[error("response table row {row}: {reason}")]
    BadRow { row: usize, reason: String },
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),
    #[error("no usable satellite in response table")]
    Empty,
}

/// Response curves of one satellite.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteResponse {
    pub temperature_mk: Vec<f64>,
    pub flux_short: Vec<f64>,
    pub flux_long: Vec<f64>,
    /// Either one value for the whole curve or one per temperature.
    pub log10_em: Vec<f64>,
}

impl SatelliteResponse {
    /// `10^(49 - log10_em)` at temperature index `i`.
    pub fn em_converter(&self, i: usize) -> f64 {
        let log10_em = if self.log10_em.len() == 1 {
            self.log10_em[0]
        } else {
            self.log10_em.get(i).copied().unwrap_or(f64::NAN)
        };
        10f64.powf(49.0 - log10_em)
    }
}

/// Response curves keyed by satellite number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseTable {
    satellites: BTreeMap<u32, SatelliteResponse>,
}

impl ResponseTable {
    pub fn new(satellites: impl IntoIterator<Item = (u32, SatelliteResponse)>) -> Self {
        Self {
            satellites: satellites.into_iter().collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ResponseError> {
        let bytes = std::fs::read(path)?;
        Self::from_bintable(&BinTable::parse(&bytes)?)
    }

    /// Row index is the satellite number.
    pub fn from_bintable(table: &BinTable) -> Result<Self, ResponseError> {
        let temp = table.column("TEMP_MK").ok_or(ResponseError::MissingColumn("TEMP_MK"))?;
        let short = table.column("FSHORT_COR").ok_or(ResponseError::MissingColumn("FSHORT_COR"))?;
        let long = table.column("FLONG_COR").ok_or(ResponseError::MissingColumn("FLONG_COR"))?;
        let em = table.column("ALOG10EM").ok_or(ResponseError::MissingColumn("ALOG10EM"))?;

        let mut satellites = BTreeMap::new();
        for row in 0..table.rows() {
            let cells = (temp.cell(row), short.cell(row), long.cell(row), em.cell(row));
            let (Some(t), Some(s), Some(l), Some(e)) = cells else {
                return Err(ResponseError::BadRow {
                    row,
                    reason: "missing cell".to_string(),
                });
            };
            if t.len() != s.len() || t.len() != l.len() {
                return Err(ResponseError::BadRow {
                    row,
                    reason: format!("curve lengths differ ({}, {}, {})", t.len(), s.len(), l.len()),
                });
            }
            let Ok(satellite) = u32::try_from(row) else {
                break;
            };
            satellites.insert(
                satellite,
                SatelliteResponse {
                    temperature_mk: t.to_vec(),
                    flux_short: s.to_vec(),
                    flux_long: l.to_vec(),
                    log10_em: e.to_vec(),
                },
            );
        }
        if satellites.is_empty() {
            return Err(ResponseError::Empty);
        }
        Ok(Self { satellites })
    }

    pub fn satellite(&self, number: u32) -> Option<&SatelliteResponse> {
        self.satellites.get(&number)
    }

    pub fn satellites(&self) -> impl Iterator<Item = (u32, &SatelliteResponse)> {
        self.satellites.iter().map(|(n, r)| (*n, r))
    }
}

// ============================================================================
// Cached Asset
// ============================================================================

/// Fetch the response file to `path`, replacing any existing copy.
pub async fn download(client: &reqwest::Client, url: &str, path: &Path) -> Result<(), ResponseError> {
    info!(url = %url, path = %path.display(), "Downloading GOES response table");
    let bytes = client
        .get(url)
        .timeout(Duration::from_secs(60))
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    let tmp = path.with_extension("fits.part");
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    info!(bytes = bytes.len(), "Response table saved");
    Ok(())
}

fn load_model(path: &Path) -> Result<ThermalModel, ResponseError> {
    ThermalModel::from_table(&ResponseTable::load(path)?)
}

/// Load the thermal model, downloading the response file when needed.
///
/// Returns `None` when no usable model could be built; callers treat that
/// as "derived values are NaN" rather than an error.
pub async fn ensure_model(config: &ResponseConfig, client: &reqwest::Client) -> Option<ThermalModel> {
    let path = config.path.as_path();

    if !path.exists() {
        if !config.download {
            warn!(path = %path.display(), "Response table missing and download disabled");
            return None;
        }
        if let Err(e) = download(client, &config.url, path).await {
            error!(error = %e, "Response table download failed; temperature and emission measure disabled");
            return None;
        }
    }

    match load_model(path) {
        Ok(model) => return Some(model),
        Err(e) if config.download => {
            warn!(path = %path.display(), error = %e, "Response table unreadable, downloading again");
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Response table unreadable");
            return None;
        }
    }

    let retried = match download(client, &config.url, path).await {
        Ok(()) => load_model(path),
        Err(e) => Err(e),
    };
    match retried {
        Ok(model) => Some(model),
        Err(e) => {
            error!(error = %e, "Response table still unusable; temperature and emission measure disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::fits::encode_f64_table;
    use std::path::PathBuf;

    fn synthetic_table_bytes() -> Vec<u8> {
        // rows 0..=16; only row 16 carries meaningful curves
        let rows = 17;
        let n = 5;
        let mut temp = Vec::new();
        let mut short = Vec::new();
        let mut long = Vec::new();
        let mut em = Vec::new();
        for _ in 0..rows {
            for i in 1..=n {
                let t = f64::from(i) * 5.0;
                temp.push(t);
                short.push(1e-8 * t * t);
                long.push(1e-6 * t);
            }
            em.push(49.0);
        }
        encode_f64_table(
            &[
                ("TEMP_MK", n as usize, temp),
                ("FSHORT_COR", n as usize, short),
                ("FLONG_COR", n as usize, long),
                ("ALOG10EM", 1, em),
            ],
            rows,
        )
    }

    #[test]
    fn test_table_from_fits_bytes() {
        let table = ResponseTable::from_bintable(&BinTable::parse(&synthetic_table_bytes()).unwrap()).unwrap();
        let goes16 = table.satellite(16).unwrap();
        assert_eq!(goes16.temperature_mk.len(), 5);
        assert!((goes16.em_converter(0) - 1.0).abs() < 1e-12);
        assert!(table.satellite(17).is_none());
    }

    #[test]
    fn test_missing_column_is_reported() {
        let bytes = encode_f64_table(&[("TEMP_MK", 1, vec![1.0])], 1);
        let err = ResponseTable::from_bintable(&BinTable::parse(&bytes).unwrap()).unwrap_err();
        assert!(matches!(err, ResponseError::MissingColumn("FSHORT_COR")));
    }

    #[tokio::test]
    async fn test_cached_file_is_used_without_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response.fits");
        std::fs::write(&path, synthetic_table_bytes()).unwrap();

        let config = ResponseConfig {
            path,
            url: "http://127.0.0.1:9/unreachable".to_string(),
            download: true,
        };
        let model = ensure_model(&config, &reqwest::Client::new()).await;
        assert!(model.is_some());
    }

    #[tokio::test]
    async fn test_missing_file_without_download_yields_none() {
        let config = ResponseConfig {
            path: PathBuf::from("/nonexistent/response.fits"),
            url: String::new(),
            download: false,
        };
        assert!(ensure_model(&config, &reqwest::Client::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_with_failed_redownload_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response.fits");
        std::fs::write(&path, b"corrupt").unwrap();

        let config = ResponseConfig {
            path,
            url: "http://127.0.0.1:9/unreachable".to_string(),
            download: true,
        };
        assert!(ensure_model(&config, &reqwest::Client::new()).await.is_none());
    }
}

//! Session recorder
//!
//! Persists merged instrument tables and the episode/FAI logs as CSV under
//! `<output_dir>/<UTC session start>/`. Every write replaces the whole file:
//! the table is written to a `.part` sibling and renamed over the previous
//! version, so readers never see a half-written table.
//!
//! In-memory tables stay authoritative; an I/O error here is returned to
//! the caller, which treats it as fatal for the session.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};

use crate::config::defaults::SESSION_DIR_FORMAT;
use crate::types::{EovsaSample, EveDerived, EveSample, FaiEvent, FlareEvent, XrsDerived, XrsSample};

pub const GOES_FILE: &str = "GOES_XRS.csv";
pub const TIMETAG_SUMMARY_FILE: &str = "timetag_summary.csv";
pub const FAI_SUMMARY_FILE: &str = "fai_summary.csv";
pub const EVE_FILE: &str = "EVE.csv";
pub const EOVSA_FILE: &str = "EOVSA.csv";

const FLARE_EVENT_HEADER: [&str; 12] = [
    "index",
    "trigger_time",
    "realtime_trigger_time",
    "countdown_initiated_time",
    "launch_time",
    "hic_launch_time",
    "hold_time",
    "flare_end_time",
    "foxsi_obs_start",
    "foxsi_obs_end",
    "hic_obs_start",
    "hic_obs_end",
];

const FAI_EVENT_HEADER: [&str; 4] = ["time_tag", "flare_index", "emission_measure", "temperature_mk"];

const EVE_HEADER: [&str; 4] = ["time_tag", "esp_0_7", "esp_30", "esp_0_7_diff"];

const EOVSA_HEADER: [&str; 9] = [
    "time_tag",
    "flare_flag",
    "band_1_7_ghz",
    "band_7_13_ghz",
    "band_13_18_ghz",
    "mean",
    "sigma",
    "threshold",
    "count",
];

/// Same format serde uses for the logged timestamps.
fn stamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("session file I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("CSV write error ({}): {1}", .0.display())]
    Csv(PathBuf, #[source] csv::Error),
}

/// Writes the audit trail of one session. Cheap to clone; each feed task
/// owns a copy and only ever writes its own files.
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    dir: PathBuf,
}

impl SessionRecorder {
    /// Create `<output_dir>/<started formatted as YYYYmmddTHHMMSSZ>`.
    pub fn create(output_dir: &Path, started: DateTime<Utc>) -> Result<Self, RecorderError> {
        let dir = output_dir.join(started.format(SESSION_DIR_FORMAT).to_string());
        std::fs::create_dir_all(&dir).map_err(|e| RecorderError::Io(dir.clone(), e))?;
        info!(dir = %dir.display(), "Session recorder ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `name` via a temporary sibling, then rename into place.
    fn replace<F>(&self, name: &str, fill: F) -> Result<(), RecorderError>
    where
        F: FnOnce(&mut csv::Writer<File>) -> Result<(), csv::Error>,
    {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.part"));

        let file = File::create(&tmp).map_err(|e| RecorderError::Io(tmp.clone(), e))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        fill(&mut writer).map_err(|e| RecorderError::Csv(path.clone(), e))?;
        writer.flush().map_err(|e| RecorderError::Io(tmp.clone(), e))?;
        drop(writer);

        std::fs::rename(&tmp, &path).map_err(|e| RecorderError::Io(path.clone(), e))?;
        debug!(file = name, "Session file replaced");
        Ok(())
    }

    /// Merged GOES table with derived columns; one set of diff columns per lag.
    pub fn write_goes(&self, samples: &[XrsSample], derived: &[XrsDerived], lags: &[usize]) -> Result<(), RecorderError> {
        self.replace(GOES_FILE, |w| {
            let mut header: Vec<String> = ["time_tag", "satellite", "xrsa", "xrsb", "temperature_mk", "emission_measure"]
                .iter()
                .map(ToString::to_string)
                .collect();
            for lag in lags {
                header.push(format!("xrsa_diff_{lag}"));
                header.push(format!("xrsb_diff_{lag}"));
                header.push(format!("temperature_mk_diff_{lag}"));
                header.push(format!("emission_measure_diff_{lag}"));
            }
            w.write_record(&header)?;

            for (s, d) in samples.iter().zip(derived) {
                let mut record = vec![
                    stamp(s.time_tag),
                    s.satellite.to_string(),
                    s.xrsa.to_string(),
                    s.xrsb.to_string(),
                    d.temperature_mk.to_string(),
                    d.emission_measure.to_string(),
                ];
                for lag in lags {
                    match d.diff(*lag) {
                        Some(l) => record.extend([
                            l.xrsa.to_string(),
                            l.xrsb.to_string(),
                            l.temperature_mk.to_string(),
                            l.emission_measure.to_string(),
                        ]),
                        None => record.extend(std::iter::repeat(String::new()).take(4)),
                    }
                }
                w.write_record(&record)?;
            }
            Ok(())
        })
    }

    pub fn write_timetag_summary(&self, episodes: &[FlareEvent]) -> Result<(), RecorderError> {
        self.replace(TIMETAG_SUMMARY_FILE, |w| {
            w.write_record(FLARE_EVENT_HEADER)?;
            for e in episodes {
                w.serialize(e)?;
            }
            Ok(())
        })
    }

    pub fn write_fai_summary(&self, events: &[FaiEvent]) -> Result<(), RecorderError> {
        self.replace(FAI_SUMMARY_FILE, |w| {
            w.write_record(FAI_EVENT_HEADER)?;
            for e in events {
                w.serialize(e)?;
            }
            Ok(())
        })
    }

    pub fn write_eve(&self, samples: &[EveSample], derived: &[EveDerived]) -> Result<(), RecorderError> {
        self.replace(EVE_FILE, |w| {
            w.write_record(EVE_HEADER)?;
            for (s, d) in samples.iter().zip(derived) {
                w.write_record([
                    stamp(s.time_tag),
                    s.esp_0_7.to_string(),
                    s.esp_30.to_string(),
                    d.esp_0_7_diff.to_string(),
                ])?;
            }
            Ok(())
        })
    }

    pub fn write_eovsa(&self, samples: &[EovsaSample]) -> Result<(), RecorderError> {
        self.replace(EOVSA_FILE, |w| {
            w.write_record(EOVSA_HEADER)?;
            for s in samples {
                w.serialize(s)?;
            }
            Ok(())
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LagDerived;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 17, 30, 5).unwrap()
    }

    fn read(path: &Path) -> Vec<csv::StringRecord> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader.records().map(Result::unwrap).collect()
    }

    #[test]
    fn test_session_directory_named_by_start_time() {
        let root = tempfile::tempdir().unwrap();
        let rec = SessionRecorder::create(root.path(), start()).unwrap();
        assert_eq!(rec.dir(), root.path().join("20240401T173005Z"));
        assert!(rec.dir().is_dir());
    }

    #[test]
    fn test_sessions_in_one_output_dir_do_not_share_files() {
        let root = tempfile::tempdir().unwrap();
        let first = SessionRecorder::create(root.path(), start()).unwrap();
        let second = SessionRecorder::create(root.path(), start() + Duration::seconds(1)).unwrap();
        assert_ne!(first.dir(), second.dir());

        let episode = FlareEvent::new(0, start(), start() + Duration::minutes(3));
        first.write_timetag_summary(std::slice::from_ref(&episode)).unwrap();
        second.write_timetag_summary(&[]).unwrap();
        assert_eq!(read(&first.dir().join(TIMETAG_SUMMARY_FILE)).len(), 1);
        assert!(read(&second.dir().join(TIMETAG_SUMMARY_FILE)).is_empty());
    }

    #[test]
    fn test_timetag_summary_is_overwritten() {
        let root = tempfile::tempdir().unwrap();
        let rec = SessionRecorder::create(root.path(), start()).unwrap();

        let mut episode = FlareEvent::new(0, start(), start() + Duration::minutes(3));
        rec.write_timetag_summary(std::slice::from_ref(&episode)).unwrap();
        episode.launch_time = Some(start() + Duration::minutes(5));
        rec.write_timetag_summary(std::slice::from_ref(&episode)).unwrap();

        let path = rec.dir().join(TIMETAG_SUMMARY_FILE);
        let rows = read(&path);
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "2024-04-01T17:30:05Z");
        assert!(!rows[0][4].is_empty());
        assert!(rows[0][6].is_empty());
        assert!(!rec.dir().join(format!("{TIMETAG_SUMMARY_FILE}.part")).exists());
    }

    #[test]
    fn test_empty_logs_still_have_headers() {
        let root = tempfile::tempdir().unwrap();
        let rec = SessionRecorder::create(root.path(), start()).unwrap();
        rec.write_fai_summary(&[]).unwrap();
        let mut reader = csv::Reader::from_path(rec.dir().join(FAI_SUMMARY_FILE)).unwrap();
        assert_eq!(reader.headers().unwrap().len(), 4);
        assert_eq!(reader.records().count(), 0);
    }

    #[test]
    fn test_goes_table_has_columns_per_lag() {
        let root = tempfile::tempdir().unwrap();
        let rec = SessionRecorder::create(root.path(), start()).unwrap();
        let sample = XrsSample {
            time_tag: start(),
            satellite: 16,
            xrsa: 1e-7,
            xrsb: 1e-6,
        };
        let derived = XrsDerived {
            temperature_mk: 8.0,
            emission_measure: 1e48,
            diffs: vec![LagDerived {
                lag: 3,
                xrsa: f64::NAN,
                xrsb: f64::NAN,
                temperature_mk: f64::NAN,
                emission_measure: f64::NAN,
            }],
        };
        rec.write_goes(&[sample], &[derived], &[3]).unwrap();

        let mut reader = csv::Reader::from_path(rec.dir().join(GOES_FILE)).unwrap();
        assert_eq!(reader.headers().unwrap().len(), 10);
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[4], "8");
        assert_eq!(&row[7], "NaN");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let rec = SessionRecorder::create(root.path(), start()).unwrap();
        std::fs::remove_dir_all(rec.dir()).unwrap();
        assert!(rec.write_fai_summary(&[]).is_err());
    }
}

//! Config Validation Integration Tests
//!
//! Load session configs from files the way the binary does and check that
//! typos are warned about while range violations stop the session.

use std::path::PathBuf;

use flare_trigger::config::validation::{validate_ranges, validate_unknown_keys};
use flare_trigger::config::{AlertCondition, ClockMode, ConfigError, SessionConfig};

fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("flare_config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn campaign_config_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
name = "foxsi-5"
output_dir = "/tmp/foxsi"
clock = "data_driven"

[goes]
poll_interval_ms = 30000
diff_lags = [1, 3, 5]

[eovsa]
enabled = false

[campaign]
deadtime_minutes = 45

[[alerts]]
name = "m_class"
kind = "xrsb_above"
threshold = 1e-5

[[alerts]]
name = "rising"
kind = "xrsb_rising"

[[alerts]]
name = "hot"
kind = "temperature_above"
threshold_mk = 10.0
"#,
    );

    let config = SessionConfig::load(Some(&path)).unwrap();
    assert_eq!(config.session.name, "foxsi-5");
    assert_eq!(config.session.clock, ClockMode::DataDriven);
    assert_eq!(config.goes.diff_lags, vec![1, 3, 5]);
    assert_eq!(config.goes.poll_interval_ms, 30_000);
    assert!(!config.eovsa.enabled);
    assert!(config.eve.enabled, "untouched sections keep defaults");
    assert_eq!(config.campaign.deadtime_minutes, 45);
    assert_eq!(config.campaign.hic_obs_end_minutes, 10);

    let names: Vec<&str> = config.alerts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["m_class", "rising", "hot"]);
    assert_eq!(
        config.alerts[2].condition,
        AlertCondition::TemperatureAbove { threshold_mk: 10.0 }
    );
}

#[test]
fn written_defaults_reload_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let toml = SessionConfig::default().to_toml().unwrap();
    assert!(validate_unknown_keys(&toml).is_empty());

    let path = write_config(&dir, &toml);
    assert_eq!(SessionConfig::load(Some(&path)).unwrap(), SessionConfig::default());
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = SessionConfig::load(Some(&dir.path().join("nope.toml")));
    assert!(matches!(result, Err(ConfigError::Io(..))));
}

#[test]
fn malformed_toml_reports_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[goes\npoll_interval_ms = 1");
    match SessionConfig::load(Some(&path)) {
        Err(ConfigError::Parse(p, _)) => assert_eq!(p, path),
        other => panic!("expected parse error, got {other:?}"),
    }
}

// ============================================================================
// Unknown keys
// ============================================================================

#[test]
fn typos_warn_but_still_load() {
    let dir = tempfile::tempdir().unwrap();
    let contents = r#"
[campaign]
deadtme_minutes = 10

[[alerts]]
name = "bright"
kind = "xrsb_above"
treshold = 3e-6
threshold = 3e-6
"#;
    let warnings = validate_unknown_keys(contents);
    let mut found: Vec<(&str, Option<&str>)> = warnings
        .iter()
        .map(|w| (w.field.as_str(), w.suggestion.as_deref()))
        .collect();
    found.sort_unstable();
    assert_eq!(
        found,
        vec![
            ("alerts[].treshold", Some("alerts[].threshold")),
            ("campaign.deadtme_minutes", Some("campaign.deadtime_minutes")),
        ]
    );

    let path = write_config(&dir, contents);
    let config = SessionConfig::load(Some(&path)).unwrap();
    assert_eq!(config.campaign.deadtime_minutes, 30, "misspelled key is ignored");
}

// ============================================================================
// Range violations
// ============================================================================

#[test]
fn every_range_violation_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[goes]
poll_interval_ms = 0
diff_lags = [3]

[fai]
lag = 5

[campaign]
hic_obs_start_minutes = 12
hic_obs_end_minutes = 10
"#,
    );

    match SessionConfig::load(Some(&path)) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 3, "{errors:?}");
            assert!(errors.iter().any(|e| e.contains("goes.poll_interval_ms")));
            assert!(errors.iter().any(|e| e.contains("fai.lag")));
            assert!(errors.iter().any(|e| e.contains("Hi-C observation")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn empty_alert_list_is_rejected() {
    let mut config = SessionConfig::default();
    config.alerts.clear();
    let errors = validate_ranges(&config);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("alerts:"));
}

#[test]
fn diff_alert_must_use_a_configured_lag() {
    let config = SessionConfig::from_toml_str(
        r#"
[[alerts]]
name = "steep"
kind = "xrsb_diff_above"
lag = 7
threshold = 1e-7
"#,
    );
    assert!(matches!(config, Err(ConfigError::Validation(_))));
}

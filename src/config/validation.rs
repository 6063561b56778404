//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::session_config::{AlertCondition, SessionConfig};

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for SessionConfig.
///
/// Entries of the `[[alerts]]` array are addressed as `alerts[].<field>`.
/// Any new field added to SessionConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        "session",
        "session.name",
        "session.output_dir",
        "session.clock",
        "goes",
        "goes.url",
        "goes.poll_interval_ms",
        "goes.window",
        "goes.diff_lags",
        "eve",
        "eve.enabled",
        "eve.url",
        "eve.poll_interval_ms",
        "eve.window",
        "eovsa",
        "eovsa.enabled",
        "eovsa.base_url",
        "eovsa.poll_interval_ms",
        "eovsa.header_lines",
        "eovsa.alert_window",
        "response",
        "response.path",
        "response.url",
        "response.download",
        "retry",
        "retry.max_attempts",
        "retry.initial_backoff_ms",
        "retry.max_backoff_ms",
        "retry.timeout_secs",
        "campaign",
        "campaign.latency_minutes",
        "campaign.hic_launch_offset_minutes",
        "campaign.foxsi_obs_start_minutes",
        "campaign.foxsi_obs_end_minutes",
        "campaign.hic_obs_start_minutes",
        "campaign.hic_obs_end_minutes",
        "campaign.deadtime_minutes",
        "flare_end",
        "flare_end.xrsb_below",
        "fai",
        "fai.lag",
        "fai.min_emission_measure",
        "fai.min_temperature_mk",
        "fai.max_temperature_mk",
        "alerts",
        "alerts[].name",
        "alerts[].kind",
        "alerts[].threshold",
        "alerts[].threshold_mk",
        "alerts[].lag",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walker
// ============================================================================

/// Recursively collect all dotted key paths from a TOML value.
///
/// Arrays of tables contribute their fields as `<key>[].<field>`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            match v {
                toml::Value::Table(_) => keys.extend(walk_toml_keys(v, &path)),
                toml::Value::Array(items) => {
                    let element_prefix = format!("{path}[]");
                    for item in items.iter().filter(|i| i.is_table()) {
                        for key in walk_toml_keys(item, &element_prefix) {
                            if !keys.contains(&key) {
                                keys.push(key);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate a parsed SessionConfig.
///
/// Returns one message per impossible value; any message prevents startup.
pub fn validate_ranges(config: &SessionConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.alerts.is_empty() {
        errors.push("alerts: at least one trigger predicate is required".to_string());
    }
    let mut seen = HashSet::new();
    for rule in &config.alerts {
        if rule.name.trim().is_empty() {
            errors.push("alerts: rule names must not be empty".to_string());
        } else if !seen.insert(rule.name.as_str()) {
            errors.push(format!("alerts: duplicate rule name '{}'", rule.name));
        }
        match rule.condition {
            AlertCondition::XrsbAbove { threshold }
            | AlertCondition::XrsaAbove { threshold }
            | AlertCondition::EmissionMeasureAbove { threshold } => {
                check_positive(&format!("alerts.{}.threshold", rule.name), threshold, &mut errors);
            }
            AlertCondition::TemperatureAbove { threshold_mk } => {
                check_positive(&format!("alerts.{}.threshold_mk", rule.name), threshold_mk, &mut errors);
            }
            AlertCondition::XrsbDiffAbove { lag, threshold } => {
                if !threshold.is_finite() {
                    errors.push(format!("alerts.{}.threshold must be finite", rule.name));
                }
                if !config.goes.diff_lags.contains(&lag) {
                    errors.push(format!(
                        "alerts.{}.lag = {lag} is not one of goes.diff_lags {:?}",
                        rule.name, config.goes.diff_lags
                    ));
                }
            }
            AlertCondition::XrsbRising | AlertCondition::XrsaRising => {}
        }
    }

    if config.goes.diff_lags.iter().any(|&lag| lag == 0) {
        errors.push("goes.diff_lags: lags must be >= 1".to_string());
    }
    if !config.goes.diff_lags.contains(&config.fai.lag) {
        errors.push(format!(
            "fai.lag = {} is not one of goes.diff_lags {:?}",
            config.fai.lag, config.goes.diff_lags
        ));
    }
    check_positive("fai.min_emission_measure", config.fai.min_emission_measure, &mut errors);
    check_positive("fai.min_temperature_mk", config.fai.min_temperature_mk, &mut errors);
    if let Some(max) = config.fai.max_temperature_mk {
        if !(max > config.fai.min_temperature_mk) {
            errors.push(format!(
                "fai.max_temperature_mk = {max} must exceed fai.min_temperature_mk = {}",
                config.fai.min_temperature_mk
            ));
        }
    }
    check_positive("flare_end.xrsb_below", config.flare_end.xrsb_below, &mut errors);

    for (name, interval) in [
        ("goes.poll_interval_ms", config.goes.poll_interval_ms),
        ("eve.poll_interval_ms", config.eve.poll_interval_ms),
        ("eovsa.poll_interval_ms", config.eovsa.poll_interval_ms),
    ] {
        if interval == 0 {
            errors.push(format!("{name} must be > 0"));
        }
    }
    if config.goes.window < 2 {
        errors.push(format!("goes.window = {} must be >= 2", config.goes.window));
    }
    if config.eovsa.alert_window == 0 {
        errors.push("eovsa.alert_window must be > 0".to_string());
    }
    if config.retry.max_attempts == 0 {
        errors.push("retry.max_attempts must be >= 1".to_string());
    }

    let c = &config.campaign;
    if c.latency_minutes < 0 {
        errors.push(format!("campaign.latency_minutes = {} cannot be negative", c.latency_minutes));
    }
    if c.foxsi_obs_start_minutes >= c.foxsi_obs_end_minutes {
        errors.push("campaign: FOXSI observation must start before it ends".to_string());
    }
    if c.hic_obs_start_minutes >= c.hic_obs_end_minutes {
        errors.push("campaign: Hi-C observation must start before it ends".to_string());
    }
    if c.hic_obs_end_minutes <= 0 {
        errors.push("campaign.hic_obs_end_minutes must be after launch".to_string());
    }
    if c.deadtime_minutes < 0 {
        errors.push(format!("campaign.deadtime_minutes = {} cannot be negative", c.deadtime_minutes));
    }

    errors
}

fn check_positive(field: &str, value: f64, errors: &mut Vec<String>) {
    if !(value.is_finite() && value > 0.0) {
        errors.push(format!("{field} = {value} must be finite and > 0"));
    }
}

// ============================================================================
// Tests
// ============================================================================

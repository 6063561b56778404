//! GOES XRS Flare Simulation
//!
//! Generates a synthetic NOAA SWPC XRS JSON document (one record per
//! minute and energy band) with configurable flares on a noisy quiet-Sun
//! background, for replay through `flare-trigger --historical`.
//!
//! # Usage
//! ```bash
//! ./simulation --hours 6 --flare 120:5e-6 --flare 300:2e-5 --seed 7 > day.json
//! ./flare-trigger --historical day.json --replay-interval-ms 100
//! ```

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

use flare_trigger::config::defaults::{XRSA_ENERGY_BAND, XRSB_ENERGY_BAND};

// ============================================================================
// Profile Constants
// ============================================================================

/// Gaussian rise width (minutes)
const RISE_MINUTES: f64 = 4.0;
/// Exponential decay time (minutes)
const DECAY_MINUTES: f64 = 15.0;
/// XRSA/XRSB ratio of the quiet background
const QUIET_RATIO: f64 = 0.01;
/// XRSA/XRSB ratio at flare peak
const PEAK_RATIO: f64 = 0.12;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "simulation")]
#[command(about = "Synthetic GOES XRS data for flare-trigger replay testing")]
#[command(version = "1.0")]
struct Args {
    /// Duration in hours (1-24)
    #[arg(short = 'H', long, default_value = "6", value_parser = clap::value_parser!(u32).range(1..=24))]
    hours: u32,

    /// First time tag (RFC 3339); defaults to the start of the current UTC day
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Flare as ONSET_MINUTE:PEAK_FLUX (repeatable), e.g. 120:5e-6
    #[arg(long = "flare", value_parser = parse_flare)]
    flares: Vec<FlareSpec>,

    /// Quiet-Sun XRSB background (W/m²)
    #[arg(long, default_value = "1e-7")]
    background: f64,

    /// Relative log-normal noise
    #[arg(long, default_value = "0.02")]
    noise: f64,

    /// GOES satellite number
    #[arg(long, default_value = "16")]
    satellite: u32,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Suppress the summary on stderr
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy)]
struct FlareSpec {
    onset_minute: f64,
    peak_flux: f64,
}

fn parse_flare(s: &str) -> Result<FlareSpec, String> {
    let (onset, peak) = s
        .split_once(':')
        .ok_or_else(|| format!("expected ONSET_MINUTE:PEAK_FLUX, got '{s}'"))?;
    let onset_minute: f64 = onset.trim().parse().map_err(|e| format!("bad onset '{onset}': {e}"))?;
    let peak_flux: f64 = peak.trim().parse().map_err(|e| format!("bad peak flux '{peak}': {e}"))?;
    if onset_minute < 0.0 || !(peak_flux > 0.0) {
        return Err(format!("onset must be >= 0 and peak flux > 0, got '{s}'"));
    }
    Ok(FlareSpec {
        onset_minute,
        peak_flux,
    })
}

// ============================================================================
// Light Curve
// ============================================================================

/// Normalised flare shape: Gaussian rise to 1 at `RISE_MINUTES * 2`, then exponential decay.
fn profile(minutes_since_onset: f64) -> f64 {
    let peak_at = 2.0 * RISE_MINUTES;
    if minutes_since_onset < 0.0 {
        0.0
    } else if minutes_since_onset < peak_at {
        let x = (minutes_since_onset - peak_at) / RISE_MINUTES;
        (-0.5 * x * x).exp()
    } else {
        (-(minutes_since_onset - peak_at) / DECAY_MINUTES).exp()
    }
}

/// Noise-free (xrsa, xrsb) at `minute`.
fn light_curve(minute: f64, background: f64, flares: &[FlareSpec]) -> (f64, f64) {
    let mut xrsb = background;
    let mut weighted_shape = 0.0;
    for f in flares {
        let shape = profile(minute - f.onset_minute);
        xrsb += f.peak_flux * shape;
        weighted_shape += shape * f.peak_flux;
    }
    let heat = if xrsb > 0.0 { weighted_shape / xrsb } else { 0.0 };
    let ratio = QUIET_RATIO + (PEAK_RATIO - QUIET_RATIO) * heat;
    (xrsb * ratio, xrsb)
}

// ============================================================================
// Output
// ============================================================================

/// One SWPC record; field names follow the published product.
#[derive(Debug, Serialize)]
struct XrsRecord {
    time_tag: String,
    satellite: u32,
    flux: f64,
    observed_flux: f64,
    electron_correction: f64,
    electron_contaminaton: bool,
    energy: &'static str,
}

impl XrsRecord {
    fn new(time_tag: &str, satellite: u32, flux: f64, energy: &'static str) -> Self {
        Self {
            time_tag: time_tag.to_string(),
            satellite,
            flux,
            observed_flux: flux,
            electron_correction: 0.0,
            electron_contaminaton: false,
            energy,
        }
    }
}

fn log_mission(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[simulation] {}", message);
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut rng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let noise = Normal::new(0.0, args.noise.max(0.0))?;

    let start = args.start.unwrap_or_else(|| {
        let now = Utc::now();
        now.date_naive()
            .and_hms_opt(0, 0, 0)
            .map_or(now, |midnight| midnight.and_utc())
    });
    let minutes = i64::from(args.hours) * 60;

    log_mission(&"=".repeat(60), args.quiet);
    log_mission(&format!("GOES-{} XRS, {} minutes from {}", args.satellite, minutes, start), args.quiet);
    log_mission(&format!("Background: {:.1e} W/m², noise: {}", args.background, args.noise), args.quiet);
    for f in &args.flares {
        log_mission(
            &format!("Flare onset +{} min, peak {:.1e} W/m²", f.onset_minute, f.peak_flux),
            args.quiet,
        );
    }
    log_mission(&"=".repeat(60), args.quiet);

    let mut records = Vec::with_capacity(2 * minutes as usize);
    let mut peak = 0.0f64;
    for m in 0..minutes {
        let time_tag = (start + Duration::minutes(m)).format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let (xrsa, xrsb) = light_curve(m as f64, args.background, &args.flares);
        let xrsa = xrsa * noise.sample(&mut rng).exp();
        let xrsb = xrsb * noise.sample(&mut rng).exp();
        peak = peak.max(xrsb);
        records.push(XrsRecord::new(&time_tag, args.satellite, xrsa, XRSA_ENERGY_BAND));
        records.push(XrsRecord::new(&time_tag, args.satellite, xrsb, XRSB_ENERGY_BAND));
    }

    let body = serde_json::to_string_pretty(&records)?;
    match &args.output {
        Some(path) => std::fs::write(path, body)?,
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(body.as_bytes())?;
            lock.write_all(b"\n")?;
        }
    }

    log_mission(&format!("{} records written, peak XRSB {:.2e} W/m²", records.len(), peak), args.quiet);
    Ok(())
}

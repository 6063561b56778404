//! System-wide default constants.
//!
//! Every value here is also the default of the corresponding
//! [`SessionConfig`](super::SessionConfig) field. Grouped by subsystem.

// ============================================================================
// Campaign Timing
// ============================================================================

/// Delay between a GOES sample's time tag and when it becomes available
/// on the NOAA feed (minutes).
pub const DATA_LATENCY_MINUTES: i64 = 3;

/// Hi-C launch offset from the FOXSI launch time (minutes).
pub const HIC_LAUNCH_OFFSET_MINUTES: i64 = 2;

/// FOXSI observation window start, relative to launch (minutes).
pub const FOXSI_OBS_START_MINUTES: i64 = 2;

/// FOXSI observation window end, relative to launch (minutes).
pub const FOXSI_OBS_END_MINUTES: i64 = 8;

/// Hi-C observation window start, relative to launch (minutes).
pub const HIC_OBS_START_MINUTES: i64 = 4;

/// Hi-C observation window end, relative to launch (minutes).
pub const HIC_OBS_END_MINUTES: i64 = 10;

/// Cool-down after the Hi-C observation ends before searching resumes (minutes).
pub const DEADTIME_MINUTES: i64 = 30;

// ============================================================================
// GOES XRS Feed
// ============================================================================

/// NOAA SWPC primary GOES XRS 6-hour JSON feed.
pub const GOES_XRS_URL: &str = "https://services.swpc.noaa.gov/json/goes/primary/xrays-6-hour.json";

/// Number of trailing samples kept from each GOES fetch.
pub const GOES_FETCH_WINDOW: usize = 30;

/// GOES poll interval (ms). Faster than the 1-minute cadence on purpose.
pub const GOES_POLL_INTERVAL_MS: u64 = 5_000;

/// Rolling-difference lags for the 1-minute GOES cadence (samples).
pub const GOES_DIFF_LAGS: [usize; 2] = [3, 5];

/// Energy band label of the XRSA (short) channel in the NOAA feed.
pub const XRSA_ENERGY_BAND: &str = "0.05-0.4nm";

/// Energy band label of the XRSB (long) channel in the NOAA feed.
pub const XRSB_ENERGY_BAND: &str = "0.1-0.8nm";

// ============================================================================
// EVE ESP Feed
// ============================================================================

/// LASP EVE quicklook ESP diode counts (10 s cadence).
pub const EVE_ESP_URL: &str =
    "https://lasp.colorado.edu/eve/data_access/eve_data/quicklook/L0CS/LATEST_EVE_L0CS_DIODES_10s_counts.json";

/// Number of trailing samples kept from each EVE fetch (30 minutes at 10 s).
pub const EVE_FETCH_WINDOW: usize = 180;

/// EVE poll interval (ms).
pub const EVE_POLL_INTERVAL_MS: u64 = 10_000;

// ============================================================================
// EOVSA Feed
// ============================================================================

/// Base URL of the EOVSA flare-test listing (`<base>/<YYYY>/<MM>/`).
pub const EOVSA_BASE_URL: &str = "http://www.ovsa.njit.edu/fits/FTST";

/// Header lines preceding the EOVSA data table.
pub const EOVSA_HEADER_LINES: usize = 9;

/// Samples inspected by the EOVSA flare-flag indicator.
pub const EOVSA_ALERT_WINDOW: usize = 1_800;

/// EOVSA poll interval (ms).
pub const EOVSA_POLL_INTERVAL_MS: u64 = 60_000;

// ============================================================================
// Response Function / Thermal Model
// ============================================================================

/// Local cache file of the GOES CHIANTI response table.
pub const RESPONSE_FILE_NAME: &str = "goes-response-latest.fits";

/// Source of the GOES CHIANTI response table.
pub const RESPONSE_URL: &str =
    "https://sohoftp.nascom.nasa.gov/solarsoft/gen/idl/synoptic/goes/goes_chianti_response_latest.fits";

/// First GOES satellite number supported by the response table.
pub const MIN_SUPPORTED_SATELLITE: u32 = 16;

/// Short-channel flux below which the ratio is unreliable (W/m²).
pub const MIN_SHORT_FLUX: f64 = 1e-10;

/// Long-channel flux below which the ratio is unreliable (W/m²).
pub const MIN_LONG_FLUX: f64 = 3e-8;

/// Ratio substituted when either channel is below its floor.
pub const FALLBACK_RATIO: f64 = 0.003;

/// Emission measure scale of the response table (cm⁻³).
pub const EM_SCALE: f64 = 1e49;

// ============================================================================
// Alerts
// ============================================================================

/// XRSB trigger threshold (W/m², roughly C2.3).
pub const XRSB_TRIGGER_FLUX: f64 = 2.3e-6;

/// XRSB level below which an ongoing flare is considered over (W/m²).
pub const XRSB_FLARE_END_FLUX: f64 = 2.3e-6;

/// Lag of the differenced series the FAI inspects (samples).
pub const FAI_LAG: usize = 3;

/// FAI emission-measure threshold on the differenced series (cm⁻³).
pub const FAI_MIN_EMISSION_MEASURE: f64 = 5e46;

/// FAI temperature threshold on the differenced series (MK).
pub const FAI_MIN_TEMPERATURE_MK: f64 = 6.0;

// ============================================================================
// Retry
// ============================================================================

/// Attempts per fetch before the tick is treated as absent data.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// First backoff delay (ms); doubled on every further attempt.
pub const RETRY_INITIAL_BACKOFF_MS: u64 = 250;

/// Backoff ceiling (ms).
pub const RETRY_MAX_BACKOFF_MS: u64 = 2_000;

/// Per-request HTTP timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Session
// ============================================================================

/// Root directory for per-session output folders.
pub const OUTPUT_DIR: &str = "SessionSummaries";

/// Session directory name format (UTC session start).
pub const SESSION_DIR_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Capacity of the notification broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the operator command channel.
pub const COMMAND_CHANNEL_CAPACITY: usize = 16;

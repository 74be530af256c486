/// Scan configuration handed to the BLE stack when scanning starts.
///
/// Intervals and windows are in controller units of 0.625 ms. Scans always
/// run with unbounded duration; see [`SCAN_FOREVER_MS`].
use core::fmt;

use serde::Deserialize;

/// Smallest scan interval/window accepted by the controller (2.5 ms)
pub const MIN_SCAN_UNITS: u16 = 0x0004;

/// Largest scan interval/window accepted by the controller (10.24 s)
pub const MAX_SCAN_UNITS: u16 = 0x4000;

/// Scan duration requested from the host stack. Finite scans are unsupported;
/// if the stack ends a scan anyway, the firmware restarts it.
pub const SCAN_FOREVER_MS: i32 = i32::MAX;

/// Scan parameters. Passed explicitly at scan start, never held globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Active scanning (send scan requests) vs passive listening
    pub active: bool,
    /// Scan interval in 0.625 ms units
    pub interval: u16,
    /// Scan window in 0.625 ms units, must not exceed `interval`
    pub window: u16,
    /// Let the controller suppress repeated reports from the same device
    pub filter_duplicates: bool,
}

impl ScanConfig {
    /// Active scan, 50 ms interval, 30 ms window, every advertisement reported.
    pub const fn new() -> Self {
        Self {
            active: true,
            interval: 0x50,
            window: 0x30,
            filter_duplicates: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SCAN_UNITS..=MAX_SCAN_UNITS).contains(&self.interval) {
            return Err(ConfigError::IntervalOutOfRange(self.interval));
        }
        if !(MIN_SCAN_UNITS..=MAX_SCAN_UNITS).contains(&self.window) {
            return Err(ConfigError::WindowOutOfRange(self.window));
        }
        if self.window > self.interval {
            return Err(ConfigError::WindowExceedsInterval {
                window: self.window,
                interval: self.interval,
            });
        }
        // The stack is handed whole milliseconds; check what it will apply.
        let interval = applied_units(self.interval_whole_ms());
        if !(MIN_SCAN_UNITS..=MAX_SCAN_UNITS).contains(&interval) {
            return Err(ConfigError::IntervalOutOfRange(interval));
        }
        let window = applied_units(self.window_whole_ms());
        if !(MIN_SCAN_UNITS..=MAX_SCAN_UNITS).contains(&window) {
            return Err(ConfigError::WindowOutOfRange(window));
        }
        Ok(())
    }

    pub fn interval_ms(&self) -> f32 {
        units_to_ms(self.interval)
    }

    pub fn window_ms(&self) -> f32 {
        units_to_ms(self.window)
    }

    /// Scan interval in whole milliseconds, rounded up so the stack's
    /// truncating conversion back to units never lands below `interval`.
    pub fn interval_whole_ms(&self) -> u16 {
        units_to_whole_ms(self.interval)
    }

    /// Scan window in whole milliseconds, rounded up like `interval_whole_ms`.
    pub fn window_whole_ms(&self) -> u16 {
        units_to_whole_ms(self.window)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn units_to_ms(units: u16) -> f32 {
    units as f32 * 0.625
}

/// ceil(units * 0.625)
fn units_to_whole_ms(units: u16) -> u16 {
    ((units as u32 * 5).div_ceil(8)) as u16
}

/// Units the BLE stack derives from a millisecond value: `(ms / 0.625) as u16`.
pub fn applied_units(ms: u16) -> u16 {
    (ms as f32 / 0.625) as u16
}

/// Why a scan configuration was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Not a flat JSON object with the expected key types
    Malformed,
    IntervalOutOfRange(u16),
    WindowOutOfRange(u16),
    WindowExceedsInterval { window: u16, interval: u16 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Malformed => f.write_str("malformed scan config JSON"),
            ConfigError::IntervalOutOfRange(v) => write!(
                f,
                "scan interval {v:#06x} outside {MIN_SCAN_UNITS:#06x}..={MAX_SCAN_UNITS:#06x}"
            ),
            ConfigError::WindowOutOfRange(v) => write!(
                f,
                "scan window {v:#06x} outside {MIN_SCAN_UNITS:#06x}..={MAX_SCAN_UNITS:#06x}"
            ),
            ConfigError::WindowExceedsInterval { window, interval } => write!(
                f,
                "scan window {window:#06x} exceeds interval {interval:#06x}"
            ),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Wire format for scan config overrides: every key optional.
#[derive(Deserialize)]
struct RawScanConfig {
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    interval: Option<u16>,
    #[serde(default)]
    window: Option<u16>,
    #[serde(default)]
    filter_duplicates: Option<bool>,
}

/// Parse a JSON scan config override, e.g. `{"interval":160,"window":160}`.
///
/// Keys that are absent keep their [`ScanConfig::new`] defaults. The merged
/// configuration is validated before it is returned.
pub fn parse_scan_config(data: &[u8]) -> Result<ScanConfig, ConfigError> {
    let trimmed = data.trim_ascii();
    let (raw, _) = serde_json_core::from_slice::<RawScanConfig>(trimmed)
        .map_err(|_| ConfigError::Malformed)?;

    let defaults = ScanConfig::new();
    let config = ScanConfig {
        active: raw.active.unwrap_or(defaults.active),
        interval: raw.interval.unwrap_or(defaults.interval),
        window: raw.window.unwrap_or(defaults.window),
        filter_duplicates: raw.filter_duplicates.unwrap_or(defaults.filter_duplicates),
    };
    config.validate()?;
    Ok(config)
}

use serde::{Deserialize, Serialize};
use std::path::Path;

use satrig_core::station::{ConfigurationError, FrequencyPlan, GroundStation};
use satrig_core::track::{LinkTuning, TrackingConfig};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub station: StationSection,

    #[serde(default)]
    pub tracking: TrackingSection,

    #[serde(default)]
    pub log: LogSection,

    #[serde(default)]
    pub presets: Vec<Preset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StationSection {
    #[serde(default)]
    pub latitude_deg: f64,

    #[serde(default)]
    pub longitude_deg: f64,

    #[serde(default)]
    pub altitude_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSection {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_radio_timeout_ms")]
    pub radio_timeout_ms: u64,

    #[serde(default = "default_min_step_hz")]
    pub min_step_hz: u64,

    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    #[serde(default = "default_pass_horizon_hours")]
    pub pass_horizon_hours: u64,

    #[serde(default = "default_scan_step_s")]
    pub scan_step_s: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default = "default_log_level")]
    pub level: String,
}

/// One satellite/transponder the operator can track, in the units hams
/// write down: MHz for dial frequencies, kHz for tuning grids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,

    /// Catalog name or NORAD number of the satellite in the TLE file.
    pub satellite: String,

    pub tle_file: String,

    pub uplink_mhz: f64,
    pub downlink_mhz: f64,

    #[serde(default = "default_true")]
    pub uplink_corrected: bool,

    #[serde(default = "default_true")]
    pub downlink_corrected: bool,

    #[serde(default)]
    pub uplink_mode: String,

    #[serde(default)]
    pub downlink_mode: String,

    #[serde(default)]
    pub uplink_tuning_step_khz: f64,

    #[serde(default)]
    pub uplink_tuning_threshold_khz: f64,

    #[serde(default)]
    pub downlink_tuning_step_khz: f64,

    #[serde(default)]
    pub downlink_tuning_threshold_khz: f64,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_radio_timeout_ms() -> u64 {
    750
}

fn default_min_step_hz() -> u64 {
    10
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_pass_horizon_hours() -> u64 {
    24
}

fn default_scan_step_s() -> u64 {
    30
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for TrackingSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            radio_timeout_ms: default_radio_timeout_ms(),
            min_step_hz: default_min_step_hz(),
            max_consecutive_failures: default_max_consecutive_failures(),
            pass_horizon_hours: default_pass_horizon_hours(),
            scan_step_s: default_scan_step_s(),
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {e}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn ground_station(&self) -> Result<GroundStation, ConfigurationError> {
        GroundStation::new(
            self.station.latitude_deg,
            self.station.longitude_deg,
            self.station.altitude_m,
        )
    }

    /// Preset by name (case-insensitive) or 1-based list position.
    pub fn find_preset(&self, key: &str) -> Option<&Preset> {
        if let Ok(index) = key.parse::<usize>() {
            if index >= 1 {
                return self.presets.get(index - 1);
            }
        }
        self.presets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(key))
    }

    pub fn preset_names(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn tracking_config(&self, preset: &Preset) -> TrackingConfig {
        TrackingConfig {
            tick_interval: std::time::Duration::from_millis(self.tracking.tick_interval_ms),
            radio_timeout: std::time::Duration::from_millis(self.tracking.radio_timeout_ms),
            min_step_hz: self.tracking.min_step_hz,
            max_consecutive_failures: self.tracking.max_consecutive_failures,
            pass_horizon: std::time::Duration::from_secs(self.tracking.pass_horizon_hours * 3600),
            uplink_tuning: LinkTuning {
                step_hz: khz_to_hz(preset.uplink_tuning_step_khz),
                threshold_hz: khz_to_hz(preset.uplink_tuning_threshold_khz),
            },
            downlink_tuning: LinkTuning {
                step_hz: khz_to_hz(preset.downlink_tuning_step_khz),
                threshold_hz: khz_to_hz(preset.downlink_tuning_threshold_khz),
            },
        }
    }
}

impl Preset {
    pub fn frequency_plan(&self) -> Result<FrequencyPlan, ConfigurationError> {
        Ok(
            FrequencyPlan::new(self.uplink_mhz * 1e6, self.downlink_mhz * 1e6)?
                .with_modes(&self.uplink_mode, &self.downlink_mode)
                .with_correction(self.uplink_corrected, self.downlink_corrected),
        )
    }
}

fn khz_to_hz(khz: f64) -> u64 {
    if khz.is_finite() && khz > 0.0 {
        (khz * 1000.0).round() as u64
    } else {
        0
    }
}

//! Ground station location and the nominal frequency plan of a satellite.

use serde::{Deserialize, Serialize};

/// Direction of a radio link relative to the ground station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    /// Station transmits, satellite receives.
    Uplink,
    /// Satellite transmits, station receives.
    Downlink,
}

impl Link {
    pub fn as_str(&self) -> &'static str {
        match self {
            Link::Uplink => "uplink",
            Link::Downlink => "downlink",
        }
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected station or tracking parameters.
#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("latitude {0} deg out of range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} deg out of range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("altitude {0} m is not finite")]
    InvalidAltitude(f64),
    #[error("{link} frequency {hz} Hz must be positive and finite")]
    InvalidFrequency { link: Link, hz: f64 },
    #[error("{link} tuning threshold {threshold_hz} Hz exceeds step {step_hz} Hz")]
    InvalidTuning {
        link: Link,
        step_hz: u64,
        threshold_hz: u64,
    },
    #[error("tick interval must be greater than zero")]
    ZeroTickInterval,
    #[error("radio timeout must be greater than zero")]
    ZeroRadioTimeout,
}

/// Fixed observer position of the station.
///
/// Angles in degrees, altitude in meters above the WGS-84 ellipsoid.
/// Validated once at construction and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundStation {
    latitude_deg: f64,
    longitude_deg: f64,
    altitude_m: f64,
}

impl GroundStation {
    pub fn new(
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_m: f64,
    ) -> Result<Self, ConfigurationError> {
        if !latitude_deg.is_finite() || latitude_deg.abs() > 90.0 {
            return Err(ConfigurationError::LatitudeOutOfRange(latitude_deg));
        }
        if !longitude_deg.is_finite() || longitude_deg.abs() > 180.0 {
            return Err(ConfigurationError::LongitudeOutOfRange(longitude_deg));
        }
        if !altitude_m.is_finite() {
            return Err(ConfigurationError::InvalidAltitude(altitude_m));
        }
        Ok(Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        })
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude_deg
    }

    pub fn longitude_deg(&self) -> f64 {
        self.longitude_deg
    }

    pub fn altitude_m(&self) -> f64 {
        self.altitude_m
    }
}

/// Nominal uplink/downlink pair of one satellite transponder, with the
/// per-link switches deciding whether Doppler correction is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyPlan {
    uplink_hz: f64,
    downlink_hz: f64,
    uplink_mode: String,
    downlink_mode: String,
    correct_uplink: bool,
    correct_downlink: bool,
}

impl FrequencyPlan {
    /// Plan with both corrections enabled and no mode tags.
    pub fn new(uplink_hz: f64, downlink_hz: f64) -> Result<Self, ConfigurationError> {
        for (link, hz) in [(Link::Uplink, uplink_hz), (Link::Downlink, downlink_hz)] {
            if !hz.is_finite() || hz <= 0.0 {
                return Err(ConfigurationError::InvalidFrequency { link, hz });
            }
        }
        Ok(Self {
            uplink_hz,
            downlink_hz,
            uplink_mode: String::new(),
            downlink_mode: String::new(),
            correct_uplink: true,
            correct_downlink: true,
        })
    }

    pub fn with_modes(mut self, uplink_mode: &str, downlink_mode: &str) -> Self {
        self.uplink_mode = uplink_mode.to_string();
        self.downlink_mode = downlink_mode.to_string();
        self
    }

    pub fn with_correction(mut self, uplink: bool, downlink: bool) -> Self {
        self.correct_uplink = uplink;
        self.correct_downlink = downlink;
        self
    }

    /// Nominal frequency of one link, Hz.
    pub fn nominal(&self, link: Link) -> f64 {
        match link {
            Link::Uplink => self.uplink_hz,
            Link::Downlink => self.downlink_hz,
        }
    }

    /// Operating mode tag of one link, e.g. "FM" or "USB". May be empty.
    pub fn mode(&self, link: Link) -> &str {
        match link {
            Link::Uplink => &self.uplink_mode,
            Link::Downlink => &self.downlink_mode,
        }
    }

    /// Whether Doppler correction is applied on this link. Disabled links
    /// are driven at the nominal frequency.
    pub fn correction_enabled(&self, link: Link) -> bool {
        match link {
            Link::Uplink => self.correct_uplink,
            Link::Downlink => self.correct_downlink,
        }
    }
}

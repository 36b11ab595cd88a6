//! Topocentric orbit model: SGP4 propagation plus the frame chain down to
//! look angles and range rate as seen from one ground station.

pub(crate) mod frames;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::station::GroundStation;

/// NORAD catalog number.
pub type NoradId = u64;

/// Failures of the ephemeris provider.
#[derive(thiserror::Error, Debug)]
pub enum EphemerisError {
    /// The element set could not be turned into a propagatable model.
    #[error("unusable orbital elements: {0}")]
    InvalidElements(String),
    /// The provider refused the requested instant.
    #[error("propagation failed at {at}: {reason}")]
    Propagation { at: DateTime<Utc>, reason: String },
}

/// One satellite's element set with the SGP4 constants derived from it.
///
/// Constants are computed once at load; queries only pay for propagation.
pub struct SatElements {
    norad_id: NoradId,
    name: String,
    epoch: DateTime<Utc>,
    constants: sgp4::Constants,
}

impl SatElements {
    pub fn new(elements: sgp4::Elements) -> Result<Self, EphemerisError> {
        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| EphemerisError::InvalidElements(e.to_string()))?;
        let name = elements
            .object_name
            .clone()
            .unwrap_or_else(|| format!("NORAD {}", elements.norad_id));
        Ok(Self {
            norad_id: elements.norad_id,
            name,
            epoch: elements.datetime.and_utc(),
            constants,
        })
    }

    pub fn norad_id(&self) -> NoradId {
        self.norad_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Epoch of the element set. Accuracy degrades the further a query
    /// strays from it.
    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    fn minutes_since_epoch(&self, at: DateTime<Utc>) -> f64 {
        (at - self.epoch).num_milliseconds() as f64 / 60_000.0
    }
}

impl std::fmt::Debug for SatElements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SatElements")
            .field("norad_id", &self.norad_id)
            .field("name", &self.name)
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Instantaneous topocentric state of one satellite.
///
/// Produced fresh for every query and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StateVector {
    pub at: DateTime<Utc>,
    /// Elevation above the horizon, degrees. Negative below the horizon.
    pub elevation_deg: f64,
    /// Azimuth, degrees clockwise from true north, in [0, 360).
    pub azimuth_deg: f64,
    /// Slant range station to satellite, meters.
    pub range_m: f64,
    /// Range rate, m/s. Positive while the satellite recedes.
    pub range_rate_m_s: f64,
    /// Latitude of the sub-satellite point, degrees.
    pub subpoint_lat_deg: f64,
    /// Longitude of the sub-satellite point, degrees.
    pub subpoint_lon_deg: f64,
}

/// Pure mapping from (element set, instant) to topocentric state for one
/// fixed station. Identical inputs give identical outputs, which is what
/// makes the search and control layers above it replayable.
#[derive(Debug, Clone)]
pub struct OrbitModel {
    station: GroundStation,
    station_ecef: frames::Vec3,
}

impl OrbitModel {
    pub fn new(station: GroundStation) -> Self {
        let station_ecef = frames::geodetic_to_ecef(
            station.latitude_deg(),
            station.longitude_deg(),
            station.altitude_m(),
        );
        Self {
            station,
            station_ecef,
        }
    }

    pub fn station(&self) -> &GroundStation {
        &self.station
    }

    /// Topocentric state of `sat` at `at`.
    pub fn state_at(
        &self,
        sat: &SatElements,
        at: DateTime<Utc>,
    ) -> Result<StateVector, EphemerisError> {
        let minutes = sat.minutes_since_epoch(at);
        let prediction = sat
            .constants
            .propagate(sgp4::MinutesSinceEpoch(minutes))
            .map_err(|e| EphemerisError::Propagation {
                at,
                reason: e.to_string(),
            })?;

        let unix = at.timestamp_micros() as f64 / 1e6;
        let theta = frames::gmst(unix);
        let sat_ecef = frames::teme_to_ecef(prediction.position, theta);
        let sat_vel = frames::teme_vel_to_ecef(prediction.position, prediction.velocity, theta);

        // Station is fixed in ECEF, so the relative velocity is the
        // satellite's ECEF velocity.
        let rel = frames::sub(sat_ecef, self.station_ecef);
        let range_km = frames::norm(rel);
        let range_rate_km_s = frames::dot(rel, sat_vel) / range_km;

        let enu = frames::ecef_to_enu(
            rel,
            self.station.latitude_deg(),
            self.station.longitude_deg(),
        );
        let elevation_deg = (enu[2] / range_km).asin() * frames::RAD2DEG;
        let mut azimuth_deg = enu[0].atan2(enu[1]) * frames::RAD2DEG;
        if azimuth_deg < 0.0 {
            azimuth_deg += 360.0;
        }

        let (subpoint_lat_deg, subpoint_lon_deg) = frames::ecef_to_geodetic(sat_ecef);

        Ok(StateVector {
            at,
            elevation_deg,
            azimuth_deg,
            range_m: range_km * 1000.0,
            range_rate_m_s: range_rate_km_s * 1000.0,
            subpoint_lat_deg,
            subpoint_lon_deg,
        })
    }
}

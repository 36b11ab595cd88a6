//! Frame conversions between the SGP4 output frame (TEME), the rotating
//! earth-fixed frame (ECEF) and the station-local east-north-up frame.
//!
//! Positions are kilometers, velocities km/s, angles radians unless a name
//! says otherwise.

use std::f64::consts::PI;

/// WGS-84 semi-major axis, km.
pub(crate) const WGS84_A: f64 = 6378.137;
/// WGS-84 flattening.
pub(crate) const WGS84_F: f64 = 1.0 / 298.257223563;
/// Earth rotation rate, rad/s.
pub(crate) const OMEGA_EARTH: f64 = 7.2921159e-5;

const JD_UNIX_EPOCH: f64 = 2440587.5;
const JD_J2000: f64 = 2451545.0;
const SECONDS_PER_DAY: f64 = 86400.0;

pub(crate) const DEG2RAD: f64 = PI / 180.0;
pub(crate) const RAD2DEG: f64 = 180.0 / PI;

pub(crate) type Vec3 = [f64; 3];

pub(crate) fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn norm(v: Vec3) -> f64 {
    dot(v, v).sqrt()
}

pub(crate) fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn eccentricity_sq() -> f64 {
    2.0 * WGS84_F - WGS84_F * WGS84_F
}

/// Geodetic coordinates to an ECEF position, km.
pub(crate) fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Vec3 {
    let lat = lat_deg * DEG2RAD;
    let lon = lon_deg * DEG2RAD;
    let alt_km = alt_m / 1000.0;
    let e2 = eccentricity_sq();
    let n = WGS84_A / (1.0 - e2 * lat.sin() * lat.sin()).sqrt();
    [
        (n + alt_km) * lat.cos() * lon.cos(),
        (n + alt_km) * lat.cos() * lon.sin(),
        (n * (1.0 - e2) + alt_km) * lat.sin(),
    ]
}

/// Geodetic latitude and longitude, degrees, under an ECEF position.
///
/// Fixed-point iteration on the latitude; three rounds are ample at LEO
/// altitudes.
pub(crate) fn ecef_to_geodetic(p: Vec3) -> (f64, f64) {
    let lon = p[1].atan2(p[0]);
    let r = (p[0] * p[0] + p[1] * p[1]).sqrt();
    let e2 = eccentricity_sq();
    let mut lat = p[2].atan2(r * (1.0 - e2));
    for _ in 0..3 {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        lat = (p[2] + n * e2 * sin_lat).atan2(r);
    }
    (lat * RAD2DEG, lon * RAD2DEG)
}

/// Greenwich mean sidereal time, radians, at a Unix timestamp.
pub(crate) fn gmst(unix_seconds: f64) -> f64 {
    let jd = JD_UNIX_EPOCH + unix_seconds / SECONDS_PER_DAY;
    let tu = (jd - JD_J2000) / 36525.0;
    let gmst_sec = 67310.54841
        + (876600.0 * 3600.0 + 8640184.812866) * tu
        + 0.093104 * tu * tu
        - 6.2e-6 * tu * tu * tu;
    gmst_sec.rem_euclid(SECONDS_PER_DAY) * (PI / 43200.0)
}

/// Rotate a TEME position into ECEF.
pub(crate) fn teme_to_ecef(p: Vec3, gmst_rad: f64) -> Vec3 {
    let (sin_g, cos_g) = gmst_rad.sin_cos();
    [
        p[0] * cos_g + p[1] * sin_g,
        -p[0] * sin_g + p[1] * cos_g,
        p[2],
    ]
}

/// Rotate a TEME velocity into ECEF.
///
/// The rotating frame adds an `omega x r` term on top of the plain
/// rotation, without it range rates come out wrong by up to ~0.5 km/s.
pub(crate) fn teme_vel_to_ecef(p: Vec3, v: Vec3, gmst_rad: f64) -> Vec3 {
    let (sin_g, cos_g) = gmst_rad.sin_cos();
    [
        v[0] * cos_g + v[1] * sin_g + OMEGA_EARTH * (-p[0] * sin_g + p[1] * cos_g),
        -v[0] * sin_g + v[1] * cos_g + OMEGA_EARTH * (-p[0] * cos_g - p[1] * sin_g),
        v[2],
    ]
}

/// Rotate an ECEF-relative vector into the east-north-up frame of a
/// station at the given geodetic coordinates.
pub(crate) fn ecef_to_enu(rel: Vec3, lat_deg: f64, lon_deg: f64) -> Vec3 {
    let lat = lat_deg * DEG2RAD;
    let lon = lon_deg * DEG2RAD;
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    [
        -sin_lon * rel[0] + cos_lon * rel[1],
        -sin_lat * cos_lon * rel[0] - sin_lat * sin_lon * rel[1] + cos_lat * rel[2],
        cos_lat * cos_lon * rel[0] + cos_lat * sin_lon * rel[1] + sin_lat * rel[2],
    ]
}

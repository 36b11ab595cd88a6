//! Doppler correction of the nominal frequency plan, plus the tuning-grid
//! rounding applied before frequencies go out over CAT.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::orbit::StateVector;
use crate::station::{FrequencyPlan, Link};

/// Speed of light, m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Corrected frequency pair for one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DopplerResult {
    pub at: DateTime<Utc>,
    pub uplink_hz: f64,
    pub downlink_hz: f64,
    /// Range rate the correction was computed from, m/s.
    pub range_rate_m_s: f64,
}

/// Applies the per-link Doppler correction to one frequency plan.
#[derive(Debug, Clone)]
pub struct DopplerEngine {
    plan: FrequencyPlan,
}

impl DopplerEngine {
    pub fn new(plan: FrequencyPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &FrequencyPlan {
        &self.plan
    }

    /// Corrected frequency of one link for a given range rate.
    ///
    /// A receding satellite (positive range rate) is heard low, so the
    /// downlink dial moves down by `f * v/c`; the uplink moves up by the
    /// same factor so the satellite receives the nominal frequency.
    /// Non-finite range rates propagate into the result untouched.
    pub fn corrected(nominal_hz: f64, range_rate_m_s: f64, link: Link) -> f64 {
        let frac = range_rate_m_s / SPEED_OF_LIGHT;
        match link {
            Link::Uplink => nominal_hz * (1.0 + frac),
            Link::Downlink => nominal_hz * (1.0 - frac),
        }
    }

    /// Correct both links of the plan for one state sample. Links with
    /// correction disabled still report their corrected value here; the
    /// control loop decides what is actually sent.
    pub fn correct(&self, state: &StateVector) -> DopplerResult {
        DopplerResult {
            at: state.at,
            uplink_hz: Self::corrected(
                self.plan.nominal(Link::Uplink),
                state.range_rate_m_s,
                Link::Uplink,
            ),
            downlink_hz: Self::corrected(
                self.plan.nominal(Link::Downlink),
                state.range_rate_m_s,
                Link::Downlink,
            ),
            range_rate_m_s: state.range_rate_m_s,
        }
    }
}

/// Round a frequency onto the rig's tuning grid.
///
/// Remainders under `threshold_hz` round down, the rest round up to the
/// next step, which keeps FM channels on their published boundaries.
/// A zero step disables the grid.
pub fn snap_to_step(hz: u64, step_hz: u64, threshold_hz: u64) -> u64 {
    if step_hz == 0 {
        return hz;
    }
    let rem = hz % step_hz;
    if rem == 0 {
        hz
    } else if rem < threshold_hz {
        hz - rem
    } else {
        hz + (step_hz - rem)
    }
}

//! Session bookkeeping and the status snapshot published by the
//! tracking controller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::doppler::DopplerResult;
use crate::orbit::NoradId;
use crate::predict::PassWindow;
use crate::station::Link;

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// No active pass. The controller may still be armed and waiting.
    #[default]
    Idle,
    /// Inside a pass, driving the rig.
    Tracking,
    /// Inside a pass, computing but not sending commands.
    Paused,
}

/// Health of the CAT link as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkHealth {
    #[default]
    Ok,
    /// Too many consecutive command failures; tracking continues and the
    /// health flips back on the next success.
    Degraded,
}

/// The satellite currently designated for tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ArmedSatellite {
    pub norad_id: NoradId,
    pub name: String,
}

/// Live state of one pass being tracked.
///
/// Created when the pass opens, updated every tick, dropped at LOS or on
/// cancel.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingSession {
    pub id: Uuid,
    pub norad_id: NoradId,
    pub satellite: String,
    pub window: PassWindow,
    pub started_at: DateTime<Utc>,
    pub last_update: Option<DateTime<Utc>>,
    pub last_doppler: Option<DopplerResult>,
    /// Last frequency the rig actually accepted, per link.
    pub applied_uplink_hz: Option<u64>,
    pub applied_downlink_hz: Option<u64>,
    pub ticks: u64,
    pub commands_sent: u64,
    pub command_failures: u64,
}

impl TrackingSession {
    pub fn new(window: PassWindow, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            norad_id: window.norad_id,
            satellite: window.satellite.clone(),
            window,
            started_at,
            last_update: None,
            last_doppler: None,
            applied_uplink_hz: None,
            applied_downlink_hz: None,
            ticks: 0,
            commands_sent: 0,
            command_failures: 0,
        }
    }

    pub fn applied(&self, link: Link) -> Option<u64> {
        match link {
            Link::Uplink => self.applied_uplink_hz,
            Link::Downlink => self.applied_downlink_hz,
        }
    }

    pub(crate) fn set_applied(&mut self, link: Link, hz: u64) {
        match link {
            Link::Uplink => self.applied_uplink_hz = Some(hz),
            Link::Downlink => self.applied_downlink_hz = Some(hz),
        }
    }
}

/// Snapshot published on the controller's watch channel after every tick
/// and command.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingStatus {
    pub state: TrackingState,
    pub link_health: LinkHealth,
    pub armed: Option<ArmedSatellite>,
    pub session: Option<TrackingSession>,
    /// Seconds until the next scheduled AOS, while one is known and still
    /// ahead.
    pub next_aos_in_s: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl TrackingStatus {
    pub(crate) fn idle(at: DateTime<Utc>) -> Self {
        Self {
            state: TrackingState::Idle,
            link_health: LinkHealth::Ok,
            armed: None,
            session: None,
            next_aos_in_s: None,
            updated_at: at,
        }
    }
}

//! Real-time tracking: the session model and the control loop that keeps
//! the rig on frequency through a pass.

pub mod controller;
pub mod session;

pub use controller::{LinkTuning, OperatorCommand, TrackingConfig, TrackingController};
pub use session::{ArmedSatellite, LinkHealth, TrackingSession, TrackingState, TrackingStatus};

//! Core library of the satrig ground-station tracker.
//!
//! Everything between a TLE catalog and a CAT-controlled transceiver:
//! a topocentric orbit model over SGP4, pass prediction, Doppler
//! correction of the frequency plan, and the tracking controller that
//! drives the rig in real time. Transports, catalogs and configuration
//! live with the binaries built on top.

pub mod clock;
pub mod doppler;
pub mod orbit;
pub mod predict;
pub mod radio;
pub mod station;
pub mod track;

pub use clock::{Clock, ManualClock, SystemClock};
pub use doppler::{DopplerEngine, DopplerResult, SPEED_OF_LIGHT, snap_to_step};
pub use orbit::{EphemerisError, NoradId, OrbitModel, SatElements, StateVector};
pub use predict::{PassPredictor, PassWindow};
pub use radio::{RadioControl, RadioError, RadioStatus};
pub use station::{ConfigurationError, FrequencyPlan, GroundStation, Link};
pub use track::{
    ArmedSatellite, LinkHealth, LinkTuning, OperatorCommand, TrackingConfig, TrackingController,
    TrackingSession, TrackingState, TrackingStatus,
};

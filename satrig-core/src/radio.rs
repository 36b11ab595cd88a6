//! CAT control surface of the transceiver.

use async_trait::async_trait;

use crate::station::Link;

/// Failures of the rig-control transport.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// No reply within the deadline.
    #[error("radio command timed out")]
    Timeout,
    /// Transport is gone, e.g. serial port closed.
    #[error("radio disconnected: {0}")]
    Disconnected(String),
    /// The rig answered but refused the command.
    #[error("radio rejected command: {0}")]
    Rejected(String),
}

/// Reply to a status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioStatus {
    /// Dial frequency reported by the rig, if it exposes one.
    pub frequency_hz: Option<u64>,
}

/// The rig operations the tracking loop needs.
///
/// Implementations own the transport and are driven by exactly one
/// controller at a time, hence `&mut self`. Wire format and serial
/// parameters are the driver's business.
#[async_trait]
pub trait RadioControl: Send {
    /// Tune one link's VFO.
    async fn set_frequency(&mut self, link: Link, hz: u64) -> Result<(), RadioError>;

    /// Liveness probe; also used as the per-tick link check before any
    /// tuning commands go out.
    async fn status(&mut self) -> Result<RadioStatus, RadioError>;
}

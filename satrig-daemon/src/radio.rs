//! Rig backends.

use async_trait::async_trait;
use satrig_core::{Link, RadioControl, RadioError, RadioStatus};
use tracing::info;

/// Logs every tuning command instead of talking to hardware, so an
/// operator can rehearse a pass with no rig attached.
#[derive(Debug, Default)]
pub struct DryRunRadio {
    last_uplink_hz: Option<u64>,
    last_downlink_hz: Option<u64>,
}

impl DryRunRadio {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RadioControl for DryRunRadio {
    async fn set_frequency(&mut self, link: Link, hz: u64) -> Result<(), RadioError> {
        info!(link = link.as_str(), hz, "dry run: set frequency");
        match link {
            Link::Uplink => self.last_uplink_hz = Some(hz),
            Link::Downlink => self.last_downlink_hz = Some(hz),
        }
        Ok(())
    }

    async fn status(&mut self) -> Result<RadioStatus, RadioError> {
        Ok(RadioStatus {
            frequency_hz: self.last_downlink_hz,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_radio_remembers_last_frequency() {
        let mut radio = DryRunRadio::new();
        assert_eq!(radio.status().await.unwrap().frequency_hz, None);
        radio
            .set_frequency(Link::Downlink, 145_896_300)
            .await
            .unwrap();
        radio.set_frequency(Link::Uplink, 435_011_000).await.unwrap();
        assert_eq!(
            radio.status().await.unwrap().frequency_hz,
            Some(145_896_300)
        );
    }
}
